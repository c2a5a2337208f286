//! Deferred change notifications
//!
//! Triggers only set flags. The host calls [`Notifier::dispatch`] from its
//! own zero-delay timer, so a burst of triggers inside one synchronous edit
//! reaches each listener at most once per event kind.

use serde::{Deserialize, Serialize};

/// Events delivered to listeners; listeners re-query state on receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackingEvent {
    /// The set of change groups changed
    Change,
    /// Document text changed
    TextChange,
}

/// Event flags raised but not yet delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingEvents {
    pub change: bool,
    pub text_change: bool,
}

impl PendingEvents {
    pub fn trigger(&mut self, event: TrackingEvent) {
        match event {
            TrackingEvent::Change => self.change = true,
            TrackingEvent::TextChange => self.text_change = true,
        }
    }

    pub fn merge(&mut self, other: PendingEvents) {
        self.change |= other.change;
        self.text_change |= other.text_change;
    }

    pub fn is_empty(&self) -> bool {
        !self.change && !self.text_change
    }

    fn events(&self) -> Vec<TrackingEvent> {
        let mut events = Vec::new();
        if self.change {
            events.push(TrackingEvent::Change);
        }
        if self.text_change {
            events.push(TrackingEvent::TextChange);
        }
        events
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(TrackingEvent)>;

/// Listener list plus the coalesced pending flags
#[derive(Default)]
pub struct Notifier {
    listeners: Vec<(SubscriptionId, Listener)>,
    pending: PendingEvents,
    next_id: u64,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .field("pending", &self.pending)
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(TrackingEvent) + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn trigger(&mut self, event: TrackingEvent) {
        self.pending.trigger(event);
    }

    pub fn schedule(&mut self, events: PendingEvents) {
        self.pending.merge(events);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> PendingEvents {
        self.pending
    }

    /// Deliver pending events and clear them; returns the kinds delivered
    pub fn dispatch(&mut self) -> Vec<TrackingEvent> {
        let events = std::mem::take(&mut self.pending).events();
        for event in &events {
            for (_, listener) in self.listeners.iter_mut() {
                listener(*event);
            }
        }
        events
    }
}
