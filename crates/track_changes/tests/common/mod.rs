//! Shared harness for the integration tests

#![allow(dead_code)]

use dom_model::{DomPoint, DomRange, NodeId};
use track_changes::{RangeBackend, TrackingConfig, TrackingSession, User};

/// Install a test-writer subscriber once; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A tracking session plus helpers for addressing text by value
pub struct EditorHarness {
    pub session: TrackingSession,
}

impl EditorHarness {
    pub fn new(markup: &str, user: &str) -> Self {
        Self::with_config(markup, user, TrackingConfig::default())
    }

    pub fn with_config(markup: &str, user: &str, config: TrackingConfig) -> Self {
        init_tracing();
        let mut session = TrackingSession::from_markup(markup, config, RangeBackend::Synthetic).unwrap();
        session.set_current_user(User::new(user, user)).unwrap();
        Self { session }
    }

    pub fn switch_user(&mut self, user: &str) {
        self.session.set_current_user(User::new(user, user)).unwrap();
    }

    /// First text node whose value is exactly `value`
    pub fn text_node(&self, value: &str) -> NodeId {
        let tree = self.session.document();
        tree.descendants(tree.root())
            .into_iter()
            .find(|n| tree.text(*n) == Some(value))
            .unwrap_or_else(|| panic!("no text node {:?} in {}", value, self.session.content_html()))
    }

    pub fn caret(&mut self, value: &str, offset: usize) {
        let node = self.text_node(value);
        self.session.set_caret(DomPoint::new(node, offset)).unwrap();
    }

    pub fn select(&mut self, from: (&str, usize), to: (&str, usize)) {
        let start = DomPoint::new(self.text_node(from.0), from.1);
        let end = DomPoint::new(self.text_node(to.0), to.1);
        self.session.set_selection(DomRange::new(start, end)).unwrap();
    }

    /// Markup keeping only the author attribute
    pub fn html(&self) -> String {
        let tree = self.session.document();
        tree.inner_html_with(tree.root(), &|name| name == "data-userid")
    }

    /// Text the reader sees, with deletions hidden
    pub fn visible_text(&self) -> String {
        let clean = self.session.clean_dom().unwrap();
        clean.text_content(clean.root())
    }

    pub fn caret_offset(&self) -> usize {
        let range = self.session.current_range().unwrap();
        self.session.visible_text_offset(&range.start())
    }
}
