//! Region mutator - records edits as annotation rewrites
//!
//! Every edit starts from a [`DomRange`] and an [`EditIntent`] and either
//! rewrites the tree so the edit is recorded as tracked changes, or reports
//! [`EditOutcome::NotHandled`] so the host can apply its native behavior.
//! The mutator works on whatever tree it is given; callers that need
//! all-or-nothing semantics hand it a working copy.

mod delete;
mod insert;
mod range_delete;

use crate::classifier::Classifier;
use crate::content::ContentModel;
use crate::notify::{PendingEvents, TrackingEvent};
use crate::{
    AuthorStyles, ChangeKind, ChangeRegistry, HiddenRegionPolicy, Result, TrackingConfig, User,
};
use dom_model::{DomPoint, DomRange, DomTree, NodeId};
use serde::{Deserialize, Serialize};

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditIntent {
    /// Type text at the selection
    Insert(String),
    /// Insert detached nodes already created in the tree's arena
    InsertNodes(Vec<NodeId>),
    /// Forward delete
    DeleteRight,
    /// Backspace
    DeleteLeft,
    /// Paragraph break; only a selection is deleted, the host adds the break
    Enter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditOutcome {
    /// The edit was recorded; the host must not apply it again
    Handled,
    /// The host should apply its default behavior
    NotHandled,
}

/// Result of applying one intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub outcome: EditOutcome,
    /// Where the caret belongs afterwards
    pub caret: Option<DomPoint>,
    /// True when the tree or registry changed
    pub mutated: bool,
}

impl Applied {
    pub fn not_handled() -> Self {
        Self {
            outcome: EditOutcome::NotHandled,
            caret: None,
            mutated: false,
        }
    }

    fn handled(caret: DomPoint, mutated: bool) -> Self {
        Self {
            outcome: EditOutcome::Handled,
            caret: Some(caret),
            mutated,
        }
    }
}

/// How a unit of content was deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Structurally removed; the point is where it used to be
    Removed(DomPoint),
    /// Kept inside a deletion annotation
    Tracked,
}

/// Applies edit intents to a tree, registry and style map
pub struct Mutator<'a> {
    tree: &'a mut DomTree,
    registry: &'a mut ChangeRegistry,
    styles: &'a mut AuthorStyles,
    config: &'a TrackingConfig,
    user: &'a User,
    payload: &'a str,
    policy: HiddenRegionPolicy,
    pending: PendingEvents,
}

impl<'a> Mutator<'a> {
    pub fn new(
        tree: &'a mut DomTree,
        registry: &'a mut ChangeRegistry,
        styles: &'a mut AuthorStyles,
        config: &'a TrackingConfig,
        user: &'a User,
    ) -> Self {
        Self {
            tree,
            registry,
            styles,
            config,
            user,
            payload: "",
            policy: config.hidden_region_policy,
            pending: PendingEvents::default(),
        }
    }

    /// Payload stamped on groups created by this mutator
    pub fn with_payload(mut self, payload: &'a str) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_policy(mut self, policy: HiddenRegionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Events raised so far
    pub fn pending(&self) -> PendingEvents {
        self.pending
    }

    fn classifier(&self) -> Classifier<'a> {
        let user: &'a User = self.user;
        Classifier::new(self.config, &user.id)
    }

    fn model(&self) -> ContentModel<'a> {
        ContentModel::new(self.config)
    }

    /// Apply one intent to a range.
    ///
    /// All nodes created by the intent belong to one batch. Invalid
    /// structural operations are returned as errors and may leave the
    /// tree partially rewritten.
    pub fn apply(&mut self, range: DomRange, intent: EditIntent) -> Result<Applied> {
        range.validate(self.tree)?;
        let batch = self.registry.start_batch();
        let result = self.dispatch(range, intent);
        self.registry.end_batch(batch);
        let mut applied = result?;

        if applied.mutated {
            if let Some(caret) = applied.caret {
                applied.caret = Some(self.prune_empty_annotations(caret)?);
            } else {
                self.prune_empty_annotations(range.start())?;
            }
            if !self.registry.collect_garbage(self.tree, self.config).is_empty() {
                self.pending.trigger(TrackingEvent::Change);
            }
            self.pending.trigger(TrackingEvent::TextChange);
        }
        Ok(applied)
    }

    fn dispatch(&mut self, range: DomRange, intent: EditIntent) -> Result<Applied> {
        match intent {
            EditIntent::Insert(text) => {
                if text.is_empty() {
                    return Ok(Applied::not_handled());
                }
                let node = self.tree.create_text(text);
                self.insert(range, vec![node])
            }
            EditIntent::InsertNodes(nodes) => {
                self.validate_insertable(&nodes)?;
                if nodes.is_empty() {
                    if range.is_collapsed() {
                        return Ok(Applied::not_handled());
                    }
                    let caret = self.delete_selection(range)?;
                    return Ok(Applied::handled(caret, true));
                }
                self.insert(range, nodes)
            }
            EditIntent::DeleteRight | EditIntent::DeleteLeft => {
                if !range.is_collapsed() {
                    let caret = self.delete_selection(range)?;
                    return Ok(Applied::handled(caret, true));
                }
                let forward = intent == EditIntent::DeleteRight;
                self.delete_char(range.start(), forward)
            }
            EditIntent::Enter => {
                if range.is_collapsed() {
                    return Ok(Applied::not_handled());
                }
                let caret = self.delete_selection(range)?;
                Ok(Applied {
                    outcome: EditOutcome::NotHandled,
                    caret: Some(caret),
                    mutated: true,
                })
            }
        }
    }

    // =========================================================================
    // Annotation Helpers
    // =========================================================================

    /// Create a detached annotation element of `kind`
    fn create_annotation(&mut self, kind: ChangeKind) -> NodeId {
        let tag = match kind {
            ChangeKind::Insertion => &self.config.insert_tag,
            ChangeKind::Deletion => &self.config.delete_tag,
        };
        self.tree.create_element(tag)
    }

    /// Attribute annotation nodes to the current batch
    fn record(&mut self, kind: ChangeKind, nodes: &[NodeId]) -> Result<()> {
        let recorded = self.registry.add_change(
            self.tree,
            self.config,
            self.styles,
            kind,
            self.user,
            self.payload,
            nodes,
        )?;
        if recorded.is_new {
            self.pending.trigger(TrackingEvent::Change);
        }
        Ok(())
    }

    /// Delete one unit of content: a text node, stub or foreign element.
    ///
    /// Untracked regions and the user's own pending insertions lose the
    /// unit outright; everything else is wrapped in a deletion.
    fn delete_unit(&mut self, unit: NodeId) -> Result<Disposition> {
        let classifier = self.classifier();
        let in_no_track = self.model().no_track_ancestor(self.tree, unit).is_some();
        let in_own_insert = classifier
            .own_annotation(self.tree, unit, ChangeKind::Insertion)
            .is_some();

        if in_no_track || in_own_insert {
            tracing::debug!(
                "Removing {} unit {}",
                if in_no_track { "untracked" } else { "own inserted" },
                unit
            );
            let Some(at) = DomPoint::before(self.tree, unit) else {
                return Ok(Disposition::Tracked);
            };
            self.tree.remove(unit)?;
            return Ok(Disposition::Removed(at));
        }

        self.track_deletion(unit)?;
        Ok(Disposition::Tracked)
    }

    /// Wrap a unit in a deletion, merging with the user's adjacent deletions
    fn track_deletion(&mut self, unit: NodeId) -> Result<NodeId> {
        for sibling in [self.tree.previous_sibling(unit), self.tree.next_sibling(unit)]
            .into_iter()
            .flatten()
        {
            if self.tree.text(sibling) == Some("") {
                self.tree.remove(sibling)?;
            }
        }

        let prev = self.tree.previous_sibling(unit).filter(|n| self.is_own_deletion(*n));
        let next = self.tree.next_sibling(unit).filter(|n| self.is_own_deletion(*n));

        match (prev, next) {
            (Some(prev), next) => {
                self.tree.append_child(prev, unit)?;
                if let Some(next) = next {
                    self.tree.move_children(next, prev)?;
                    self.tree.remove(next)?;
                }
                tracing::debug!("Merged deletion of {} into {}", unit, prev);
                Ok(prev)
            }
            (None, Some(next)) => {
                self.tree.insert_child(next, 0, unit)?;
                tracing::debug!("Merged deletion of {} into {}", unit, next);
                Ok(next)
            }
            (None, None) => {
                let wrapper = self.create_annotation(ChangeKind::Deletion);
                self.tree.wrap(unit, wrapper)?;
                self.record(ChangeKind::Deletion, &[wrapper])?;
                Ok(wrapper)
            }
        }
    }

    fn is_own_deletion(&self, node: NodeId) -> bool {
        let classifier = self.classifier();
        classifier.change_kind(self.tree, node) == Some(ChangeKind::Deletion)
            && classifier.is_owned_by_current_user(self.tree, node)
    }

    /// A caret position near `at`, preferring text after, then text before
    fn settle(&self, at: DomPoint) -> DomPoint {
        if self.tree.is_text(at.node) {
            return at;
        }
        if let Some(next) = self.tree.child_at(at.node, at.offset) {
            if self.tree.is_text(next) {
                return DomPoint::new(next, 0);
            }
        }
        if let Some(prev) = at
            .offset
            .checked_sub(1)
            .and_then(|i| self.tree.child_at(at.node, i))
        {
            if self.tree.is_text(prev) {
                return DomPoint::new(prev, self.tree.length(prev));
            }
        }
        at
    }

    /// Remove annotations left without content, keeping the caret valid
    fn prune_empty_annotations(&mut self, caret: DomPoint) -> Result<DomPoint> {
        let mut caret = caret;
        let classifier = self.classifier();
        for node in classifier.annotation_nodes(self.tree) {
            if !self.tree.is_attached(node) || !self.is_without_content(node) {
                continue;
            }
            let Some(at) = DomPoint::before(self.tree, node) else {
                continue;
            };
            let holds_caret = self.tree.is_inclusive_ancestor(node, caret.node);
            self.tree.remove(node)?;
            if holds_caret {
                caret = self.settle(at);
            } else if caret.node == at.node && caret.offset > at.offset {
                caret.offset -= 1;
            }
        }
        Ok(caret)
    }

    /// No text, stubs or foreign elements anywhere in the subtree
    fn is_without_content(&self, node: NodeId) -> bool {
        let model = self.model();
        std::iter::once(node)
            .chain(self.tree.descendants(node))
            .all(|n| {
                !model.is_atomic(self.tree, n) && self.tree.text(n).map_or(true, str::is_empty)
            })
    }
}
