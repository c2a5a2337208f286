//! Tracking session - the editor-facing façade
//!
//! A [`TrackingSession`] owns one document together with its change
//! registry, author style map, selection backend and notifier. Edits run
//! against a working copy of the document state that replaces the live
//! state only when the edit succeeds, so a failed edit leaves nothing
//! behind.

use crate::bookmark::Bookmark;
use crate::classifier::Classifier;
use crate::host::RangeBackend;
use crate::mutator::{EditIntent, EditOutcome, Mutator};
use crate::notify::{Notifier, SubscriptionId, TrackingEvent};
use crate::review::{clean_tree, Resolution, Reviewer};
use crate::{
    AuthorStyles, Change, ChangeFilter, ChangeId, ChangeRegistry, HiddenRegionPolicy,
    ReloadSummary, Result, TrackingConfig, TrackingError, User,
};
use dom_model::{parse_fragment, DomPoint, DomRange, DomTree, NodeId, Selection};
use std::collections::BTreeMap;

/// One tracked document and everything needed to edit it
pub struct TrackingSession {
    config: TrackingConfig,
    tree: DomTree,
    registry: ChangeRegistry,
    styles: AuthorStyles,
    selection: Box<dyn Selection>,
    notifier: Notifier,
    current_user: User,
    /// Payload stamped on new groups
    change_data: String,
    tracking: bool,
    show_changes: bool,
}

impl std::fmt::Debug for TrackingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingSession")
            .field("current_user", &self.current_user)
            .field("changes", &self.registry.len())
            .field("tracking", &self.tracking)
            .field("show_changes", &self.show_changes)
            .field("notifier", &self.notifier)
            .finish()
    }
}

impl TrackingSession {
    /// Create a session over an empty document
    pub fn new(config: TrackingConfig, backend: RangeBackend) -> Result<Self> {
        config.validate()?;
        let styles = AuthorStyles::with_assignments(&config.style_prefix, &config.user_styles);
        Ok(Self {
            config,
            tree: DomTree::new(),
            registry: ChangeRegistry::new(),
            styles,
            selection: backend.into_selection(),
            notifier: Notifier::new(),
            current_user: User::default(),
            change_data: String::new(),
            tracking: true,
            show_changes: true,
        })
    }

    /// Create a session over existing markup, picking up its changes
    pub fn from_markup(markup: &str, config: TrackingConfig, backend: RangeBackend) -> Result<Self> {
        let mut session = Self::new(config, backend)?;
        session.load_html(markup)?;
        Ok(session)
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn document(&self) -> &DomTree {
        &self.tree
    }

    pub fn registry(&self) -> &ChangeRegistry {
        &self.registry
    }

    pub fn styles(&self) -> &AuthorStyles {
        &self.styles
    }

    pub fn current_user(&self) -> &User {
        &self.current_user
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// The first selected range, if it is valid for the document
    pub fn current_range(&self) -> Option<DomRange> {
        if self.selection.range_count(&self.tree) == 0 {
            return None;
        }
        let range = self.selection.get_range_at(&self.tree, 0)?;
        match range.validate(&self.tree) {
            Ok(()) => Some(range),
            Err(e) => {
                tracing::debug!("Ignoring unusable selection: {}", e);
                None
            }
        }
    }

    pub fn set_selection(&mut self, range: DomRange) -> Result<()> {
        range.validate(&self.tree)?;
        self.select(range);
        Ok(())
    }

    pub fn set_caret(&mut self, point: DomPoint) -> Result<()> {
        self.set_selection(DomRange::collapsed_at(point))
    }

    fn select(&mut self, range: DomRange) {
        self.selection.remove_all_ranges();
        self.selection.add_range(range);
    }

    /// Create detached nodes from markup for [`EditIntent::InsertNodes`]
    pub fn create_nodes(&mut self, markup: &str) -> Result<Vec<NodeId>> {
        Ok(self.tree.parse_detached(markup)?)
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Apply an intent to the current selection.
    ///
    /// With tracking off, or without a usable selection, nothing happens
    /// and the host should edit natively. Nodes passed in
    /// [`EditIntent::InsertNodes`] that were not inserted are dropped from
    /// the document arena.
    ///
    /// Each edit clones the tree, registry and style map and rescans the
    /// document for empty annotations, so its cost grows with document size.
    pub fn apply(&mut self, intent: EditIntent) -> Result<EditOutcome> {
        let offered = match &intent {
            EditIntent::InsertNodes(nodes) => nodes.clone(),
            _ => Vec::new(),
        };
        let result = self.apply_to_working_copy(intent);
        if !matches!(result, Ok(EditOutcome::Handled)) {
            self.discard_detached(&offered)?;
        }
        result
    }

    /// Remove offered nodes still left outside the document
    fn discard_detached(&mut self, nodes: &[NodeId]) -> Result<()> {
        for node in nodes {
            if self.tree.contains(*node) && self.tree.parent(*node).is_none() && *node != self.tree.root() {
                tracing::debug!("Discarding unused detached node {}", node);
                self.tree.remove(*node)?;
            }
        }
        Ok(())
    }

    fn apply_to_working_copy(&mut self, intent: EditIntent) -> Result<EditOutcome> {
        if !self.tracking {
            tracing::debug!("Tracking disabled, deferring {:?} to host", intent);
            return Ok(EditOutcome::NotHandled);
        }
        let Some(range) = self.current_range() else {
            return Ok(EditOutcome::NotHandled);
        };

        let policy = if self.show_changes {
            self.config.hidden_region_policy
        } else {
            HiddenRegionPolicy::Skip
        };
        let mut tree = self.tree.clone();
        let mut registry = self.registry.clone();
        let mut styles = self.styles.clone();

        let mut mutator = Mutator::new(
            &mut tree,
            &mut registry,
            &mut styles,
            &self.config,
            &self.current_user,
        )
        .with_payload(&self.change_data)
        .with_policy(policy);
        let applied = mutator.apply(range, intent)?;
        let pending = mutator.pending();

        if applied.mutated {
            self.tree = tree;
            self.registry = registry;
            self.styles = styles;
            self.notifier.schedule(pending);
        }
        if let Some(caret) = applied.caret {
            if applied.outcome == EditOutcome::Handled || applied.mutated {
                self.select(DomRange::collapsed_at(caret));
            }
        }
        Ok(applied.outcome)
    }

    pub fn insert_text(&mut self, text: &str) -> Result<EditOutcome> {
        self.apply(EditIntent::Insert(text.to_string()))
    }

    pub fn insert_nodes(&mut self, nodes: Vec<NodeId>) -> Result<EditOutcome> {
        self.apply(EditIntent::InsertNodes(nodes))
    }

    pub fn delete_right(&mut self) -> Result<EditOutcome> {
        self.apply(EditIntent::DeleteRight)
    }

    pub fn delete_left(&mut self) -> Result<EditOutcome> {
        self.apply(EditIntent::DeleteLeft)
    }

    pub fn enter(&mut self) -> Result<EditOutcome> {
        self.apply(EditIntent::Enter)
    }

    // =========================================================================
    // Accept / Reject
    // =========================================================================

    pub fn accept_all(&mut self, filter: Option<&ChangeFilter>) -> Result<usize> {
        self.resolve_all(Resolution::Accept, filter)
    }

    pub fn reject_all(&mut self, filter: Option<&ChangeFilter>) -> Result<usize> {
        self.resolve_all(Resolution::Reject, filter)
    }

    /// Accept the group enclosing `node`; `None` if it is not in a change
    pub fn accept_change(&mut self, node: NodeId) -> Result<Option<ChangeId>> {
        self.resolve_at(node, Resolution::Accept)
    }

    /// Reject the group enclosing `node`; `None` if it is not in a change
    pub fn reject_change(&mut self, node: NodeId) -> Result<Option<ChangeId>> {
        self.resolve_at(node, Resolution::Reject)
    }

    fn resolve_all(&mut self, resolution: Resolution, filter: Option<&ChangeFilter>) -> Result<usize> {
        let mut tree = self.tree.clone();
        let mut registry = self.registry.clone();
        let count = Reviewer::new(&mut tree, &mut registry, &self.config).resolve_all(resolution, filter)?;
        self.commit_review(tree, registry);
        Ok(count)
    }

    fn resolve_at(&mut self, node: NodeId, resolution: Resolution) -> Result<Option<ChangeId>> {
        let mut tree = self.tree.clone();
        let mut registry = self.registry.clone();
        let resolved = Reviewer::new(&mut tree, &mut registry, &self.config).resolve_at(node, resolution)?;
        if resolved.is_some() {
            self.commit_review(tree, registry);
        }
        Ok(resolved)
    }

    fn commit_review(&mut self, tree: DomTree, registry: ChangeRegistry) {
        self.tree = tree;
        self.registry = registry;
        if self.current_range().is_none() {
            self.selection.remove_all_ranges();
        }
        self.notifier.trigger(TrackingEvent::Change);
        self.notifier.trigger(TrackingEvent::TextChange);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_changes(&self) -> &BTreeMap<ChangeId, Change> {
        self.registry.changes()
    }

    pub fn get_change(&self, id: ChangeId) -> Result<&Change> {
        self.registry.get_change(id).ok_or(TrackingError::ChangeNotFound(id))
    }

    /// Number of groups, optionally restricted by a filter
    pub fn count_changes(&self, filter: Option<&ChangeFilter>) -> usize {
        match filter {
            Some(filter) => self.registry.iter().filter(|(_, c)| filter.matches(c)).count(),
            None => self.registry.len(),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.registry.is_empty()
    }

    pub fn change_user_ids(&self) -> Vec<String> {
        self.registry.change_user_ids()
    }

    /// The registry as JSON, keyed by group id
    pub fn changes_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self.registry.changes())?)
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Document with every pending change accepted, markers dropped
    pub fn clean_dom(&self) -> Result<DomTree> {
        clean_tree(&self.tree, &self.config)
    }

    pub fn clean_content(&self) -> Result<String> {
        let clean = self.clean_dom()?;
        Ok(clean.inner_html(clean.root()))
    }

    /// Annotated markup of the live document
    pub fn content_html(&self) -> String {
        self.tree.inner_html(self.tree.root())
    }

    /// Replace the document and rebuild the registry from its annotations
    pub fn load_html(&mut self, markup: &str) -> Result<ReloadSummary> {
        let mut tree = parse_fragment(markup)?;
        let mut registry = ChangeRegistry::new();
        let mut styles = AuthorStyles::with_assignments(&self.config.style_prefix, &self.config.user_styles);
        let summary = registry.reload(&mut tree, &self.config, &self.current_user, &mut styles)?;

        self.tree = tree;
        self.registry = registry;
        self.styles = styles;
        self.selection.remove_all_ranges();
        self.notifier.trigger(TrackingEvent::Change);
        self.notifier.trigger(TrackingEvent::TextChange);
        tracing::info!(
            "Loaded document with {} change groups over {} annotation nodes",
            summary.changes,
            summary.annotation_nodes
        );
        Ok(summary)
    }

    /// Annotation node around the selection start
    pub fn current_change_node(&self) -> Option<NodeId> {
        let range = self.current_range()?;
        self.classifier().enclosing_change_node(&self.tree, &range.start())
    }

    pub fn is_inside_change(&self) -> bool {
        self.current_change_node().is_some()
    }

    /// Visible units before a point, skipping deleted text
    pub fn visible_text_offset(&self, point: &DomPoint) -> usize {
        self.classifier().visible_text_offset(&self.tree, point)
    }

    fn classifier(&self) -> Classifier<'_> {
        Classifier::new(&self.config, &self.current_user.id)
    }

    // =========================================================================
    // Bookmarks
    // =========================================================================

    /// Place markers around the current selection
    pub fn get_bookmark(&mut self) -> Result<Option<Bookmark>> {
        let Some(range) = self.current_range() else {
            return Ok(None);
        };
        Ok(Some(Bookmark::create(&mut self.tree, &range)?))
    }

    /// Remove a bookmark's markers and select what they delimited
    pub fn move_to_bookmark(&mut self, bookmark: Bookmark) -> Result<Option<DomRange>> {
        let range = bookmark.select(&mut self.tree)?;
        if let Some(range) = range {
            self.select(range);
        }
        Ok(range)
    }

    // =========================================================================
    // Tracking Control
    // =========================================================================

    /// Enable tracking and rebuild the registry from the document
    pub fn start_tracking(&mut self) -> Result<ReloadSummary> {
        self.tracking = true;
        let summary = self.reload()?;
        tracing::info!("Change tracking started");
        Ok(summary)
    }

    /// Disable tracking; content is left as it is
    pub fn stop_tracking(&mut self) {
        self.tracking = false;
        tracing::info!("Change tracking stopped");
    }

    pub fn enable_change_tracking(&mut self) {
        self.tracking = true;
    }

    pub fn disable_change_tracking(&mut self) {
        self.tracking = false;
    }

    /// Set tracking, or flip it when `None`; returns the new state
    pub fn toggle_change_tracking(&mut self, enabled: Option<bool>) -> bool {
        self.tracking = enabled.unwrap_or(!self.tracking);
        self.tracking
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Rebuild the registry and style map from annotation nodes.
    ///
    /// Fails with [`TrackingError::TrackingDisabled`] while tracking is off.
    pub fn reload(&mut self) -> Result<ReloadSummary> {
        if !self.tracking {
            return Err(TrackingError::TrackingDisabled);
        }
        let mut tree = self.tree.clone();
        let mut registry = ChangeRegistry::new();
        let mut styles = AuthorStyles::with_assignments(&self.config.style_prefix, &self.config.user_styles);
        let summary = registry.reload(&mut tree, &self.config, &self.current_user, &mut styles)?;

        self.tree = tree;
        self.registry = registry;
        self.styles = styles;
        self.notifier.trigger(TrackingEvent::Change);
        tracing::info!(
            "Reloaded {} change groups ({} ids synthesized, {} nodes restyled)",
            summary.changes,
            summary.synthesized_ids,
            summary.restyled
        );
        Ok(summary)
    }

    // =========================================================================
    // User and Display
    // =========================================================================

    /// Switch the active author, refreshing their name everywhere
    pub fn set_current_user(&mut self, user: User) -> Result<()> {
        if user.id.trim().is_empty() {
            return Err(TrackingError::InvalidUser("user id cannot be empty".to_string()));
        }
        self.registry.rename_user(&mut self.tree, &self.config, &user)?;
        tracing::debug!("Current user is now {}", user.id);
        self.current_user = user;
        Ok(())
    }

    /// Record whether deletions are displayed
    pub fn set_show_changes(&mut self, show: bool) {
        self.show_changes = show;
    }

    pub fn shows_changes(&self) -> bool {
        self.show_changes
    }

    /// Payload for groups created from now on
    pub fn set_change_data(&mut self, data: Option<String>) {
        self.change_data = data.unwrap_or_default();
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub fn subscribe(&mut self, listener: impl FnMut(TrackingEvent) + 'static) -> SubscriptionId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn has_pending_notifications(&self) -> bool {
        self.notifier.has_pending()
    }

    /// Deliver coalesced notifications; call from the host's deferred timer
    pub fn dispatch_notifications(&mut self) -> Vec<TrackingEvent> {
        self.notifier.dispatch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_session(markup: &str) -> TrackingSession {
        let mut session =
            TrackingSession::from_markup(markup, TrackingConfig::default(), RangeBackend::Synthetic).unwrap();
        session.set_current_user(User::new("A", "Alice")).unwrap();
        session
    }

    fn first_text(session: &TrackingSession) -> NodeId {
        let tree = session.document();
        tree.descendants(tree.root())
            .into_iter()
            .find(|n| tree.is_text(*n))
            .unwrap()
    }

    #[test]
    fn test_edit_without_selection_is_not_handled() {
        let mut session = create_session("<p>abc</p>");
        assert_eq!(session.insert_text("x").unwrap(), EditOutcome::NotHandled);
        assert!(!session.has_changes());
    }

    #[test]
    fn test_disabled_tracking_defers() {
        let mut session = create_session("<p>abc</p>");
        let text = first_text(&session);
        session.set_caret(DomPoint::new(text, 1)).unwrap();
        assert!(!session.toggle_change_tracking(None));
        assert_eq!(session.delete_right().unwrap(), EditOutcome::NotHandled);
        assert_eq!(session.content_html(), "<p>abc</p>");
        assert!(matches!(session.reload(), Err(TrackingError::TrackingDisabled)));
        assert!(session.toggle_change_tracking(Some(true)));
        assert!(session.reload().is_ok());
    }

    #[test]
    fn test_failed_edit_leaves_document_untouched() {
        let mut session = create_session("<p>abc</p>");
        let text = first_text(&session);
        session.set_caret(DomPoint::new(text, 1)).unwrap();
        let before = session.content_html();
        let result = session.insert_nodes(vec![text]);
        assert!(result.is_err());
        assert_eq!(session.content_html(), before);
        assert!(!session.has_pending_notifications());
    }

    #[test]
    fn test_unused_created_nodes_are_discarded() {
        let mut session = create_session("<p>abc</p>");
        let text = first_text(&session);
        session.set_caret(DomPoint::new(text, 1)).unwrap();
        let before = session.document().node_count();

        session.disable_change_tracking();
        let nodes = session.create_nodes("x<b>y</b>").unwrap();
        assert_eq!(session.document().node_count(), before + 3);
        assert_eq!(session.insert_nodes(nodes.clone()).unwrap(), EditOutcome::NotHandled);
        assert_eq!(session.document().node_count(), before);
        assert!(nodes.iter().all(|n| !session.document().contains(*n)));

        session.enable_change_tracking();
        let nodes = session.create_nodes("<i>z</i>").unwrap();
        assert_eq!(session.insert_nodes(nodes.clone()).unwrap(), EditOutcome::Handled);
        assert!(session.document().is_attached(nodes[0]));
    }

    #[test]
    fn test_stale_selection_is_ignored() {
        let mut session = create_session("<p>abc</p>");
        let text = first_text(&session);
        session.set_caret(DomPoint::new(text, 3)).unwrap();
        session.load_html("<p>x</p>").unwrap();
        assert_eq!(session.current_range(), None);
        assert!(session.set_caret(DomPoint::new(text, 0)).is_err());
    }

    #[test]
    fn test_payload_and_user_name_are_stamped() {
        let mut session = create_session("<p>abc</p>");
        let text = first_text(&session);
        session.set_caret(DomPoint::new(text, 3)).unwrap();
        session.set_change_data(Some("rev-7".to_string()));
        session.insert_text("d").unwrap();

        let (id, change) = session.get_changes().iter().next().unwrap();
        assert_eq!(change.payload, "rev-7");
        assert_eq!(change.user_name, "Alice");
        assert_eq!(session.get_change(*id).unwrap(), change);
        assert!(matches!(
            session.get_change(ChangeId(99)),
            Err(TrackingError::ChangeNotFound(_))
        ));

        session.set_current_user(User::new("A", "Alice B")).unwrap();
        assert!(session.content_html().contains(r#"data-username="Alice B""#));
        assert!(session.changes_json().unwrap().contains("Alice B"));
    }

    #[test]
    fn test_empty_user_id_is_rejected() {
        let mut session = create_session("<p>abc</p>");
        assert!(matches!(
            session.set_current_user(User::new(" ", "Nobody")),
            Err(TrackingError::InvalidUser(_))
        ));
        assert_eq!(session.current_user().id, "A");
    }

    #[test]
    fn test_current_change_node() {
        let mut session = create_session(r#"<p>a<ins class="ice-ins" data-cid="4" data-userid="B">bc</ins></p>"#);
        let text = first_text(&session);
        session.set_caret(DomPoint::new(text, 1)).unwrap();
        assert!(!session.is_inside_change());

        let inserted = session.document().next_sibling(text).unwrap();
        let inner = session.document().children(inserted)[0];
        session.set_caret(DomPoint::new(inner, 1)).unwrap();
        assert_eq!(session.current_change_node(), Some(inserted));
    }

    #[test]
    fn test_bookmark_round_trip() {
        let mut session = create_session("<p>abc</p>");
        let text = first_text(&session);
        session
            .set_selection(DomRange::new(DomPoint::new(text, 1), DomPoint::new(text, 2)))
            .unwrap();
        let bookmark = session.get_bookmark().unwrap().unwrap();
        assert!(session.content_html().contains("ice-bookmark"));
        assert_eq!(session.clean_content().unwrap(), "<p>abc</p>");

        let range = session.move_to_bookmark(bookmark).unwrap().unwrap();
        assert!(!range.is_collapsed());
        assert_eq!(session.current_range(), Some(range));
        assert!(!session.content_html().contains("ice-bookmark"));
    }
}
