//! Annotation node classifier
//!
//! Read-only queries that map tree nodes to change kinds, groups and
//! authors. Nothing here mutates the tree, and every query tolerates
//! detached or missing nodes by returning `None`/`false`.

use crate::{ChangeId, ChangeKind, TrackingConfig};
use dom_model::{compare_points, DomPoint, DomTree, NodeId};
use std::cmp::Ordering;

/// Change kind marked on a node itself by its class
pub fn annotation_kind(tree: &DomTree, config: &TrackingConfig, node: NodeId) -> Option<ChangeKind> {
    let element = tree.element(node)?;
    if element.has_class(&config.insert_class) {
        Some(ChangeKind::Insertion)
    } else if element.has_class(&config.delete_class) {
        Some(ChangeKind::Deletion)
    } else {
        None
    }
}

/// Node queries bound to a configuration and the active user
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    config: &'a TrackingConfig,
    user_id: &'a str,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a TrackingConfig, user_id: &'a str) -> Self {
        Self { config, user_id }
    }

    pub fn config(&self) -> &'a TrackingConfig {
        self.config
    }

    pub fn change_kind(&self, tree: &DomTree, node: NodeId) -> Option<ChangeKind> {
        annotation_kind(tree, self.config, node)
    }

    /// The node itself or its nearest ancestor that is an annotation of
    /// `kind` (any kind when `None`)
    pub fn annotation_node(
        &self,
        tree: &DomTree,
        node: NodeId,
        kind: Option<ChangeKind>,
    ) -> Option<NodeId> {
        if !tree.contains(node) {
            return None;
        }
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == tree.root() {
                return None;
            }
            if let Some(found) = self.change_kind(tree, candidate) {
                if kind.map_or(true, |k| k == found) {
                    return Some(candidate);
                }
            }
            current = tree.parent(candidate);
        }
        None
    }

    pub fn is_inside(&self, tree: &DomTree, node: NodeId, kind: ChangeKind) -> bool {
        self.annotation_node(tree, node, Some(kind)).is_some()
    }

    /// Check if an annotation node was authored by the active user
    pub fn is_owned_by_current_user(&self, tree: &DomTree, node: NodeId) -> bool {
        tree.attribute(node, &self.config.attributes.user_id) == Some(self.user_id)
    }

    /// Annotation node of `kind` around `node` owned by the active user
    pub fn own_annotation(&self, tree: &DomTree, node: NodeId, kind: ChangeKind) -> Option<NodeId> {
        self.annotation_node(tree, node, Some(kind))
            .filter(|found| self.is_owned_by_current_user(tree, *found))
    }

    /// Annotation node containing a boundary point
    pub fn enclosing_change_node(&self, tree: &DomTree, point: &DomPoint) -> Option<NodeId> {
        self.annotation_node(tree, point.node, None)
    }

    pub fn change_id(&self, tree: &DomTree, node: NodeId) -> Option<ChangeId> {
        tree.attribute(node, &self.config.attributes.change_id)
            .and_then(ChangeId::parse)
    }

    /// Every attached annotation node, in document order
    pub fn annotation_nodes(&self, tree: &DomTree) -> Vec<NodeId> {
        tree.descendants(tree.root())
            .into_iter()
            .filter(|node| self.change_kind(tree, *node).is_some())
            .collect()
    }

    /// Attached annotation nodes belonging to one group
    pub fn nodes_for_change(&self, tree: &DomTree, id: ChangeId) -> Vec<NodeId> {
        self.annotation_nodes(tree)
            .into_iter()
            .filter(|node| self.change_id(tree, *node) == Some(id))
            .collect()
    }

    // =========================================================================
    // Visible Text Offsets
    // =========================================================================

    /// Number of visible units before a point.
    ///
    /// Chars of text outside deletion annotations count one each, and so
    /// does every stub element outside a deletion.
    pub fn visible_text_offset(&self, tree: &DomTree, point: &DomPoint) -> usize {
        let mut offset = 0;
        for node in tree.descendants(tree.root()) {
            if let Some(text) = tree.text(node) {
                if self.is_inside(tree, node, ChangeKind::Deletion) {
                    continue;
                }
                if node == point.node {
                    offset += point.offset.min(dom_model::text::char_len(text));
                } else if precedes(tree, &DomPoint::new(node, 0), point) {
                    offset += dom_model::text::char_len(text);
                }
            } else if self.is_stub(tree, node) && !self.is_inside(tree, node, ChangeKind::Deletion) {
                if let Some(before) = DomPoint::before(tree, node) {
                    if precedes(tree, &before, point) {
                        offset += 1;
                    }
                }
            }
        }
        offset
    }

    /// Total visible units in the document
    pub fn visible_len(&self, tree: &DomTree) -> usize {
        let root = tree.root();
        self.visible_text_offset(tree, &DomPoint::new(root, tree.length(root)))
    }

    fn is_stub(&self, tree: &DomTree, node: NodeId) -> bool {
        tree.tag(node)
            .is_some_and(|tag| self.config.stub_elements.contains(tag))
    }
}

fn precedes(tree: &DomTree, a: &DomPoint, b: &DomPoint) -> bool {
    compare_points(tree, a, b) == Some(Ordering::Less)
}
