//! Insertion at a caret or over a selection

use super::{Applied, Mutator};
use crate::{ChangeKind, Result, TrackingError};
use dom_model::text::char_len;
use dom_model::{DomPoint, DomRange, NodeId};

const ZERO_WIDTH_SPACE: &str = "\u{200B}";

impl<'a> Mutator<'a> {
    /// Nodes handed to an insert must be detached, known and not the root
    pub(super) fn validate_insertable(&self, nodes: &[NodeId]) -> Result<()> {
        for node in nodes {
            if !self.tree.contains(*node) {
                return Err(TrackingError::InvalidOperation(format!("unknown node {}", node)));
            }
            if *node == self.tree.root() {
                return Err(TrackingError::InvalidOperation(
                    "the document root cannot be inserted".to_string(),
                ));
            }
            if self.tree.parent(*node).is_some() {
                return Err(TrackingError::InvalidOperation(format!(
                    "node {} is already attached",
                    node
                )));
            }
        }
        Ok(())
    }

    /// Insert detached nodes, replacing the selection if there is one
    pub(super) fn insert(&mut self, range: DomRange, nodes: Vec<NodeId>) -> Result<Applied> {
        let caret = if range.is_collapsed() {
            range.start()
        } else {
            self.delete_selection(range)?
        };
        let caret = self.leave_deletions(caret);

        if self.model().no_track_ancestor(self.tree, caret.node).is_some() {
            tracing::debug!("Inserting {} node(s) into untracked region", nodes.len());
            let caret = self.splice(caret, &nodes)?;
            return Ok(Applied::handled(caret, true));
        }

        let classifier = self.classifier();
        let caret = match classifier.annotation_node(self.tree, caret.node, Some(ChangeKind::Insertion)) {
            Some(ins) if classifier.is_owned_by_current_user(self.tree, ins) => {
                tracing::debug!("Extending own insertion {}", ins);
                self.splice(self.text_before(caret), &nodes)?
            }
            Some(ins) => {
                let anchor = self.split_insertion(ins, caret)?;
                self.wrap_insertion(anchor, &nodes)?
            }
            None => self.wrap_insertion(caret, &nodes)?,
        };
        Ok(Applied::handled(caret, true))
    }

    /// Move a caret forward out of deletions and zero-width spacers
    fn leave_deletions(&self, caret: DomPoint) -> DomPoint {
        let mut caret = caret;
        let mut last = None;
        while let Some(void) = self.void_at(caret) {
            if last == Some(void) {
                break;
            }
            let Some(after) = DomPoint::after(self.tree, void) else {
                break;
            };
            tracing::debug!("Caret moved past void node {}", void);
            caret = after;
            last = Some(void);
        }
        caret
    }

    /// Node at a caret that cannot take tracked content
    fn void_at(&self, caret: DomPoint) -> Option<NodeId> {
        if self.tree.text(caret.node) == Some(ZERO_WIDTH_SPACE) {
            return Some(caret.node);
        }
        self.classifier()
            .annotation_node(self.tree, caret.node, Some(ChangeKind::Deletion))
    }

    /// Prefer the end of a preceding text node over an element position
    fn text_before(&self, caret: DomPoint) -> DomPoint {
        if self.tree.is_text(caret.node) {
            return caret;
        }
        caret
            .offset
            .checked_sub(1)
            .and_then(|i| self.tree.child_at(caret.node, i))
            .filter(|n| self.tree.is_text(*n))
            .map(|prev| DomPoint::new(prev, self.tree.length(prev)))
            .unwrap_or(caret)
    }

    /// Put nodes at a point and return the point after the last of them.
    ///
    /// A lone text node typed into text is merged into it.
    fn splice(&mut self, caret: DomPoint, nodes: &[NodeId]) -> Result<DomPoint> {
        if let [single] = nodes {
            if let (Some(value), true) = (self.tree.text(*single), self.tree.is_text(caret.node)) {
                let value = value.to_string();
                self.tree.insert_text(caret.node, caret.offset, &value)?;
                self.tree.remove(*single)?;
                return Ok(DomPoint::new(caret.node, caret.offset + char_len(&value)));
            }
        }

        let Some((first, rest)) = nodes.split_first() else {
            return Ok(caret);
        };
        self.tree.insert_at_point(caret, *first)?;
        let mut last = *first;
        for node in rest {
            self.tree.insert_after(last, *node)?;
            last = *node;
        }
        self.end_of(last)
    }

    fn end_of(&self, node: NodeId) -> Result<DomPoint> {
        if let Some(value) = self.tree.text(node) {
            return Ok(DomPoint::new(node, char_len(value)));
        }
        DomPoint::after(self.tree, node).ok_or_else(|| {
            TrackingError::InvalidOperation(format!("inserted node {} is detached", node))
        })
    }

    /// Split another user's insertion at the caret.
    ///
    /// Both halves keep the original group; the returned point lies
    /// between them.
    fn split_insertion(&mut self, ins: NodeId, caret: DomPoint) -> Result<DomPoint> {
        let start = DomPoint::before(self.tree, ins).ok_or_else(|| {
            TrackingError::InvalidOperation(format!("insertion {} is detached", ins))
        })?;
        tracing::debug!("Splitting insertion {} at caret", ins);

        let mut head = DomRange::new(start, caret);
        let extracted = head.extract_contents(self.tree)?;
        let mut left = None;
        for node in extracted {
            self.tree.insert_before(ins, node)?;
            left = Some(node);
        }

        if let Some(node) = left.filter(|n| self.is_without_content(*n)) {
            self.tree.remove(node)?;
            left = None;
        }
        if self.is_without_content(ins) {
            self.tree.remove(ins)?;
        }

        let anchor = if self.tree.is_attached(ins) {
            DomPoint::before(self.tree, ins)
        } else {
            left.and_then(|n| DomPoint::after(self.tree, n))
        };
        Ok(anchor.unwrap_or(start))
    }

    /// Wrap nodes in a new insertion annotation placed at a point
    fn wrap_insertion(&mut self, at: DomPoint, nodes: &[NodeId]) -> Result<DomPoint> {
        let ins = self.create_annotation(ChangeKind::Insertion);
        self.tree.insert_at_point(at, ins)?;
        for node in nodes {
            self.tree.append_child(ins, *node)?;
        }
        self.record(ChangeKind::Insertion, &[ins])?;
        match nodes.last() {
            Some(last) => self.end_of(*last),
            None => Ok(DomPoint::new(ins, 0)),
        }
    }
}
