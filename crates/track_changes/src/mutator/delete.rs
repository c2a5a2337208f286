//! Character-level deletion from a collapsed caret

use super::{Applied, Disposition, Mutator};
use crate::bookmark::is_marker;
use crate::{ChangeKind, HiddenRegionPolicy, Result};
use dom_model::text::{char_len, next_grapheme_boundary, previous_grapheme_boundary};
use dom_model::{DomPoint, NodeId};

/// The next deletable thing in one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    /// One grapheme of a text node
    Char { node: NodeId, start: usize, end: usize },
    /// A stub element, deleted as a whole
    Atomic(NodeId),
    /// A non-editable element
    Foreign(NodeId),
    /// An existing deletion annotation the caret only steps over
    Hidden(NodeId),
    /// The edge of a block, reached at this point
    Boundary(DomPoint),
    /// The edge of the document
    End,
}

impl<'a> Mutator<'a> {
    /// Delete the unit next to a collapsed caret
    pub(super) fn delete_char(&mut self, caret: DomPoint, forward: bool) -> Result<Applied> {
        let model = self.model();
        let home = model.block_parent(self.tree, caret.node);
        if let Some(home) = home {
            if model.has_no_text_or_stub(self.tree, home) {
                tracing::debug!("Caret in empty block {}, deferring to host", home);
                return Ok(Applied::not_handled());
            }
        }

        let unit = if forward {
            self.scan_forward(caret)
        } else {
            self.scan_backward(caret)
        };
        tracing::debug!("Delete {} found {:?}", if forward { "right" } else { "left" }, unit);

        match unit {
            Unit::End => Ok(Applied::not_handled()),
            Unit::Boundary(at) => match home {
                Some(home) if forward => self.join_forward(caret, home, at),
                Some(home) => self.join_backward(caret, home, at),
                None => Ok(Applied::not_handled()),
            },
            Unit::Hidden(deletion) => {
                let point = if forward {
                    DomPoint::after(self.tree, deletion)
                } else {
                    DomPoint::before(self.tree, deletion)
                };
                match point {
                    Some(point) => Ok(Applied::handled(self.settle(point), false)),
                    None => Ok(Applied::not_handled()),
                }
            }
            Unit::Char { node, start, end } => {
                let len = self.tree.length(node);
                if end < len {
                    self.tree.split_text(node, end)?;
                }
                let piece = if start > 0 {
                    self.tree.split_text(node, start)?
                } else {
                    node
                };
                self.delete_piece(piece, forward)
            }
            Unit::Atomic(element) => self.delete_piece(element, forward),
            Unit::Foreign(element) => self.delete_foreign(element, forward),
        }
    }

    /// Delete a split-off grapheme or a stub and place the caret beside it
    fn delete_piece(&mut self, piece: NodeId, forward: bool) -> Result<Applied> {
        let caret = match self.delete_unit(piece)? {
            Disposition::Removed(at) => self.settle(at),
            Disposition::Tracked => {
                if let Some(text) = self.tree.text(piece) {
                    DomPoint::new(piece, if forward { char_len(text) } else { 0 })
                } else {
                    let point = if forward {
                        DomPoint::after(self.tree, piece)
                    } else {
                        DomPoint::before(self.tree, piece)
                    };
                    match point {
                        Some(point) => point,
                        None => return Ok(Applied::not_handled()),
                    }
                }
            }
        };
        Ok(Applied::handled(caret, true))
    }

    /// Enclose a non-editable element and give the caret a text node beside it
    fn delete_foreign(&mut self, element: NodeId, forward: bool) -> Result<Applied> {
        if let Disposition::Removed(at) = self.delete_unit(element)? {
            return Ok(Applied::handled(self.settle(at), true));
        }
        let annotation = self
            .classifier()
            .annotation_node(self.tree, element, Some(ChangeKind::Deletion))
            .unwrap_or(element);
        let spacer = self.tree.create_text("");
        if forward {
            self.tree.insert_after(annotation, spacer)?;
        } else {
            self.tree.insert_before(annotation, spacer)?;
        }
        Ok(Applied::handled(DomPoint::new(spacer, 0), true))
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    /// Deletion annotation around a node the scan must not enter
    fn hidden_region(&self, node: NodeId) -> Option<NodeId> {
        self.classifier()
            .annotation_node(self.tree, node, Some(ChangeKind::Deletion))
    }

    fn scan_forward(&self, from: DomPoint) -> Unit {
        let tree = &*self.tree;
        let model = self.model();
        let mut pos = from;
        loop {
            if let Some(text) = tree.text(pos.node) {
                if pos.offset < char_len(text) {
                    if let Some(deletion) = self.hidden_region(pos.node) {
                        match self.policy {
                            HiddenRegionPolicy::Step => return Unit::Hidden(deletion),
                            HiddenRegionPolicy::Skip => match DomPoint::after(tree, deletion) {
                                Some(next) => {
                                    pos = next;
                                    continue;
                                }
                                None => return Unit::End,
                            },
                        }
                    }
                    return Unit::Char {
                        node: pos.node,
                        start: pos.offset,
                        end: next_grapheme_boundary(text, pos.offset),
                    };
                }
                match DomPoint::after(tree, pos.node) {
                    Some(next) => pos = next,
                    None => return Unit::End,
                }
                continue;
            }

            if let Some(child) = tree.child_at(pos.node, pos.offset) {
                if tree.is_text(child) {
                    pos = DomPoint::new(child, 0);
                } else if is_marker(tree, child) {
                    pos.offset += 1;
                } else if model.is_block(tree, child) {
                    return Unit::Boundary(pos);
                } else if let Some(deletion) = self.hidden_region(child) {
                    match self.policy {
                        HiddenRegionPolicy::Step => return Unit::Hidden(deletion),
                        HiddenRegionPolicy::Skip => match DomPoint::after(tree, deletion) {
                            Some(next) => pos = next,
                            None => return Unit::End,
                        },
                    }
                } else if model.is_non_editable(tree, child) {
                    return Unit::Foreign(child);
                } else if model.is_stub(tree, child) {
                    return Unit::Atomic(child);
                } else {
                    pos = DomPoint::new(child, 0);
                }
                continue;
            }

            if pos.node == tree.root() {
                return Unit::End;
            }
            if model.is_block(tree, pos.node) {
                return Unit::Boundary(pos);
            }
            match DomPoint::after(tree, pos.node) {
                Some(next) => pos = next,
                None => return Unit::End,
            }
        }
    }

    fn scan_backward(&self, from: DomPoint) -> Unit {
        let tree = &*self.tree;
        let model = self.model();
        let mut pos = from;
        loop {
            if let Some(text) = tree.text(pos.node) {
                if pos.offset > 0 {
                    if let Some(deletion) = self.hidden_region(pos.node) {
                        match self.policy {
                            HiddenRegionPolicy::Step => return Unit::Hidden(deletion),
                            HiddenRegionPolicy::Skip => match DomPoint::before(tree, deletion) {
                                Some(prev) => {
                                    pos = prev;
                                    continue;
                                }
                                None => return Unit::End,
                            },
                        }
                    }
                    let offset = pos.offset.min(char_len(text));
                    return Unit::Char {
                        node: pos.node,
                        start: previous_grapheme_boundary(text, offset),
                        end: offset,
                    };
                }
                match DomPoint::before(tree, pos.node) {
                    Some(prev) => pos = prev,
                    None => return Unit::End,
                }
                continue;
            }

            if let Some(child) = pos.offset.checked_sub(1).and_then(|i| tree.child_at(pos.node, i)) {
                if let Some(text) = tree.text(child) {
                    pos = DomPoint::new(child, char_len(text));
                } else if is_marker(tree, child) {
                    pos.offset -= 1;
                } else if model.is_block(tree, child) {
                    return Unit::Boundary(pos);
                } else if let Some(deletion) = self.hidden_region(child) {
                    match self.policy {
                        HiddenRegionPolicy::Step => return Unit::Hidden(deletion),
                        HiddenRegionPolicy::Skip => match DomPoint::before(tree, deletion) {
                            Some(prev) => pos = prev,
                            None => return Unit::End,
                        },
                    }
                } else if model.is_non_editable(tree, child) {
                    return Unit::Foreign(child);
                } else if model.is_stub(tree, child) {
                    return Unit::Atomic(child);
                } else {
                    pos = DomPoint::new(child, tree.length(child));
                }
                continue;
            }

            if pos.node == tree.root() {
                return Unit::End;
            }
            if model.is_block(tree, pos.node) {
                return Unit::Boundary(pos);
            }
            match DomPoint::before(tree, pos.node) {
                Some(prev) => pos = prev,
                None => return Unit::End,
            }
        }
    }

    // =========================================================================
    // Block Boundaries
    // =========================================================================

    /// Block that forward deletion runs into from a boundary point
    fn block_after(&self, at: DomPoint) -> Option<NodeId> {
        let model = self.model();
        let leaf = match self.tree.child_at(at.node, at.offset) {
            Some(child) => model.first_leaf(self.tree, child),
            None => model.next_leaf(self.tree, at.node)?,
        };
        model.block_parent(self.tree, leaf)
    }

    /// Block that backward deletion runs into from a boundary point
    fn block_before(&self, at: DomPoint) -> Option<NodeId> {
        let model = self.model();
        let leaf = match at.offset.checked_sub(1).and_then(|i| self.tree.child_at(at.node, i)) {
            Some(child) => model.last_leaf(self.tree, child),
            None => model.prev_leaf(self.tree, at.node)?,
        };
        model.block_parent(self.tree, leaf)
    }

    fn can_merge(&self, a: NodeId, b: NodeId) -> bool {
        self.config.merge_blocks
            && a != b
            && self.tree.tag(b) == Some(self.config.block_tag.as_str())
            && !self.tree.is_inclusive_ancestor(a, b)
            && !self.tree.is_inclusive_ancestor(b, a)
    }

    pub(super) fn remove_trailing_break(&mut self, block: NodeId) -> Result<()> {
        if let Some(last) = self.tree.last_child(block) {
            if self.tree.tag(last) == Some("br") {
                self.tree.remove(last)?;
            }
        }
        Ok(())
    }

    fn join_forward(&mut self, caret: DomPoint, home: NodeId, at: DomPoint) -> Result<Applied> {
        let Some(target) = self.block_after(at) else {
            return Ok(Applied::not_handled());
        };
        let model = self.model();

        if target != home
            && !self.tree.is_inclusive_ancestor(target, home)
            && model.has_no_text_or_stub(self.tree, target)
        {
            tracing::debug!("Removing empty block {} after {}", target, home);
            self.tree.remove(target)?;
            return Ok(Applied::handled(self.clamp(caret), true));
        }

        if self.can_merge(home, target) {
            tracing::debug!("Merging block {} into {}", target, home);
            self.remove_trailing_break(home)?;
            self.tree.move_children(target, home)?;
            self.tree.remove(target)?;
            return Ok(Applied::handled(self.clamp(caret), true));
        }

        let leaf = model.first_leaf(self.tree, target);
        let point = if self.tree.is_text(leaf) {
            DomPoint::new(leaf, 0)
        } else {
            DomPoint::new(target, 0)
        };
        Ok(Applied::handled(point, false))
    }

    fn join_backward(&mut self, caret: DomPoint, home: NodeId, at: DomPoint) -> Result<Applied> {
        let Some(target) = self.block_before(at) else {
            return Ok(Applied::not_handled());
        };
        let model = self.model();

        if target != home
            && !self.tree.is_inclusive_ancestor(target, home)
            && model.has_no_text_or_stub(self.tree, target)
        {
            tracing::debug!("Removing empty block {} before {}", target, home);
            self.tree.remove(target)?;
            return Ok(Applied::handled(self.clamp(caret), true));
        }

        if self.can_merge(home, target) {
            tracing::debug!("Merging block {} into {}", home, target);
            self.remove_trailing_break(target)?;
            let shift = self.tree.length(target);
            self.tree.move_children(home, target)?;
            self.tree.remove(home)?;
            let caret = if caret.node == home {
                DomPoint::new(target, shift + caret.offset)
            } else {
                caret
            };
            return Ok(Applied::handled(self.clamp(caret), true));
        }

        let leaf = model.last_leaf(self.tree, target);
        let point = if self.tree.is_text(leaf) {
            DomPoint::new(leaf, self.tree.length(leaf))
        } else {
            DomPoint::new(target, self.tree.length(target))
        };
        Ok(Applied::handled(point, false))
    }

    /// Keep a caret inside its node's bounds after children were removed
    fn clamp(&self, caret: DomPoint) -> DomPoint {
        DomPoint::new(caret.node, caret.offset.min(self.tree.length(caret.node)))
    }
}
