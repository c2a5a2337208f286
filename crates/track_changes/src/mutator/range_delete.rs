//! Deletion of a non-collapsed selection

use super::{Disposition, Mutator};
use crate::bookmark::{is_marker, Bookmark};
use crate::{ChangeKind, Result, TrackingError};
use dom_model::{DomPoint, DomRange, NodeId};
use std::collections::VecDeque;

impl<'a> Mutator<'a> {
    /// Delete everything between the range boundaries.
    ///
    /// The selection is bookmarked first so that wrapping and removal can
    /// rewrite the tree freely; the returned caret is the collapsed start.
    pub(super) fn delete_selection(&mut self, range: DomRange) -> Result<DomPoint> {
        let model = self.model();
        let first_block = model.block_parent(self.tree, range.start().node);
        let last_block = model.block_parent(self.tree, range.end().node);

        let bookmark = Bookmark::create(self.tree, &range)?;
        let mut queue: VecDeque<NodeId> = self
            .tree
            .nodes_between(bookmark.start_marker(), bookmark.end_marker())
            .into();
        let mut between_blocks = Vec::new();
        tracing::debug!("Deleting selection over {} top-level node(s)", queue.len());

        while let Some(node) = queue.pop_front() {
            if !self.tree.is_attached(node) {
                continue;
            }
            if model.is_block(self.tree, node) {
                between_blocks.push(node);
                if !model.is_text_container(self.tree, node) {
                    self.enqueue_children(&mut queue, node);
                    continue;
                }
            }

            if let Some(value) = self.tree.text(node) {
                if value.is_empty() || self.is_deleted(node) {
                    continue;
                }
                let block = model.block_parent(self.tree, node);
                if let Disposition::Removed(_) = self.delete_unit(node)? {
                    if let Some(block) = block {
                        self.remove_if_emptied(block)?;
                    }
                }
                continue;
            }

            if is_marker(self.tree, node) || self.is_deleted(node) || self.tree.tag(node) == Some("br") {
                continue;
            }
            if model.is_atomic(self.tree, node) {
                self.delete_unit(node)?;
            } else if model.has_no_text_or_stub(self.tree, node) && !self.holds_marker(node) {
                self.tree.remove(node)?;
            } else {
                self.enqueue_children(&mut queue, node);
            }
        }

        if let (Some(first), Some(last)) = (first_block, last_block) {
            self.merge_selected_blocks(first, last, between_blocks)?;
        }

        match bookmark.select(self.tree)? {
            Some(selection) => Ok(selection.start()),
            None => Err(TrackingError::InvalidOperation("selection lost".to_string())),
        }
    }

    /// Queue children ahead of the remaining work, keeping document order
    fn enqueue_children(&self, queue: &mut VecDeque<NodeId>, node: NodeId) {
        for child in self.tree.children(node).iter().rev() {
            queue.push_front(*child);
        }
    }

    fn is_deleted(&self, node: NodeId) -> bool {
        self.classifier()
            .annotation_node(self.tree, node, Some(ChangeKind::Deletion))
            .is_some()
    }

    fn holds_marker(&self, node: NodeId) -> bool {
        self.tree
            .descendants(node)
            .into_iter()
            .any(|n| is_marker(self.tree, n))
    }

    fn remove_if_emptied(&mut self, block: NodeId) -> Result<()> {
        if self.tree.is_attached(block)
            && self.model().has_no_text_or_stub(self.tree, block)
            && !self.holds_marker(block)
        {
            tracing::debug!("Removing emptied block {}", block);
            self.tree.remove(block)?;
        }
        Ok(())
    }

    /// Join the blocks a selection started and ended in
    fn merge_selected_blocks(&mut self, first: NodeId, last: NodeId, between: Vec<NodeId>) -> Result<()> {
        if !self.config.merge_blocks
            || first == last
            || !self.tree.is_attached(first)
            || !self.tree.is_attached(last)
            || self.tree.is_inclusive_ancestor(first, last)
            || self.tree.is_inclusive_ancestor(last, first)
        {
            return Ok(());
        }
        let model = self.model();
        tracing::debug!("Merging selected blocks {} and {}", first, last);
        self.remove_trailing_break(first)?;

        let mut between = between;
        between.sort_by_key(|n| self.tree.path(*n));
        for block in &between {
            let block = *block;
            if !self.tree.is_attached(block)
                || !model.is_text_container(self.tree, block)
                || self.tree.is_inclusive_ancestor(block, first)
                || self.tree.is_inclusive_ancestor(block, last)
            {
                continue;
            }
            self.remove_trailing_break(first)?;
            self.tree.move_children(block, first)?;
            self.tree.remove(block)?;
        }

        self.remove_trailing_break(first)?;
        self.tree.move_children(last, first)?;
        self.tree.remove(last)?;

        for block in between {
            if self.tree.is_attached(block)
                && !model.is_text_container(self.tree, block)
                && model.has_no_text_or_stub(self.tree, block)
            {
                self.tree.remove(block)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use super::super::{EditIntent, EditOutcome};
    use dom_model::{DomPoint, DomRange};

    fn select(fixture: &Fixture, from: (&str, usize), to: (&str, usize)) -> DomRange {
        DomRange::new(
            DomPoint::new(fixture.text_node(from.0), from.1),
            DomPoint::new(fixture.text_node(to.0), to.1),
        )
    }

    #[test]
    fn test_selection_in_one_text_node() {
        let mut fixture = Fixture::new("<p>abcd</p>", "A");
        let range = select(&fixture, ("abcd", 1), ("abcd", 3));
        let applied = fixture.apply(range, EditIntent::DeleteRight);
        assert_eq!(applied.outcome, EditOutcome::Handled);
        assert_eq!(fixture.html(), r#"<p>a<del data-userid="A">bc</del>d</p>"#);
        assert_eq!(applied.caret, Some(DomPoint::new(fixture.text_node("a"), 1)));
    }

    #[test]
    fn test_selection_across_blocks_merges() {
        let mut fixture = Fixture::new("<p>ab</p><p>cd</p>", "A");
        let range = select(&fixture, ("ab", 1), ("cd", 1));
        fixture.apply(range, EditIntent::DeleteLeft);
        assert_eq!(
            fixture.html(),
            r#"<p>a<del data-userid="A">b</del><del data-userid="A">c</del>d</p>"#
        );
        assert_eq!(fixture.registry.len(), 1);
    }

    #[test]
    fn test_selection_keeps_blocks_without_merge() {
        let mut fixture = Fixture::new("<p>ab</p><p>cd</p>", "A");
        fixture.config.merge_blocks = false;
        let range = select(&fixture, ("ab", 1), ("cd", 1));
        fixture.apply(range, EditIntent::DeleteRight);
        assert_eq!(
            fixture.html(),
            r#"<p>a<del data-userid="A">b</del></p><p><del data-userid="A">c</del>d</p>"#
        );
    }

    #[test]
    fn test_selection_removes_own_insertion() {
        let mut fixture = Fixture::new(
            r#"<p>a<ins class="ice-ins" data-cid="1" data-userid="A">xy</ins>b</p>"#,
            "A",
        );
        let range = select(&fixture, ("a", 0), ("b", 1));
        fixture.apply(range, EditIntent::DeleteRight);
        assert_eq!(
            fixture.html(),
            r#"<p><del data-userid="A">a</del><del data-userid="A">b</del></p>"#
        );
        assert_eq!(fixture.registry.len(), 1);
    }

    #[test]
    fn test_selection_skips_existing_deletions() {
        let mut fixture = Fixture::new(
            r#"<p>a<del class="ice-del" data-cid="1" data-userid="B">b</del>c</p>"#,
            "A",
        );
        let range = select(&fixture, ("a", 0), ("c", 1));
        fixture.apply(range, EditIntent::DeleteRight);
        assert_eq!(
            fixture.html(),
            r#"<p><del data-userid="A">a</del><del data-userid="B">b</del><del data-userid="A">c</del></p>"#
        );
    }

    #[test]
    fn test_selection_with_stub_and_break() {
        let mut fixture = Fixture::new(r#"<p>a<img src="x"/><br/>b</p>"#, "A");
        let range = select(&fixture, ("a", 1), ("b", 0));
        fixture.apply(range, EditIntent::DeleteRight);
        assert_eq!(
            fixture.html(),
            r#"<p>a<del data-userid="A"><img></del><br>b</p>"#
        );
    }
}
