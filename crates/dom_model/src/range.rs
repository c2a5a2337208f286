//! Boundary points and ranges over the document tree
//!
//! A [`DomPoint`] is a `(node, offset)` pair: for text nodes the offset is
//! a char index, for other nodes it is a child index. A [`DomRange`] is an
//! ordered pair of points. Ranges are plain values; every operation that
//! needs the tree takes it explicitly, so a range never holds a borrow.

use crate::{text, DocModelError, DomTree, NodeId, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A boundary point in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl DomPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }

    /// Point immediately before a node, in its parent
    pub fn before(tree: &DomTree, node: NodeId) -> Option<Self> {
        Some(Self::new(tree.parent(node)?, tree.index_of(node)?))
    }

    /// Point immediately after a node, in its parent
    pub fn after(tree: &DomTree, node: NodeId) -> Option<Self> {
        Some(Self::new(tree.parent(node)?, tree.index_of(node)? + 1))
    }

    /// Check that the point addresses an attached node within bounds
    pub fn is_valid(&self, tree: &DomTree) -> bool {
        tree.is_attached(self.node) && self.offset <= tree.length(self.node)
    }

    /// Sort key: the node path followed by the offset
    fn key(&self, tree: &DomTree) -> Option<Vec<usize>> {
        let mut key = tree.path(self.node)?;
        key.push(self.offset);
        Some(key)
    }
}

/// Compare two boundary points in document order.
///
/// Returns `None` when either point is detached from the root.
pub fn compare_points(tree: &DomTree, a: &DomPoint, b: &DomPoint) -> Option<Ordering> {
    Some(a.key(tree)?.cmp(&b.key(tree)?))
}

/// Which endpoints [`DomRange::compare_endpoints`] compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointPair {
    StartToStart,
    StartToEnd,
    EndToEnd,
    EndToStart,
}

/// A range between two boundary points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomRange {
    start: DomPoint,
    end: DomPoint,
}

impl DomRange {
    /// Create a range without validation; see [`DomRange::validate`]
    pub fn new(start: DomPoint, end: DomPoint) -> Self {
        Self { start, end }
    }

    /// A collapsed range at a point
    pub fn collapsed_at(point: DomPoint) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    pub fn start(&self) -> DomPoint {
        self.start
    }

    pub fn end(&self) -> DomPoint {
        self.end
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Check that both points are valid and correctly ordered
    pub fn validate(&self, tree: &DomTree) -> Result<()> {
        for point in [self.start, self.end] {
            if !point.is_valid(tree) {
                return Err(DocModelError::InvalidPosition {
                    node_id: point.node.as_uuid(),
                    offset: point.offset,
                });
            }
        }
        match compare_points(tree, &self.start, &self.end) {
            Some(Ordering::Greater) | None => Err(DocModelError::InvalidSelection(
                "range start is after its end".to_string(),
            )),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Boundary Setters
    // =========================================================================

    /// Set the start; an end before the new start collapses onto it
    pub fn set_start(&mut self, tree: &DomTree, node: NodeId, offset: usize) -> Result<()> {
        let point = checked_point(tree, node, offset)?;
        self.start = point;
        if !matches!(
            compare_points(tree, &self.start, &self.end),
            Some(Ordering::Less | Ordering::Equal)
        ) {
            self.end = point;
        }
        Ok(())
    }

    /// Set the end; a start after the new end collapses onto it
    pub fn set_end(&mut self, tree: &DomTree, node: NodeId, offset: usize) -> Result<()> {
        let point = checked_point(tree, node, offset)?;
        self.end = point;
        if !matches!(
            compare_points(tree, &self.start, &self.end),
            Some(Ordering::Less | Ordering::Equal)
        ) {
            self.start = point;
        }
        Ok(())
    }

    pub fn set_start_before(&mut self, tree: &DomTree, node: NodeId) -> Result<()> {
        let point = DomPoint::before(tree, node).ok_or_else(|| orphan(node))?;
        self.set_start(tree, point.node, point.offset)
    }

    pub fn set_start_after(&mut self, tree: &DomTree, node: NodeId) -> Result<()> {
        let point = DomPoint::after(tree, node).ok_or_else(|| orphan(node))?;
        self.set_start(tree, point.node, point.offset)
    }

    pub fn set_end_before(&mut self, tree: &DomTree, node: NodeId) -> Result<()> {
        let point = DomPoint::before(tree, node).ok_or_else(|| orphan(node))?;
        self.set_end(tree, point.node, point.offset)
    }

    pub fn set_end_after(&mut self, tree: &DomTree, node: NodeId) -> Result<()> {
        let point = DomPoint::after(tree, node).ok_or_else(|| orphan(node))?;
        self.set_end(tree, point.node, point.offset)
    }

    /// Collapse onto one of the endpoints
    pub fn collapse(&mut self, to_start: bool) {
        if to_start {
            self.end = self.start;
        } else {
            self.start = self.end;
        }
    }

    /// Select a node as a whole
    pub fn select_node(&mut self, tree: &DomTree, node: NodeId) -> Result<()> {
        let start = DomPoint::before(tree, node).ok_or_else(|| orphan(node))?;
        self.start = start;
        self.end = DomPoint::new(start.node, start.offset + 1);
        Ok(())
    }

    /// Select the contents of a node
    pub fn select_node_contents(&mut self, tree: &DomTree, node: NodeId) -> Result<()> {
        if !tree.contains(node) {
            return Err(DocModelError::NodeNotFound(node.as_uuid()));
        }
        self.start = DomPoint::new(node, 0);
        self.end = DomPoint::new(node, tree.length(node));
        Ok(())
    }

    /// Compare one endpoint of this range with one of `other`
    pub fn compare_endpoints(
        &self,
        tree: &DomTree,
        how: EndpointPair,
        other: &DomRange,
    ) -> Option<Ordering> {
        let (mine, theirs) = match how {
            EndpointPair::StartToStart => (self.start, other.start),
            EndpointPair::StartToEnd => (self.start, other.end),
            EndpointPair::EndToEnd => (self.end, other.end),
            EndpointPair::EndToStart => (self.end, other.start),
        };
        compare_points(tree, &mine, &theirs)
    }

    /// Deepest node containing both endpoints
    pub fn common_ancestor(&self, tree: &DomTree) -> Option<NodeId> {
        tree.common_ancestor(self.start.node, self.end.node)
    }

    // =========================================================================
    // Character Stepping
    // =========================================================================

    /// Move the start by `count` characters (negative moves backwards)
    pub fn move_start(&mut self, tree: &DomTree, count: isize) -> usize {
        let (point, moved) = step_chars(tree, self.start, count);
        self.start = point;
        if compare_points(tree, &self.start, &self.end) == Some(Ordering::Greater) {
            self.end = point;
        }
        moved
    }

    /// Move the end by `count` characters (negative moves backwards)
    pub fn move_end(&mut self, tree: &DomTree, count: isize) -> usize {
        let (point, moved) = step_chars(tree, self.end, count);
        self.end = point;
        if compare_points(tree, &self.start, &self.end) == Some(Ordering::Greater) {
            self.start = point;
        }
        moved
    }

    // =========================================================================
    // Content Extraction
    // =========================================================================

    /// Move the selected content out of the tree.
    ///
    /// Fully contained nodes are reparented into the returned fragment (so
    /// they keep their identity); partially selected elements are shallow
    /// cloned with their selected part moved into the clone. The range is
    /// collapsed to where the content used to be.
    pub fn extract_contents(&mut self, tree: &mut DomTree) -> Result<Vec<NodeId>> {
        self.validate(tree)?;
        if self.is_collapsed() {
            return Ok(Vec::new());
        }
        let (start, end) = (self.start, self.end);

        if start.node == end.node && tree.is_text(start.node) {
            let node = start.node;
            let content = tree.text(node).unwrap_or("");
            let extracted = text::char_slice(content, start.offset, end.offset).to_string();
            tree.delete_text(node, start.offset, end.offset)?;
            self.end = self.start;
            return Ok(vec![tree.create_text(extracted)]);
        }

        let common = tree
            .common_ancestor(start.node, end.node)
            .ok_or_else(|| DocModelError::InvalidSelection("range spans detached nodes".to_string()))?;

        let first_partial = if tree.is_inclusive_ancestor(start.node, end.node) {
            None
        } else {
            child_towards(tree, common, start.node)
        };
        let last_partial = if tree.is_inclusive_ancestor(end.node, start.node) {
            None
        } else {
            child_towards(tree, common, end.node)
        };

        let from = match first_partial {
            Some(child) => tree.index_of(child).map_or(0, |i| i + 1),
            None => start.offset,
        };
        let to = match last_partial {
            Some(child) => tree.index_of(child).unwrap_or(0),
            None => end.offset,
        };
        let contained: Vec<NodeId> = tree
            .children(common)
            .iter()
            .skip(from)
            .take(to.saturating_sub(from))
            .copied()
            .collect();

        let collapse_to = if tree.is_inclusive_ancestor(start.node, end.node) {
            start
        } else {
            let mut reference = start.node;
            while let Some(parent) = tree.parent(reference) {
                if tree.is_inclusive_ancestor(parent, end.node) {
                    break;
                }
                reference = parent;
            }
            DomPoint::after(tree, reference).ok_or_else(|| orphan(reference))?
        };

        let mut fragment = Vec::new();

        if let Some(child) = first_partial {
            if tree.is_text(child) {
                let content = tree.text(child).unwrap_or("");
                let tail = text::char_slice(content, start.offset, usize::MAX).to_string();
                let len = tree.length(child);
                tree.delete_text(child, start.offset, len)?;
                fragment.push(tree.create_text(tail));
            } else {
                let clone = tree.shallow_clone(child)?;
                let mut sub = DomRange::new(start, DomPoint::new(child, tree.length(child)));
                for node in sub.extract_contents(tree)? {
                    tree.append_child(clone, node)?;
                }
                fragment.push(clone);
            }
        }

        for node in contained {
            tree.detach(node)?;
            fragment.push(node);
        }

        if let Some(child) = last_partial {
            if tree.is_text(child) {
                let content = tree.text(child).unwrap_or("");
                let head = text::char_slice(content, 0, end.offset).to_string();
                tree.delete_text(child, 0, end.offset)?;
                fragment.push(tree.create_text(head));
            } else {
                let clone = tree.shallow_clone(child)?;
                let mut sub = DomRange::new(DomPoint::new(child, 0), end);
                for node in sub.extract_contents(tree)? {
                    tree.append_child(clone, node)?;
                }
                fragment.push(clone);
            }
        }

        // The collapse point was computed before mutation; only nodes after
        // it moved, so it is still valid.
        self.start = collapse_to;
        self.end = collapse_to;
        Ok(fragment)
    }

    /// Remove the selected content from the tree
    pub fn delete_contents(&mut self, tree: &mut DomTree) -> Result<()> {
        for node in self.extract_contents(tree)? {
            tree.remove(node)?;
        }
        Ok(())
    }
}

impl DomTree {
    /// Insert a node at a boundary point, splitting a text node if the point
    /// falls inside one
    pub fn insert_at_point(&mut self, point: DomPoint, node: NodeId) -> Result<()> {
        if !self.is_text(point.node) {
            return self.insert_child(point.node, point.offset, node);
        }
        let len = self.length(point.node);
        if point.offset == 0 {
            self.insert_before(point.node, node)
        } else if point.offset >= len {
            self.insert_after(point.node, node)
        } else {
            self.split_text(point.node, point.offset)?;
            self.insert_after(point.node, node)
        }
    }
}

fn checked_point(tree: &DomTree, node: NodeId, offset: usize) -> Result<DomPoint> {
    if !tree.contains(node) {
        return Err(DocModelError::NodeNotFound(node.as_uuid()));
    }
    if offset > tree.length(node) {
        return Err(DocModelError::InvalidPosition {
            node_id: node.as_uuid(),
            offset,
        });
    }
    Ok(DomPoint::new(node, offset))
}

fn orphan(node: NodeId) -> DocModelError {
    DocModelError::TreeStructureError(format!("node {} has no parent", node))
}

/// The child of `ancestor` that contains `node`
fn child_towards(tree: &DomTree, ancestor: NodeId, node: NodeId) -> Option<NodeId> {
    let mut current = node;
    loop {
        let parent = tree.parent(current)?;
        if parent == ancestor {
            return Some(current);
        }
        current = parent;
    }
}

/// Text nodes with content, in document order
fn text_nodes(tree: &DomTree) -> Vec<NodeId> {
    tree.descendants(tree.root())
        .into_iter()
        .filter(|n| tree.length(*n) > 0 && tree.is_text(*n))
        .collect()
}

/// Step a point over `count` grapheme clusters of text, returning the new
/// point and how many clusters were actually crossed.
fn step_chars(tree: &DomTree, point: DomPoint, count: isize) -> (DomPoint, usize) {
    let texts = text_nodes(tree);
    let mut current = point;
    let mut moved = 0;
    let forward = count >= 0;

    while moved < count.unsigned_abs() {
        let next = if forward {
            step_forward(tree, &texts, current)
        } else {
            step_backward(tree, &texts, current)
        };
        match next {
            Some(p) => {
                current = p;
                moved += 1;
            }
            None => break,
        }
    }
    (current, moved)
}

fn step_forward(tree: &DomTree, texts: &[NodeId], point: DomPoint) -> Option<DomPoint> {
    if let Some(content) = tree.text(point.node) {
        if point.offset < text::char_len(content) {
            let next = text::next_grapheme_boundary(content, point.offset);
            return Some(DomPoint::new(point.node, next));
        }
    }
    let following = texts.iter().find(|t| {
        **t != point.node
            && compare_points(tree, &DomPoint::new(**t, 0), &point) != Some(Ordering::Less)
    })?;
    let content = tree.text(*following)?;
    Some(DomPoint::new(
        *following,
        text::next_grapheme_boundary(content, 0),
    ))
}

fn step_backward(tree: &DomTree, texts: &[NodeId], point: DomPoint) -> Option<DomPoint> {
    if let Some(content) = tree.text(point.node) {
        if point.offset > 0 {
            let previous = text::previous_grapheme_boundary(content, point.offset);
            return Some(DomPoint::new(point.node, previous));
        }
    }
    let preceding = texts.iter().rev().find(|t| {
        **t != point.node
            && compare_points(tree, &DomPoint::new(**t, tree.length(**t)), &point)
                != Some(Ordering::Greater)
    })?;
    let content = tree.text(*preceding)?;
    let len = text::char_len(content);
    Some(DomPoint::new(
        *preceding,
        text::previous_grapheme_boundary(content, len),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// <p>hello <b>bold</b> world</p><p>next</p>
    fn create_document() -> (DomTree, Vec<NodeId>) {
        let mut tree = DomTree::new();
        let root = tree.root();
        let p1 = tree.create_element("p");
        let hello = tree.create_text("hello ");
        let b = tree.create_element("b");
        let bold = tree.create_text("bold");
        let world = tree.create_text(" world");
        let p2 = tree.create_element("p");
        let next = tree.create_text("next");
        tree.append_child(root, p1).unwrap();
        tree.append_child(p1, hello).unwrap();
        tree.append_child(p1, b).unwrap();
        tree.append_child(b, bold).unwrap();
        tree.append_child(p1, world).unwrap();
        tree.append_child(root, p2).unwrap();
        tree.append_child(p2, next).unwrap();
        (tree, vec![p1, hello, b, bold, world, p2, next])
    }

    #[test]
    fn test_compare_points() {
        let (tree, n) = create_document();
        let (p1, hello, b, bold) = (n[0], n[1], n[2], n[3]);

        let before_b = DomPoint::new(p1, 1);
        let in_bold = DomPoint::new(bold, 0);
        let in_hello = DomPoint::new(hello, 6);
        assert_eq!(compare_points(&tree, &in_hello, &before_b), Some(Ordering::Less));
        assert_eq!(compare_points(&tree, &before_b, &in_bold), Some(Ordering::Less));
        assert_eq!(
            compare_points(&tree, &DomPoint::new(p1, 2), &DomPoint::new(b, 1)),
            Some(Ordering::Greater)
        );

        let mut scratch = tree.clone();
        let loose = scratch.create_text("loose");
        assert_eq!(compare_points(&scratch, &DomPoint::new(loose, 0), &in_bold), None);
    }

    #[test]
    fn test_setters_keep_order() {
        let (tree, n) = create_document();
        let (hello, next) = (n[1], n[6]);
        let mut range = DomRange::collapsed_at(DomPoint::new(hello, 0));

        range.set_end(&tree, next, 2).unwrap();
        assert!(!range.is_collapsed());
        range.set_start(&tree, next, 3).unwrap();
        assert!(range.is_collapsed());
        assert_eq!(range.end(), DomPoint::new(next, 3));

        assert!(range.set_start(&tree, hello, 99).is_err());
    }

    #[test]
    fn test_select_node() {
        let (tree, n) = create_document();
        let (p1, b) = (n[0], n[2]);
        let mut range = DomRange::collapsed_at(DomPoint::new(p1, 0));
        range.select_node(&tree, b).unwrap();
        assert_eq!(range.start(), DomPoint::new(p1, 1));
        assert_eq!(range.end(), DomPoint::new(p1, 2));

        range.select_node_contents(&tree, b).unwrap();
        assert_eq!(range.end(), DomPoint::new(b, 1));
    }

    #[test]
    fn test_extract_within_text() {
        let (mut tree, n) = create_document();
        let hello = n[1];
        let mut range = DomRange::new(DomPoint::new(hello, 1), DomPoint::new(hello, 4));
        let fragment = range.extract_contents(&mut tree).unwrap();

        assert_eq!(fragment.len(), 1);
        assert_eq!(tree.text(fragment[0]), Some("ell"));
        assert_eq!(tree.text(hello), Some("ho "));
        assert!(range.is_collapsed());
        assert_eq!(range.start(), DomPoint::new(hello, 1));
    }

    #[test]
    fn test_extract_across_elements_clones_partial_nodes() {
        let (mut tree, n) = create_document();
        let (p1, hello, b, bold, world) = (n[0], n[1], n[2], n[3], n[4]);
        let mut range = DomRange::new(DomPoint::new(hello, 2), DomPoint::new(bold, 2));
        let fragment = range.extract_contents(&mut tree).unwrap();

        assert_eq!(fragment.len(), 2);
        assert_eq!(tree.text(fragment[0]), Some("llo "));
        assert_eq!(tree.tag(fragment[1]), Some("b"));
        assert_eq!(tree.text_content(fragment[1]), "bo");

        // The original <b> keeps its identity and the remaining text
        assert_eq!(tree.children(p1), &[hello, b, world]);
        assert_eq!(tree.text_content(p1), "held world");
        assert_eq!(range.start(), DomPoint::new(p1, 1));
    }

    #[test]
    fn test_extract_reparents_contained_nodes() {
        let (mut tree, n) = create_document();
        let (p1, b) = (n[0], n[2]);
        let mut range = DomRange::new(DomPoint::new(p1, 1), DomPoint::new(p1, 2));
        let fragment = range.extract_contents(&mut tree).unwrap();
        assert_eq!(fragment, vec![b]);
        assert!(!tree.is_attached(b));
    }

    #[test]
    fn test_delete_contents_across_blocks() {
        let (mut tree, n) = create_document();
        let (world, next) = (n[4], n[6]);
        let root = tree.root();
        let mut range = DomRange::new(DomPoint::new(world, 3), DomPoint::new(next, 2));
        range.delete_contents(&mut tree).unwrap();
        assert_eq!(tree.text_content(root), "hello bold woxt");
        assert_eq!(tree.text(next), Some("xt"));
    }

    #[test]
    fn test_insert_at_point_splits_text() {
        let (mut tree, n) = create_document();
        let (p1, hello) = (n[0], n[1]);
        let marker = tree.create_element("span");
        tree.insert_at_point(DomPoint::new(hello, 2), marker).unwrap();
        assert_eq!(tree.text(hello), Some("he"));
        assert_eq!(tree.next_sibling(hello), Some(marker));
        assert_eq!(tree.text_content(p1), "hello bold world");

        let edge = tree.create_element("span");
        tree.insert_at_point(DomPoint::new(hello, 0), edge).unwrap();
        assert_eq!(tree.first_child(p1), Some(edge));
    }

    #[test]
    fn test_character_moves() {
        let (tree, n) = create_document();
        let (hello, bold) = (n[1], n[3]);
        let mut range = DomRange::collapsed_at(DomPoint::new(hello, 5));
        let moved = range.move_end(&tree, 3);
        assert_eq!(moved, 3);
        assert_eq!(range.end(), DomPoint::new(bold, 2));
        assert_eq!(range.start(), DomPoint::new(hello, 5));

        let moved = range.move_start(&tree, -10);
        assert_eq!(moved, 5);
        assert_eq!(range.start(), DomPoint::new(hello, 0));
    }

    // =========================================================================
    // Properties
    // =========================================================================

    mod properties {
        use super::*;
        use crate::parse_fragment;
        use proptest::prelude::*;

        /// Paragraphs of plain, bold and italic-bold runs
        fn paragraphs() -> impl Strategy<Value = Vec<Vec<(u8, String)>>> {
            prop::collection::vec(prop::collection::vec((0u8..3, "[a-h]{1,5}"), 1..4), 1..4)
        }

        fn build(paragraphs: &[Vec<(u8, String)>]) -> String {
            paragraphs
                .iter()
                .map(|runs| {
                    let body: String = runs
                        .iter()
                        .map(|(style, text)| match style {
                            1 => format!("<b>{}</b>", text),
                            2 => format!("<i><b>{}</b></i>", text),
                            _ => text.clone(),
                        })
                        .collect();
                    format!("<p>{}</p>", body)
                })
                .collect()
        }

        /// Point in the nth text node (wrapping) and its offset in the whole text
        fn locate(tree: &DomTree, texts: &[NodeId], index: usize, offset: usize) -> (DomPoint, usize) {
            let index = index % texts.len();
            let node = texts[index];
            let offset = offset % (tree.length(node) + 1);
            let before: usize = texts[..index].iter().map(|t| tree.length(*t)).sum();
            (DomPoint::new(node, offset), before + offset)
        }

        proptest! {
            #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

            #[test]
            fn test_extract_splits_text_at_range(
                paragraphs in paragraphs(),
                a in any::<(usize, usize)>(),
                b in any::<(usize, usize)>(),
            ) {
                let mut tree = parse_fragment(&build(&paragraphs)).unwrap();
                let texts = text_nodes(&tree);
                let full = tree.text_content(tree.root());
                let first = locate(&tree, &texts, a.0, a.1);
                let second = locate(&tree, &texts, b.0, b.1);
                let (start, end) = if (a.0 % texts.len(), first.1) <= (b.0 % texts.len(), second.1) {
                    (first, second)
                } else {
                    (second, first)
                };

                let mut range = DomRange::new(start.0, end.0);
                let fragment = range.extract_contents(&mut tree).unwrap();
                let extracted: String = fragment.iter().map(|n| tree.text_content(*n)).collect();

                prop_assert_eq!(extracted, &full[start.1..end.1]);
                prop_assert_eq!(
                    tree.text_content(tree.root()),
                    format!("{}{}", &full[..start.1], &full[end.1..])
                );
                prop_assert!(range.is_collapsed());
                prop_assert!(range.validate(&tree).is_ok());
            }
        }
    }
}
