//! Content model - block, stub and leaf navigation helpers

use crate::TrackingConfig;
use dom_model::{DomTree, NodeId};

/// Tag-based classification of document structure
#[derive(Debug, Clone, Copy)]
pub struct ContentModel<'a> {
    config: &'a TrackingConfig,
}

impl<'a> ContentModel<'a> {
    pub fn new(config: &'a TrackingConfig) -> Self {
        Self { config }
    }

    fn tag_in(&self, tree: &DomTree, node: NodeId, set: &std::collections::BTreeSet<String>) -> bool {
        tree.tag(node).is_some_and(|tag| set.contains(tag))
    }

    pub fn is_block(&self, tree: &DomTree, node: NodeId) -> bool {
        self.tag_in(tree, node, &self.config.block_elements)
    }

    /// Blocks that may hold text directly (a list item, not a list)
    pub fn is_text_container(&self, tree: &DomTree, node: NodeId) -> bool {
        self.tag_in(tree, node, &self.config.text_container_elements)
    }

    pub fn is_stub(&self, tree: &DomTree, node: NodeId) -> bool {
        self.tag_in(tree, node, &self.config.stub_elements)
    }

    /// Stubs that carry content, i.e. everything but line breaks
    pub fn is_content_stub(&self, tree: &DomTree, node: NodeId) -> bool {
        self.is_stub(tree, node) && tree.tag(node) != Some("br")
    }

    pub fn is_non_editable(&self, tree: &DomTree, node: NodeId) -> bool {
        tree.attribute(node, "contenteditable")
            .is_some_and(|v| v.eq_ignore_ascii_case("false"))
    }

    /// Elements deleted as a whole instead of being entered
    pub fn is_atomic(&self, tree: &DomTree, node: NodeId) -> bool {
        self.is_stub(tree, node) || self.is_non_editable(tree, node)
    }

    /// Nearest inclusive ancestor marked as an untracked region
    pub fn no_track_ancestor(&self, tree: &DomTree, node: NodeId) -> Option<NodeId> {
        std::iter::once(node)
            .chain(tree.ancestors(node))
            .find(|n| tree.has_class(*n, &self.config.no_track_class))
    }

    /// Nearest inclusive ancestor that is a block
    pub fn block_parent(&self, tree: &DomTree, node: NodeId) -> Option<NodeId> {
        std::iter::once(node)
            .chain(tree.ancestors(node))
            .take_while(|n| *n != tree.root())
            .find(|n| self.is_block(tree, *n))
    }

    /// True when a subtree holds neither text nor content stubs.
    ///
    /// Line breaks do not count, so `<p><br></p>` is empty.
    pub fn has_no_text_or_stub(&self, tree: &DomTree, node: NodeId) -> bool {
        std::iter::once(node)
            .chain(tree.descendants(node))
            .all(|n| !self.is_content_stub(tree, n) && tree.text(n).map_or(true, str::is_empty))
    }

    /// Deepest first descendant, not entering atomic elements
    pub fn first_leaf(&self, tree: &DomTree, node: NodeId) -> NodeId {
        let mut current = node;
        while !self.is_atomic(tree, current) {
            match tree.first_child(current) {
                Some(child) => current = child,
                None => break,
            }
        }
        current
    }

    /// Deepest last descendant, not entering atomic elements
    pub fn last_leaf(&self, tree: &DomTree, node: NodeId) -> NodeId {
        let mut current = node;
        while !self.is_atomic(tree, current) {
            match tree.last_child(current) {
                Some(child) => current = child,
                None => break,
            }
        }
        current
    }

    /// The first leaf after a node's subtree
    pub fn next_leaf(&self, tree: &DomTree, node: NodeId) -> Option<NodeId> {
        tree.next_after_subtree(node)
            .map(|next| self.first_leaf(tree, next))
    }

    /// The last leaf before a node's subtree
    pub fn prev_leaf(&self, tree: &DomTree, node: NodeId) -> Option<NodeId> {
        tree.previous_before_subtree(node)
            .map(|prev| self.last_leaf(tree, prev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_model::parse_fragment;

    #[test]
    fn test_classification() {
        let tree = parse_fragment(
            r#"<ul><li>a<img src="x"/><br/><span contenteditable="false">z</span></li></ul>"#,
        )
        .unwrap();
        let config = TrackingConfig::default();
        let model = ContentModel::new(&config);
        let ul = tree.children(tree.root())[0];
        let li = tree.children(ul)[0];
        let kids = tree.children(li).to_vec();

        assert!(model.is_block(&tree, ul));
        assert!(!model.is_text_container(&tree, ul));
        assert!(model.is_text_container(&tree, li));
        assert!(model.is_content_stub(&tree, kids[1]));
        assert!(model.is_stub(&tree, kids[2]) && !model.is_content_stub(&tree, kids[2]));
        assert!(model.is_atomic(&tree, kids[3]));
        assert_eq!(model.block_parent(&tree, kids[0]), Some(li));
        assert_eq!(model.block_parent(&tree, tree.root()), None);
    }

    #[test]
    fn test_leaf_navigation() {
        let tree = parse_fragment("<p>a<b><i>b</i></b></p><p><img/>c</p>").unwrap();
        let config = TrackingConfig::default();
        let model = ContentModel::new(&config);
        let root = tree.root();
        let p1 = tree.children(root)[0];
        let p2 = tree.children(root)[1];

        let b_text = model.last_leaf(&tree, p1);
        assert_eq!(tree.text(b_text), Some("b"));
        let img = model.next_leaf(&tree, b_text).unwrap();
        assert_eq!(tree.tag(img), Some("img"));
        assert_eq!(model.first_leaf(&tree, p2), img);
        assert_eq!(model.prev_leaf(&tree, img), Some(b_text));
        assert_eq!(tree.text(model.first_leaf(&tree, root)), Some("a"));
    }

    #[test]
    fn test_empty_blocks_and_no_track() {
        let tree =
            parse_fragment(r#"<p><b></b><br/></p><p><img/></p><div class="ice-no-track"><p>x</p></div>"#)
                .unwrap();
        let config = TrackingConfig::default();
        let model = ContentModel::new(&config);
        let blocks = tree.children(tree.root()).to_vec();
        assert!(model.has_no_text_or_stub(&tree, blocks[0]));
        assert!(!model.has_no_text_or_stub(&tree, blocks[1]));

        let inner = tree.children(blocks[2])[0];
        assert_eq!(model.no_track_ancestor(&tree, inner), Some(blocks[2]));
        assert_eq!(model.no_track_ancestor(&tree, blocks[0]), None);
    }
}
