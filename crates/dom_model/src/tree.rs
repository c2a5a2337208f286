//! Document tree storage and structural operations

use crate::{text, DocModelError, DomNode, ElementData, NodeId, NodeKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An HTML-like document tree.
///
/// Nodes live in an arena keyed by [`NodeId`]. Nodes may exist detached
/// (created but not yet inserted, or extracted from the tree); only nodes
/// reachable from [`DomTree::root`] are part of the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomTree {
    root: NodeId,
    nodes: HashMap<NodeId, DomNode>,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    /// Create an empty tree containing only the document root
    pub fn new() -> Self {
        let root = DomNode::new(NodeKind::Document);
        let id = root.id();
        let mut nodes = HashMap::new();
        nodes.insert(id, root);
        Self { root: id, nodes }
    }

    /// The document root
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes in the arena, detached ones included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // =========================================================================
    // Node Creation
    // =========================================================================

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.store(DomNode::new(NodeKind::Element(ElementData::new(tag))))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.store(DomNode::new(NodeKind::Text(text.into())))
    }

    fn store(&mut self, node: DomNode) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    // =========================================================================
    // Node Access
    // =========================================================================

    pub fn node(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn get(&self, id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(&id)
            .ok_or(DocModelError::NodeNotFound(id.as_uuid()))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(&id)
            .ok_or(DocModelError::NodeNotFound(id.as_uuid()))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.node(id).and_then(DomNode::element)
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(ElementData::tag)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id).and_then(DomNode::text)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attribute(name))
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_class(class))
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData> {
        self.get_mut(id)?.element_mut().ok_or_else(|| {
            DocModelError::InvalidOperation(format!("node {} is not an element", id))
        })
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.element_mut(id)?.set_attribute(name, value);
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<String>> {
        Ok(self.element_mut(id)?.remove_attribute(name))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        self.element_mut(id)?.add_class(class);
        Ok(())
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        self.element_mut(id)?.remove_class(class);
        Ok(())
    }

    fn text_mut(&mut self, id: NodeId) -> Result<&mut String> {
        self.get_mut(id)?.text_mut().ok_or_else(|| {
            DocModelError::InvalidOperation(format!("node {} is not a text node", id))
        })
    }

    /// Replace the content of a text node
    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) -> Result<()> {
        *self.text_mut(id)? = value.into();
        Ok(())
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(DomNode::parent)
    }

    /// Children of a node (empty for text nodes and unknown IDs)
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(DomNode::children).unwrap_or(&[])
    }

    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    /// Index of a node among its parent's children
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_of(id)?;
        self.child_at(parent, index + 1)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_of(id)?;
        index.checked_sub(1).and_then(|i| self.child_at(parent, i))
    }

    /// Boundary length of a node: chars for text, child count otherwise
    pub fn length(&self, id: NodeId) -> usize {
        match self.node(id).map(DomNode::kind) {
            Some(NodeKind::Text(t)) => text::char_len(t),
            Some(_) => self.children(id).len(),
            None => 0,
        }
    }

    /// Ancestors of a node, nearest first
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            result.push(node);
            current = self.parent(node);
        }
        result
    }

    /// Check if `ancestor` strictly contains `node`
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.is_ancestor(ancestor, node)
    }

    /// Check if a node is reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(id) && self.is_inclusive_ancestor(self.root, id)
    }

    /// Descendants in document order, excluding the node itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            result.push(node);
            stack.extend(self.children(node).iter().rev());
        }
        result
    }

    /// The next node in document order that is not inside `id`
    pub fn next_after_subtree(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            if current == self.root {
                return None;
            }
            if let Some(sibling) = self.next_sibling(current) {
                return Some(sibling);
            }
            current = self.parent(current)?;
        }
    }

    /// The previous node in document order that does not contain `id`
    pub fn previous_before_subtree(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            if current == self.root {
                return None;
            }
            if let Some(sibling) = self.previous_sibling(current) {
                return Some(sibling);
            }
            current = self.parent(current)?;
        }
    }

    /// Deepest node containing both `a` and `b`
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        if self.is_inclusive_ancestor(a, b) {
            return Some(a);
        }
        self.ancestors(a)
            .into_iter()
            .find(|ancestor| self.is_ancestor(*ancestor, b))
    }

    /// Child indices leading from the root to a node; `None` if detached
    pub fn path(&self, id: NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = id;
        while current != self.root {
            path.push(self.index_of(current)?);
            current = self.parent(current)?;
        }
        path.reverse();
        Some(path)
    }

    /// Maximal subtrees lying strictly between two nodes in document order.
    ///
    /// Ancestors of `to` are descended into rather than returned, so the
    /// result never contains `from`, `to`, or anything enclosing `to`.
    pub fn nodes_between(&self, from: NodeId, to: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut cursor = self.next_after_subtree(from);
        while let Some(node) = cursor {
            if node == to {
                break;
            }
            if self.is_ancestor(node, to) {
                cursor = self.first_child(node);
                continue;
            }
            result.push(node);
            cursor = self.next_after_subtree(node);
        }
        result
    }

    /// Concatenated text of a subtree
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    // =========================================================================
    // Structural Mutation
    // =========================================================================

    /// Insert `child` at `index` under `parent`, detaching it from its old place
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        if !self.get(parent)?.can_have_children() {
            return Err(DocModelError::InvalidOperation(format!(
                "text node {} cannot have children",
                parent
            )));
        }
        if matches!(self.get(child)?.kind(), NodeKind::Document) {
            return Err(DocModelError::InvalidOperation(
                "the document node cannot be inserted".to_string(),
            ));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DocModelError::TreeStructureError(format!(
                "inserting {} under {} would create a cycle",
                child, parent
            )));
        }

        let mut index = index;
        if self.parent(child) == Some(parent) {
            if let Some(old) = self.index_of(child) {
                if old < index {
                    index -= 1;
                }
            }
        }
        self.detach(child)?;

        let children = self.get_mut(parent)?.children_mut();
        if index > children.len() {
            return Err(DocModelError::InvalidPosition {
                node_id: parent.as_uuid(),
                offset: index,
            });
        }
        children.insert(index, child);
        self.get_mut(child)?.set_parent(Some(parent));
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    /// Insert `child` immediately before `reference`
    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) -> Result<()> {
        let (parent, index) = self.location(reference)?;
        self.insert_child(parent, index, child)
    }

    /// Insert `child` immediately after `reference`
    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) -> Result<()> {
        let (parent, index) = self.location(reference)?;
        self.insert_child(parent, index + 1, child)
    }

    fn location(&self, id: NodeId) -> Result<(NodeId, usize)> {
        let parent = self.get(id)?.parent().ok_or_else(|| {
            DocModelError::TreeStructureError(format!("node {} has no parent", id))
        })?;
        let index = self.index_of(id).ok_or_else(|| {
            DocModelError::TreeStructureError(format!("node {} missing from its parent", id))
        })?;
        Ok((parent, index))
    }

    /// Detach a node from its parent, keeping it in the arena
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(DocModelError::InvalidOperation(
                "the document node cannot be detached".to_string(),
            ));
        }
        let Some(parent) = self.get(id)?.parent() else {
            return Ok(());
        };
        self.get_mut(parent)?.children_mut().retain(|c| *c != id);
        self.get_mut(id)?.set_parent(None);
        Ok(())
    }

    /// Remove a node and its whole subtree from the tree and the arena
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        self.detach(id)?;
        for node in self.descendants(id) {
            self.nodes.remove(&node);
        }
        self.nodes.remove(&id);
        Ok(())
    }

    /// Replace an element with its children, returning the moved children
    pub fn unwrap_node(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let (parent, index) = self.location(id)?;
        let children = self.children(id).to_vec();
        for (offset, child) in children.iter().enumerate() {
            self.insert_child(parent, index + offset, *child)?;
        }
        self.remove(id)?;
        Ok(children)
    }

    /// Put `wrapper` in place of `node` and move `node` inside it
    pub fn wrap(&mut self, node: NodeId, wrapper: NodeId) -> Result<()> {
        if node == self.root {
            return Err(DocModelError::InvalidOperation(
                "the document node cannot be wrapped".to_string(),
            ));
        }
        self.insert_before(node, wrapper)?;
        self.append_child(wrapper, node)
    }

    /// Move all children of `from` to the end of `into`
    pub fn move_children(&mut self, from: NodeId, into: NodeId) -> Result<Vec<NodeId>> {
        let children = self.children(from).to_vec();
        for child in &children {
            self.append_child(into, *child)?;
        }
        Ok(children)
    }

    /// Remove every child of a node
    pub fn clear_children(&mut self, id: NodeId) -> Result<()> {
        for child in self.children(id).to_vec() {
            self.remove(child)?;
        }
        Ok(())
    }

    // =========================================================================
    // Text Mutation
    // =========================================================================

    /// Split a text node at a char offset; the new right half follows it
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId> {
        let value = self.text_mut(id)?;
        if offset > text::char_len(value) {
            return Err(DocModelError::InvalidPosition {
                node_id: id.as_uuid(),
                offset,
            });
        }
        let tail = value.split_off(text::byte_index(value, offset));
        let right = self.create_text(tail);
        if self.parent(id).is_some() {
            self.insert_after(id, right)?;
        }
        Ok(right)
    }

    /// Insert a string into a text node at a char offset
    pub fn insert_text(&mut self, id: NodeId, offset: usize, insert: &str) -> Result<()> {
        let value = self.text_mut(id)?;
        if offset > text::char_len(value) {
            return Err(DocModelError::InvalidPosition {
                node_id: id.as_uuid(),
                offset,
            });
        }
        let at = text::byte_index(value, offset);
        value.insert_str(at, insert);
        Ok(())
    }

    /// Delete the chars in `start..end` of a text node
    pub fn delete_text(&mut self, id: NodeId, start: usize, end: usize) -> Result<()> {
        let value = self.text_mut(id)?;
        if start > end || end > text::char_len(value) {
            return Err(DocModelError::InvalidPosition {
                node_id: id.as_uuid(),
                offset: end,
            });
        }
        let range = text::byte_index(value, start)..text::byte_index(value, end);
        value.replace_range(range, "");
        Ok(())
    }

    // =========================================================================
    // Cloning
    // =========================================================================

    /// Detached copy of a node without its children
    pub fn shallow_clone(&mut self, id: NodeId) -> Result<NodeId> {
        let kind = self.get(id)?.kind().clone();
        if matches!(kind, NodeKind::Document) {
            return Err(DocModelError::InvalidOperation(
                "the document node cannot be cloned".to_string(),
            ));
        }
        Ok(self.store(DomNode::new(kind)))
    }

    /// Detached copy of a whole subtree
    pub fn deep_clone(&mut self, id: NodeId) -> Result<NodeId> {
        let copy = self.shallow_clone(id)?;
        for child in self.children(id).to_vec() {
            let child_copy = self.deep_clone(child)?;
            self.append_child(copy, child_copy)?;
        }
        Ok(copy)
    }
}
