//! Node types stored in the document tree

use crate::NodeId;
use serde::{Deserialize, Serialize};

/// Enumeration of node types in the document tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Document,
    Element,
    Text,
}

/// Tag name and attributes of an element node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementData {
    /// Lowercase tag name
    tag: String,
    /// Attributes in insertion order
    attributes: Vec<(String, String)>,
}

impl ElementData {
    /// Create element data for a tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: Vec::new(),
        }
    }

    /// Get the tag name
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Get an attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing any previous value in place
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Remove an attribute, returning its previous value
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(index).1)
    }

    /// Iterate over attributes in insertion order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Iterate over the whitespace-separated tokens of the class attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class").unwrap_or("").split_whitespace()
    }

    /// Check for a class token
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Add a class token if not already present
    pub fn add_class(&mut self, class: &str) {
        if class.is_empty() || self.has_class(class) {
            return;
        }
        let value = match self.attribute("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attribute("class", value);
    }

    /// Remove a class token; drops the attribute once it is empty
    pub fn remove_class(&mut self, class: &str) {
        let remaining: Vec<&str> = self.classes().filter(|c| *c != class).collect();
        if remaining.is_empty() {
            self.remove_attribute("class");
        } else {
            let value = remaining.join(" ");
            self.set_attribute("class", value);
        }
    }
}

/// Payload of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// The tree root; never wrapped, moved or removed
    Document,
    Element(ElementData),
    Text(String),
}

/// A node in the document tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomNode {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

impl DomNode {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            parent: None,
            children: Vec::new(),
            kind,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Document => NodeType::Document,
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
        }
    }

    /// Element data, if this is an element
    pub fn element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Text content, if this is a text node
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Check if this node can have children
    pub fn can_have_children(&self) -> bool {
        !matches!(self.kind, NodeKind::Text(_))
    }

    pub(crate) fn element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn text_mut(&mut self) -> Option<&mut String> {
        match &mut self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_tokens() {
        let mut el = ElementData::new("SPAN");
        assert_eq!(el.tag(), "span");

        el.add_class("ice-ins");
        el.add_class("ice-cts-1");
        el.add_class("ice-ins");
        assert_eq!(el.attribute("class"), Some("ice-ins ice-cts-1"));
        assert!(el.has_class("ice-cts-1"));

        el.remove_class("ice-ins");
        assert_eq!(el.attribute("class"), Some("ice-cts-1"));
        el.remove_class("ice-cts-1");
        assert_eq!(el.attribute("class"), None);
    }

    #[test]
    fn test_attribute_order_is_stable() {
        let mut el = ElementData::new("ins");
        el.set_attribute("data-cid", "1");
        el.set_attribute("data-userid", "A");
        el.set_attribute("data-cid", "2");

        let attrs: Vec<_> = el.attributes().collect();
        assert_eq!(attrs, vec![("data-cid", "2"), ("data-userid", "A")]);
        assert_eq!(el.remove_attribute("data-cid"), Some("2".to_string()));
        assert_eq!(el.attribute("data-cid"), None);
    }
}
