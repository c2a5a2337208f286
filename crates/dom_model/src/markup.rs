//! Markup reader and writer
//!
//! Reads XHTML-style fragments and the HTML this module writes: void
//! elements may be self-closed (`<br/>`) or bare (`<br>`), and a stray
//! closing tag for one is ignored. Writes HTML, where void elements have
//! no closing tag.

use crate::{DocModelError, DomTree, NodeId, NodeKind, Result};
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Elements written without a closing tag when they have no children
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

fn resolve_entity(name: &str) -> Option<&'static str> {
    match name {
        "nbsp" => Some("\u{a0}"),
        "zwsp" => Some("\u{200b}"),
        _ => None,
    }
}

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

fn markup_error(err: impl std::fmt::Display) -> DocModelError {
    DocModelError::Markup(err.to_string())
}

/// Parse a fragment into a new tree whose root holds the top-level nodes
pub fn parse_fragment(markup: &str) -> Result<DomTree> {
    let mut tree = DomTree::new();
    let root = tree.root();
    tree.append_markup(root, markup)?;
    Ok(tree)
}

impl DomTree {
    /// Parse markup and append the resulting nodes under `parent`
    pub fn append_markup(&mut self, parent: NodeId, markup: &str) -> Result<Vec<NodeId>> {
        let mut reader = Reader::from_str(markup);
        reader.config_mut().trim_text(false);
        // Bare void tags never close, so end names are matched against the stack here
        reader.config_mut().check_end_names = false;
        let mut buf = Vec::new();
        let mut stack = vec![parent];
        let mut top_level = Vec::new();

        loop {
            let current = *stack.last().unwrap_or(&parent);
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let element = self.element_from_tag(e)?;
                    self.append_child(current, element)?;
                    if stack.len() == 1 {
                        top_level.push(element);
                    }
                    if !is_void(&String::from_utf8_lossy(e.name().as_ref())) {
                        stack.push(element);
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    let element = self.element_from_tag(e)?;
                    self.append_child(current, element)?;
                    if stack.len() == 1 {
                        top_level.push(element);
                    }
                }
                Ok(Event::End(ref e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if !is_void(&name) {
                        if stack.len() == 1 || self.tag(current) != Some(name.as_str()) {
                            return Err(DocModelError::Markup(format!("unexpected closing tag </{}>", name)));
                        }
                        stack.pop();
                    }
                }
                Ok(Event::Text(ref e)) => {
                    let value = e.unescape_with(resolve_entity).map_err(markup_error)?;
                    if let Some(node) = self.append_text(current, &value)? {
                        if stack.len() == 1 {
                            top_level.push(node);
                        }
                    }
                }
                Ok(Event::CData(e)) => {
                    let value = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    if let Some(node) = self.append_text(current, &value)? {
                        if stack.len() == 1 {
                            top_level.push(node);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(other) => {
                    tracing::debug!("Ignoring markup event: {:?}", other);
                }
                Err(e) => return Err(markup_error(e)),
            }
            buf.clear();
        }

        if stack.len() > 1 {
            return Err(DocModelError::Markup("unclosed element at end of input".to_string()));
        }
        Ok(top_level)
    }

    /// Parse markup into detached nodes, ready to be inserted elsewhere
    pub fn parse_detached(&mut self, markup: &str) -> Result<Vec<NodeId>> {
        let holder = self.create_element("div");
        let parsed = self.append_markup(holder, markup);
        let nodes = match parsed {
            Ok(nodes) => nodes,
            Err(e) => {
                self.remove(holder)?;
                return Err(e);
            }
        };
        for node in &nodes {
            self.detach(*node)?;
        }
        self.remove(holder)?;
        Ok(nodes)
    }

    fn element_from_tag(&mut self, start: &BytesStart<'_>) -> Result<NodeId> {
        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let element = self.create_element(&tag);
        for attr in start.attributes() {
            let attr = attr.map_err(markup_error)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value_with(resolve_entity)
                .map_err(markup_error)?
                .into_owned();
            self.set_attribute(element, key, value)?;
        }
        Ok(element)
    }

    /// Append text, merging into a trailing text node; returns a new node if one was created
    fn append_text(&mut self, parent: NodeId, value: &str) -> Result<Option<NodeId>> {
        if value.is_empty() {
            return Ok(None);
        }
        if let Some(last) = self.last_child(parent) {
            if let Some(existing) = self.text(last) {
                let merged = format!("{}{}", existing, value);
                self.set_text(last, merged)?;
                return Ok(None);
            }
        }
        let node = self.create_text(value);
        self.append_child(parent, node)?;
        Ok(Some(node))
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// HTML of a node's children
    pub fn inner_html(&self, id: NodeId) -> String {
        self.inner_html_with(id, &|_| true)
    }

    /// HTML of a node including its own tag
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &|_| true, &mut out);
        out
    }

    /// HTML of a node's children, keeping only attributes accepted by `keep`
    pub fn inner_html_with(&self, id: NodeId, keep: &dyn Fn(&str) -> bool) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_node(*child, keep, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, keep: &dyn Fn(&str) -> bool, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match node.kind() {
            NodeKind::Text(value) => out.push_str(&partial_escape(value.as_str())),
            NodeKind::Document => {
                for child in node.children() {
                    self.write_node(*child, keep, out);
                }
            }
            NodeKind::Element(data) => {
                out.push('<');
                out.push_str(data.tag());
                for (key, value) in data.attributes().filter(|(key, _)| keep(key)) {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape(value));
                    out.push('"');
                }
                out.push('>');
                if node.children().is_empty() && VOID_ELEMENTS.contains(&data.tag()) {
                    return;
                }
                for child in node.children() {
                    self.write_node(*child, keep, out);
                }
                out.push_str("</");
                out.push_str(data.tag());
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize() {
        let markup = r#"<p class="x">hello <b>bold</b><br/>tail</p><p>two</p>"#;
        let tree = parse_fragment(markup).unwrap();
        let root = tree.root();

        assert_eq!(tree.children(root).len(), 2);
        assert_eq!(
            tree.inner_html(root),
            r#"<p class="x">hello <b>bold</b><br>tail</p><p>two</p>"#
        );
    }

    #[test]
    fn test_entities_and_escaping() {
        let tree = parse_fragment("<p>a &amp; b&nbsp;&lt;c&gt;</p>").unwrap();
        let p = tree.children(tree.root())[0];
        assert_eq!(tree.text_content(p), "a & b\u{a0}<c>");
        assert_eq!(tree.inner_html(p), "a &amp; b\u{a0}&lt;c&gt;");
    }

    #[test]
    fn test_attribute_filter() {
        let tree = parse_fragment(r#"<ins class="ice-ins" data-userid="A" data-cid="3">X</ins>"#)
            .unwrap();
        let html = tree.inner_html_with(tree.root(), &|name| name == "data-userid");
        assert_eq!(html, r#"<ins data-userid="A">X</ins>"#);
    }

    #[test]
    fn test_mismatched_markup_is_an_error() {
        assert!(parse_fragment("<p><b>oops</p>").is_err());
        assert!(parse_fragment("<p>open").is_err());
        assert!(parse_fragment("<p>x</p></div>").is_err());
    }

    #[test]
    fn test_written_void_elements_read_back() {
        let tree = parse_fragment(r#"<p>a<br/><img src="x"/>b</p>"#).unwrap();
        let html = tree.inner_html(tree.root());
        assert_eq!(html, r#"<p>a<br><img src="x">b</p>"#);

        let again = parse_fragment(&html).unwrap();
        let p = again.children(again.root())[0];
        assert_eq!(again.children(p).len(), 4);
        assert_eq!(again.inner_html(again.root()), html);
    }

    #[test]
    fn test_stray_void_closing_tag_is_ignored() {
        let tree = parse_fragment("<p>a<br></br>b</p>").unwrap();
        assert_eq!(tree.inner_html(tree.root()), "<p>a<br>b</p>");
    }

    #[test]
    fn test_parse_detached_nodes() {
        let mut tree = DomTree::new();
        let before = tree.node_count();
        let nodes = tree.parse_detached("x<i>y</i>").unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| tree.parent(*n).is_none()));
        assert_eq!(tree.node_count(), before + 3);
    }
}
