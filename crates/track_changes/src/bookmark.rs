//! Bookmarks - marker pairs that carry a selection across tree rewrites

use crate::Result;
use dom_model::{compare_points, DomPoint, DomRange, DomTree, NodeId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const BOOKMARK_CLASS: &str = "ice-bookmark";
pub const BOOKMARK_START_CLASS: &str = "ice-bookmark-start";
pub const BOOKMARK_END_CLASS: &str = "ice-bookmark-end";

/// Check if a node is a bookmark marker
pub fn is_marker(tree: &DomTree, node: NodeId) -> bool {
    tree.has_class(node, BOOKMARK_CLASS)
}

/// Two marker elements delimiting a selection.
///
/// Markers are found again by identity, so any mutation that keeps them
/// attached leaves the selection recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    start: NodeId,
    end: NodeId,
    collapsed: bool,
}

impl Bookmark {
    /// Place markers around a range
    pub fn create(tree: &mut DomTree, range: &DomRange) -> Result<Self> {
        range.validate(tree)?;
        let collapsed = range.is_collapsed();

        let end = create_marker(tree, BOOKMARK_END_CLASS)?;
        tree.insert_at_point(range.end(), end)?;

        let start = create_marker(tree, BOOKMARK_START_CLASS)?;
        if collapsed {
            tree.insert_before(end, start)?;
        } else {
            tree.insert_at_point(range.start(), start)?;
        }

        let (start, end) = match (DomPoint::before(tree, start), DomPoint::before(tree, end)) {
            (Some(a), Some(b)) if compare_points(tree, &a, &b) == Some(Ordering::Greater) => {
                (end, start)
            }
            _ => (start, end),
        };

        if tree.previous_sibling(end).is_none() {
            let spacer = tree.create_text("");
            tree.insert_before(end, spacer)?;
        }
        if tree.next_sibling(start).is_none() {
            let spacer = tree.create_text("");
            tree.insert_after(start, spacer)?;
        }

        Ok(Self {
            start,
            end,
            collapsed,
        })
    }

    pub fn start_marker(&self) -> NodeId {
        self.start
    }

    pub fn end_marker(&self) -> NodeId {
        self.end
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Remove the markers and derive the range they delimited.
    ///
    /// A lost marker is replaced by the surviving one; `None` when both
    /// are gone.
    pub fn select(self, tree: &mut DomTree) -> Result<Option<DomRange>> {
        let start = take_marker(tree, self.start)?;
        let end = take_marker(tree, self.end)?;

        let (start, end) = match (start, end) {
            (Some(s), Some(e)) => (s, e),
            (Some(s), None) => {
                tracing::warn!("Bookmark end marker lost, collapsing to start");
                (s, s)
            }
            (None, Some(e)) => {
                tracing::warn!("Bookmark start marker lost, collapsing to end");
                (e, e)
            }
            (None, None) => {
                tracing::warn!("Bookmark markers lost");
                return Ok(None);
            }
        };

        let mut range = DomRange::collapsed_at(start);
        if !self.collapsed && compare_points(tree, &start, &end) == Some(Ordering::Less) {
            range = DomRange::new(start, end);
        }
        Ok(Some(range))
    }
}

fn create_marker(tree: &mut DomTree, edge_class: &str) -> Result<NodeId> {
    let marker = tree.create_element("span");
    tree.add_class(marker, BOOKMARK_CLASS)?;
    tree.add_class(marker, edge_class)?;
    Ok(marker)
}

/// Remove a marker and return the content position it stood for
fn take_marker(tree: &mut DomTree, marker: NodeId) -> Result<Option<DomPoint>> {
    if !tree.is_attached(marker) {
        if tree.contains(marker) {
            tree.remove(marker)?;
        }
        return Ok(None);
    }
    let Some(DomPoint {
        node: parent,
        offset: index,
    }) = DomPoint::before(tree, marker)
    else {
        return Ok(None);
    };
    tree.remove(marker)?;

    if let Some(next) = tree.child_at(parent, index).filter(|n| tree.is_text(*n)) {
        return Ok(Some(DomPoint::new(next, 0)));
    }
    if let Some(prev) = index
        .checked_sub(1)
        .and_then(|i| tree.child_at(parent, i))
        .filter(|n| tree.is_text(*n))
    {
        return Ok(Some(DomPoint::new(prev, tree.length(prev))));
    }
    Ok(Some(DomPoint::new(parent, index)))
}
