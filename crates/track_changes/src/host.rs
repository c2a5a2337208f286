//! Host editor bridge
//!
//! A session either keeps its selection in memory or defers to the host
//! editor that owns the real one. The choice is made once, at
//! construction, through [`RangeBackend`].

use dom_model::{DomRange, DomTree, NodeId, Selection, SyntheticSelection};

/// Selection services provided by a host editor
pub trait HostEditor {
    /// The host's current range, if it has one
    fn get_host_range(&self, tree: &DomTree) -> Option<DomRange>;

    /// Make `range` the host's selection
    fn set_host_range(&mut self, range: DomRange);

    /// Drop the host's selection
    fn clear_host_range(&mut self) {}

    /// Adapt a node for the host; identity by default
    fn make_host_element(&self, node: NodeId) -> NodeId {
        node
    }
}

/// [`Selection`] backed by a host editor, holding at most one range
pub struct HostSelection {
    host: Box<dyn HostEditor>,
}

impl std::fmt::Debug for HostSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostSelection").field("host", &"<host>").finish()
    }
}

impl HostSelection {
    pub fn new(host: Box<dyn HostEditor>) -> Self {
        Self { host }
    }
}

impl Selection for HostSelection {
    fn range_count(&self, tree: &DomTree) -> usize {
        usize::from(self.host.get_host_range(tree).is_some())
    }

    fn get_range_at(&self, tree: &DomTree, index: usize) -> Option<DomRange> {
        if index != 0 {
            return None;
        }
        self.host.get_host_range(tree)
    }

    fn add_range(&mut self, range: DomRange) {
        self.host.set_host_range(range);
    }

    fn remove_all_ranges(&mut self) {
        self.host.clear_host_range();
    }
}

/// Where a session's selection lives
pub enum RangeBackend {
    /// Kept by the session itself
    Synthetic,
    /// Routed through the host editor
    Host(Box<dyn HostEditor>),
}

impl std::fmt::Debug for RangeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeBackend::Synthetic => write!(f, "Synthetic"),
            RangeBackend::Host(_) => write!(f, "Host(<host>)"),
        }
    }
}

impl RangeBackend {
    pub fn into_selection(self) -> Box<dyn Selection> {
        match self {
            RangeBackend::Synthetic => Box::new(SyntheticSelection::new()),
            RangeBackend::Host(host) => Box::new(HostSelection::new(host)),
        }
    }
}
