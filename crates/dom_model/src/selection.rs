//! Selection model - the set of ranges the user currently has selected

use crate::{DomRange, DomTree};
use serde::{Deserialize, Serialize};

/// Selection-level operations shared by every selection backend.
///
/// Implementations hand out [`DomRange`] values; callers validate them
/// against the tree they are about to mutate.
pub trait Selection {
    /// Number of ranges currently selected
    fn range_count(&self, tree: &DomTree) -> usize;

    /// Get a copy of the range at `index`
    fn get_range_at(&self, tree: &DomTree, index: usize) -> Option<DomRange>;

    /// Add a range to the selection
    fn add_range(&mut self, range: DomRange);

    /// Clear the selection
    fn remove_all_ranges(&mut self);
}

/// A selection kept entirely in memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyntheticSelection {
    ranges: Vec<DomRange>,
}

impl SyntheticSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A selection holding a single range
    pub fn with_range(range: DomRange) -> Self {
        Self {
            ranges: vec![range],
        }
    }
}

impl Selection for SyntheticSelection {
    fn range_count(&self, _tree: &DomTree) -> usize {
        self.ranges.len()
    }

    fn get_range_at(&self, _tree: &DomTree, index: usize) -> Option<DomRange> {
        self.ranges.get(index).copied()
    }

    fn add_range(&mut self, range: DomRange) {
        self.ranges.push(range);
    }

    fn remove_all_ranges(&mut self) {
        self.ranges.clear();
    }
}
