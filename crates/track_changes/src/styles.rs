//! Author style map - assigns each author a small style index

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mapping from author id to style index.
///
/// Indices start at 1 and are handed out by a monotonic counter that
/// skips indices already claimed, so no two authors share an index until
/// [`AuthorStyles::reset`] is called.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorStyles {
    prefix: String,
    user_styles: HashMap<String, u32>,
    counter: u32,
}

impl AuthorStyles {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            user_styles: HashMap::new(),
            counter: 0,
        }
    }

    /// Create a map with preassigned indices
    pub fn with_assignments(prefix: impl Into<String>, assignments: &HashMap<String, u32>) -> Self {
        let mut styles = Self::new(prefix);
        let mut sorted: Vec<(&String, &u32)> = assignments.iter().collect();
        sorted.sort();
        for (user, index) in sorted {
            styles.claim(user, *index);
        }
        styles
    }

    /// Style index of an author, assigning the next free one if needed
    pub fn style_index(&mut self, user_id: &str) -> u32 {
        if let Some(index) = self.user_styles.get(user_id) {
            return *index;
        }
        let index = self.next_free_index();
        self.user_styles.insert(user_id.to_string(), index);
        index
    }

    /// Style class of an author, e.g. `ice-cts-2`
    pub fn style_class(&mut self, user_id: &str) -> String {
        let index = self.style_index(user_id);
        self.class_for(index)
    }

    pub fn class_for(&self, index: u32) -> String {
        format!("{}-{}", self.prefix, index)
    }

    /// Record an index found in content.
    ///
    /// An author that already has an index keeps it, and an index owned by
    /// another author is not shared; in both cases the author's effective
    /// index is returned.
    pub fn claim(&mut self, user_id: &str, index: u32) -> u32 {
        if let Some(existing) = self.user_styles.get(user_id) {
            return *existing;
        }
        if index == 0 || self.owner_of(index).is_some() {
            return self.style_index(user_id);
        }
        self.user_styles.insert(user_id.to_string(), index);
        index
    }

    pub fn index_of(&self, user_id: &str) -> Option<u32> {
        self.user_styles.get(user_id).copied()
    }

    pub fn owner_of(&self, index: u32) -> Option<&str> {
        self.user_styles
            .iter()
            .find(|(_, i)| **i == index)
            .map(|(user, _)| user.as_str())
    }

    /// Forget every assignment; indices may be reused afterwards
    pub fn reset(&mut self) {
        self.user_styles.clear();
        self.counter = 0;
    }

    fn next_free_index(&mut self) -> u32 {
        loop {
            self.counter += 1;
            if self.owner_of(self.counter).is_none() {
                return self.counter;
            }
        }
    }
}
