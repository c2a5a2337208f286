//! Change filtering for queries and bulk accept/reject

use crate::Change;
use chrono::{DateTime, Utc};

/// The metadata a filter predicate sees
#[derive(Debug, Clone, Copy)]
pub struct ChangeSummary<'a> {
    pub user_id: &'a str,
    pub time: DateTime<Utc>,
    pub data: &'a str,
}

impl<'a> From<&'a Change> for ChangeSummary<'a> {
    fn from(change: &'a Change) -> Self {
        Self {
            user_id: &change.user_id,
            time: change.time,
            data: &change.payload,
        }
    }
}

/// Filter options for selecting change groups.
///
/// A change is selected only if it passes every supplied criterion; an
/// empty filter selects everything.
#[derive(Default)]
pub struct ChangeFilter {
    /// Only these authors (None = all authors)
    pub include: Option<Vec<String>>,
    /// Never these authors
    pub exclude: Option<Vec<String>>,
    #[allow(clippy::type_complexity)]
    pub predicate: Option<Box<dyn Fn(&ChangeSummary) -> bool>>,
}

impl std::fmt::Debug for ChangeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFilter")
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("predicate", &self.predicate.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl ChangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(users.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(users.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_predicate(mut self, predicate: impl Fn(&ChangeSummary) -> bool + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Check if a change matches this filter
    pub fn matches(&self, change: &Change) -> bool {
        if let Some(include) = &self.include {
            if !include.iter().any(|u| *u == change.user_id) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.iter().any(|u| *u == change.user_id) {
                return false;
            }
        }
        match &self.predicate {
            Some(predicate) => predicate(&ChangeSummary::from(change)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChangeKind, User};

    fn create_change(user: &str, data: &str) -> Change {
        Change::new(ChangeKind::Insertion, &User::new(user, user)).with_payload(data)
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(ChangeFilter::new().matches(&create_change("A", "")));
    }

    #[test]
    fn test_include_and_exclude() {
        let filter = ChangeFilter::new().include_users(["A", "B"]).exclude_users(["B"]);
        assert!(filter.matches(&create_change("A", "")));
        assert!(!filter.matches(&create_change("B", "")));
        assert!(!filter.matches(&create_change("C", "")));
    }

    #[test]
    fn test_predicate_sees_time() {
        let cutoff = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap();
        let filter = ChangeFilter::new().with_predicate(move |c| c.time < cutoff);
        let old = create_change("A", "").with_time(cutoff - chrono::Duration::seconds(1));
        assert!(filter.matches(&old));
        assert!(!filter.matches(&create_change("A", "")));
    }

    #[test]
    fn test_predicate_sees_payload() {
        let filter = ChangeFilter::new().with_predicate(|c| c.data == "v2");
        assert!(filter.matches(&create_change("A", "v2")));
        assert!(!filter.matches(&create_change("A", "v1")));
    }
}
