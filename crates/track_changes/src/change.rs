//! Change-group data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a change group, rendered in decimal on annotation nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeId(pub u64);

impl ChangeId {
    /// Parse the attribute form of an id
    pub fn parse(value: &str) -> Option<Self> {
        value.trim().parse().ok().map(Self)
    }
}

impl std::fmt::Display for ChangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of tracked change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insertion,
    Deletion,
}

impl ChangeKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ChangeKind::Insertion => "Insertion",
            ChangeKind::Deletion => "Deletion",
        }
    }
}

/// The author of changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new("anonymous", "Anonymous")
    }
}

/// Metadata of one change group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub kind: ChangeKind,
    pub time: DateTime<Utc>,
    pub user_id: String,
    pub user_name: String,
    /// Opaque tag supplied by the host, e.g. a document version
    pub payload: String,
}

impl Change {
    /// A change authored now by `user`
    pub fn new(kind: ChangeKind, user: &User) -> Self {
        Self {
            kind,
            time: Utc::now(),
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            payload: String::new(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn is_insertion(&self) -> bool {
        self.kind == ChangeKind::Insertion
    }

    pub fn is_deletion(&self) -> bool {
        self.kind == ChangeKind::Deletion
    }
}
