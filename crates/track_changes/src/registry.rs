//! Change registry - metadata for every live change group

use crate::classifier::annotation_kind;
use crate::{AuthorStyles, Change, ChangeId, ChangeKind, Result, TrackingConfig, TrackingError, User};
use chrono::{DateTime, Utc};
use dom_model::{DomTree, NodeId};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// The group id held open for one user action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Batch {
    id: ChangeId,
    /// Group for nodes of the other kind, e.g. the insertion half of a replace
    alternate: Option<ChangeId>,
}

/// Result of [`ChangeRegistry::add_change`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recorded {
    pub id: ChangeId,
    /// True when the group was created by this call
    pub is_new: bool,
}

/// What a [`ChangeRegistry::reload`] scan found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadSummary {
    pub changes: usize,
    pub annotation_nodes: usize,
    /// Nodes whose id was missing, unparseable or reused across kinds
    pub synthesized_ids: usize,
    /// Nodes whose style class was rewritten
    pub restyled: usize,
}

/// In-memory map from change-group id to change metadata.
///
/// The registry never owns annotation nodes; it only records ids that
/// appear on them. Groups whose nodes all disappear are dropped by
/// [`ChangeRegistry::collect_garbage`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeRegistry {
    changes: BTreeMap<ChangeId, Change>,
    next_index: u64,
    batch: Option<Batch>,
}

impl ChangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Ids and Batches
    // =========================================================================

    /// Allocate the next unused group id
    pub fn new_change_id(&mut self) -> ChangeId {
        loop {
            self.next_index += 1;
            let id = ChangeId(self.next_index);
            if !self.changes.contains_key(&id) {
                return id;
            }
        }
    }

    /// Open a batch, or return the id of the batch already open
    pub fn start_batch(&mut self) -> ChangeId {
        if let Some(batch) = self.batch {
            return batch.id;
        }
        let id = self.new_change_id();
        self.batch = Some(Batch {
            id,
            alternate: None,
        });
        id
    }

    /// Close the batch; ignored unless `id` is the open batch
    pub fn end_batch(&mut self, id: ChangeId) {
        if self.batch.map(|b| b.id) == Some(id) {
            self.batch = None;
        }
    }

    pub fn current_batch(&self) -> Option<ChangeId> {
        self.batch.map(|b| b.id)
    }

    /// Group id for a new node of `kind` inside the open batch
    fn batch_id_for(&mut self, kind: ChangeKind) -> Option<ChangeId> {
        let batch = self.batch?;
        match self.changes.get(&batch.id) {
            None => Some(batch.id),
            Some(change) if change.kind == kind => Some(batch.id),
            Some(_) => {
                if let Some(alternate) = batch.alternate {
                    return Some(alternate);
                }
                let alternate = self.new_change_id();
                self.batch = Some(Batch {
                    alternate: Some(alternate),
                    ..batch
                });
                Some(alternate)
            }
        }
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Attribute annotation nodes to a group.
    ///
    /// Uses the open batch when there is one, otherwise a fresh group.
    /// Metadata is recorded the first time a group id is seen.
    #[allow(clippy::too_many_arguments)]
    pub fn add_change(
        &mut self,
        tree: &mut DomTree,
        config: &TrackingConfig,
        styles: &mut AuthorStyles,
        kind: ChangeKind,
        user: &User,
        payload: &str,
        nodes: &[NodeId],
    ) -> Result<Recorded> {
        for node in nodes {
            if !tree.is_element(*node) {
                return Err(TrackingError::InvalidOperation(format!(
                    "annotation node {} must be an element",
                    node
                )));
            }
        }

        let id = match self.batch_id_for(kind) {
            Some(id) => id,
            None => self.new_change_id(),
        };
        let is_new = !self.changes.contains_key(&id);
        let change = self
            .changes
            .entry(id)
            .or_insert_with(|| Change::new(kind, user).with_payload(payload))
            .clone();

        for node in nodes {
            stamp(tree, config, styles, *node, id, &change)?;
        }
        if is_new {
            tracing::debug!("Recorded {} group {} for {}", kind.display_name(), id, user.id);
        }
        Ok(Recorded { id, is_new })
    }

    /// Insert metadata directly, e.g. from a reload scan
    pub fn insert_change(&mut self, id: ChangeId, change: Change) {
        self.next_index = self.next_index.max(id.0);
        self.changes.insert(id, change);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_change(&self, id: ChangeId) -> Option<&Change> {
        self.changes.get(&id)
    }

    pub fn contains(&self, id: ChangeId) -> bool {
        self.changes.contains_key(&id)
    }

    /// Drop a group's metadata; its nodes must already be gone or transformed
    pub fn remove_change(&mut self, id: ChangeId) -> Option<Change> {
        self.changes.remove(&id)
    }

    pub fn clear(&mut self) {
        self.changes.clear();
        self.batch = None;
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChangeId, &Change)> {
        self.changes.iter()
    }

    pub fn changes(&self) -> &BTreeMap<ChangeId, Change> {
        &self.changes
    }

    /// Distinct author ids, sorted
    pub fn change_user_ids(&self) -> Vec<String> {
        self.changes
            .values()
            .map(|c| c.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Remove groups that no longer have an attached annotation node
    pub fn collect_garbage(&mut self, tree: &DomTree, config: &TrackingConfig) -> Vec<ChangeId> {
        let live: HashSet<ChangeId> = tree
            .descendants(tree.root())
            .into_iter()
            .filter(|node| annotation_kind(tree, config, *node).is_some())
            .filter_map(|node| tree.attribute(node, &config.attributes.change_id))
            .filter_map(ChangeId::parse)
            .collect();
        let dead: Vec<ChangeId> = self
            .changes
            .keys()
            .filter(|id| !live.contains(id))
            .copied()
            .collect();
        for id in &dead {
            self.changes.remove(id);
        }
        if !dead.is_empty() {
            tracing::debug!("Collected {} empty change groups", dead.len());
        }
        dead
    }

    /// Refresh an author's display name in metadata and on their nodes
    pub fn rename_user(&mut self, tree: &mut DomTree, config: &TrackingConfig, user: &User) -> Result<()> {
        for change in self.changes.values_mut() {
            if change.user_id == user.id {
                change.user_name = user.name.clone();
            }
        }
        for node in tree.descendants(tree.root()) {
            if annotation_kind(tree, config, node).is_some()
                && tree.attribute(node, &config.attributes.user_id) == Some(user.id.as_str())
            {
                tree.set_attribute(node, config.attributes.user_name.as_str(), user.name.as_str())?;
            }
        }
        Ok(())
    }

    /// Rebuild the registry from annotation nodes in the tree.
    ///
    /// Never fails on malformed attributes: a missing or unusable id is
    /// replaced with a fresh one (and written back), a bad time becomes
    /// now, and a missing payload becomes empty.
    pub fn reload(
        &mut self,
        tree: &mut DomTree,
        config: &TrackingConfig,
        current_user: &User,
        styles: &mut AuthorStyles,
    ) -> Result<ReloadSummary> {
        self.clear();
        self.next_index = 0;
        let attrs = &config.attributes;
        let style_pattern = Regex::new(&format!(r"^{}-(\d+)$", regex_lite::escape(&config.style_prefix)))
            .map_err(|e| TrackingError::Config(e.to_string()))?;

        let annotations: Vec<(NodeId, ChangeKind)> = tree
            .descendants(tree.root())
            .into_iter()
            .filter_map(|node| annotation_kind(tree, config, node).map(|kind| (node, kind)))
            .collect();

        // Reserve every parseable id first so synthesized ones never collide
        for (node, _) in &annotations {
            if let Some(id) = tree.attribute(*node, &attrs.change_id).and_then(ChangeId::parse) {
                self.next_index = self.next_index.max(id.0);
            }
        }

        let mut summary = ReloadSummary {
            annotation_nodes: annotations.len(),
            ..ReloadSummary::default()
        };
        let mut kinds: BTreeMap<ChangeId, ChangeKind> = BTreeMap::new();

        for (node, kind) in annotations {
            let parsed = tree.attribute(node, &attrs.change_id).and_then(ChangeId::parse);
            let id = match parsed {
                Some(id) if kinds.get(&id).map_or(true, |k| *k == kind) => id,
                _ => {
                    let id = self.new_change_id();
                    tracing::debug!("Synthesized change id {} for annotation {}", id, node);
                    tree.set_attribute(node, attrs.change_id.as_str(), id.to_string())?;
                    summary.synthesized_ids += 1;
                    id
                }
            };
            kinds.insert(id, kind);

            let user_id = tree.attribute(node, &attrs.user_id).unwrap_or_default().to_string();
            let user_name = if user_id == current_user.id {
                tree.set_attribute(node, attrs.user_name.as_str(), current_user.name.as_str())?;
                current_user.name.clone()
            } else {
                tree.attribute(node, &attrs.user_name).unwrap_or_default().to_string()
            };
            let time = tree
                .attribute(node, &attrs.time)
                .and_then(|t| t.trim().parse::<i64>().ok())
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .unwrap_or_else(|| {
                    tracing::debug!("Annotation {} has no usable time, using now", node);
                    Utc::now()
                });
            let payload = tree.attribute(node, &attrs.change_data).unwrap_or_default().to_string();

            if restyle(tree, &style_pattern, styles, node, &user_id)? {
                summary.restyled += 1;
            }

            // A later node with the same id overwrites the metadata
            let author = User::new(user_id, user_name);
            self.insert_change(id, Change::new(kind, &author).with_payload(payload).with_time(time));
        }

        summary.changes = self.changes.len();
        Ok(summary)
    }
}

/// Write group identity and classes onto one annotation node
fn stamp(
    tree: &mut DomTree,
    config: &TrackingConfig,
    styles: &mut AuthorStyles,
    node: NodeId,
    id: ChangeId,
    change: &Change,
) -> Result<()> {
    let attrs = &config.attributes;
    tree.set_attribute(node, attrs.change_id.as_str(), id.to_string())?;
    tree.set_attribute(node, attrs.user_id.as_str(), change.user_id.as_str())?;
    tree.set_attribute(node, attrs.user_name.as_str(), change.user_name.as_str())?;
    tree.set_attribute(node, attrs.time.as_str(), change.time.timestamp_millis().to_string())?;
    tree.set_attribute(node, attrs.change_data.as_str(), change.payload.as_str())?;
    let kind_class = match change.kind {
        ChangeKind::Insertion => &config.insert_class,
        ChangeKind::Deletion => &config.delete_class,
    };
    tree.add_class(node, kind_class)?;
    let style_class = styles.style_class(&change.user_id);
    tree.add_class(node, &style_class)?;
    Ok(())
}

/// Make a node's style class agree with the author style map.
///
/// Returns true when the class had to be rewritten.
fn restyle(
    tree: &mut DomTree,
    pattern: &Regex,
    styles: &mut AuthorStyles,
    node: NodeId,
    user_id: &str,
) -> Result<bool> {
    let found: Vec<(String, Option<u32>)> = tree
        .element(node)
        .map(|e| {
            e.classes()
                .filter_map(|class| {
                    pattern
                        .captures(class)
                        .map(|c| (class.to_string(), c.get(1).and_then(|m| m.as_str().parse().ok())))
                })
                .collect()
        })
        .unwrap_or_default();

    let claimed = found.iter().find_map(|(_, index)| *index);
    let effective = match claimed {
        Some(index) => styles.claim(user_id, index),
        None => styles.style_index(user_id),
    };
    let wanted = styles.class_for(effective);
    if found.len() == 1 && found[0].0 == wanted {
        return Ok(false);
    }
    for (class, _) in &found {
        tree.remove_class(node, class)?;
    }
    tree.add_class(node, &wanted)?;
    Ok(true)
}
