//! Accept/reject engine and the clean projection

use crate::bookmark::is_marker;
use crate::classifier::{annotation_kind, Classifier};
use crate::{ChangeFilter, ChangeId, ChangeKind, ChangeRegistry, Result, TrackingConfig};
use dom_model::{parse_fragment, DomTree, NodeId};

/// Whether a review keeps or discards the edits it resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Accept,
    Reject,
}

impl Resolution {
    /// Kind whose content survives the resolution
    fn keeps(self) -> ChangeKind {
        match self {
            Resolution::Accept => ChangeKind::Insertion,
            Resolution::Reject => ChangeKind::Deletion,
        }
    }
}

/// Resolves pending changes against a tree and its registry
pub struct Reviewer<'a> {
    tree: &'a mut DomTree,
    registry: &'a mut ChangeRegistry,
    config: &'a TrackingConfig,
}

impl<'a> Reviewer<'a> {
    pub fn new(tree: &'a mut DomTree, registry: &'a mut ChangeRegistry, config: &'a TrackingConfig) -> Self {
        Self { tree, registry, config }
    }

    /// Resolve every group, or only those passing a filter.
    ///
    /// Returns the number of groups resolved.
    pub fn resolve_all(&mut self, resolution: Resolution, filter: Option<&ChangeFilter>) -> Result<usize> {
        let Some(filter) = filter else {
            let count = self.registry.len();
            strip_annotations(self.tree, self.config, resolution)?;
            self.registry.clear();
            tracing::info!("Resolved all {} change groups ({:?})", count, resolution);
            return Ok(count);
        };

        let ids: Vec<ChangeId> = self
            .registry
            .iter()
            .filter(|(_, change)| filter.matches(change))
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            self.resolve_group(*id, resolution)?;
        }
        self.finish()?;
        tracing::info!("Resolved {} filtered change groups ({:?})", ids.len(), resolution);
        Ok(ids.len())
    }

    /// Resolve the group of the annotation enclosing `node`
    pub fn resolve_at(&mut self, node: NodeId, resolution: Resolution) -> Result<Option<ChangeId>> {
        let classifier = Classifier::new(self.config, "");
        let Some(id) = classifier
            .annotation_node(self.tree, node, None)
            .and_then(|annotation| classifier.change_id(self.tree, annotation))
        else {
            return Ok(None);
        };
        self.resolve_group(id, resolution)?;
        self.finish()?;
        Ok(Some(id))
    }

    /// Drop annotations emptied by the resolution, then their groups
    fn finish(&mut self) -> Result<()> {
        let emptied: Vec<NodeId> = Classifier::new(self.config, "")
            .annotation_nodes(self.tree)
            .into_iter()
            .filter(|node| {
                self.tree
                    .descendants(*node)
                    .into_iter()
                    .all(|n| self.tree.text(n) == Some(""))
            })
            .collect();
        for node in emptied {
            if self.tree.is_attached(node) {
                self.tree.remove(node)?;
            }
        }
        self.registry.collect_garbage(self.tree, self.config);
        Ok(())
    }

    fn resolve_group(&mut self, id: ChangeId, resolution: Resolution) -> Result<()> {
        let nodes = Classifier::new(self.config, "").nodes_for_change(self.tree, id);
        tracing::debug!("Resolving group {} over {} node(s)", id, nodes.len());
        for node in nodes {
            if !self.tree.is_attached(node) {
                continue;
            }
            resolve_node(self.tree, self.config, node, resolution)?;
        }
        self.registry.remove_change(id);
        Ok(())
    }
}

/// Unwrap an annotation whose content survives, remove it otherwise
fn resolve_node(tree: &mut DomTree, config: &TrackingConfig, node: NodeId, resolution: Resolution) -> Result<()> {
    if annotation_kind(tree, config, node) == Some(resolution.keeps()) {
        tree.unwrap_node(node)?;
    } else {
        tree.remove(node)?;
    }
    Ok(())
}

/// Resolve every annotation node in a tree, outermost first
fn strip_annotations(tree: &mut DomTree, config: &TrackingConfig, resolution: Resolution) -> Result<()> {
    let annotations: Vec<NodeId> = tree
        .descendants(tree.root())
        .into_iter()
        .filter(|node| annotation_kind(tree, config, *node).is_some())
        .collect();
    for node in annotations {
        if tree.is_attached(node) {
            resolve_node(tree, config, node, resolution)?;
        }
    }
    Ok(())
}

/// Copy of a tree with every change accepted and bookmark markers dropped
pub fn clean_tree(tree: &DomTree, config: &TrackingConfig) -> Result<DomTree> {
    let mut clean = tree.clone();
    strip_annotations(&mut clean, config, Resolution::Accept)?;
    let markers: Vec<NodeId> = clean
        .descendants(clean.root())
        .into_iter()
        .filter(|node| is_marker(&clean, *node))
        .collect();
    for marker in markers {
        if clean.contains(marker) {
            clean.remove(marker)?;
        }
    }
    Ok(clean)
}

/// Clean projection of arbitrary markup
pub fn clean_markup(markup: &str, config: &TrackingConfig) -> Result<String> {
    let tree = parse_fragment(markup)?;
    let clean = clean_tree(&tree, config)?;
    Ok(clean.inner_html(clean.root()))
}
