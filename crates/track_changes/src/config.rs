//! Tracking configuration
//!
//! Every tag, class and attribute name the engine reads or writes comes
//! from [`TrackingConfig`], so content produced under one configuration
//! round-trips through `reload()` under the same configuration.

use crate::{Result, TrackingError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Attribute names stamped on annotation nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnnotationAttributes {
    pub change_id: String,
    pub user_id: String,
    pub user_name: String,
    /// Epoch milliseconds
    pub time: String,
    pub change_data: String,
}

impl Default for AnnotationAttributes {
    fn default() -> Self {
        Self {
            change_id: "data-cid".to_string(),
            user_id: "data-userid".to_string(),
            user_name: "data-username".to_string(),
            time: "data-time".to_string(),
            change_data: "data-changedata".to_string(),
        }
    }
}

/// How character deletion treats content already inside a deletion
/// annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HiddenRegionPolicy {
    /// Deleted content is passed over; the next visible unit is deleted
    #[default]
    Skip,
    /// Reaching deleted content only moves the caret past it
    Step,
}

fn tag_set(tags: &[&str]) -> BTreeSet<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

/// Configuration for a tracking session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackingConfig {
    /// Tag of new insertion annotations
    pub insert_tag: String,
    /// Tag of new deletion annotations
    pub delete_tag: String,
    /// Class marking insertion annotations
    pub insert_class: String,
    /// Class marking deletion annotations
    pub delete_class: String,
    /// Prefix of per-author style classes (`{prefix}-{index}`)
    pub style_prefix: String,
    pub attributes: AnnotationAttributes,
    /// Tags that start a layout block
    pub block_elements: BTreeSet<String>,
    /// Blocks that may directly hold text
    pub text_container_elements: BTreeSet<String>,
    /// Atomic non-text content (images, line breaks, rules)
    pub stub_elements: BTreeSet<String>,
    /// The block tag eligible for merge-on-delete
    pub block_tag: String,
    /// Merge adjacent blocks when their separating break is deleted
    pub merge_blocks: bool,
    /// Class of regions edited without tracking
    pub no_track_class: String,
    pub hidden_region_policy: HiddenRegionPolicy,
    /// Preassigned author style indices
    pub user_styles: HashMap<String, u32>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            insert_tag: "ins".to_string(),
            delete_tag: "del".to_string(),
            insert_class: "ice-ins".to_string(),
            delete_class: "ice-del".to_string(),
            style_prefix: "ice-cts".to_string(),
            attributes: AnnotationAttributes::default(),
            block_elements: tag_set(&[
                "body", "p", "div", "pre", "ul", "ol", "li", "table", "tbody", "td", "th",
                "fieldset", "form", "blockquote", "dl", "dt", "dd", "dir", "center", "address",
                "h1", "h2", "h3", "h4", "h5", "h6",
            ]),
            text_container_elements: tag_set(&[
                "body", "p", "div", "pre", "li", "td", "th", "blockquote", "dt", "dd", "center",
                "address", "h1", "h2", "h3", "h4", "h5", "h6",
            ]),
            stub_elements: tag_set(&[
                "img", "hr", "iframe", "param", "link", "meta", "input", "frame", "col", "base",
                "area", "br",
            ]),
            block_tag: "p".to_string(),
            merge_blocks: true,
            no_track_class: "ice-no-track".to_string(),
            hidden_region_policy: HiddenRegionPolicy::Skip,
            user_styles: HashMap::new(),
        }
    }
}

impl TrackingConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TrackingError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration, falling back to defaults on any error
    pub fn load_or_default(json: &str) -> Self {
        match Self::from_json_str(json) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to parse tracking config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Check that the names the engine relies on are usable
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("insertTag", &self.insert_tag),
            ("deleteTag", &self.delete_tag),
            ("insertClass", &self.insert_class),
            ("deleteClass", &self.delete_class),
            ("stylePrefix", &self.style_prefix),
            ("attributes.changeId", &self.attributes.change_id),
            ("attributes.userId", &self.attributes.user_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(TrackingError::Config(format!("{} must not be empty", name)));
            }
        }
        if self.insert_class == self.delete_class {
            return Err(TrackingError::Config(
                "insertClass and deleteClass must differ".to_string(),
            ));
        }
        Ok(())
    }
}
