//! Asset keys and asset nodes
//!
//! Assets are persistent data artifacts produced by computation nodes in the
//! asset graph. An asset is identified by an [`AssetKey`] and may carry a
//! [`PartitionsDefinition`] describing the slices it can be materialized in.

use crate::partitions::PartitionsDefinition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an asset
///
/// A key is an ordered, non-empty list of path components. Its string form
/// joins the components with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AssetKey(Vec<String>);

impl AssetKey {
    /// Create a single-component asset key
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty. Use [`AssetKey::from_path`] for untrusted input.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.trim().is_empty(), "asset key component cannot be empty");
        Self(vec![name])
    }

    /// Create an asset key from path components, validating each component
    pub fn from_path<I, S>(path: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path: Vec<String> = path.into_iter().map(Into::into).collect();
        if path.is_empty() {
            return Err(crate::Error::InvalidAssetKey(
                "asset key path cannot be empty".to_string(),
            ));
        }
        if let Some(pos) = path.iter().position(|c| c.trim().is_empty()) {
            return Err(crate::Error::InvalidAssetKey(format!(
                "component {} of {:?} is empty",
                pos, path
            )));
        }
        Ok(Self(path))
    }

    /// Path components of the key
    pub fn path(&self) -> &[String] {
        &self.0
    }

    /// Human-readable form (`a/b/c`)
    pub fn to_user_string(&self) -> String {
        self.0.join("/")
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_user_string())
    }
}

impl TryFrom<Vec<String>> for AssetKey {
    type Error = crate::Error;

    fn try_from(path: Vec<String>) -> crate::Result<Self> {
        Self::from_path(path)
    }
}

impl From<AssetKey> for Vec<String> {
    fn from(key: AssetKey) -> Self {
        key.0
    }
}

/// A node in the asset graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetNode {
    /// Unique key of the asset
    pub key: AssetKey,

    /// Partitions the asset can be materialized in; `None` for non-partitioned assets
    #[serde(default)]
    pub partitions_def: Option<PartitionsDefinition>,

    /// Keys of the assets this asset reads from
    #[serde(default)]
    pub dependencies: Vec<AssetKey>,

    /// Description of the asset
    #[serde(default)]
    pub description: Option<String>,

    /// Group used for display and selection
    #[serde(default)]
    pub group_name: Option<String>,
}

impl AssetNode {
    /// Create a non-partitioned asset node without dependencies
    pub fn new(key: AssetKey) -> Self {
        Self {
            key,
            partitions_def: None,
            dependencies: Vec::new(),
            description: None,
            group_name: None,
        }
    }

    /// Create a builder for constructing an asset node with fluent API
    pub fn builder(name: impl Into<String>) -> AssetNodeBuilder {
        AssetNodeBuilder::new(AssetKey::new(name))
    }

    /// Whether this asset has a partitions definition
    pub fn is_partitioned(&self) -> bool {
        self.partitions_def.is_some()
    }

    /// Add a dependency on another asset
    pub fn add_dependency(&mut self, upstream: AssetKey) {
        // Prevent duplicates to keep the graph clean.
        if !self.dependencies.contains(&upstream) {
            self.dependencies.push(upstream);
        }
    }
}

/// Builder for constructing asset nodes with a fluent API
pub struct AssetNodeBuilder {
    node: AssetNode,
}

impl AssetNodeBuilder {
    /// Create a new builder for the given key
    pub fn new(key: AssetKey) -> Self {
        Self {
            node: AssetNode::new(key),
        }
    }

    /// Set the partitions definition
    pub fn partitions_def(mut self, partitions_def: PartitionsDefinition) -> Self {
        self.node.partitions_def = Some(partitions_def);
        self
    }

    /// Add a dependency on another asset
    pub fn depends_on(mut self, upstream: AssetKey) -> Self {
        self.node.add_dependency(upstream);
        self
    }

    /// Set the asset description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.node.description = Some(desc.into());
        self
    }

    /// Set the asset group
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.node.group_name = Some(group.into());
        self
    }

    /// Build the asset node
    pub fn build(self) -> AssetNode {
        self.node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_key_display() {
        let key = AssetKey::from_path(["warehouse", "orders"]).unwrap();
        assert_eq!(key.to_string(), "warehouse/orders");
        assert_eq!(key.path().len(), 2);
    }

    #[test]
    fn test_asset_key_rejects_empty_path() {
        let empty: Vec<String> = vec![];
        assert!(matches!(
            AssetKey::from_path(empty),
            Err(crate::Error::InvalidAssetKey(_))
        ));
        assert!(AssetKey::from_path(["ok", " "]).is_err());
    }

    #[test]
    fn test_asset_key_serializes_as_path() {
        let key = AssetKey::from_path(["a", "b"]).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"["a","b"]"#);

        let back: AssetKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);

        let invalid: Result<AssetKey, _> = serde_json::from_str("[]");
        assert!(invalid.is_err());
    }

    #[test]
    fn test_asset_key_ordering_is_by_path() {
        let a = AssetKey::new("asset1");
        let b = AssetKey::new("asset2");
        assert!(a < b);
    }

    #[test]
    fn test_builder_fluent_api() {
        let def = PartitionsDefinition::static_keys(["a", "b"]).unwrap();
        let node = AssetNode::builder("asset2")
            .partitions_def(def.clone())
            .depends_on(AssetKey::new("asset1"))
            .depends_on(AssetKey::new("asset1"))
            .description("downstream of asset1")
            .group("core")
            .build();

        assert_eq!(node.key, AssetKey::new("asset2"));
        assert_eq!(node.partitions_def, Some(def));
        assert_eq!(node.dependencies, vec![AssetKey::new("asset1")]);
        assert_eq!(node.group_name.as_deref(), Some("core"));
        assert!(node.is_partitioned());
    }

    #[test]
    fn test_non_partitioned_node() {
        let node = AssetNode::new(AssetKey::new("plain"));
        assert!(!node.is_partitioned());
        assert!(node.dependencies.is_empty());
    }
}
