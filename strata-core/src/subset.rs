//! Target subsets
//!
//! An [`AssetGraphSubset`] is the resolved set of (asset, partition) pairs a
//! backfill operates on. Every asset key it mentions lives in exactly one of
//! two places:
//!
//! - `partitions_subsets_by_asset_key`, for partitioned assets, mapping the
//!   key to the partitions targeted
//! - `non_partitioned_asset_keys`, for assets without a partitions definition

use crate::asset::AssetKey;
use crate::asset_graph::AssetGraph;
use crate::partitions::PartitionsDefinition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A set of partition keys belonging to one asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionsSubset {
    keys: BTreeSet<String>,
}

impl PartitionsSubset {
    /// An empty subset
    pub fn empty() -> Self {
        Self::default()
    }

    /// A subset holding the given keys
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::empty().with_partition_keys(keys)
    }

    /// Return a copy of this subset with `keys` added
    pub fn with_partition_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Keys in the subset
    pub fn get_partition_keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys of this subset that are valid under `partitions_def`
    pub fn valid_under(&self, partitions_def: &PartitionsDefinition) -> Self {
        let valid: BTreeSet<String> = partitions_def.partition_keys().into_iter().collect();
        Self {
            keys: self.keys.intersection(&valid).cloned().collect(),
        }
    }
}

/// Resolved (asset, partition) targets of a backfill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "SerializedAssetGraphSubset",
    try_from = "SerializedAssetGraphSubset"
)]
pub struct AssetGraphSubset {
    partitions_subsets_by_asset_key: BTreeMap<AssetKey, PartitionsSubset>,
    non_partitioned_asset_keys: BTreeSet<AssetKey>,
}

impl AssetGraphSubset {
    /// An empty subset
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `partition_names` against every asset in `asset_selection`
    ///
    /// Partitioned assets receive the requested names that exist in their
    /// partitions definition; non-partitioned assets are recorded as such and
    /// ignore the requested names. Fails if any selected key is not in the graph.
    pub fn from_asset_partitions(
        asset_graph: &AssetGraph,
        asset_selection: &[AssetKey],
        partition_names: &[String],
    ) -> crate::Result<Self> {
        Self::resolve(asset_graph, asset_selection, |def| {
            partition_names
                .iter()
                .filter(|name| def.has_partition_key(name))
                .cloned()
                .collect()
        })
    }

    /// Target every partition of every selected asset
    pub fn all_partitions(
        asset_graph: &AssetGraph,
        asset_selection: &[AssetKey],
    ) -> crate::Result<Self> {
        Self::resolve(asset_graph, asset_selection, |def| def.partition_keys())
    }

    fn resolve<F>(
        asset_graph: &AssetGraph,
        asset_selection: &[AssetKey],
        mut keys_for: F,
    ) -> crate::Result<Self>
    where
        F: FnMut(&PartitionsDefinition) -> Vec<String>,
    {
        let missing = asset_graph.missing_keys(asset_selection);
        if !missing.is_empty() {
            return Err(crate::Error::UnknownAssets(missing));
        }

        let mut subset = Self::new();
        for key in asset_selection {
            match asset_graph.partitions_def(key) {
                Some(def) => {
                    subset.insert_partitions(key.clone(), keys_for(def));
                }
                None => {
                    subset.insert_non_partitioned(key.clone());
                }
            }
        }
        Ok(subset)
    }

    /// Add partitions of a partitioned asset
    pub fn insert_partitions<I, S>(&mut self, key: AssetKey, partition_keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.non_partitioned_asset_keys.remove(&key);
        let subset = self.partitions_subsets_by_asset_key.entry(key).or_default();
        *subset = std::mem::take(subset).with_partition_keys(partition_keys);
    }

    /// Record a non-partitioned asset
    pub fn insert_non_partitioned(&mut self, key: AssetKey) {
        self.partitions_subsets_by_asset_key.remove(&key);
        self.non_partitioned_asset_keys.insert(key);
    }

    /// All asset keys targeted, partitioned or not
    pub fn asset_keys(&self) -> BTreeSet<AssetKey> {
        self.partitions_subsets_by_asset_key
            .keys()
            .chain(self.non_partitioned_asset_keys.iter())
            .cloned()
            .collect()
    }

    /// Partition subset of a partitioned asset
    pub fn get_partitions_subset(&self, key: &AssetKey) -> Option<&PartitionsSubset> {
        self.partitions_subsets_by_asset_key.get(key)
    }

    pub fn partitions_subsets_by_asset_key(&self) -> &BTreeMap<AssetKey, PartitionsSubset> {
        &self.partitions_subsets_by_asset_key
    }

    pub fn non_partitioned_asset_keys(&self) -> &BTreeSet<AssetKey> {
        &self.non_partitioned_asset_keys
    }

    /// Whether an (asset, partition) pair is targeted
    ///
    /// `partition` must be `None` for non-partitioned assets.
    pub fn contains_asset_partition(&self, key: &AssetKey, partition: Option<&str>) -> bool {
        match partition {
            Some(p) => self
                .partitions_subsets_by_asset_key
                .get(key)
                .is_some_and(|s| s.contains(p)),
            None => self.non_partitioned_asset_keys.contains(key),
        }
    }

    /// Whether nothing is targeted
    pub fn is_empty(&self) -> bool {
        self.partitions_subsets_by_asset_key.is_empty() && self.non_partitioned_asset_keys.is_empty()
    }

    /// Distinct partition names across all partitioned assets
    pub fn partition_names(&self) -> BTreeSet<String> {
        self.partitions_subsets_by_asset_key
            .values()
            .flat_map(|s| s.get_partition_keys().iter().cloned())
            .collect()
    }

    /// Number of distinct partition names; non-partitioned assets contribute zero
    pub fn num_partitions(&self) -> usize {
        self.partition_names().len()
    }

    /// Check every targeted asset still exists with the same classification
    ///
    /// Returns a description of the first mismatch found.
    pub fn check_compatible(&self, asset_graph: &AssetGraph) -> Result<(), String> {
        for key in self.partitions_subsets_by_asset_key.keys() {
            match asset_graph.get(key) {
                None => return Err(format!("asset {} no longer exists", key)),
                Some(node) if !node.is_partitioned() => {
                    return Err(format!("asset {} is no longer partitioned", key))
                }
                Some(_) => {}
            }
        }
        for key in &self.non_partitioned_asset_keys {
            match asset_graph.get(key) {
                None => return Err(format!("asset {} no longer exists", key)),
                Some(node) if node.is_partitioned() => {
                    return Err(format!("asset {} is now partitioned", key))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Drop partition keys that are not in their asset's current definition
    ///
    /// Assets whose classification changed are left untouched; callers should
    /// run [`AssetGraphSubset::check_compatible`] first.
    pub fn retain_valid_partitions(&self, asset_graph: &AssetGraph) -> Self {
        let partitions_subsets_by_asset_key = self
            .partitions_subsets_by_asset_key
            .iter()
            .map(|(key, subset)| {
                let subset = match asset_graph.partitions_def(key) {
                    Some(def) => subset.valid_under(def),
                    None => subset.clone(),
                };
                (key.clone(), subset)
            })
            .collect();

        Self {
            partitions_subsets_by_asset_key,
            non_partitioned_asset_keys: self.non_partitioned_asset_keys.clone(),
        }
    }
}

/// Storage form of [`AssetGraphSubset`]
///
/// JSON object keys must be strings, so the per-asset map is stored as a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializedAssetGraphSubset {
    #[serde(default)]
    partitions_subsets: Vec<SerializedPartitionsSubset>,
    #[serde(default)]
    non_partitioned_asset_keys: Vec<AssetKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializedPartitionsSubset {
    asset_key: AssetKey,
    partition_keys: PartitionsSubset,
}

impl From<AssetGraphSubset> for SerializedAssetGraphSubset {
    fn from(subset: AssetGraphSubset) -> Self {
        Self {
            partitions_subsets: subset
                .partitions_subsets_by_asset_key
                .into_iter()
                .map(|(asset_key, partition_keys)| SerializedPartitionsSubset {
                    asset_key,
                    partition_keys,
                })
                .collect(),
            non_partitioned_asset_keys: subset.non_partitioned_asset_keys.into_iter().collect(),
        }
    }
}

impl TryFrom<SerializedAssetGraphSubset> for AssetGraphSubset {
    type Error = crate::Error;

    fn try_from(serialized: SerializedAssetGraphSubset) -> crate::Result<Self> {
        let mut partitions_subsets_by_asset_key = BTreeMap::new();
        for entry in serialized.partitions_subsets {
            if partitions_subsets_by_asset_key
                .insert(entry.asset_key.clone(), entry.partition_keys)
                .is_some()
            {
                return Err(crate::Error::InvalidSubset(format!(
                    "asset {} listed twice",
                    entry.asset_key
                )));
            }
        }

        let mut non_partitioned_asset_keys = BTreeSet::new();
        for key in serialized.non_partitioned_asset_keys {
            if partitions_subsets_by_asset_key.contains_key(&key) {
                return Err(crate::Error::InvalidSubset(format!(
                    "asset {} is both partitioned and non-partitioned",
                    key
                )));
            }
            non_partitioned_asset_keys.insert(key);
        }

        Ok(Self {
            partitions_subsets_by_asset_key,
            non_partitioned_asset_keys,
        })
    }
}
