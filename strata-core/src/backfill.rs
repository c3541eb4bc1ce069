//! Backfill records and asset backfill data
//!
//! A [`PartitionBackfill`] is the persisted record of a launched backfill.
//! Asset backfills store their [`AssetBackfillData`] serialized; the data is
//! rebuilt against whatever asset graph is current when it is read back,
//! since definitions can change between launch and query.

use crate::asset::AssetKey;
use crate::asset_graph::AssetGraph;
use crate::repository::PartitionSetOrigin;
use crate::subset::AssetGraphSubset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

/// Version of the serialized asset backfill data format
const ASSET_BACKFILL_DATA_VERSION: u32 = 1;

/// Unique identifier for a backfill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackfillId(pub Uuid);

impl BackfillId {
    /// Create a new random backfill ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BackfillId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BackfillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for BackfillId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| crate::Error::InvalidBackfillId(s.to_string()))
    }
}

/// Status of a backfill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkActionStatus {
    /// Launched and waiting for (or undergoing) execution
    Requested,

    /// Cancellation requested while runs are still in flight
    Canceling,

    /// Cancelled
    Canceled,

    /// All targeted partitions were handled
    Completed,

    /// The backfill could not be carried out
    Failed,
}

impl BulkActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Canceling => "canceling",
            Self::Canceled => "canceled",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Completed | Self::Failed)
    }
}

impl fmt::Display for BulkActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BulkActionStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "requested" => Ok(Self::Requested),
            "canceling" => Ok(Self::Canceling),
            "canceled" => Ok(Self::Canceled),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(crate::Error::UnknownStatus(other.to_string())),
        }
    }
}

/// Data describing what an asset backfill targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBackfillData {
    target_subset: AssetGraphSubset,
}

#[derive(Serialize, Deserialize)]
struct SerializedAssetBackfillData {
    version: u32,
    target_subset: AssetGraphSubset,
}

impl AssetBackfillData {
    /// Wrap an already resolved target subset
    pub fn new(target_subset: AssetGraphSubset) -> Self {
        Self { target_subset }
    }

    /// Resolve requested partition names against the selected assets
    pub fn from_asset_partitions(
        asset_graph: &AssetGraph,
        partition_names: &[String],
        asset_selection: &[AssetKey],
    ) -> crate::Result<Self> {
        AssetGraphSubset::from_asset_partitions(asset_graph, asset_selection, partition_names)
            .map(Self::new)
    }

    /// Target every partition of the selected assets
    pub fn from_asset_selection_all_partitions(
        asset_graph: &AssetGraph,
        asset_selection: &[AssetKey],
    ) -> crate::Result<Self> {
        AssetGraphSubset::all_partitions(asset_graph, asset_selection).map(Self::new)
    }

    pub fn target_subset(&self) -> &AssetGraphSubset {
        &self.target_subset
    }

    /// Distinct partition names targeted
    pub fn partition_names(&self) -> BTreeSet<String> {
        self.target_subset.partition_names()
    }

    /// Number of distinct partition names targeted
    pub fn num_partitions(&self) -> usize {
        self.target_subset.num_partitions()
    }

    /// Serialize for storage
    pub fn serialize(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(&SerializedAssetBackfillData {
            version: ASSET_BACKFILL_DATA_VERSION,
            target_subset: self.target_subset.clone(),
        })?)
    }

    /// Rebuild from storage against the current asset graph
    ///
    /// Fails if the stored data cannot be parsed or if any targeted asset no
    /// longer exists with the classification (partitioned or not) it had at
    /// launch. Partition keys no longer in an asset's definition are dropped.
    pub fn from_serialized(serialized: &str, asset_graph: &AssetGraph) -> crate::Result<Self> {
        let stored: SerializedAssetBackfillData = serde_json::from_str(serialized)?;
        if stored.version != ASSET_BACKFILL_DATA_VERSION {
            return Err(crate::Error::IncompatibleSerialization(format!(
                "unsupported version {}",
                stored.version
            )));
        }

        stored
            .target_subset
            .check_compatible(asset_graph)
            .map_err(crate::Error::IncompatibleSerialization)?;

        Ok(Self::new(
            stored.target_subset.retain_valid_partitions(asset_graph),
        ))
    }

    /// Whether `serialized` can be rebuilt against `asset_graph`
    pub fn is_valid_serialization(serialized: &str, asset_graph: &AssetGraph) -> bool {
        match Self::from_serialized(serialized, asset_graph) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Stored asset backfill data is not valid for current graph");
                false
            }
        }
    }
}

/// What a backfill targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackfillTarget {
    /// An explicit asset selection
    Assets {
        asset_selection: Vec<AssetKey>,
        serialized_asset_backfill_data: String,
    },

    /// A named partition set of a job
    PartitionSet {
        partition_set_origin: PartitionSetOrigin,
        partition_names: Vec<String>,
    },
}

/// Persisted record of a launched backfill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionBackfill {
    pub backfill_id: BackfillId,
    pub status: BulkActionStatus,
    pub timestamp: DateTime<Utc>,
    pub target: BackfillTarget,
    pub from_failure: bool,
    pub tags: BTreeMap<String, String>,
    pub error: Option<String>,
}

impl PartitionBackfill {
    /// Create a requested asset backfill
    pub fn for_assets(
        asset_selection: Vec<AssetKey>,
        data: &AssetBackfillData,
        tags: BTreeMap<String, String>,
        from_failure: bool,
    ) -> crate::Result<Self> {
        Ok(Self::requested(
            BackfillTarget::Assets {
                asset_selection,
                serialized_asset_backfill_data: data.serialize()?,
            },
            tags,
            from_failure,
        ))
    }

    /// Create a requested partition-set backfill
    pub fn for_partition_set(
        partition_set_origin: PartitionSetOrigin,
        partition_names: Vec<String>,
        tags: BTreeMap<String, String>,
        from_failure: bool,
    ) -> Self {
        Self::requested(
            BackfillTarget::PartitionSet {
                partition_set_origin,
                partition_names,
            },
            tags,
            from_failure,
        )
    }

    fn requested(
        target: BackfillTarget,
        tags: BTreeMap<String, String>,
        from_failure: bool,
    ) -> Self {
        Self {
            backfill_id: BackfillId::new(),
            status: BulkActionStatus::Requested,
            timestamp: Utc::now(),
            target,
            from_failure,
            tags,
            error: None,
        }
    }

    /// Return a copy with a different status
    pub fn with_status(mut self, status: BulkActionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_asset_backfill(&self) -> bool {
        matches!(self.target, BackfillTarget::Assets { .. })
    }

    pub fn serialized_asset_backfill_data(&self) -> Option<&str> {
        match &self.target {
            BackfillTarget::Assets {
                serialized_asset_backfill_data,
                ..
            } => Some(serialized_asset_backfill_data),
            BackfillTarget::PartitionSet { .. } => None,
        }
    }

    pub fn asset_selection(&self) -> Option<&[AssetKey]> {
        match &self.target {
            BackfillTarget::Assets {
                asset_selection, ..
            } => Some(asset_selection),
            BackfillTarget::PartitionSet { .. } => None,
        }
    }

    pub fn partition_set_origin(&self) -> Option<&PartitionSetOrigin> {
        match &self.target {
            BackfillTarget::PartitionSet {
                partition_set_origin,
                ..
            } => Some(partition_set_origin),
            BackfillTarget::Assets { .. } => None,
        }
    }

    /// Rebuild the asset backfill data against the current asset graph
    ///
    /// `None` for partition-set backfills.
    pub fn asset_backfill_data(
        &self,
        asset_graph: &AssetGraph,
    ) -> Option<crate::Result<AssetBackfillData>> {
        self.serialized_asset_backfill_data()
            .map(|s| AssetBackfillData::from_serialized(s, asset_graph))
    }
}
