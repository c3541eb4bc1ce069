//! Repositories: named bundles of definitions
//!
//! A [`Repository`] holds the asset graph and the partition sets that
//! requests are resolved against. Backfills are persisted independently of
//! the repository, so the repository a query runs against may differ from
//! the one the backfill was launched with.

use crate::asset::AssetNode;
use crate::asset_graph::AssetGraph;
use crate::partitions::PartitionsDefinition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default repository and location name
pub const DEFAULT_REPOSITORY_NAME: &str = "__repository__";

/// Default execution mode for partition sets
pub const DEFAULT_MODE: &str = "default";

/// Where a repository was loaded from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryOrigin {
    pub repository_name: String,
    pub repository_location_name: String,
}

impl RepositoryOrigin {
    pub fn new(repository_name: impl Into<String>, location_name: impl Into<String>) -> Self {
        Self {
            repository_name: repository_name.into(),
            repository_location_name: location_name.into(),
        }
    }

    /// Stable identifier of the origin
    pub fn id(&self) -> String {
        format!("{}@{}", self.repository_name, self.repository_location_name)
    }
}

/// A named job paired with the partitions it can run for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSetDefinition {
    pub name: String,
    pub job_name: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    pub partitions_def: PartitionsDefinition,
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

impl PartitionSetDefinition {
    pub fn new(
        name: impl Into<String>,
        job_name: impl Into<String>,
        partitions_def: PartitionsDefinition,
    ) -> Self {
        Self {
            name: name.into(),
            job_name: job_name.into(),
            mode: default_mode(),
            partitions_def,
        }
    }
}

/// Reference to a partition set inside a specific repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionSetOrigin {
    pub repository_origin: RepositoryOrigin,
    pub partition_set_name: String,
}

impl PartitionSetOrigin {
    /// Stable identifier of the partition set
    pub fn id(&self) -> String {
        format!("{}:{}", self.repository_origin.id(), self.partition_set_name)
    }
}

/// Loaded definitions that requests are resolved against
#[derive(Debug, Clone)]
pub struct Repository {
    origin: RepositoryOrigin,
    asset_graph: AssetGraph,
    partition_sets: BTreeMap<String, PartitionSetDefinition>,
}

impl Repository {
    /// Create a builder for a repository with the given name
    pub fn builder(name: impl Into<String>) -> RepositoryBuilder {
        RepositoryBuilder::new(name)
    }

    /// A repository with no assets or partition sets
    pub fn empty() -> Self {
        Self {
            origin: RepositoryOrigin::new(DEFAULT_REPOSITORY_NAME, DEFAULT_REPOSITORY_NAME),
            asset_graph: AssetGraph::empty(),
            partition_sets: BTreeMap::new(),
        }
    }

    pub fn origin(&self) -> &RepositoryOrigin {
        &self.origin
    }

    pub fn asset_graph(&self) -> &AssetGraph {
        &self.asset_graph
    }

    /// Look up a partition set by name
    pub fn partition_set(&self, name: &str) -> Option<&PartitionSetDefinition> {
        self.partition_sets.get(name)
    }

    /// Origin handle for a partition set in this repository
    pub fn partition_set_origin(&self, name: &str) -> Option<PartitionSetOrigin> {
        self.partition_sets.get(name).map(|ps| PartitionSetOrigin {
            repository_origin: self.origin.clone(),
            partition_set_name: ps.name.clone(),
        })
    }

    /// Whether this repository matches the given name and location
    pub fn matches(&self, repository_name: &str, location_name: &str) -> bool {
        self.origin.repository_name == repository_name
            && self.origin.repository_location_name == location_name
    }

    pub fn partition_sets(&self) -> impl Iterator<Item = &PartitionSetDefinition> {
        self.partition_sets.values()
    }
}

/// Builder for [`Repository`]
pub struct RepositoryBuilder {
    name: String,
    location_name: Option<String>,
    assets: Vec<AssetNode>,
    partition_sets: Vec<PartitionSetDefinition>,
}

impl RepositoryBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location_name: None,
            assets: Vec::new(),
            partition_sets: Vec::new(),
        }
    }

    /// Set the location name (defaults to the repository name)
    pub fn location(mut self, location_name: impl Into<String>) -> Self {
        self.location_name = Some(location_name.into());
        self
    }

    /// Add an asset
    pub fn asset(mut self, asset: AssetNode) -> Self {
        self.assets.push(asset);
        self
    }

    /// Add several assets
    pub fn assets(mut self, assets: impl IntoIterator<Item = AssetNode>) -> Self {
        self.assets.extend(assets);
        self
    }

    /// Add a partition set
    pub fn partition_set(mut self, partition_set: PartitionSetDefinition) -> Self {
        self.partition_sets.push(partition_set);
        self
    }

    /// Validate the definitions and build the repository
    pub fn build(self) -> crate::Result<Repository> {
        let asset_graph = AssetGraph::new(self.assets)?;

        let mut partition_sets = BTreeMap::new();
        for ps in self.partition_sets {
            ps.partitions_def.validate()?;
            if partition_sets.contains_key(&ps.name) {
                return Err(crate::Error::DuplicatePartitionSet(ps.name));
            }
            partition_sets.insert(ps.name.clone(), ps);
        }

        let location_name = self.location_name.unwrap_or_else(|| self.name.clone());
        Ok(Repository {
            origin: RepositoryOrigin::new(self.name, location_name),
            asset_graph,
            partition_sets,
        })
    }
}

/// Serializable form of a repository, as loaded from a definitions file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryDefinition {
    pub name: String,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub assets: Vec<AssetNode>,
    #[serde(default)]
    pub partition_sets: Vec<PartitionSetDefinition>,
}

impl RepositoryDefinition {
    /// Parse a JSON definitions document
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate and build the repository
    pub fn into_repository(self) -> crate::Result<Repository> {
        let mut builder = RepositoryBuilder::new(self.name).assets(self.assets);
        if let Some(location) = self.location_name {
            builder = builder.location(location);
        }
        for ps in self.partition_sets {
            builder = builder.partition_set(ps);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetKey;

    fn letters() -> PartitionsDefinition {
        PartitionsDefinition::static_keys(["a", "b", "c"]).unwrap()
    }

    #[test]
    fn test_builder_defaults_location_to_name() {
        let repo = Repository::builder("analytics").build().unwrap();
        assert_eq!(repo.origin().repository_location_name, "analytics");
        assert!(repo.matches("analytics", "analytics"));
        assert!(!repo.matches("analytics", "elsewhere"));
    }

    #[test]
    fn test_partition_set_origin() {
        let repo = Repository::builder("analytics")
            .location("prod")
            .partition_set(PartitionSetDefinition::new("daily_set", "daily_job", letters()))
            .build()
            .unwrap();

        let origin = repo.partition_set_origin("daily_set").unwrap();
        assert_eq!(origin.partition_set_name, "daily_set");
        assert_eq!(origin.id(), "analytics@prod:daily_set");
        assert!(repo.partition_set_origin("missing").is_none());
        assert_eq!(repo.partition_set("daily_set").unwrap().mode, DEFAULT_MODE);
    }

    #[test]
    fn test_duplicate_partition_sets_rejected() {
        let result = Repository::builder("r")
            .partition_set(PartitionSetDefinition::new("s", "j", letters()))
            .partition_set(PartitionSetDefinition::new("s", "j2", letters()))
            .build();
        assert!(matches!(result, Err(crate::Error::DuplicatePartitionSet(_))));
    }

    #[test]
    fn test_definition_from_json() {
        let json = r#"{
            "name": "repo",
            "assets": [
                {"key": ["asset1"], "partitions_def": {"type": "static", "keys": ["a", "b"]}},
                {"key": ["asset2"], "dependencies": [["asset1"]]}
            ],
            "partition_sets": [
                {"name": "set", "job_name": "job", "partitions_def": {"type": "static", "keys": ["x"]}}
            ]
        }"#;

        let repo = RepositoryDefinition::from_json(json)
            .unwrap()
            .into_repository()
            .unwrap();

        assert_eq!(repo.asset_graph().len(), 2);
        assert!(repo.asset_graph().is_partitioned(&AssetKey::new("asset1")));
        assert_eq!(
            repo.asset_graph().upstream(&AssetKey::new("asset2")),
            vec![&AssetKey::new("asset1")]
        );
        assert_eq!(repo.partition_sets().count(), 1);
    }

    #[test]
    fn test_definition_rejects_invalid_partitions() {
        let json = r#"{
            "name": "repo",
            "assets": [{"key": ["a"], "partitions_def": {"type": "static", "keys": ["x", "x"]}}]
        }"#;
        let result = RepositoryDefinition::from_json(json)
            .unwrap()
            .into_repository();
        assert!(matches!(
            result,
            Err(crate::Error::InvalidPartitionsDefinition(_))
        ));
    }
}
