//! Repository fixtures
//!
//! Repositories are built through the same builder the server uses, so a
//! fixture that fails to build is a bug in the fixture.

use strata_core::{
    AssetKey, AssetNode, PartitionSetDefinition, PartitionsDefinition, Repository,
};

pub const REPOSITORY_NAME: &str = "test_repo";
pub const LOCATION_NAME: &str = "test_location";
pub const PARTITION_SET_NAME: &str = "letters_job_partition_set";

/// Static partitions `a`, `b`, `c`
pub fn letters() -> PartitionsDefinition {
    PartitionsDefinition::static_keys(["a", "b", "c"]).expect("static letters")
}

fn build(assets: Vec<AssetNode>) -> Repository {
    Repository::builder(REPOSITORY_NAME)
        .location(LOCATION_NAME)
        .assets(assets)
        .build()
        .expect("valid repository")
}

/// `asset1` and `asset2`, both partitioned by [`letters`]
pub fn get_repo() -> Repository {
    build(vec![
        AssetNode::builder("asset1").partitions_def(letters()).build(),
        AssetNode::builder("asset2").partitions_def(letters()).build(),
    ])
}

/// Same keys as [`get_repo`] without any partitions definitions
pub fn get_repo_with_unpartitioned_assets() -> Repository {
    build(vec![
        AssetNode::builder("asset1").build(),
        AssetNode::builder("asset2").build(),
    ])
}

/// Partitioned `asset1` feeding a non-partitioned `asset2`
pub fn get_repo_with_non_partitioned_asset() -> Repository {
    build(vec![
        AssetNode::builder("asset1").partitions_def(letters()).build(),
        AssetNode::builder("asset2")
            .depends_on(AssetKey::new("asset1"))
            .build(),
    ])
}

/// [`get_repo`] plus a job partition set over [`letters`]
pub fn get_repo_with_partition_set() -> Repository {
    Repository::builder(REPOSITORY_NAME)
        .location(LOCATION_NAME)
        .asset(AssetNode::builder("asset1").partitions_def(letters()).build())
        .asset(AssetNode::builder("asset2").partitions_def(letters()).build())
        .partition_set(PartitionSetDefinition::new(
            PARTITION_SET_NAME,
            "letters_job",
            letters(),
        ))
        .build()
        .expect("valid repository")
}

/// Asset key from a single name
pub fn key(name: &str) -> AssetKey {
    AssetKey::new(name)
}
