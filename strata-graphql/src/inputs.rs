//! GraphQL input objects

use async_graphql::InputObject;
use strata_core::AssetKey;
use strata_runtime::{LaunchBackfillParams, PartitionSetSelector};

#[derive(Debug, Clone, InputObject)]
pub struct AssetKeyInput {
    pub path: Vec<String>,
}

#[derive(Debug, Clone, InputObject)]
pub struct RepositorySelector {
    pub repository_name: String,
    pub repository_location_name: String,
}

#[derive(Debug, Clone, InputObject)]
#[graphql(name = "PartitionSetSelector")]
pub struct PartitionSetSelectorInput {
    pub partition_set_name: String,
    pub repository_selector: RepositorySelector,
}

#[derive(Debug, Clone, InputObject)]
pub struct ExecutionTag {
    pub key: String,
    pub value: String,
}

/// Parameters of `launchPartitionBackfill`
#[derive(Debug, Clone, Default, InputObject)]
#[graphql(name = "LaunchBackfillParams")]
pub struct LaunchBackfillParamsInput {
    pub partition_names: Option<Vec<String>>,
    pub asset_selection: Option<Vec<AssetKeyInput>>,
    pub selector: Option<PartitionSetSelectorInput>,
    pub all_partitions: Option<bool>,
    pub from_failure: Option<bool>,
    pub tags: Option<Vec<ExecutionTag>>,
}

impl TryFrom<LaunchBackfillParamsInput> for LaunchBackfillParams {
    type Error = strata_runtime::Error;

    fn try_from(input: LaunchBackfillParamsInput) -> strata_runtime::Result<Self> {
        let asset_selection = input
            .asset_selection
            .map(|keys| {
                keys.into_iter()
                    .map(|k| AssetKey::from_path(k.path))
                    .collect::<strata_core::Result<Vec<_>>>()
            })
            .transpose()
            .map_err(|e| strata_runtime::Error::InvalidParams(e.to_string()))?;

        let selector = input.selector.map(|s| PartitionSetSelector {
            partition_set_name: s.partition_set_name,
            repository_name: s.repository_selector.repository_name,
            repository_location_name: s.repository_selector.repository_location_name,
        });

        Ok(Self {
            partition_names: input.partition_names.unwrap_or_default(),
            asset_selection,
            selector,
            all_partitions: input.all_partitions.unwrap_or(false),
            from_failure: input.from_failure.unwrap_or(false),
            tags: input
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(|t| (t.key, t.value))
                .collect(),
        })
    }
}
