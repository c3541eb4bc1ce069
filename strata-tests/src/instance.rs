//! Test storage instance and workspace contexts

use std::sync::Arc;
use strata_core::{BackfillId, PartitionBackfill, Repository, RunRecord, RunStatus};
use strata_runtime::WorkspaceContext;
use strata_storage::{BackfillFilters, InMemoryStorage, Storage};

/// In-memory storage shared between the contexts of one test
#[derive(Clone, Default)]
pub struct TestInstance {
    storage: Arc<InMemoryStorage>,
}

/// Fresh, empty instance
pub fn instance_for_test() -> TestInstance {
    TestInstance::default()
}

impl TestInstance {
    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    /// Every stored backfill, newest first
    pub async fn get_backfills(&self) -> Vec<PartitionBackfill> {
        self.storage
            .get_backfills(&BackfillFilters::new())
            .await
            .expect("list backfills")
    }

    pub async fn get_backfill(&self, backfill_id: BackfillId) -> Option<PartitionBackfill> {
        self.storage
            .get_backfill(backfill_id)
            .await
            .expect("get backfill")
    }

    /// Record a run for one partition of a backfill
    pub async fn add_run_for_partition(
        &self,
        backfill_id: BackfillId,
        partition: &str,
        status: RunStatus,
    ) -> RunRecord {
        let run = RunRecord::for_backfill_partition(backfill_id, partition).with_status(status);
        self.storage.add_run(&run).await.expect("add run");
        run
    }

    pub async fn get_runs_for_backfill(&self, backfill_id: BackfillId) -> Vec<RunRecord> {
        self.storage
            .get_runs_for_backfill(backfill_id)
            .await
            .expect("get runs")
    }
}

/// Workspace over `instance` serving `repository`
///
/// Contexts built from the same instance see each other's backfills, which
/// is how tests simulate redeploying definitions between requests.
pub fn define_context(
    instance: &TestInstance,
    repository: Repository,
    read_only: bool,
) -> WorkspaceContext {
    WorkspaceContext::new(instance.storage(), Arc::new(repository)).with_read_only(read_only)
}
