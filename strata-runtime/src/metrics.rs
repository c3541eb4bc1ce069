//! Prometheus metrics for backfill operations

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Total number of backfills launched
    ///
    /// Labels:
    /// - kind: "asset", "job"
    pub static ref BACKFILLS_LAUNCHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "strata_backfills_launched_total",
        "Total number of backfills launched",
        &["kind"]
    )
    .expect("strata_backfills_launched_total metric registration");

    /// Total number of rejected launch requests
    ///
    /// Labels:
    /// - reason: "unauthorized", "partition_set_not_found", "invalid_params", ...
    pub static ref BACKFILL_LAUNCH_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "strata_backfill_launch_rejections_total",
        "Total number of rejected backfill launch requests",
        &["reason"]
    )
    .expect("strata_backfill_launch_rejections_total metric registration");

    /// Total number of backfill cancellations, by resulting status
    ///
    /// Labels:
    /// - status: "canceling", "canceled"
    pub static ref BACKFILL_CANCELLATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "strata_backfill_cancellations_total",
        "Total number of backfill cancellations",
        &["status"]
    )
    .expect("strata_backfill_cancellations_total metric registration");
}
