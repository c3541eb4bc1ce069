//! Partitions definitions
//!
//! A [`PartitionsDefinition`] describes the finite, ordered set of partition
//! keys an asset can be materialized in. Two shapes are supported:
//!
//! - **Static**: an explicit enumeration of keys
//! - **Time window**: keys generated from an inclusive date range at a fixed
//!   granularity
//!
//! # Example
//!
//! ```rust
//! use strata_core::{PartitionsDefinition, TimeGranularity};
//! use chrono::NaiveDate;
//!
//! let letters = PartitionsDefinition::static_keys(["a", "b", "c"]).unwrap();
//! assert!(letters.has_partition_key("b"));
//!
//! let days = PartitionsDefinition::time_window(
//!     TimeGranularity::Daily,
//!     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
//! )
//! .unwrap();
//! assert_eq!(days.partition_keys(), vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
//! ```

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Upper bound on the number of keys a time window may generate
pub const MAX_TIME_WINDOW_PARTITIONS: usize = 10_000;

/// Time granularity for time-window partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGranularity {
    /// Hourly partitions
    Hourly,

    /// Daily partitions
    Daily,

    /// Weekly partitions
    Weekly,

    /// Monthly partitions
    Monthly,

    /// Yearly partitions
    Yearly,
}

/// The set of valid partition keys for an asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartitionsDefinition {
    /// Explicitly enumerated keys
    Static {
        /// Keys in definition order
        keys: Vec<String>,
    },

    /// Keys generated from `start` through `end` (inclusive)
    TimeWindow {
        /// Spacing between consecutive partitions
        granularity: TimeGranularity,
        /// First day covered by the window
        start: NaiveDate,
        /// Last day covered by the window
        end: NaiveDate,
    },
}

impl PartitionsDefinition {
    /// Create a static definition, rejecting empty or duplicate keys
    pub fn static_keys<I, S>(keys: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let def = Self::Static {
            keys: keys.into_iter().map(Into::into).collect(),
        };
        def.validate()?;
        Ok(def)
    }

    /// Create a time-window definition
    pub fn time_window(
        granularity: TimeGranularity,
        start: NaiveDate,
        end: NaiveDate,
    ) -> crate::Result<Self> {
        let def = Self::TimeWindow {
            granularity,
            start,
            end,
        };
        def.validate()?;
        Ok(def)
    }

    /// Create a daily time-window definition
    pub fn daily(start: NaiveDate, end: NaiveDate) -> crate::Result<Self> {
        Self::time_window(TimeGranularity::Daily, start, end)
    }

    /// Check the definition is well formed
    ///
    /// Definitions built through the constructors are always valid; this is
    /// for definitions that arrive through deserialization.
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Self::Static { keys } => {
                let mut seen = HashSet::with_capacity(keys.len());
                for key in keys {
                    if key.trim().is_empty() {
                        return Err(crate::Error::InvalidPartitionsDefinition(
                            "partition key cannot be empty".to_string(),
                        ));
                    }
                    if !seen.insert(key.as_str()) {
                        return Err(crate::Error::InvalidPartitionsDefinition(format!(
                            "duplicate partition key '{}'",
                            key
                        )));
                    }
                }
                Ok(())
            }
            Self::TimeWindow {
                granularity,
                start,
                end,
            } => {
                if end < start {
                    return Err(crate::Error::InvalidPartitionsDefinition(format!(
                        "end date {} is before start date {}",
                        end, start
                    )));
                }
                let count =
                    time_window_keys(*granularity, *start, *end, MAX_TIME_WINDOW_PARTITIONS + 1)
                        .len();
                if count > MAX_TIME_WINDOW_PARTITIONS {
                    return Err(crate::Error::InvalidPartitionsDefinition(format!(
                        "time window from {} to {} exceeds {} partitions",
                        start, end, MAX_TIME_WINDOW_PARTITIONS
                    )));
                }
                Ok(())
            }
        }
    }

    /// All partition keys in definition order
    pub fn partition_keys(&self) -> Vec<String> {
        match self {
            Self::Static { keys } => keys.clone(),
            Self::TimeWindow {
                granularity,
                start,
                end,
            } => time_window_keys(*granularity, *start, *end, MAX_TIME_WINDOW_PARTITIONS),
        }
    }

    /// Whether `key` is one of this definition's partition keys
    ///
    /// Time-window keys are parsed and checked against the window directly
    /// rather than by enumerating it.
    pub fn has_partition_key(&self, key: &str) -> bool {
        match self {
            Self::Static { keys } => keys.iter().any(|k| k == key),
            Self::TimeWindow {
                granularity,
                start,
                end,
            } => is_time_window_key(*granularity, *start, *end, key),
        }
    }

    /// Number of partitions in the definition
    pub fn num_partitions(&self) -> usize {
        match self {
            Self::Static { keys } => keys.len(),
            Self::TimeWindow { .. } => self.partition_keys().len(),
        }
    }
}

const HOURLY_KEY_FORMAT: &str = "%Y-%m-%d-%H:00";
const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// First window start, last allowed window start and key format
fn window_bounds(
    granularity: TimeGranularity,
    start: NaiveDate,
    end: NaiveDate,
) -> (NaiveDateTime, NaiveDateTime, &'static str) {
    let origin = NaiveDateTime::new(start, NaiveTime::MIN);
    let end = NaiveDateTime::new(end, NaiveTime::MIN);
    match granularity {
        TimeGranularity::Hourly => (origin, end + Duration::hours(23), HOURLY_KEY_FORMAT),
        _ => (origin, end, DATE_KEY_FORMAT),
    }
}

/// Generate at most `limit` keys for a time window
fn time_window_keys(
    granularity: TimeGranularity,
    start: NaiveDate,
    end: NaiveDate,
    limit: usize,
) -> Vec<String> {
    let (origin, last, format) = window_bounds(granularity, start, end);

    let mut keys = Vec::new();
    for index in 0..limit {
        // Offsets are taken from the window start so month-end days do not drift.
        let Some(current) = window_start(granularity, origin, index as u32) else {
            break;
        };
        if current > last {
            break;
        }
        keys.push(current.format(format).to_string());
    }
    keys
}

/// Membership test that agrees with [`time_window_keys`] without generating it
fn is_time_window_key(
    granularity: TimeGranularity,
    start: NaiveDate,
    end: NaiveDate,
    key: &str,
) -> bool {
    let (origin, last, format) = window_bounds(granularity, start, end);

    let candidate = match granularity {
        TimeGranularity::Hourly => NaiveDateTime::parse_from_str(key, "%Y-%m-%d-%H:%M").ok(),
        _ => NaiveDate::parse_from_str(key, DATE_KEY_FORMAT)
            .ok()
            .map(|date| NaiveDateTime::new(date, NaiveTime::MIN)),
    };
    let Some(candidate) = candidate else {
        return false;
    };
    if candidate < origin || candidate > last {
        return false;
    }

    let index = match granularity {
        TimeGranularity::Hourly => (candidate - origin).num_hours(),
        TimeGranularity::Daily => (candidate - origin).num_days(),
        TimeGranularity::Weekly => (candidate - origin).num_days() / 7,
        TimeGranularity::Monthly | TimeGranularity::Yearly => {
            let months = i64::from(candidate.year() - origin.year()) * 12
                + i64::from(candidate.month())
                - i64::from(origin.month());
            if granularity == TimeGranularity::Yearly {
                months / 12
            } else {
                months
            }
        }
    };
    let Ok(index) = u32::try_from(index) else {
        return false;
    };
    if index as usize >= MAX_TIME_WINDOW_PARTITIONS {
        return false;
    }

    // Alignment and canonical spelling: the key must be exactly what
    // enumeration would have produced at this index.
    window_start(granularity, origin, index) == Some(candidate)
        && candidate.format(format).to_string() == key
}

fn window_start(
    granularity: TimeGranularity,
    origin: NaiveDateTime,
    index: u32,
) -> Option<NaiveDateTime> {
    match granularity {
        TimeGranularity::Hourly => origin.checked_add_signed(Duration::hours(index.into())),
        TimeGranularity::Daily => origin.checked_add_signed(Duration::days(index.into())),
        TimeGranularity::Weekly => origin.checked_add_signed(Duration::weeks(index.into())),
        TimeGranularity::Monthly => origin.checked_add_months(Months::new(index)),
        TimeGranularity::Yearly => origin.checked_add_months(Months::new(index.checked_mul(12)?)),
    }
}
