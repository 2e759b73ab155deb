//! Result aggregation and batch statistics.
//!
//! Computes per-batch status counts from stored records.

use crate::models::{BatchStatistics, ResultRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which records a batch tally counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StatsPolicy {
    /// Only the newest record of each task.
    #[default]
    LatestPerTask,
    /// Every stored record, duplicates included.
    RawRecords,
}

/// Tally records by status under the given policy.
pub fn tally(records: &[ResultRecord], policy: StatsPolicy) -> BatchStatistics {
    let mut stats = BatchStatistics::default();

    match policy {
        StatsPolicy::RawRecords => {
            for record in records {
                stats.record(record.status);
            }
        }
        StatsPolicy::LatestPerTask => {
            for record in latest_per_task(records) {
                stats.record(record.status);
            }
        }
    }

    stats
}

/// The most recent record of each task, newest first.
pub fn latest_per_task(records: &[ResultRecord]) -> Vec<&ResultRecord> {
    let mut latest: HashMap<&str, &ResultRecord> = HashMap::new();

    for record in records {
        latest
            .entry(record.task_id.as_str())
            .and_modify(|current| {
                if record.timestamp > current.timestamp {
                    *current = record;
                }
            })
            .or_insert(record);
    }

    let mut latest: Vec<&ResultRecord> = latest.into_values().collect();
    latest.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordStatus;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::{json, Map};

    fn record(task_id: &str, seconds: i64, status: RecordStatus) -> ResultRecord {
        ResultRecord {
            task_id: task_id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(seconds),
            batch_id: "batch-1".to_string(),
            status,
            file_url: String::new(),
            results: json!({}),
            error_message: String::new(),
            processing_time: Decimal::ZERO,
            metadata: Map::new(),
        }
    }

    fn duplicated_delivery() -> Vec<ResultRecord> {
        vec![
            record("a", 1, RecordStatus::Processing),
            record("a", 2, RecordStatus::Completed),
            record("a", 3, RecordStatus::Completed),
            record("b", 1, RecordStatus::Failed),
        ]
    }

    #[test]
    fn test_raw_tally_counts_every_record() {
        let stats = tally(&duplicated_delivery(), StatsPolicy::RawRecords);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processing, 1);
    }

    #[test]
    fn test_latest_tally_ignores_superseded_records() {
        let stats = tally(&duplicated_delivery(), StatsPolicy::LatestPerTask);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processing, 0);
    }

    #[test]
    fn test_latest_per_task_picks_newest() {
        let records = duplicated_delivery();
        let latest = latest_per_task(&records);
        assert_eq!(latest.len(), 2);
        let a = latest.iter().find(|r| r.task_id == "a").unwrap();
        assert_eq!(a.timestamp, records[2].timestamp);
    }

    #[test]
    fn test_policy_serde_names() {
        assert_eq!(
            serde_json::to_value(StatsPolicy::LatestPerTask).unwrap(),
            json!("latest_per_task")
        );
        let policy: StatsPolicy = serde_json::from_value(json!("raw_records")).unwrap();
        assert_eq!(policy, StatsPolicy::RawRecords);
    }
}
