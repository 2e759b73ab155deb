//! Callback ingestion and result queries.

use super::clock::MonotonicClock;
use crate::config::CallbackConfig;
use crate::error::{Result, ServiceError};
use crate::ids;
use crate::models::{
    BatchResults, CallbackPayload, ResultRecord, StoredAck, TaskResults,
};
use crate::store::{stats, ResultStore, StatsPolicy};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on records returned by a task query.
pub const MAX_TASK_RESULTS: usize = 10;

/// Receives out-of-band Analyzer results and answers result queries.
pub struct CallbackService {
    store: Arc<dyn ResultStore>,
    clock: MonotonicClock,
    reject_orphans: bool,
    stats_policy: StatsPolicy,
    query_limit: usize,
}

impl CallbackService {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self {
            store,
            clock: MonotonicClock::new(),
            reject_orphans: false,
            stats_policy: StatsPolicy::default(),
            query_limit: MAX_TASK_RESULTS,
        }
    }

    pub fn with_config(store: Arc<dyn ResultStore>, config: &CallbackConfig, stats_policy: StatsPolicy) -> Self {
        Self {
            reject_orphans: config.reject_orphans,
            stats_policy,
            query_limit: config.query_limit.clamp(1, MAX_TASK_RESULTS),
            ..Self::new(store)
        }
    }

    /// Refuse callbacks that carry no task id at all instead of storing them
    /// under a fresh, disconnected id.
    pub fn reject_orphans(mut self, reject: bool) -> Self {
        self.reject_orphans = reject;
        self
    }

    pub fn stats_policy(mut self, policy: StatsPolicy) -> Self {
        self.stats_policy = policy;
        self
    }

    /// Store one callback as a new record.
    ///
    /// The task id comes from the callback address, then the body, then a
    /// fresh id. The batch id comes from the body, then `metadata.batch_id`,
    /// then a fresh id. The timestamp is assigned here.
    pub async fn ingest(
        &self,
        address_task_id: Option<&str>,
        payload: CallbackPayload,
    ) -> Result<StoredAck> {
        let task_id = match ids::non_blank(address_task_id)
            .or_else(|| ids::non_blank(payload.task_id.as_deref()))
        {
            Some(id) => id.to_string(),
            None if self.reject_orphans => {
                return Err(ServiceError::Validation(
                    "callback carries no task_id in its address or body".to_string(),
                ));
            }
            None => {
                let generated = ids::new_id();
                warn!(
                    "Callback without task_id stored under generated id {}",
                    generated
                );
                generated
            }
        };

        let metadata = payload.metadata.clone().unwrap_or_default();
        let batch_id = ids::resolve(
            ids::non_blank(payload.batch_id.as_deref())
                .or_else(|| metadata.get("batch_id").and_then(Value::as_str)),
        );

        let record = ResultRecord {
            task_id,
            timestamp: self.clock.now(),
            batch_id,
            status: payload.record_status(),
            file_url: payload.file_url.unwrap_or_default(),
            results: payload.results.unwrap_or_else(|| Value::Object(Map::new())),
            error_message: payload.error.unwrap_or_default(),
            processing_time: payload.processing_time.unwrap_or(Decimal::ZERO),
            metadata,
        };

        let ack = StoredAck {
            message: "Callback received and stored".to_string(),
            task_id: record.task_id.clone(),
            batch_id: record.batch_id.clone(),
            timestamp: record.timestamp,
        };

        debug!(
            "Storing {} record for task {} at {}",
            record.status, record.task_id, record.timestamp
        );
        self.store.put(record).await?;

        info!(
            "Callback stored for task_id: {}, batch_id: {}",
            ack.task_id, ack.batch_id
        );
        Ok(ack)
    }

    /// Most recent records of a task, newest first. `limit` is clamped to
    /// the configured query limit.
    pub async fn task_results(&self, task_id: &str, limit: Option<usize>) -> Result<TaskResults> {
        let limit = limit
            .unwrap_or(self.query_limit)
            .clamp(1, self.query_limit);
        let results = self.store.get_by_task(task_id, limit).await?;

        Ok(TaskResults {
            task_id: task_id.to_string(),
            count: results.len(),
            results,
        })
    }

    /// Every record of a batch, newest first, with statistics.
    pub async fn batch_results(&self, batch_id: &str) -> Result<BatchResults> {
        let results = self.store.get_by_batch(batch_id).await?;
        let statistics = stats::tally(&results, self.stats_policy);

        Ok(BatchResults {
            batch_id: batch_id.to_string(),
            results,
            statistics,
        })
    }
}
