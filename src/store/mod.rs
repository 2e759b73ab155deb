//! Append-only result storage.
//!
//! Records are keyed primarily by `(task_id, timestamp)` with a secondary
//! grouping index on `(batch_id, timestamp)`. Both read paths return records
//! newest first. There is no update-in-place.

pub mod jsonl;
pub mod memory;
pub mod stats;

use crate::error::StorageError;
use crate::models::{BatchStatistics, ResultRecord};
use async_trait::async_trait;

pub use jsonl::JsonlResultStore;
pub use memory::MemoryResultStore;
pub use stats::StatsPolicy;

pub type StoreResult<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Append a record. Never overwrites.
    async fn put(&self, record: ResultRecord) -> StoreResult<()>;

    /// At most `limit` records for the task, newest first.
    async fn get_by_task(&self, task_id: &str, limit: usize) -> StoreResult<Vec<ResultRecord>>;

    /// Every record of the batch, newest first.
    async fn get_by_batch(&self, batch_id: &str) -> StoreResult<Vec<ResultRecord>>;

    async fn stats_for_batch(
        &self,
        batch_id: &str,
        policy: StatsPolicy,
    ) -> StoreResult<BatchStatistics> {
        let records = self.get_by_batch(batch_id).await?;
        Ok(stats::tally(&records, policy))
    }
}
