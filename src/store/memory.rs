//! In-process result store.

use super::{ResultStore, StoreResult};
use crate::error::StorageError;
use crate::models::ResultRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

/// Primary and secondary ordered indexes over stored records.
#[derive(Debug, Default)]
pub(crate) struct RecordIndex {
    primary: BTreeMap<(String, DateTime<Utc>), ResultRecord>,
    by_batch: BTreeSet<(String, DateTime<Utc>, String)>,
}

impl RecordIndex {
    pub(crate) fn len(&self) -> usize {
        self.primary.len()
    }

    /// Refuse the record if its primary key is already taken.
    pub(crate) fn check_vacant(&self, record: &ResultRecord) -> StoreResult<()> {
        let key = (record.task_id.clone(), record.timestamp);
        if self.primary.contains_key(&key) {
            return Err(StorageError::Duplicate {
                task_id: record.task_id.clone(),
                timestamp: record.timestamp,
            });
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, record: ResultRecord) -> StoreResult<()> {
        self.check_vacant(&record)?;

        self.by_batch.insert((
            record.batch_id.clone(),
            record.timestamp,
            record.task_id.clone(),
        ));
        self.primary
            .insert((record.task_id.clone(), record.timestamp), record);

        Ok(())
    }

    pub(crate) fn by_task(&self, task_id: &str, limit: usize) -> Vec<ResultRecord> {
        let start = (task_id.to_string(), DateTime::<Utc>::MIN_UTC);
        let end = (task_id.to_string(), DateTime::<Utc>::MAX_UTC);

        self.primary
            .range(start..=end)
            .rev()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub(crate) fn by_batch(&self, batch_id: &str) -> Vec<ResultRecord> {
        let start = (batch_id.to_string(), DateTime::<Utc>::MIN_UTC, String::new());

        let mut records: Vec<ResultRecord> = self
            .by_batch
            .range(start..)
            .take_while(|(batch, _, _)| batch == batch_id)
            .filter_map(|(_, timestamp, task_id)| {
                self.primary.get(&(task_id.clone(), *timestamp)).cloned()
            })
            .collect();

        records.reverse();
        records
    }
}

/// Result store held entirely in memory. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    index: RwLock<RecordIndex>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn put(&self, record: ResultRecord) -> StoreResult<()> {
        self.index.write().await.insert(record)
    }

    async fn get_by_task(&self, task_id: &str, limit: usize) -> StoreResult<Vec<ResultRecord>> {
        Ok(self.index.read().await.by_task(task_id, limit))
    }

    async fn get_by_batch(&self, batch_id: &str) -> StoreResult<Vec<ResultRecord>> {
        Ok(self.index.read().await.by_batch(batch_id))
    }
}
