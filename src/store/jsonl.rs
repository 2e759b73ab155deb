//! Append-only JSON-lines result store.
//!
//! Every record is appended as one line. Opening the store replays the file
//! into the same ordered indexes the memory store uses.

use super::memory::RecordIndex;
use super::{ResultStore, StoreResult};
use crate::error::StorageError;
use crate::models::ResultRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct JsonlState {
    file: File,
    index: RecordIndex,
}

/// File-backed result store.
#[derive(Debug)]
pub struct JsonlResultStore {
    path: PathBuf,
    state: RwLock<JsonlState>,
}

impl JsonlResultStore {
    /// Open (or create) the store at `path`, replaying existing records.
    ///
    /// A final line cut short by an interrupted write is dropped and the
    /// file truncated back to the last complete record.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let Replay { index, tail } = replay(&path).await?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        match tail {
            Tail::Clean => {}
            Tail::MissingNewline => file.write_all(b"\n").await?,
            Tail::Torn { offset } => {
                warn!(
                    "Dropping incomplete trailing record in {} (truncating to {} bytes)",
                    path.display(),
                    offset
                );
                file.set_len(offset).await?;
            }
        }

        info!(
            "Opened result store at {} ({} records)",
            path.display(),
            index.len()
        );

        Ok(Self {
            path,
            state: RwLock::new(JsonlState { file, index }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.state.read().await.index.len()
    }
}

/// How the file ended when it was replayed.
#[derive(Debug, PartialEq, Eq)]
enum Tail {
    Clean,
    /// The last record is complete but has no line terminator.
    MissingNewline,
    /// The last line is an incomplete record starting at `offset`.
    Torn { offset: u64 },
}

struct Replay {
    index: RecordIndex,
    tail: Tail,
}

async fn replay(path: &Path) -> StoreResult<Replay> {
    let mut index = RecordIndex::default();

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Replay {
                index,
                tail: Tail::Clean,
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut offset = 0u64;
    let mut tail = Tail::Clean;

    for (i, chunk) in content.split_inclusive('\n').enumerate() {
        let terminated = chunk.ends_with('\n');
        let line = chunk.trim_end_matches(['\n', '\r']);

        if !line.trim().is_empty() {
            match serde_json::from_str::<ResultRecord>(line) {
                Ok(record) => {
                    index.insert(record)?;
                    if !terminated {
                        tail = Tail::MissingNewline;
                    }
                }
                Err(_) if !terminated => {
                    tail = Tail::Torn { offset };
                }
                Err(source) => return Err(StorageError::Corrupt { line: i + 1, source }),
            }
        }

        offset += chunk.len() as u64;
    }

    Ok(Replay { index, tail })
}

async fn append_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line).await?;
    file.flush().await
}

#[async_trait]
impl ResultStore for JsonlResultStore {
    async fn put(&self, record: ResultRecord) -> StoreResult<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut state = self.state.write().await;
        state.index.check_vacant(&record)?;

        let committed = state.file.metadata().await?.len();
        if let Err(e) = append_line(&mut state.file, line.as_bytes()).await {
            // Roll back a partial line so the file stays replayable.
            if let Err(truncate) = state.file.set_len(committed).await {
                warn!(
                    "Failed to roll back partial write to {}: {}",
                    self.path.display(),
                    truncate
                );
            }
            return Err(e.into());
        }
        state.index.insert(record)?;

        debug!("Appended record to {}", self.path.display());
        Ok(())
    }

    async fn get_by_task(&self, task_id: &str, limit: usize) -> StoreResult<Vec<ResultRecord>> {
        Ok(self.state.read().await.index.by_task(task_id, limit))
    }

    async fn get_by_batch(&self, batch_id: &str) -> StoreResult<Vec<ResultRecord>> {
        Ok(self.state.read().await.index.by_batch(batch_id))
    }
}
