//! Dispatch request schema and boundary validation.

use super::dispatcher::parse_callback_base;
use crate::error::{Result, ServiceError};
use crate::ids::non_blank;
use crate::models::{CallbackMethod, DispatchMode, Job};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Inbound dispatch request. Exactly one job source must be present:
/// `file_url`, `files_url`, or `jobs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchRequest {
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub files_url: Option<Vec<String>>,
    #[serde(default)]
    pub jobs: Option<Vec<Job>>,
    /// Applies to every job without its own callback address.
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Only meaningful together with a single `file_url`.
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub method: Option<CallbackMethod>,
}

/// A validated set of jobs to dispatch together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobBatch {
    pub batch_id: Option<String>,
    pub jobs: Vec<Job>,
}

impl JobBatch {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self {
            batch_id: None,
            jobs,
        }
    }

    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    /// Validate the batch and select its execution mode.
    ///
    /// A batch runs async when any job carries a callback address, and then
    /// every job must carry one. Supplied task ids must be unique within the
    /// batch.
    pub fn mode(&self) -> Result<DispatchMode> {
        if self.jobs.is_empty() {
            return Err(ServiceError::Validation("no jobs supplied".to_string()));
        }

        let mut seen_ids = HashSet::new();
        for (index, job) in self.jobs.iter().enumerate() {
            if job.file_url.trim().is_empty() {
                return Err(ServiceError::Validation(format!(
                    "job {} is missing file_url",
                    index
                )));
            }
            if let Some(task_id) = non_blank(job.task_id.as_deref()) {
                if !seen_ids.insert(task_id) {
                    return Err(ServiceError::Validation(format!(
                        "task_id '{}' is used by more than one job",
                        task_id
                    )));
                }
            }
            if let Some(base) = non_blank(job.callback_url.as_deref()) {
                parse_callback_base(base)?;
            }
        }

        let (with_callback, without_callback): (Vec<usize>, Vec<usize>) = (0..self.jobs.len())
            .partition(|&i| non_blank(self.jobs[i].callback_url.as_deref()).is_some());

        match (with_callback.is_empty(), without_callback.is_empty()) {
            (true, _) => Ok(DispatchMode::Sync),
            (false, true) => Ok(DispatchMode::Async),
            (false, false) => Err(ServiceError::Validation(format!(
                "jobs {:?} carry a callback_url but jobs {:?} do not; a batch must be entirely sync or entirely async",
                with_callback, without_callback
            ))),
        }
    }
}

impl DispatchRequest {
    /// Turn the loose request into a validated [`JobBatch`], applying the
    /// batch-level callback address and method to jobs lacking their own.
    pub fn into_batch(self) -> Result<JobBatch> {
        let sources = [
            self.file_url.is_some(),
            self.files_url.is_some(),
            self.jobs.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();

        if sources == 0 {
            return Err(ServiceError::Validation(
                "one of file_url, files_url or jobs is required".to_string(),
            ));
        }
        if sources > 1 {
            return Err(ServiceError::Validation(
                "only one of file_url, files_url or jobs may be supplied".to_string(),
            ));
        }

        let shared_task_id = non_blank(self.task_id.as_deref()).map(str::to_string);

        let mut jobs = if let Some(file_url) = self.file_url {
            vec![Job {
                task_id: shared_task_id,
                ..Job::new(file_url)
            }]
        } else if let Some(urls) = self.files_url {
            if shared_task_id.is_some() {
                return Err(ServiceError::Validation(
                    "task_id can only accompany a single file_url".to_string(),
                ));
            }
            urls.into_iter().map(Job::new).collect()
        } else {
            self.jobs.unwrap_or_default()
        };

        let shared_callback = non_blank(self.callback_url.as_deref()).map(str::to_string);
        for job in &mut jobs {
            if non_blank(job.callback_url.as_deref()).is_none() {
                job.callback_url = shared_callback.clone();
            }
            if job.method.is_none() {
                job.method = self.method;
            }
        }

        let batch = JobBatch {
            batch_id: self.batch_id,
            jobs,
        };
        batch.mode()?;

        Ok(batch)
    }
}
