//! Fan-out of jobs to the Analyzer.
//!
//! Sync batches run through a bounded pool and are aggregated in submission
//! order. Async batches are submitted fire-and-forget and answered with the
//! launch outcome of each task and its individual callback address.

use super::request::JobBatch;
use crate::config::AnalyzerConfig;
use crate::error::{InvokeError, Result, ServiceError};
use crate::ids;
use crate::invoker::{HttpInvoker, Invoker};
use crate::models::{
    BatchReport, CallbackMethod, DispatchMode, DispatchResponse, Job, LaunchReport,
    LaunchedTask, Task, TaskOutcome, TaskStatus,
};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_POOL_SIZE: usize = 10;

/// Parse a callback base address. It must be an http(s) URL that can take
/// additional path segments.
pub fn parse_callback_base(base: &str) -> Result<Url> {
    let url = Url::parse(base.trim()).map_err(|e| {
        ServiceError::Validation(format!("invalid callback_url '{}': {}", base, e))
    })?;

    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ServiceError::Validation(format!(
            "callback_url '{}' must be an http(s) URL with a path",
            base
        )));
    }

    Ok(url)
}

/// Append the task id to a (possibly shared) callback base as one
/// percent-encoded path segment. Query and fragment are kept.
pub fn derive_callback_url(base: &str, task_id: &str) -> Result<String> {
    let mut url = parse_callback_base(base)?;
    url.path_segments_mut()
        .map_err(|_| {
            ServiceError::Validation(format!("callback_url '{}' cannot take a path", base))
        })?
        .pop_if_empty()
        .push(task_id);

    Ok(url.to_string())
}

/// Orchestrates dispatch of job batches.
pub struct Dispatcher {
    invoker: Option<Arc<dyn Invoker>>,
    pool_size: usize,
    invoke_timeout: Duration,
}

impl Dispatcher {
    pub fn new(invoker: Arc<dyn Invoker>, pool_size: usize, invoke_timeout: Duration) -> Self {
        Self {
            invoker: Some(invoker),
            pool_size: pool_size.max(1),
            invoke_timeout,
        }
    }

    /// A dispatcher with no Analyzer behind it. Every dispatch fails with a
    /// configuration error once the request itself has been validated.
    pub fn unconfigured() -> Self {
        Self {
            invoker: None,
            pool_size: DEFAULT_POOL_SIZE,
            invoke_timeout: Duration::from_secs(900),
        }
    }

    /// Build from configuration, using the HTTP invoker when an endpoint is set.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
        let invoke_timeout = Duration::from_secs(config.timeout_seconds);

        match config.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(endpoint) => {
                let invoker = HttpInvoker::new(
                    endpoint,
                    config.timeout_seconds,
                    config.connect_timeout_seconds,
                )
                .map_err(|e| {
                    ServiceError::Configuration(format!("failed to build HTTP client: {}", e))
                })?;
                info!("Analyzer endpoint: {}", endpoint);
                Ok(Self::new(Arc::new(invoker), config.pool_size, invoke_timeout))
            }
            None => {
                warn!("No analyzer endpoint configured; dispatch is disabled");
                Ok(Self {
                    invoke_timeout,
                    pool_size: config.pool_size.max(1),
                    ..Self::unconfigured()
                })
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.invoker.is_some()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    fn invoker(&self) -> Result<Arc<dyn Invoker>> {
        self.invoker.clone().ok_or_else(|| {
            ServiceError::Configuration("analyzer endpoint is not configured".to_string())
        })
    }

    /// Dispatch a batch in whichever mode its jobs select.
    ///
    /// Structural problems fail the whole call before any fan-out; per-task
    /// failures are folded into the response.
    pub async fn dispatch(&self, batch: JobBatch) -> Result<DispatchResponse> {
        let mode = batch.mode()?;
        let invoker = self.invoker()?;

        let batch_id = ids::resolve(batch.batch_id.as_deref());
        let tasks = prepare_tasks(&batch_id, batch.jobs, mode)?;

        info!(
            "Dispatching batch {} with {} tasks ({:?} mode)",
            batch_id,
            tasks.len(),
            mode
        );

        let response = match mode {
            DispatchMode::Async => {
                DispatchResponse::Async(self.launch(invoker, batch_id, tasks).await)
            }
            DispatchMode::Sync => DispatchResponse::Sync(self.run(invoker, batch_id, tasks).await),
        };

        Ok(response)
    }

    /// Fire-and-forget every task and report launch outcomes only.
    async fn launch(
        &self,
        invoker: Arc<dyn Invoker>,
        batch_id: String,
        tasks: Vec<Task>,
    ) -> LaunchReport {
        let launches = tasks.iter().map(|task| {
            let invoker = Arc::clone(&invoker);
            async move {
                let result = match invoker.submit(&task.analyzer_request()).await {
                    Ok(ack) => ack.into_result(),
                    Err(e) => Err(e),
                };

                let (status, error) = match result {
                    Ok(()) => {
                        debug!("Task {} launched for {}", task.task_id, task.file_url);
                        (TaskStatus::Launched, None)
                    }
                    Err(e) => {
                        warn!(
                            "Launch of task {} (index {}) failed: {}",
                            task.task_id, task.task_index, e
                        );
                        (TaskStatus::Failed, Some(e.message().to_string()))
                    }
                };

                LaunchedTask {
                    task_index: task.task_index,
                    task_id: task.task_id.clone(),
                    file_url: task.file_url.clone(),
                    callback_url: task.callback_url.clone().unwrap_or_default(),
                    method: task.method,
                    status,
                    error,
                }
            }
        });

        let launched_tasks = join_all(launches).await;
        let launched = launched_tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Launched)
            .count();
        let failed = launched_tasks.len() - launched;

        info!(
            "Batch {} launched: {} accepted, {} rejected",
            batch_id, launched, failed
        );

        LaunchReport {
            message: "Analysis launched asynchronously".to_string(),
            batch_id,
            total_tasks: launched_tasks.len(),
            launched,
            failed,
            tasks: launched_tasks,
        }
    }

    /// Invoke every task through the bounded pool and aggregate in
    /// submission order.
    async fn run(&self, invoker: Arc<dyn Invoker>, batch_id: String, tasks: Vec<Task>) -> BatchReport {
        let total = tasks.len();
        let invoke_timeout = self.invoke_timeout;

        let mut outcomes = stream::iter(tasks)
            .map(|task| {
                let invoker = Arc::clone(&invoker);
                async move {
                    let request = task.analyzer_request();
                    let handle = tokio::spawn(async move {
                        match tokio::time::timeout(invoke_timeout, invoker.invoke(&request)).await {
                            Ok(result) => result,
                            Err(_) => Err(InvokeError::Invocation(format!(
                                "no response within {:?}",
                                invoke_timeout
                            ))),
                        }
                    });

                    let result = match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(InvokeError::Invocation(format!(
                            "invocation aborted: {}",
                            e
                        ))),
                    };

                    if let Err(ref e) = result {
                        warn!(
                            "Task {} (index {}) failed: {}",
                            task.task_id, task.task_index, e
                        );
                    }

                    TaskOutcome::from_result(&task, result)
                }
            })
            .buffer_unordered(self.pool_size);

        // Slots keyed by submission position; completion order never leaks.
        let mut slots: Vec<Option<TaskOutcome>> = vec![None; total];
        while let Some(outcome) = outcomes.next().await {
            let index = outcome.task_index;
            slots[index] = Some(outcome);
        }
        let results: Vec<TaskOutcome> = slots.into_iter().flatten().collect();

        let successful = results.iter().filter(|r| r.success).count();
        let failed = results.len() - successful;

        info!(
            "Batch {} finished: {} succeeded, {} failed",
            batch_id, successful, failed
        );

        BatchReport {
            message: "Batch processed".to_string(),
            batch_id,
            total_tasks: total,
            successful,
            failed,
            results,
        }
    }
}

/// Assign ids, positions and individual callback addresses.
fn prepare_tasks(batch_id: &str, jobs: Vec<Job>, mode: DispatchMode) -> Result<Vec<Task>> {
    jobs.into_iter()
        .enumerate()
        .map(|(task_index, job)| {
            let task_id = ids::resolve(job.task_id.as_deref());
            let callback_url = match (mode, job.callback_url.as_deref()) {
                (DispatchMode::Async, Some(base)) => Some(derive_callback_url(base, &task_id)?),
                _ => None,
            };
            let status = match mode {
                DispatchMode::Async => TaskStatus::Launched,
                DispatchMode::Sync => TaskStatus::Processing,
            };

            Ok(Task {
                task_id,
                batch_id: batch_id.to_string(),
                task_index,
                file_url: job.file_url,
                callback_url,
                method: job.method.unwrap_or(CallbackMethod::Post),
                status,
            })
        })
        .collect()
}
