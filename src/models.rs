//! Data models for dispatch and callback correlation.
//!
//! This module contains the jobs clients submit, the tasks the dispatcher
//! derives from them, the payloads exchanged with the Analyzer, the
//! append-only result records, and the dispatch response shapes.

use crate::error::{FailureKind, InvokeError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// HTTP method the Analyzer uses when delivering a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CallbackMethod {
    #[default]
    Post,
    Put,
}

impl fmt::Display for CallbackMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackMethod::Post => write!(f, "POST"),
            CallbackMethod::Put => write!(f, "PUT"),
        }
    }
}

impl FromStr for CallbackMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "POST" => Ok(CallbackMethod::Post),
            "PUT" => Ok(CallbackMethod::Put),
            other => Err(format!("method must be POST or PUT, got '{}'", other)),
        }
    }
}

impl TryFrom<String> for CallbackMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CallbackMethod> for String {
    fn from(method: CallbackMethod) -> Self {
        method.to_string()
    }
}

/// A unit of work as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<CallbackMethod>,
}

impl Job {
    pub fn new(file_url: impl Into<String>) -> Self {
        Self {
            file_url: file_url.into(),
            callback_url: None,
            task_id: None,
            method: None,
        }
    }
}

/// Lifecycle state of a dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Launched,
    Processing,
    Completed,
    Failed,
}

/// The runtime instance of a job once dispatched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub task_id: String,
    pub batch_id: String,
    pub task_index: usize,
    pub file_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    pub method: CallbackMethod,
    pub status: TaskStatus,
}

impl Task {
    /// Build the payload sent to the Analyzer for this task.
    pub fn analyzer_request(&self) -> AnalyzerRequest {
        AnalyzerRequest {
            file_url: self.file_url.clone(),
            task_id: self.task_id.clone(),
            batch_id: self.batch_id.clone(),
            task_index: self.task_index,
            method: self.callback_url.as_ref().map(|_| self.method),
            callback_url: self.callback_url.clone(),
        }
    }
}

/// Request body sent to the Analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerRequest {
    pub file_url: String,
    pub task_id: String,
    pub batch_id: String,
    pub task_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<CallbackMethod>,
}

/// Outcome payload produced by the Analyzer, either inline (blocking mode)
/// or as the body of an out-of-band callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerReport {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub results: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default, deserialize_with = "exact_decimal")]
    pub processing_time: Option<Decimal>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Body of a callback delivered to the ingestion surface.
pub type CallbackPayload = AnalyzerReport;

impl AnalyzerReport {
    /// Reported status, normalized.
    pub fn record_status(&self) -> RecordStatus {
        self.status
            .as_deref()
            .map(RecordStatus::from)
            .unwrap_or(RecordStatus::Unknown)
    }

    /// Interpret an inline report: a failed status (or an error with no
    /// status at all) is an analysis failure.
    pub fn into_output(self) -> Result<AnalysisOutput, InvokeError> {
        let failed = match self.status.as_deref() {
            Some(status) => RecordStatus::from(status) == RecordStatus::Failed,
            None => self.error.is_some(),
        };

        if failed {
            let message = self
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "analyzer reported failure".to_string());
            return Err(InvokeError::Analysis(message));
        }

        Ok(AnalysisOutput {
            results: self.results.unwrap_or_else(|| Value::Object(Map::new())),
            processing_time: self.processing_time,
            metadata: self.metadata.unwrap_or_default(),
        })
    }
}

/// Successful inline analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub results: Value,
    pub processing_time: Option<Decimal>,
    pub metadata: Map<String, Value>,
}

/// Parse a decimal from its textual form, accepting scientific notation.
pub fn parse_decimal(text: &str) -> Result<Decimal, rust_decimal::Error> {
    let text = text.trim();
    Decimal::from_str(text).or_else(|_| Decimal::from_scientific(text))
}

/// Deserialize a JSON number or decimal string into a [`Decimal`] through
/// its textual representation, never through float arithmetic.
fn exact_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => parse_decimal(&n.to_string())
            .map(Some)
            .map_err(D::Error::custom),
        Some(Value::String(s)) => parse_decimal(&s).map(Some).map_err(D::Error::custom),
        Some(other) => Err(D::Error::custom(format!(
            "processing_time must be a number or a decimal string, got {}",
            other
        ))),
    }
}

/// Status carried by a stored result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Completed,
    Failed,
    Processing,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Completed => write!(f, "completed"),
            RecordStatus::Failed => write!(f, "failed"),
            RecordStatus::Processing => write!(f, "processing"),
            RecordStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<&str> for RecordStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "completed" => RecordStatus::Completed,
            "failed" => RecordStatus::Failed,
            "processing" => RecordStatus::Processing,
            _ => RecordStatus::Unknown,
        }
    }
}

/// One reported outcome for a task. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub batch_id: String,
    pub status: RecordStatus,
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub results: Value,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub processing_time: Decimal,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Acknowledgement returned after a callback is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAck {
    pub message: String,
    pub task_id: String,
    pub batch_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate status counts for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub processing: usize,
    pub unknown: usize,
}

impl BatchStatistics {
    pub fn record(&mut self, status: RecordStatus) {
        self.total += 1;
        match status {
            RecordStatus::Completed => self.completed += 1,
            RecordStatus::Failed => self.failed += 1,
            RecordStatus::Processing => self.processing += 1,
            RecordStatus::Unknown => self.unknown += 1,
        }
    }
}

/// Records for a single task, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResults {
    pub task_id: String,
    pub results: Vec<ResultRecord>,
    pub count: usize,
}

/// Records for a batch, newest first, with statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    pub batch_id: String,
    pub results: Vec<ResultRecord>,
    pub statistics: BatchStatistics,
}

/// Launch outcome of one task in an async dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchedTask {
    pub task_index: usize,
    pub task_id: String,
    pub file_url: String,
    /// Individual callback address derived for this task.
    pub callback_url: String,
    pub method: CallbackMethod,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to an async dispatch. A rendezvous for correlation, not a
/// completion signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchReport {
    pub message: String,
    pub batch_id: String,
    pub total_tasks: usize,
    pub launched: usize,
    pub failed: usize,
    pub tasks: Vec<LaunchedTask>,
}

/// Result of one task in a sync dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_index: usize,
    pub task_id: String,
    pub file_url: String,
    pub success: bool,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn from_result(task: &Task, result: Result<AnalysisOutput, InvokeError>) -> Self {
        match result {
            Ok(output) => Self {
                task_index: task.task_index,
                task_id: task.task_id.clone(),
                file_url: task.file_url.clone(),
                success: true,
                status: TaskStatus::Completed,
                results: Some(output.results),
                processing_time: output.processing_time,
                error_kind: None,
                error: None,
            },
            Err(e) => Self {
                task_index: task.task_index,
                task_id: task.task_id.clone(),
                file_url: task.file_url.clone(),
                success: false,
                status: TaskStatus::Failed,
                results: None,
                processing_time: None,
                error_kind: Some(e.kind()),
                error: Some(e.message().to_string()),
            },
        }
    }
}

/// Aggregated response to a sync dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub message: String,
    pub batch_id: String,
    pub total_tasks: usize,
    pub successful: usize,
    pub failed: usize,
    /// Ordered by `task_index`, never by completion order.
    pub results: Vec<TaskOutcome>,
}

/// Execution mode of a dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    Sync,
    Async,
}

/// Response of a dispatch call, tagged by mode.
/// Serialize-only; tagged enums cannot read back exact numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DispatchResponse {
    Async(LaunchReport),
    Sync(BatchReport),
}

impl DispatchResponse {
    pub fn mode(&self) -> DispatchMode {
        match self {
            DispatchResponse::Async(_) => DispatchMode::Async,
            DispatchResponse::Sync(_) => DispatchMode::Sync,
        }
    }

    pub fn batch_id(&self) -> &str {
        match self {
            DispatchResponse::Async(r) => &r.batch_id,
            DispatchResponse::Sync(r) => &r.batch_id,
        }
    }

    /// Number of tasks that failed to launch (async) or to complete (sync).
    pub fn failed(&self) -> usize {
        match self {
            DispatchResponse::Async(r) => r.failed,
            DispatchResponse::Sync(r) => r.failed,
        }
    }
}
