//! Error taxonomy.
//!
//! Structural errors ([`ServiceError`]) abort a whole call. Per-task errors
//! ([`InvokeError`]) are folded into the batch response and never abort
//! sibling tasks. [`StorageError`] comes from the result store.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Errors that reject an entire dispatch, ingestion or query call.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP status equivalent of this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Configuration(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Configuration(_) => "ConfigurationError",
            Self::Storage(_) => "StorageError",
            Self::NotFound(_) => "NotFound",
            Self::Internal(_) => "InternalError",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

/// Which side of the Analyzer boundary a task failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The submission itself failed or was rejected.
    Invocation,
    /// The Analyzer ran and reported a failed outcome.
    Analysis,
}

/// Per-task failure reported by a worker invoker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    #[error("invocation failed: {0}")]
    Invocation(String),

    #[error("analysis failed: {0}")]
    Analysis(String),
}

impl InvokeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Invocation(_) => FailureKind::Invocation,
            Self::Analysis(_) => FailureKind::Analysis,
        }
    }

    /// The bare message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Invocation(m) | Self::Analysis(m) => m,
        }
    }
}

/// Result store failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt record at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("record for task {task_id} at {timestamp} already exists")]
    Duplicate {
        task_id: String,
        timestamp: DateTime<Utc>,
    },
}

pub type Result<T> = std::result::Result<T, ServiceError>;
