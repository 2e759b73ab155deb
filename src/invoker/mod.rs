//! Worker invocation.
//!
//! An [`Invoker`] submits tasks to the Analyzer either fire-and-forget
//! ([`Invoker::submit`]) or request-response ([`Invoker::invoke`]). The
//! dispatcher owns an `Arc<dyn Invoker>` so tests can substitute a double.

pub mod http;

use crate::error::InvokeError;
use crate::models::{AnalysisOutput, AnalyzerRequest};
use async_trait::async_trait;

pub use http::HttpInvoker;

/// Immediate answer to a fire-and-forget submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    Accepted,
    Rejected { reason: String },
}

impl Acknowledgement {
    /// Anything other than an acceptance is an invocation failure.
    pub fn into_result(self) -> Result<(), InvokeError> {
        match self {
            Acknowledgement::Accepted => Ok(()),
            Acknowledgement::Rejected { reason } => Err(InvokeError::Invocation(reason)),
        }
    }
}

#[async_trait]
pub trait Invoker: Send + Sync {
    /// Submit without waiting for the analysis. Carries no payload back.
    async fn submit(&self, request: &AnalyzerRequest) -> Result<Acknowledgement, InvokeError>;

    /// Submit and wait for the full analysis outcome.
    async fn invoke(&self, request: &AnalyzerRequest) -> Result<AnalysisOutput, InvokeError>;
}
