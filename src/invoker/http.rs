//! HTTP transport to the Analyzer.
//!
//! Both invocation kinds POST the [`AnalyzerRequest`] as JSON to the
//! configured endpoint. The kind is carried in the `X-Invocation-Type`
//! header: `Event` must be answered with `202 Accepted`, while
//! `RequestResponse` is answered with the analysis report inline.

use super::{Acknowledgement, Invoker};
use crate::error::InvokeError;
use crate::models::{AnalysisOutput, AnalyzerReport, AnalyzerRequest};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

pub const INVOCATION_TYPE_HEADER: &str = "X-Invocation-Type";
pub const EVENT_INVOCATION: &str = "Event";
pub const REQUEST_RESPONSE_INVOCATION: &str = "RequestResponse";

/// Invoker that talks to an Analyzer over HTTP.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    endpoint: String,
    http_client: reqwest::Client,
    timeout_seconds: u64,
}

impl HttpInvoker {
    /// Build an invoker for `endpoint`. Blocking invocations give up after
    /// `timeout_seconds`.
    pub fn new(
        endpoint: impl Into<String>,
        timeout_seconds: u64,
        connect_timeout_seconds: u64,
    ) -> reqwest::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .connect_timeout(Duration::from_secs(connect_timeout_seconds))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
            timeout_seconds,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(
        &self,
        request: &AnalyzerRequest,
        invocation_type: &str,
    ) -> Result<reqwest::Response, InvokeError> {
        debug!(
            "Invoking analyzer ({}) for task {} at {}",
            invocation_type, request.task_id, self.endpoint
        );

        self.http_client
            .post(&self.endpoint)
            .header(INVOCATION_TYPE_HEADER, invocation_type)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InvokeError::Invocation(format!(
                        "request timed out after {}s",
                        self.timeout_seconds
                    ))
                } else if e.is_connect() {
                    InvokeError::Invocation(format!(
                        "cannot connect to analyzer at {}",
                        self.endpoint
                    ))
                } else {
                    InvokeError::Invocation(format!("failed to send request: {}", e))
                }
            })
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn submit(&self, request: &AnalyzerRequest) -> Result<Acknowledgement, InvokeError> {
        let response = self.post(request, EVENT_INVOCATION).await?;
        let status = response.status();

        if status == StatusCode::ACCEPTED {
            return Ok(Acknowledgement::Accepted);
        }

        let body = response.text().await.unwrap_or_default();
        Ok(Acknowledgement::Rejected {
            reason: format!("analyzer answered {}: {}", status, body.trim()),
        })
    }

    async fn invoke(&self, request: &AnalyzerRequest) -> Result<AnalysisOutput, InvokeError> {
        let response = self.post(request, REQUEST_RESPONSE_INVOCATION).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InvokeError::Invocation(format!(
                "analyzer answered {}: {}",
                status,
                body.trim()
            )));
        }

        let report: AnalyzerReport = response.json().await.map_err(|e| {
            InvokeError::Invocation(format!("failed to parse analyzer response: {}", e))
        })?;

        report.into_output()
    }
}
