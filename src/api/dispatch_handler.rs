use crate::dispatch::DispatchRequest;
use crate::error::{Result, ServiceError};
use crate::models::DispatchMode;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

/// Dispatch one batch of media jobs.
///
/// Answers `202 Accepted` with launch information when the jobs carry a
/// callback address, otherwise `200 OK` with every task's result.
pub async fn dispatch(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload.map_err(|e| ServiceError::Validation(e.body_text()))?;
    let batch = request.into_batch()?;

    tracing::debug!("Dispatch request with {} jobs", batch.jobs.len());

    let response = state.dispatcher.dispatch(batch).await?;
    let status = match response.mode() {
        DispatchMode::Async => StatusCode::ACCEPTED,
        DispatchMode::Sync => StatusCode::OK,
    };

    Ok((status, Json(response)))
}
