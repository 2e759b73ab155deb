use crate::error::{Result, ServiceError};
use crate::models::{BatchResults, CallbackPayload, StoredAck, TaskResults};
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ResultsQuery {
    pub limit: Option<usize>,
}

fn payload_or_reject(
    payload: std::result::Result<Json<CallbackPayload>, JsonRejection>,
) -> Result<CallbackPayload> {
    payload
        .map(|Json(p)| p)
        .map_err(|e| ServiceError::Validation(e.body_text()))
}

/// Store a callback addressed to a specific task.
pub async fn receive_callback(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    payload: std::result::Result<Json<CallbackPayload>, JsonRejection>,
) -> Result<Json<StoredAck>> {
    let payload = payload_or_reject(payload)?;
    let ack = state.callbacks.ingest(Some(&task_id), payload).await?;
    Ok(Json(ack))
}

/// Store a callback whose task id, if any, is in the body.
pub async fn receive_orphan_callback(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CallbackPayload>, JsonRejection>,
) -> Result<Json<StoredAck>> {
    let payload = payload_or_reject(payload)?;
    let ack = state.callbacks.ingest(None, payload).await?;
    Ok(Json(ack))
}

/// Most recent records of a task.
pub async fn get_task_results(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    query: std::result::Result<Query<ResultsQuery>, QueryRejection>,
) -> Result<Json<TaskResults>> {
    let Query(query) = query.map_err(|e| ServiceError::Validation(e.body_text()))?;
    let results = state.callbacks.task_results(&task_id, query.limit).await?;
    Ok(Json(results))
}

/// Every record of a batch with statistics.
pub async fn get_batch_results(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchResults>> {
    let results = state.callbacks.batch_results(&batch_id).await?;
    Ok(Json(results))
}
