pub mod callback_handler;
pub mod dispatch_handler;
pub mod health;

pub use callback_handler::{
    get_batch_results, get_task_results, receive_callback, receive_orphan_callback,
};
pub use dispatch_handler::dispatch;
pub use health::health_check;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the HTTP surface: dispatch, callback ingestion, result queries and
/// health.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/dispatch", post(dispatch))
        .route(
            "/callback",
            post(receive_orphan_callback).put(receive_orphan_callback),
        )
        .route(
            "/callback/:task_id",
            get(get_task_results)
                .post(receive_callback)
                .put(receive_callback),
        )
        .route("/callback/batch/:batch_id", get(get_batch_results))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
