use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mediadispatch::{
    api,
    dispatch::Dispatcher,
    error::InvokeError,
    ingest::CallbackService,
    invoker::{Acknowledgement, Invoker},
    models::{AnalysisOutput, AnalyzerRequest},
    state::AppState,
    store::MemoryResultStore,
};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

/// Analyzer double: files whose URL contains "broken" fail analysis.
#[derive(Default)]
struct FakeAnalyzer {
    requests: Mutex<Vec<AnalyzerRequest>>,
}

#[async_trait]
impl Invoker for FakeAnalyzer {
    async fn submit(&self, request: &AnalyzerRequest) -> Result<Acknowledgement, InvokeError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(Acknowledgement::Accepted)
    }

    async fn invoke(&self, request: &AnalyzerRequest) -> Result<AnalysisOutput, InvokeError> {
        self.requests.lock().unwrap().push(request.clone());
        if request.file_url.contains("broken") {
            return Err(InvokeError::Analysis("no video stream".into()));
        }
        Ok(AnalysisOutput {
            results: json!({"duration": 12.5}),
            processing_time: Some(Decimal::new(125, 2)),
            metadata: Map::new(),
        })
    }
}

fn app_with(dispatcher: Dispatcher) -> Router {
    let callbacks = CallbackService::new(Arc::new(MemoryResultStore::new()));
    api::router(AppState::new(dispatcher, callbacks))
}

fn app() -> (Router, Arc<FakeAnalyzer>) {
    let analyzer = Arc::new(FakeAnalyzer::default());
    let dispatcher = Dispatcher::new(analyzer.clone(), 4, Duration::from_secs(5));
    (app_with(dispatcher), analyzer)
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["analyzer_configured"], true);

    let (_, body) = send(&app_with(Dispatcher::unconfigured()), get("/health")).await;
    assert_eq!(body["analyzer_configured"], false);
}

#[tokio::test]
async fn test_callback_round_trip_keeps_exact_values() {
    let (app, _) = app();

    let (status, ack) = send(
        &app,
        json_request(
            "POST",
            "/callback/task-42",
            r#"{
                "status": "completed",
                "batch_id": "batch-7",
                "file_url": "https://cdn.example/a.mp4",
                "results": {"scenes": [{"start": 0.0, "end": 4.2}]},
                "processing_time": 3.14159,
                "metadata": {"worker": "gpu-1"}
            }"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["task_id"], "task-42");
    assert_eq!(ack["batch_id"], "batch-7");
    assert!(ack["timestamp"].is_string());

    let (status, body) = send(&app, get("/callback/task-42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task_id"], "task-42");
    assert_eq!(body["count"], 1);

    let record = &body["results"][0];
    assert_eq!(record["status"], "completed");
    assert_eq!(record["processing_time"], "3.14159");
    assert_eq!(record["results"], json!({"scenes": [{"start": 0.0, "end": 4.2}]}));
    assert_eq!(record["metadata"]["worker"], "gpu-1");
    assert_eq!(record["error_message"], "");
    assert_eq!(record["timestamp"], ack["timestamp"]);
}

#[tokio::test]
async fn test_put_and_unaddressed_callbacks() {
    let (app, _) = app();

    let (status, ack) = send(
        &app,
        json_request("PUT", "/callback/t-put", r#"{"status": "processing"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["task_id"], "t-put");

    let (status, ack) = send(
        &app,
        json_request("POST", "/callback", r#"{"task_id": "t-body", "status": "failed"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["task_id"], "t-body");
}

#[tokio::test]
async fn test_task_query_limit() {
    let (app, _) = app();
    for _ in 0..12 {
        send(
            &app,
            json_request("POST", "/callback/busy", r#"{"status": "processing"}"#),
        )
        .await;
    }

    let (_, body) = send(&app, get("/callback/busy")).await;
    assert_eq!(body["count"], 10);

    let (_, body) = send(&app, get("/callback/busy?limit=2")).await;
    assert_eq!(body["count"], 2);

    let (status, body) = send(&app, get("/callback/busy?limit=lots")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "ValidationError");
}

#[tokio::test]
async fn test_batch_results_with_statistics() {
    let (app, _) = app();
    let callbacks = [
        ("t1", r#"{"status": "processing", "batch_id": "b1"}"#),
        ("t1", r#"{"status": "completed", "batch_id": "b1"}"#),
        ("t2", r#"{"status": "failed", "error": "bad codec", "metadata": {"batch_id": "b1"}}"#),
        ("t3", r#"{"status": "completed", "batch_id": "other"}"#),
    ];
    for (task_id, body) in callbacks {
        let (status, _) = send(
            &app,
            json_request("POST", &format!("/callback/{}", task_id), body),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, get("/callback/batch/b1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["batch_id"], "b1");
    assert_eq!(body["results"].as_array().unwrap().len(), 3);
    assert_eq!(body["statistics"]["total"], 2);
    assert_eq!(body["statistics"]["completed"], 1);
    assert_eq!(body["statistics"]["failed"], 1);

    let (_, body) = send(&app, get("/callback/batch/nothing-here")).await;
    assert_eq!(body["results"], json!([]));
    assert_eq!(body["statistics"]["total"], 0);
}

#[tokio::test]
async fn test_malformed_callback_is_rejected() {
    let (app, _) = app();
    let (status, body) = send(&app, json_request("POST", "/callback/t1", "{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "ValidationError");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_async_dispatch_derives_callback_addresses() {
    let (app, analyzer) = app();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/dispatch",
            r#"{
                "files_url": ["https://cdn.example/a.mp4", "https://cdn.example/b.mp4"],
                "callback_url": "https://me.example/callback/",
                "batch_id": "nightly"
            }"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["mode"], "async");
    assert_eq!(body["batch_id"], "nightly");
    assert_eq!(body["launched"], 2);

    let tasks = body["tasks"].as_array().unwrap();
    for task in tasks {
        let task_id = task["task_id"].as_str().unwrap();
        assert_eq!(
            task["callback_url"],
            format!("https://me.example/callback/{}", task_id)
        );
        assert_eq!(task["status"], "launched");
    }
    assert_ne!(tasks[0]["task_id"], tasks[1]["task_id"]);

    let requests = analyzer.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.batch_id == "nightly"));
}

#[tokio::test]
async fn test_sync_dispatch_aggregates_in_order() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/dispatch",
            r#"{"files_url": [
                "https://cdn.example/a.mp4",
                "https://cdn.example/broken.mp4",
                "https://cdn.example/c.mp4"
            ]}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "sync");
    assert_eq!(body["total_tasks"], 3);
    assert_eq!(body["successful"], 2);
    assert_eq!(body["failed"], 1);

    let results = body["results"].as_array().unwrap();
    for (index, result) in results.iter().enumerate() {
        assert_eq!(result["task_index"], index);
    }
    assert_eq!(results[0]["processing_time"], "1.25");
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["error_kind"], "analysis");
    assert_eq!(results[1]["error"], "no video stream");
}

#[tokio::test]
async fn test_dispatch_structural_errors() {
    let (app, analyzer) = app();

    let (status, body) = send(&app, json_request("POST", "/dispatch", r#"{}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "ValidationError");

    let (status, _) = send(
        &app,
        json_request("POST", "/dispatch", r#"{"file_url": "   "}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(analyzer.requests.lock().unwrap().is_empty());

    let unconfigured = app_with(Dispatcher::unconfigured());
    let (status, body) = send(
        &unconfigured,
        json_request("POST", "/dispatch", r#"{"file_url": "https://cdn.example/a.mp4"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "ConfigurationError");
}

#[tokio::test]
async fn test_dispatched_task_id_correlates_with_callbacks() {
    let (app, analyzer) = app();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/dispatch",
            r#"{
                "file_url": "https://cdn.example/a.mp4",
                "task_id": "episode 7/intro",
                "callback_url": "https://me.example/callback?token=abc"
            }"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let task = &body["tasks"][0];
    assert_eq!(task["task_id"], "episode 7/intro");
    let callback_url = task["callback_url"].as_str().unwrap();
    assert_eq!(
        callback_url,
        "https://me.example/callback/episode%207%2Fintro?token=abc"
    );
    assert_eq!(
        analyzer.requests.lock().unwrap()[0].callback_url.as_deref(),
        Some(callback_url)
    );

    // The worker calls back on the address it was handed.
    let path = url::Url::parse(callback_url).unwrap().path().to_string();
    let (status, ack) = send(
        &app,
        json_request(
            "POST",
            &path,
            r#"{"status": "completed", "results": {"duration": 12.5}}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["task_id"], "episode 7/intro");

    let (status, body) = send(&app, get(&path)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task_id"], "episode 7/intro");
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["status"], "completed");
}

#[tokio::test]
async fn test_unaddressed_callback_does_not_correlate_with_dispatch() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/dispatch",
            r#"{
                "file_url": "https://cdn.example/a.mp4",
                "callback_url": "https://me.example/callback"
            }"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let dispatched = body["tasks"][0]["task_id"].as_str().unwrap().to_string();

    let (status, ack) = send(
        &app,
        json_request("POST", "/callback", r#"{"status": "completed"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let generated = ack["task_id"].as_str().unwrap();
    assert!(!generated.is_empty());
    assert_ne!(generated, dispatched);

    let (_, body) = send(&app, get(&format!("/callback/{}", dispatched))).await;
    assert_eq!(body["count"], 0);

    let (_, body) = send(&app, get(&format!("/callback/{}", generated))).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_dispatch_rejects_duplicate_task_ids() {
    let (app, analyzer) = app();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/dispatch",
            r#"{
                "jobs": [
                    {"file_url": "https://cdn.example/a.mp4", "task_id": "same"},
                    {"file_url": "https://cdn.example/b.mp4", "task_id": "same"}
                ],
                "callback_url": "https://me.example/callback"
            }"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "ValidationError");
    assert!(analyzer.requests.lock().unwrap().is_empty());
}
