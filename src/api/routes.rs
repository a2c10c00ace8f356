//! API route definitions.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use crate::filter::{EventFilter, QueryFilter};
use crate::model::IncidentRecord;
use crate::pipeline::RunOptions;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/pipeline", post(run_pipeline))
        .route("/filter", get(get_filter).put(set_filter).delete(clear_filter))
}

fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": { "message": message.into() } })))
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

#[derive(Debug, Deserialize)]
struct PipelineRequest {
    records: Vec<IncidentRecord>,
    #[serde(default)]
    query: Option<QueryFilter>,
    /// Take the stored navigation filter (reading clears it) and scope the run to it.
    #[serde(default)]
    apply_filter: bool,
    #[serde(default)]
    window_minutes: Option<u32>,
}

async fn run_pipeline(State(state): State<AppState>, Json(req): Json<PipelineRequest>) -> ApiResult {
    if req.window_minutes == Some(0) {
        return Err(error(StatusCode::BAD_REQUEST, "window_minutes must be at least 1"));
    }

    let _guard = state.run_lock.lock().await;

    let filter = if req.apply_filter { state.filters.take() } else { None };
    let filter_applied = filter.is_some();
    let options = RunOptions {
        query: req.query,
        filter,
        window_minutes: req.window_minutes,
    };

    let pipeline = state.pipeline.clone();
    let records = req.records;
    let report = tokio::task::spawn_blocking(move || pipeline.run_with(&records, &options))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "pipeline task failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, "pipeline task failed")
        })?;

    Ok(Json(json!({
        "data": report,
        "meta": {
            "run_id": report.run_id,
            "filter_applied": filter_applied,
            "total": report.events.len()
        }
    })))
}

async fn get_filter(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "data": state.filters.get() }))
}

async fn set_filter(State(state): State<AppState>, Json(filter): Json<EventFilter>) -> ApiResult {
    if filter.namespace.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "filter namespace is required"));
    }
    tracing::debug!(resource = %filter.resource, namespace = %filter.namespace, "event filter set");
    state.filters.set(filter.clone());
    Ok(Json(json!({ "data": filter })))
}

async fn clear_filter(State(state): State<AppState>) -> StatusCode {
    state.filters.clear();
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> (AppState, axum::Router) {
        let state = AppState::new(Pipeline::default());
        (state.clone(), crate::api::router(state))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_, app) = app();
        let response = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_pipeline_dedups_records() {
        let (_, app) = app();
        let payload = json!({
            "records": [
                {"id": "a", "category": "pod_oom_restart", "namespace": "prod", "resourceName": "api-7f9-abc",
                 "message": "OOMKilled", "lastSeen": "2024-05-01T10:00:00Z"},
                {"id": "b", "category": "pod_oom_restart", "namespace": "prod", "resourceName": "api-7f9-abc",
                 "message": "OOMKilled", "lastSeen": "2024-05-01T10:01:00Z"}
            ]
        });
        let response = app
            .oneshot(
                Request::post("/api/v1/pipeline")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["meta"]["total"], 1);
        assert_eq!(body["data"]["events"][0]["duplicate_count"], 2);
        assert_eq!(body["data"]["events"][0]["event"]["severity"], "critical");
    }

    #[tokio::test]
    async fn test_zero_window_rejected() {
        let (_, app) = app();
        let response = app
            .oneshot(
                Request::post("/api/v1/pipeline")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"records": [], "window_minutes": 0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_filter_applied_once() {
        let (state, app) = app();
        state.filters.set(EventFilter {
            resource: "checkout".into(),
            namespace: "prod".into(),
            kind: String::new(),
        });
        let payload = json!({
            "apply_filter": true,
            "records": [
                {"id": "a", "namespace": "prod", "resourceName": "checkout-7d8f9-xk2p1", "lastSeen": "2024-05-01T10:00:00Z"},
                {"id": "b", "namespace": "prod", "resourceName": "payments-5f6-abc", "lastSeen": "2024-05-01T10:00:00Z"}
            ]
        });
        let response = app
            .oneshot(
                Request::post("/api/v1/pipeline")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["meta"]["filter_applied"], true);
        assert_eq!(body["data"]["input_records"], 1);
        assert!(state.filters.get().is_none());
    }

    #[test]
    fn test_filter_roundtrip_through_routes() {
        tokio_test::block_on(async {
            let (state, app) = app();
            let response = app
                .clone()
                .oneshot(
                    Request::put("/api/v1/filter")
                        .header("content-type", "application/json")
                        .body(Body::from(r#"{"resource": "web", "namespace": "prod"}"#))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(state.filters.get().map(|f| f.resource), Some("web".to_string()));

            let response = app
                .oneshot(Request::delete("/api/v1/filter").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert!(state.filters.get().is_none());
        });
    }
}
