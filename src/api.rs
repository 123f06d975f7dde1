use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Error, Result};
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    clients::health::HealthChecker,
    config::Config,
    error::WorkerError,
    models::{health::HealthStatus, message::{NotificationRequest, Priority}, response::ApiResponse},
    worker::{Worker, WorkerMetrics},
};

pub struct AppState {
    health_checker: HealthChecker,
    workers: Vec<Arc<Worker>>,
    next_worker: AtomicUsize,
}

pub async fn run_api_server(config: Config, workers: Vec<Arc<Worker>>) -> Result<(), Error> {
    let state = Arc::new(AppState {
        health_checker: HealthChecker::new(config.clone()),
        workers,
        next_worker: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(worker_metrics))
        .route("/notifications", post(enqueue_notification))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "API server started");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn worker_metrics(State(state): State<Arc<AppState>>) -> Json<Vec<WorkerMetrics>> {
    Json(state.workers.iter().map(|w| w.metrics()).collect())
}

#[derive(Debug, Deserialize)]
struct EnqueueRequest {
    subscriber_id: String,
    event_type: String,
    priority: Priority,

    #[serde(default)]
    channels: Vec<String>,

    #[serde(default)]
    payload: HashMap<String, serde_json::Value>,

    #[serde(default)]
    scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct EnqueuedNotification {
    trace_id: String,
}

async fn enqueue_notification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EnqueueRequest>,
) -> impl IntoResponse {
    let mut request = NotificationRequest::new(
        body.subscriber_id,
        body.event_type,
        body.priority,
        body.channels,
        body.payload,
    );
    request.scheduled_at = body.scheduled_at;

    let trace_id = request.trace_id.clone();

    // Round-robin admission across the pool; each worker applies its own
    // validation and backpressure.
    let index = state.next_worker.fetch_add(1, Ordering::Relaxed) % state.workers.len();

    match state.workers[index].enqueue(request).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(ApiResponse::success(
                EnqueuedNotification { trace_id },
                "Notification accepted for delivery".to_string(),
            )),
        ),
        Err(e) => {
            let status_code = match &e {
                WorkerError::Validation(_) => StatusCode::BAD_REQUEST,
                WorkerError::Backpressure { .. } => StatusCode::TOO_MANY_REQUESTS,
                WorkerError::NotRunning | WorkerError::ShuttingDown => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                WorkerError::AlreadyRunning => StatusCode::INTERNAL_SERVER_ERROR,
            };

            (
                status_code,
                Json(ApiResponse::error(
                    e.to_string(),
                    "Notification rejected".to_string(),
                )),
            )
        }
    }
}
