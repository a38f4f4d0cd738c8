//! HTTP trigger surface
//!
//! `POST /cron/daily-analysis` starts a run and answers immediately with the
//! workflow id; progress is read back through `/workflows/{id}` and
//! `/workflows/{id}/events`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::orchestrator::{Orchestrator, TriggerOutcome};
use crate::workflow::{StepEvent, WorkflowRun};

// ── Config ──

pub struct ServeConfig {
    pub bind: String,
    pub port: u16,
    pub cron_secret: String,
}

// ── App State ──

struct AppState {
    orchestrator: Arc<Orchestrator>,
    cron_secret: String,
}

// ── Error Handling ──

enum AppError {
    Unauthorized,
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };
        (status, Json(serde_json::json!({ "ok": false, "error": message }))).into_response()
    }
}

// ── Entrypoint ──

pub async fn serve(orchestrator: Arc<Orchestrator>, config: ServeConfig) -> anyhow::Result<()> {
    let app = router(orchestrator, config.cron_secret);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "devpulse HTTP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router (for testing without binding to a port).
pub fn router(orchestrator: Arc<Orchestrator>, cron_secret: impl Into<String>) -> Router {
    let state = Arc::new(AppState {
        orchestrator,
        cron_secret: cron_secret.into(),
    });
    Router::new()
        .route("/health", get(health))
        .route("/cron/daily-analysis", post(post_daily_analysis))
        .route("/workflows/{id}", get(get_workflow))
        .route("/workflows/{id}/events", get(get_workflow_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Health ──

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

// ── POST /cron/daily-analysis ──

#[derive(Debug, Default, Deserialize)]
struct TriggerBody {
    date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerResponse {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

fn authorized(headers: &HeaderMap, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.trim() == secret)
        .unwrap_or(false)
}

async fn post_daily_analysis(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<TriggerBody>>,
) -> Result<Json<TriggerResponse>, AppError> {
    if !authorized(&headers, &state.cron_secret) {
        warn!("Rejected daily analysis trigger with bad secret");
        return Err(AppError::Unauthorized);
    }

    let body = body.map(|Json(b)| b).unwrap_or_default();
    let date = match body.date.as_deref() {
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| AppError::BadRequest(format!("invalid date '{}': {}", raw, e)))?,
        ),
        None => None,
    };

    let response = match state.orchestrator.trigger(date) {
        TriggerOutcome::Started { workflow_id, date } => TriggerResponse {
            ok: true,
            workflow_id: Some(workflow_id),
            date: Some(date.to_string()),
            skipped: false,
            reason: None,
        },
        TriggerOutcome::Skipped { reason } => TriggerResponse {
            ok: true,
            workflow_id: None,
            date: None,
            skipped: true,
            reason: Some(reason),
        },
    };
    Ok(Json(response))
}

// ── GET /workflows/{id} ──

async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowRun>, AppError> {
    state
        .orchestrator
        .registry()
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("workflow {}", id)))
}

// ── GET /workflows/{id}/events ──

async fn get_workflow_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StepEvent>>, AppError> {
    state
        .orchestrator
        .registry()
        .events(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("workflow {}", id)))
}
