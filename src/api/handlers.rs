use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::models::{IncidentDocument, PipelineEvent, PipelineRun};
use crate::search::IndexStats;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};
use validator::Validate;

/// Service info
pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "incident-oracle",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational",
    }))
}

/// Health check endpoint
///
/// Degraded (503) when the document store does not answer.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut services = HashMap::new();
    services.insert("api".to_string(), "healthy".to_string());

    let status = match state.store.stats().await {
        Ok(_) => {
            services.insert(state.store.name().to_string(), "healthy".to_string());
            StatusCode::OK
        }
        Err(e) => {
            warn!(error = %e, store = state.store.name(), "Document store health check failed");
            services.insert(state.store.name().to_string(), format!("unhealthy: {e}"));
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    let body = HealthResponse {
        status: if status == StatusCode::OK {
            "healthy"
        } else {
            "degraded"
        }
        .to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        services,
    };

    (status, Json(body))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub services: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeRequest {
    #[validate(length(min = 10, message = "description must be at least 10 characters"))]
    pub description: String,
    pub user_id: Option<String>,
}

/// Analyze an incident description and return the complete run
pub async fn analyze_incident(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<PipelineRun>> {
    request.validate()?;

    info!(user_id = ?request.user_id, "Analyze request");
    let run = state.pipeline.run(&request.description).await?;

    Ok(Json(run))
}

/// Analyze an incident description, streaming stage events as they happen
pub async fn analyze_incident_stream(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    request.validate()?;

    info!(user_id = ?request.user_id, "Streaming analyze request");
    let events = state
        .pipeline
        .clone()
        .run_streaming(request.description)
        .map(|event| Ok(to_sse_event(&event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &PipelineEvent) -> Event {
    match Event::default().event(event.kind()).json_data(event) {
        Ok(sse) => sse,
        Err(e) => {
            warn!(error = %e, kind = event.kind(), "Failed to serialize pipeline event");
            Event::default()
                .event("error")
                .data(json!({ "type": "failed", "data": { "error": e.to_string() } }).to_string())
        }
    }
}

/// Fetch one historical incident
pub async fn get_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<String>,
) -> Result<Json<IncidentDocument>> {
    state
        .store
        .get(&incident_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Incident {incident_id} not found")))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub store: IndexStats,
    pub timestamp: DateTime<Utc>,
}

/// Document store statistics
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let store = state.store.stats().await?;

    Ok(Json(StatsResponse {
        store,
        timestamp: Utc::now(),
    }))
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    match crate::metrics::gather_metrics() {
        Ok(metrics) => (StatusCode::OK, metrics),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to gather metrics: {e}"),
        ),
    }
}
