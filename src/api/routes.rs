//! REST endpoints for engine control and rule CRUD.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::config::ConfigUpdate;
use crate::error::RuleError;
use crate::followup::rule::{NewRule, RulePatch};
use crate::followup::service::FollowUpService;

/// Shared state for the follow-up routes.
#[derive(Clone)]
pub struct ApiState {
    pub service: FollowUpService,
}

/// Build the follow-up REST routes.
pub fn follow_up_routes(service: FollowUpService) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/health", get(health))
        .route("/api/follow-up/stats", get(get_stats))
        .route("/api/follow-up/start", post(start))
        .route("/api/follow-up/stop", post(stop))
        .route("/api/follow-up/process", post(process))
        .route("/api/follow-up/config", patch(update_config))
        .route("/api/follow-up/rules", get(list_rules).post(create_rule))
        .route(
            "/api/follow-up/rules/{id}",
            get(get_rule).patch(update_rule).delete(delete_rule),
        )
        .route("/api/follow-up/rules/{id}/toggle", post(toggle_rule))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "followup-engine"
    }))
}

// ── Engine control ──────────────────────────────────────────────────────

async fn get_stats(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.service.get_stats())
}

async fn start(State(state): State<ApiState>) -> impl IntoResponse {
    state.service.start();
    Json(state.service.get_stats())
}

async fn stop(State(state): State<ApiState>) -> impl IntoResponse {
    state.service.stop();
    Json(state.service.get_stats())
}

/// POST /api/follow-up/process
///
/// Runs one pass and returns its summary.
async fn process(State(state): State<ApiState>) -> Response {
    match state.service.force_process().await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

async fn update_config(
    State(state): State<ApiState>,
    Json(update): Json<ConfigUpdate>,
) -> Response {
    match state.service.update_config(update) {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

// ── Rules ───────────────────────────────────────────────────────────────

async fn list_rules(State(state): State<ApiState>) -> Response {
    match state.service.list_rules().await {
        Ok(rules) => Json(rules).into_response(),
        Err(e) => rule_error(e),
    }
}

async fn create_rule(State(state): State<ApiState>, Json(new): Json<NewRule>) -> Response {
    match state.service.create_rule(new).await {
        Ok(rule) => (StatusCode::CREATED, Json(rule)).into_response(),
        Err(e) => rule_error(e),
    }
}

async fn get_rule(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let Some(rule_id) = parse_id(&id) else {
        return invalid_id();
    };
    match state.service.get_rule(rule_id).await {
        Ok(rule) => Json(rule).into_response(),
        Err(e) => rule_error(e),
    }
}

async fn update_rule(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(patch): Json<RulePatch>,
) -> Response {
    let Some(rule_id) = parse_id(&id) else {
        return invalid_id();
    };
    match state.service.update_rule(rule_id, patch).await {
        Ok(rule) => Json(rule).into_response(),
        Err(e) => rule_error(e),
    }
}

async fn delete_rule(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let Some(rule_id) = parse_id(&id) else {
        return invalid_id();
    };
    match state.service.delete_rule(rule_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => rule_error(e),
    }
}

async fn toggle_rule(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let Some(rule_id) = parse_id(&id) else {
        return invalid_id();
    };
    match state.service.toggle_rule(rule_id).await {
        Ok(rule) => Json(rule).into_response(),
        Err(e) => rule_error(e),
    }
}

fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

fn invalid_id() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "Invalid rule ID"})),
    )
        .into_response()
}

fn rule_error(e: RuleError) -> Response {
    let status = match &e {
        RuleError::NotFound { .. } => StatusCode::NOT_FOUND,
        RuleError::Validation { .. } | RuleError::UnknownPlaceholder { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RuleError::Database(_) => {
            tracing::error!(error = %e, "Rule store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({"error": e.to_string()}))).into_response()
}
