//! Learning session HTTP API.
//!
//! - GET  /health
//! - GET  /v1/session
//! - POST /v1/session/start
//! - POST /v1/session/reset
//! - POST /v1/topics/{id}/select
//! - POST /v1/topics/{id}/complete
//! - POST /v1/examples
//! - PUT  /v1/highlight
//! - POST /v1/doubts
//! - GET  /v1/cache/stats
//! - GET  /metrics

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::material::{validate_materials, MaterialInput};
use crate::roadmap::types::TopicId;
use crate::session::{SessionController, SessionError, SessionSnapshot};

/// Application state shared across handlers.
pub struct AppState {
    pub controller: SessionController,
    pub config: Arc<Config>,
    pub start_time: Instant,
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let permissive_cors = state.config.server.permissive_cors;

    let router = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/v1/session", get(get_session))
        .route("/v1/session/start", post(start_session))
        .route("/v1/session/reset", post(reset_session))
        .route("/v1/topics/{id}/select", post(select_topic))
        .route("/v1/topics/{id}/complete", post(complete_topic))
        .route("/v1/examples", post(more_examples))
        .route("/v1/highlight", put(set_highlight))
        .route("/v1/doubts", post(ask_doubt))
        .route("/v1/cache/stats", get(cache_stats))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes)),
        )
        .with_state(state);

    if permissive_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

// ─── Request/Response Types ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub materials: Vec<MaterialInput>,
}

#[derive(Debug, Deserialize)]
pub struct HighlightRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DoubtRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub phase: String,
    pub cache: CacheStatsResponse,
}

/// Cache statistics response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub cached_topics: usize,
    pub prefetching: usize,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::InvalidTransition { .. }
            | SessionError::NotLearning
            | SessionError::NoActiveTopic
            | SessionError::TopicLoading => StatusCode::CONFLICT,
            SessionError::UnknownTopic(_) => StatusCode::NOT_FOUND,
            SessionError::Material(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SessionError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult = Result<Json<SessionSnapshot>, SessionError>;

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot().await)
}

async fn start_session(State(state): State<Arc<AppState>>, Json(req): Json<StartRequest>) -> ApiResult {
    let materials = validate_materials(req.materials, &state.config.materials)?;
    info!(materials = materials.len(), "Start session request");
    Ok(Json(state.controller.start(materials).await?))
}

async fn reset_session(State(state): State<Arc<AppState>>) -> ApiResult {
    Ok(Json(state.controller.reset().await?))
}

async fn select_topic(State(state): State<Arc<AppState>>, Path(id): Path<TopicId>) -> ApiResult {
    Ok(Json(state.controller.select_topic(id).await?))
}

async fn complete_topic(State(state): State<Arc<AppState>>, Path(id): Path<TopicId>) -> ApiResult {
    Ok(Json(state.controller.mark_complete(id).await?))
}

async fn more_examples(State(state): State<Arc<AppState>>) -> ApiResult {
    Ok(Json(state.controller.generate_more_examples().await?))
}

async fn set_highlight(State(state): State<Arc<AppState>>, Json(req): Json<HighlightRequest>) -> ApiResult {
    Ok(Json(state.controller.set_highlight(req.text).await?))
}

async fn ask_doubt(State(state): State<Arc<AppState>>, Json(req): Json<DoubtRequest>) -> ApiResult {
    Ok(Json(state.controller.ask_doubt(&req.question, req.context).await?))
}

async fn cache_stats_of(controller: &SessionController) -> CacheStatsResponse {
    CacheStatsResponse {
        cached_topics: controller.cache().len().await,
        prefetching: controller.tracker().len(),
    }
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    Json(cache_stats_of(&state.controller).await)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        phase: state.controller.phase().await.name().to_string(),
        cache: cache_stats_of(&state.controller).await,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.controller.metrics().encode() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
