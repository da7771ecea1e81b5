//! Navigator HTTP API
//!
//! 启动: cargo run --bin navigator-web --features web
//!
//! - `POST /api/search` `{ "task": "...", "wait": false }`：后台运行，返回 task_id；wait=true 时等待完成并返回最终快照
//! - `POST /api/quick-search` `{ "query": "..." }`：直接搜索
//! - `GET /api/tasks/:id`：任务最新快照
//! - `GET /api/health`：可用能力

#![cfg(feature = "web")]

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use navigator::config::load_config;
use navigator::core::{
    Capabilities, NavigatorCleanup, SearchResult, ShutdownCoordinator, ShutdownManager,
    TaskProgress,
};
use navigator::{observability, Navigator};

#[derive(Clone)]
struct AppState {
    navigator: Arc<Navigator>,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    task: String,
    #[serde(default)]
    wait: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct TaskStarted {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct QuickSearchRequest {
    query: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct QuickSearchResponse {
    query: String,
    results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    capabilities: Capabilities,
}

type ApiError = (StatusCode, String);

fn router(navigator: Arc<Navigator>) -> Router {
    Router::new()
        .route("/api/search", post(api_search))
        .route("/api/quick-search", post(api_quick_search))
        .route("/api/tasks/:id", get(api_task))
        .route("/api/health", get(api_health))
        .with_state(AppState { navigator })
}

/// POST /api/search
async fn api_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<axum::response::Response, ApiError> {
    use axum::response::IntoResponse;

    if req.task.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "task is required".to_string()));
    }
    let (task_id, handle) = state.navigator.spawn_smart_search(req.task);
    if !req.wait {
        return Ok((StatusCode::ACCEPTED, Json(TaskStarted { task_id })).into_response());
    }
    let progress = handle
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(progress).into_response())
}

/// POST /api/quick-search
async fn api_quick_search(
    State(state): State<AppState>,
    Json(req): Json<QuickSearchRequest>,
) -> Json<QuickSearchResponse> {
    let results = state.navigator.quick_search(&req.query).await;
    Json(QuickSearchResponse {
        query: req.query,
        results,
    })
}

/// GET /api/tasks/:id
async fn api_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskProgress>, ApiError> {
    state
        .navigator
        .task(&id)
        .await
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("task {} not found", id)))
}

async fn api_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        capabilities: state.navigator.capabilities(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        Default::default()
    });
    let navigator = Arc::new(Navigator::from_config(&cfg).await);

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();
    let mut coordinator = ShutdownCoordinator::new();
    coordinator.register(NavigatorCleanup::new(Arc::clone(&navigator)));

    let listener = tokio::net::TcpListener::bind(&cfg.web.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.web.bind_addr))?;
    tracing::info!("Navigator API: http://{}", cfg.web.bind_addr);

    let token = shutdown.token();
    axum::serve(listener, router(navigator))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    coordinator.run_cleanup().await;
    Ok(())
}
