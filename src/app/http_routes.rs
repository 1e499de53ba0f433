// ==========================================
// 病房床位分配系统 - HTTP 路由
// ==========================================
// POST /allocations/allocate   实际分配
// POST /allocations/simulate   模拟分配 (iteration = 时间偏移天数)
// GET  /allocations?context=   查询分配记录
// GET  /health                 健康检查
// ==========================================

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::AllocateRequest;
use crate::app::common::{map_allocation_error, status_for, ErrorResponse};
use crate::app::state::AppState;

/// 构建路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/allocations/allocate", post(allocate_handler))
        .route("/allocations/simulate", post(simulate_handler))
        .route("/allocations", get(list_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_context")]
    pub context: String,
}

fn default_context() -> String {
    "live".to_string()
}

async fn allocate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AllocateRequest>,
) -> Response {
    match state.allocation_api.allocate(request).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => {
            let (status, body) = map_allocation_error(e);
            (status, Json(body)).into_response()
        }
    }
}

async fn simulate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AllocateRequest>,
) -> Response {
    match state.allocation_api.simulate(request).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => {
            let (status, body) = map_allocation_error(e);
            (status, Json(body)).into_response()
        }
    }
}

async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    match state.allocation_api.list_allocations(&query.context) {
        Ok(allocations) => (StatusCode::OK, Json(allocations)).into_response(),
        Err(e) => (status_for(&e), Json(ErrorResponse::from_api_error(&e))).into_response(),
    }
}

async fn health_handler() -> Response {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "version": crate::VERSION })),
    )
        .into_response()
}
