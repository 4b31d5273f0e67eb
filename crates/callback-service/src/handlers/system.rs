//! 服务信息与健康检查

use axum::{Json, extract::State};

use crate::{
    dto::{HealthResponse, ServiceInfo},
    state::AppState,
};

/// GET /
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::current())
}

/// 健康检查
///
/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (scenes_count, scenarios_count) = state.store.counts();
    Json(HealthResponse {
        status: "healthy".to_string(),
        scenes_loaded: state.store.is_loaded(),
        scenes_count,
        scenarios_count,
    })
}
