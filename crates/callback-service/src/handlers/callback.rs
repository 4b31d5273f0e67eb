//! 单个回调场景 API
//!
//! 场景执行、场景查询与配置重载

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
};
use tracing::{info, warn};

use callback_shared::observability::metrics;

use crate::{
    dto::{ReloadResponse, SceneSummary, parse_flag},
    error::{ApiError, Result},
    scenes::Scene,
    sender::CallbackResult,
    state::AppState,
    variables,
};

/// 执行单个回调场景
///
/// POST /api/callback/{scene_id}?env=&dry_run=
///
/// 变量优先级: 场景 defaults < 环境变量 < URL 查询参数 < JSON 请求体
pub async fn execute_callback(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CallbackResult>> {
    // 场景与环境变量取自同一个快照
    let snapshot = state
        .store
        .snapshot()
        .ok_or_else(|| ApiError::SceneNotFound(scene_id.clone()))?;
    let scene = snapshot
        .scene(&scene_id)
        .ok_or_else(|| ApiError::SceneNotFound(scene_id.clone()))?;

    let env = state.resolve_env(query.get("env").map(String::as_str));
    let dry_run = parse_flag(query.get("dry_run").map(String::as_str));

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let body_vars = variables::parse_json_body(content_type, &body);

    let env_vars = snapshot.env_variables(env);
    let merged = variables::merge(&scene, &env_vars, &query, body_vars.as_ref());

    info!(scene = %scene_id, env, dry_run, "执行回调场景");
    let result = state.sender.send(&scene, &merged, dry_run).await;

    Ok(Json(result))
}

/// 列出所有场景
///
/// GET /api/scenes
pub async fn list_scenes(State(state): State<AppState>) -> Json<Vec<SceneSummary>> {
    let scenes = state
        .store
        .list_scenes()
        .iter()
        .map(|s| SceneSummary::from(s.as_ref()))
        .collect();
    Json(scenes)
}

/// 获取场景详情
///
/// GET /api/scenes/{scene_id}
pub async fn get_scene(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> Result<Json<Scene>> {
    let scene = state
        .store
        .get_scene(&scene_id)
        .ok_or(ApiError::SceneNotFound(scene_id))?;
    Ok(Json(scene.as_ref().clone()))
}

/// 重新加载场景配置
///
/// POST /api/scenes/reload
pub async fn reload_scenes(State(state): State<AppState>) -> Json<ReloadResponse> {
    match state.store.reload() {
        Ok(snapshot) => {
            metrics::record_config_reload(true, snapshot.scenes.len());
            Json(ReloadResponse::succeeded(
                snapshot.scenes.len(),
                snapshot.scenarios.len(),
            ))
        }
        Err(e) => {
            warn!(error = %e, "场景配置重载失败");
            metrics::record_config_reload(false, 0);
            Json(ReloadResponse::failed(&e))
        }
    }
}
