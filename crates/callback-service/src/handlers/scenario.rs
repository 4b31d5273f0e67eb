//! 批量场景 API

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
};
use tracing::info;

use crate::{
    Variables,
    dto::{ScenarioSummary, parse_flag},
    error::{ApiError, Result},
    scenario::ScenarioResult,
    scenes::Scenario,
    state::AppState,
    variables,
};

/// 执行批量场景
///
/// POST /api/scenario/{scenario_id}?env=&dry_run=
///
/// 请求体中的变量作为公共变量应用到所有步骤
pub async fn execute_scenario(
    State(state): State<AppState>,
    Path(scenario_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ScenarioResult>> {
    let snapshot = state
        .store
        .snapshot()
        .ok_or_else(|| ApiError::ScenarioNotFound(scenario_id.clone()))?;
    let scenario = snapshot
        .scenario(&scenario_id)
        .ok_or_else(|| ApiError::ScenarioNotFound(scenario_id.clone()))?;

    let env = state.resolve_env(query.get("env").map(String::as_str));
    let dry_run = parse_flag(query.get("dry_run").map(String::as_str));

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let common: Variables = variables::parse_json_body(content_type, &body).unwrap_or_default();

    info!(scenario = %scenario_id, env, dry_run, "执行批量场景");
    let result = state
        .runner()
        .run(&snapshot, &scenario, env, &common, dry_run)
        .await;

    Ok(Json(result))
}

/// 列出所有批量场景
///
/// GET /api/scenarios
pub async fn list_scenarios(State(state): State<AppState>) -> Json<Vec<ScenarioSummary>> {
    let scenarios = state
        .store
        .list_scenarios()
        .iter()
        .map(|s| ScenarioSummary::from(s.as_ref()))
        .collect();
    Json(scenarios)
}

/// 获取批量场景详情
///
/// GET /api/scenarios/{scenario_id}
pub async fn get_scenario(
    State(state): State<AppState>,
    Path(scenario_id): Path<String>,
) -> Result<Json<Scenario>> {
    let scenario = state
        .store
        .get_scenario(&scenario_id)
        .ok_or(ApiError::ScenarioNotFound(scenario_id))?;
    Ok(Json(scenario.as_ref().clone()))
}
