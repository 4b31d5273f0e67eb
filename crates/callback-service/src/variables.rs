//! 变量合并
//!
//! 单个回调的优先级（后者覆盖前者）：
//! 场景 defaults < 环境变量 < URL 查询参数 < JSON 请求体
//!
//! 批量场景的优先级：场景 defaults < 环境变量 < 公共变量（请求体）

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::Variables;
use crate::scenes::Scene;

/// 查询参数中的控制字段，不参与变量合并
pub const RESERVED_QUERY_KEYS: [&str; 2] = ["env", "dry_run"];

/// 合并单个回调的变量
pub fn merge(
    scene: &Scene,
    env_vars: &Variables,
    query: &HashMap<String, String>,
    body: Option<&Variables>,
) -> Variables {
    let mut variables = scene.defaults.clone();

    extend(&mut variables, env_vars);

    for (key, value) in query {
        if !RESERVED_QUERY_KEYS.contains(&key.as_str()) {
            variables.insert(key.clone(), Value::String(value.clone()));
        }
    }

    if let Some(body) = body {
        extend(&mut variables, body);
    }

    variables
}

/// 合并批量场景中单个步骤的变量
pub fn merge_for_scenario(scene: &Scene, env_vars: &Variables, common: &Variables) -> Variables {
    let mut variables = scene.defaults.clone();
    extend(&mut variables, env_vars);
    extend(&mut variables, common);
    variables
}

fn extend(target: &mut Variables, layer: &Variables) {
    for (key, value) in layer {
        target.insert(key.clone(), value.clone());
    }
}

/// 是否为 JSON 请求
pub fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.starts_with("application/json"))
}

/// 解析 JSON 请求体中的变量
///
/// 非 JSON 请求、空请求体、解析失败或顶层不是对象时都视为没有变量。
pub fn parse_json_body(content_type: Option<&str>, body: &[u8]) -> Option<Variables> {
    if !is_json_content_type(content_type) || body.is_empty() {
        return None;
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            debug!(kind = json_kind(&other), "请求体不是 JSON 对象，忽略");
            None
        }
        Err(e) => {
            debug!(error = %e, "请求体 JSON 解析失败，忽略");
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
