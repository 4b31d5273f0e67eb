//! 请求/响应数据传输对象

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use callback_shared::error::CallbackError;

use crate::scenes::{Scenario, Scene};

/// 场景列表项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub method: String,
    pub url: String,
}

impl From<&Scene> for SceneSummary {
    fn from(scene: &Scene) -> Self {
        Self {
            id: scene.id.clone(),
            name: scene.name.clone(),
            description: scene.description.clone(),
            method: scene.method.clone(),
            url: scene.url.clone(),
        }
    }
}

/// 批量场景列表项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub steps_count: usize,
}

impl From<&Scenario> for ScenarioSummary {
    fn from(scenario: &Scenario) -> Self {
        Self {
            id: scenario.id.clone(),
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            steps_count: scenario.steps.len(),
        }
    }
}

/// 重新加载结果，失败信息放在响应体中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub success: bool,
    pub message: String,
    pub scenes_count: usize,
    pub scenarios_count: usize,
}

impl ReloadResponse {
    pub fn succeeded(scenes_count: usize, scenarios_count: usize) -> Self {
        Self {
            success: true,
            message: "config reloaded".to_string(),
            scenes_count,
            scenarios_count,
        }
    }

    pub fn failed(err: &CallbackError) -> Self {
        Self {
            success: false,
            message: format!("config reload failed: {}", err),
            scenes_count: 0,
            scenarios_count: 0,
        }
    }
}

/// 健康检查响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub scenes_loaded: bool,
    pub scenes_count: usize,
    pub scenarios_count: usize,
}

/// 服务信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub description: String,
    pub version: String,
    pub endpoints: BTreeMap<String, String>,
}

impl ServiceInfo {
    pub fn current() -> Self {
        let endpoints = [
            ("scenes", "/api/scenes"),
            ("scenarios", "/api/scenarios"),
            ("callback", "/api/callback/{scene_id}"),
            ("scenario", "/api/scenario/{scenario_id}"),
            ("reload", "/api/scenes/reload"),
            ("health", "/health"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            name: "Callback Tool".to_string(),
            description: "HTTP callback simulator for automated testing".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            endpoints,
        }
    }
}

/// 解析布尔型查询参数
///
/// 接受 true/false、1/0、yes/no、on/off（不区分大小写），其余值视为 false。
pub fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        )
    })
}
