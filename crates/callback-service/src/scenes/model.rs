//! 场景配置模型
//!
//! 定义场景（Scene）、场景编排（Scenario）与配置快照（Snapshot），
//! 以及 YAML 配置文件到快照的解析逻辑。
//!
//! 配置文件结构：
//!
//! ```yaml
//! environments:
//!   test:
//!     base_url: http://localhost:9000
//! scenes:
//!   order-paid:
//!     name: 订单支付回调
//!     url: "{{base_url}}/callback/pay"
//!     method: post
//!     headers:
//!       Content-Type: application/json
//!     body: '{"order_id": "{{order_id}}"}'
//!     defaults:
//!       order_id: ORD-001
//! scenarios:
//!   full-order-flow:
//!     name: 完整订单流程
//!     steps:
//!       - scene: order-paid
//!         delay_after: 1.5
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use callback_shared::error::{CallbackError, Result};

use crate::Variables;
use crate::template::value_to_string;

/// 单个回调场景
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// 场景唯一标识（配置文件中的键）
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 请求 URL 模板
    pub url: String,
    /// 大写的 HTTP 方法
    pub method: String,
    /// 请求头，值为模板
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// 请求体模板，为空时不发送请求体
    #[serde(default)]
    pub body: String,
    /// 场景默认变量，优先级最低
    #[serde(default)]
    pub defaults: Variables,
}

/// 场景编排中的单个步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// 引用的场景 ID，加载时不校验是否存在
    pub scene: String,
    /// 执行后等待的秒数
    #[serde(default)]
    pub delay_after: f64,
}

/// 场景编排：按顺序执行的一组场景
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

/// 悬空的步骤引用（引用了不存在的场景）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingStep {
    pub scenario_id: String,
    pub step_index: usize,
    pub scene_id: String,
}

/// 一次完整加载得到的配置快照
///
/// 快照加载后不可变，重载时整体替换。
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub environments: BTreeMap<String, Variables>,
    pub scenes: BTreeMap<String, Arc<Scene>>,
    pub scenarios: BTreeMap<String, Arc<Scenario>>,
    /// 配置来源文件
    pub source: PathBuf,
    pub loaded_at: DateTime<Local>,
}

impl Snapshot {
    /// 空快照
    pub fn empty(source: impl Into<PathBuf>) -> Self {
        Self {
            environments: BTreeMap::new(),
            scenes: BTreeMap::new(),
            scenarios: BTreeMap::new(),
            source: source.into(),
            loaded_at: Local::now(),
        }
    }

    /// 从 YAML 文本解析快照
    pub fn parse(content: &str, source: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::empty(source));
        }

        let raw: Option<RawConfig> = serde_yaml::from_str(content)?;
        let raw = raw.unwrap_or_default();

        let environments = raw
            .environments
            .into_iter()
            .map(|(name, vars)| (name, vars.unwrap_or_default()))
            .collect();

        let scenes = raw
            .scenes
            .into_iter()
            .map(|(id, scene)| {
                let scene = scene.unwrap_or_default().into_scene(&id);
                (id, Arc::new(scene))
            })
            .collect();

        let mut scenarios = BTreeMap::new();
        for (id, scenario) in raw.scenarios {
            let scenario = scenario.unwrap_or_default().into_scenario(&id)?;
            scenarios.insert(id, Arc::new(scenario));
        }

        Ok(Self {
            environments,
            scenes,
            scenarios,
            source: source.to_path_buf(),
            loaded_at: Local::now(),
        })
    }

    pub fn scene(&self, id: &str) -> Option<Arc<Scene>> {
        self.scenes.get(id).cloned()
    }

    pub fn scenario(&self, id: &str) -> Option<Arc<Scenario>> {
        self.scenarios.get(id).cloned()
    }

    /// 获取环境变量，未知环境返回空映射
    pub fn env_variables(&self, env: &str) -> Variables {
        self.environments.get(env).cloned().unwrap_or_default()
    }

    /// 查找引用了不存在场景的步骤
    pub fn dangling_steps(&self) -> Vec<DanglingStep> {
        self.scenarios
            .values()
            .flat_map(|scenario| {
                scenario
                    .steps
                    .iter()
                    .enumerate()
                    .filter(|(_, step)| !self.scenes.contains_key(&step.scene))
                    .map(|(step_index, step)| DanglingStep {
                        scenario_id: scenario.id.clone(),
                        step_index,
                        scene_id: step.scene.clone(),
                    })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// 原始配置结构
// ---------------------------------------------------------------------------

/// YAML 中的空值（如 `scenes:` 后不写内容）按默认值处理
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    environments: BTreeMap<String, Option<Variables>>,
    #[serde(default, deserialize_with = "null_as_default")]
    scenes: BTreeMap<String, Option<RawScene>>,
    #[serde(default, deserialize_with = "null_as_default")]
    scenarios: BTreeMap<String, Option<RawScenario>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawScene {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    url: String,
    #[serde(default)]
    method: Option<String>,
    /// 允许 `X-Version: 2` 这类非字符串写法
    #[serde(default, deserialize_with = "null_as_default")]
    headers: BTreeMap<String, Value>,
    /// 字符串模板；写成映射或列表时序列化为 JSON 文本
    #[serde(default)]
    body: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    defaults: Variables,
}

impl RawScene {
    fn into_scene(self, id: &str) -> Scene {
        let method = self
            .method
            .filter(|m| !m.trim().is_empty())
            .map(|m| m.trim().to_uppercase())
            .unwrap_or_else(|| "POST".to_string());

        let headers = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v).into_owned()))
            .collect();

        Scene {
            id: id.to_string(),
            name: self.name.unwrap_or_else(|| id.to_string()),
            description: self.description,
            url: self.url,
            method,
            headers,
            body: value_to_string(&self.body).into_owned(),
            defaults: self.defaults,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawScenario {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    steps: Vec<RawStep>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStep {
    #[serde(default, deserialize_with = "null_as_default")]
    scene: String,
    #[serde(default, deserialize_with = "null_as_default")]
    delay_after: f64,
}

impl RawScenario {
    fn into_scenario(self, id: &str) -> Result<Scenario> {
        let mut steps = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.into_iter().enumerate() {
            // 负数、NaN、无穷大以及超出 Duration 范围的值都不接受
            if Duration::try_from_secs_f64(step.delay_after).is_err() {
                return Err(CallbackError::InvalidConfig(format!(
                    "批量场景 {} 第 {} 步的 delay_after 必须为有效的非负秒数: {}",
                    id, index, step.delay_after
                )));
            }
            steps.push(ScenarioStep {
                scene: step.scene,
                delay_after: step.delay_after,
            });
        }

        Ok(Scenario {
            id: id.to_string(),
            name: self.name.unwrap_or_else(|| id.to_string()),
            description: self.description,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"
environments:
  test:
    base_url: http://localhost:9000
    tenant: 7
  empty:
scenes:
  order-paid:
    name: 订单支付回调
    description: 模拟支付成功
    url: "{{base_url}}/callback/pay"
    method: put
    headers:
      Content-Type: application/json
      X-Version: 2
    body: '{"order_id": "{{order_id}}"}'
    defaults:
      order_id: ORD-001
      amount: 99.5
  minimal:
    url: http://example.com
  structured-body:
    url: http://example.com
    body:
      id: "{{id}}"
scenarios:
  full-order-flow:
    name: 完整订单流程
    steps:
      - scene: order-paid
        delay_after: 1.5
      - scene: ghost
      - scene: minimal
        delay_after: 0
"#;

    fn parse(content: &str) -> Result<Snapshot> {
        Snapshot::parse(content, Path::new("scenes.yaml"))
    }

    #[test]
    fn test_parse_full_config() {
        let snapshot = parse(SAMPLE).unwrap();

        assert_eq!(snapshot.environments.len(), 2);
        assert_eq!(snapshot.scenes.len(), 3);
        assert_eq!(snapshot.scenarios.len(), 1);

        let scene = snapshot.scene("order-paid").unwrap();
        assert_eq!(scene.id, "order-paid");
        assert_eq!(scene.name, "订单支付回调");
        assert_eq!(scene.method, "PUT");
        assert_eq!(scene.headers["X-Version"], "2");
        assert_eq!(scene.body, r#"{"order_id": "{{order_id}}"}"#);
        assert_eq!(scene.defaults["order_id"], json!("ORD-001"));
        assert_eq!(scene.defaults["amount"], json!(99.5));
    }

    #[test]
    fn test_scene_defaults_for_missing_fields() {
        let snapshot = parse(SAMPLE).unwrap();
        let scene = snapshot.scene("minimal").unwrap();

        assert_eq!(scene.name, "minimal");
        assert_eq!(scene.method, "POST");
        assert_eq!(scene.description, "");
        assert_eq!(scene.body, "");
        assert!(scene.headers.is_empty());
        assert!(scene.defaults.is_empty());
    }

    #[test]
    fn test_structured_body_serialized_as_json() {
        let snapshot = parse(SAMPLE).unwrap();
        let scene = snapshot.scene("structured-body").unwrap();
        assert_eq!(scene.body, r#"{"id":"{{id}}"}"#);
    }

    #[test]
    fn test_scenario_steps_keep_order() {
        let snapshot = parse(SAMPLE).unwrap();
        let scenario = snapshot.scenario("full-order-flow").unwrap();

        let ids: Vec<_> = scenario.steps.iter().map(|s| s.scene.as_str()).collect();
        assert_eq!(ids, vec!["order-paid", "ghost", "minimal"]);
        assert_eq!(scenario.steps[0].delay_after, 1.5);
        assert_eq!(scenario.steps[1].delay_after, 0.0);
    }

    #[test]
    fn test_env_variables_unknown_env_is_empty() {
        let snapshot = parse(SAMPLE).unwrap();
        assert_eq!(snapshot.env_variables("test")["tenant"], json!(7));
        assert!(snapshot.env_variables("empty").is_empty());
        assert!(snapshot.env_variables("prod").is_empty());
    }

    #[test]
    fn test_dangling_steps() {
        let snapshot = parse(SAMPLE).unwrap();
        assert_eq!(
            snapshot.dangling_steps(),
            vec![DanglingStep {
                scenario_id: "full-order-flow".to_string(),
                step_index: 1,
                scene_id: "ghost".to_string(),
            }]
        );
    }

    #[test]
    fn test_empty_document() {
        let snapshot = parse("").unwrap();
        assert!(snapshot.scenes.is_empty());

        let snapshot = parse("scenes:\nscenarios:\n").unwrap();
        assert!(snapshot.scenes.is_empty());
        assert!(snapshot.scenarios.is_empty());
    }

    #[test]
    fn test_negative_delay_rejected() {
        let content = "scenarios:\n  s:\n    steps:\n      - scene: a\n        delay_after: -1\n";
        let err = parse(content).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_delay_out_of_duration_range_rejected() {
        for delay in ["1e20", ".inf", ".nan"] {
            let content = format!(
                "scenarios:\n  big:\n    steps:\n      - scene: a\n        delay_after: {delay}\n"
            );
            let err = parse(&content).unwrap_err();
            assert_eq!(err.code(), "INVALID_CONFIG", "delay_after: {delay}");
        }
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(parse("scenes: [unclosed"), Err(CallbackError::Parse(_))));
    }
}
