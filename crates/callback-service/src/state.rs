//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use crate::scenario::ScenarioRunner;
use crate::scenes::SceneStore;
use crate::sender::CallbackDispatcher;

/// Axum 应用共享状态
///
/// 场景存储与发送器通过 Arc 在 handler 间共享
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SceneStore>,
    pub sender: Arc<dyn CallbackDispatcher>,
    /// 请求未指定 env 时使用的环境
    pub default_env: String,
}

impl AppState {
    pub fn new(
        store: Arc<SceneStore>,
        sender: Arc<dyn CallbackDispatcher>,
        default_env: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sender,
            default_env: default_env.into(),
        }
    }

    /// 基于共享发送器的批量场景执行器
    pub fn runner(&self) -> ScenarioRunner {
        ScenarioRunner::new(self.sender.clone())
    }

    /// 解析请求中的环境名，仅在未传 env 时回退到默认环境
    ///
    /// `?env=` 视为名为空串的环境，查不到时环境变量为空。
    pub fn resolve_env<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(self.default_env.as_str())
    }
}
