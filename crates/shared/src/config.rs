//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use crate::observability::ObservabilityConfig;

/// 服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// 场景配置源
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScenesConfig {
    /// 场景 YAML 文件路径
    pub file: PathBuf,
    /// 请求未携带 env 参数时使用的环境名
    pub default_env: String,
    /// 是否监听场景文件变更并自动重载
    pub watch: bool,
    /// 文件变更去抖窗口（毫秒）
    pub debounce_ms: u64,
}

impl Default for ScenesConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("scenes.yaml"),
            default_env: "test".to_string(),
            watch: false,
            debounce_ms: 500,
        }
    }
}

impl ScenesConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// 出站 HTTP 请求配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    pub timeout_secs: u64,
    /// 响应体保留的最大字符数
    pub max_response_chars: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_response_chars: 2000,
        }
    }
}

impl SenderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub server: ServerConfig,
    pub scenes: ScenesConfig,
    pub sender: SenderConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. 环境变量（CALLBACK_ 前缀，`__` 分隔层级，如 CALLBACK_SERVER__PORT -> server.port）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("CALLBACK_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(service_name, &env, Path::new(&config_dir))
    }

    /// 从指定目录加载配置，便于测试和 CLI 覆盖环境名
    pub fn load_from(service_name: &str, env: &str, config_dir: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            // 字段名自身含下划线（default_env），层级分隔符使用双下划线
            .add_source(
                Environment::with_prefix("CALLBACK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.observability.service_name = config.service_name.clone();
        Ok(config)
    }

    /// 获取服务地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
