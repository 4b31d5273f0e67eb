//! Callback Service
//!
//! 配置驱动的 HTTP 回调模拟服务，用于自动化测试中模拟第三方回调。
//!
//! # 主要模块
//!
//! - `template`: `{{var}}` / `{{var|default:x}}` 模板渲染
//! - `scenes`: 场景配置模型、快照存储与文件监听
//! - `variables`: 多来源变量合并
//! - `sender`: 渲染并发送回调请求
//! - `scenario`: 按顺序执行的场景编排
//! - `handlers` / `routes`: HTTP API
//! - `cli`: 命令行入口
//! - `client`: HTTP API 客户端，供集成测试调用
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use callback_service::scenes::SceneStore;
//! use callback_service::sender::{CallbackDispatcher, HttpSender};
//!
//! let store = SceneStore::new();
//! store.load("scenes.yaml")?;
//!
//! let scene = store.get_scene("order-paid").unwrap();
//! let sender = HttpSender::from_config(&Default::default())?;
//! let result = sender.send(&scene, &scene.defaults, true).await;
//! assert!(result.success);
//! ```

pub mod cli;
pub mod client;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod scenario;
pub mod scenes;
pub mod sender;
pub mod state;
pub mod template;
pub mod variables;

/// 变量映射：变量名 -> 任意 JSON 值
pub type Variables = serde_json::Map<String, serde_json::Value>;
