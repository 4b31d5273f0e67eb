//! 场景配置模块
//!
//! - `model` - 场景（Scene）、批量场景（Scenario）与配置快照（Snapshot）
//! - `store` - 持有当前快照的存储，支持原子重载
//! - `watcher` - 场景文件变更自动重载

mod model;
mod store;
mod watcher;

pub use model::{DanglingStep, Scenario, ScenarioStep, Scene, Snapshot};
pub use store::SceneStore;
pub use watcher::SceneWatcher;
