//! 场景配置存储
//!
//! 使用 `ArcSwapOption` 持有当前快照：读取端一次原子 load 拿到完整快照，
//! 重载时整体替换，读取方不会看到新旧混合的数据。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tracing::{debug, info};

use callback_shared::error::{CallbackError, Result};

use super::model::{Scenario, Scene, Snapshot};
use crate::Variables;

/// 场景配置存储
///
/// 尚未加载时所有读取方法返回空结果而不是报错。
#[derive(Default)]
pub struct SceneStore {
    current: ArcSwapOption<Snapshot>,
    /// 最近一次成功加载的配置文件路径，reload 时复用
    source: Mutex<Option<PathBuf>>,
}

impl SceneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加载场景配置文件
    ///
    /// 成功后原子替换当前快照；失败时保留旧快照。
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Arc<Snapshot>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CallbackError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let snapshot = Arc::new(Snapshot::parse(&content, path)?);

        {
            // 持锁完成两次写入，快照与来源路径始终一致
            let mut source = self.source.lock();
            self.current.store(Some(snapshot.clone()));
            *source = Some(path.to_path_buf());
        }

        info!(
            path = %path.display(),
            scenes = snapshot.scenes.len(),
            scenarios = snapshot.scenarios.len(),
            environments = snapshot.environments.len(),
            "场景配置加载完成"
        );

        Ok(snapshot)
    }

    /// 重新加载最近一次成功加载的配置文件
    pub fn reload(&self) -> Result<Arc<Snapshot>> {
        let path = self.source.lock().clone().ok_or_else(|| {
            CallbackError::InvalidState("尚未加载过配置文件，请先调用 load()".to_string())
        })?;

        debug!(path = %path.display(), "重新加载场景配置");
        self.load(path)
    }

    /// 当前快照
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    /// 最近一次成功加载的配置文件路径
    pub fn source(&self) -> Option<PathBuf> {
        self.source.lock().clone()
    }

    pub fn get_scene(&self, id: &str) -> Option<Arc<Scene>> {
        self.current.load().as_ref().and_then(|s| s.scene(id))
    }

    pub fn get_scenario(&self, id: &str) -> Option<Arc<Scenario>> {
        self.current.load().as_ref().and_then(|s| s.scenario(id))
    }

    /// 获取指定环境的变量，未加载或环境不存在时返回空映射
    pub fn env_variables(&self, env: &str) -> Variables {
        self.current
            .load()
            .as_ref()
            .map(|s| s.env_variables(env))
            .unwrap_or_default()
    }

    /// 按 ID 排序列出所有场景
    pub fn list_scenes(&self) -> Vec<Arc<Scene>> {
        self.current
            .load()
            .as_ref()
            .map(|s| s.scenes.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 按 ID 排序列出所有批量场景
    pub fn list_scenarios(&self) -> Vec<Arc<Scenario>> {
        self.current
            .load()
            .as_ref()
            .map(|s| s.scenarios.values().cloned().collect())
            .unwrap_or_default()
    }

    /// (场景数, 批量场景数)
    pub fn counts(&self) -> (usize, usize) {
        self.current
            .load()
            .as_ref()
            .map(|s| (s.scenes.len(), s.scenarios.len()))
            .unwrap_or((0, 0))
    }
}
