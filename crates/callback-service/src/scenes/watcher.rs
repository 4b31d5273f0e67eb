//! 场景配置文件监听
//!
//! 基于 `notify` 监听场景文件所在目录，文件写入后经 debounce 窗口去抖，
//! 再调用 [`SceneStore::reload`] 重新加载。监听目录而非文件本身，
//! 是为了兼容编辑器"写临时文件再重命名"的保存方式。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use callback_shared::observability::metrics;

use super::store::SceneStore;

/// 场景文件监听器
pub struct SceneWatcher {
    store: Arc<SceneStore>,
    path: PathBuf,
    debounce: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl SceneWatcher {
    pub fn new(store: Arc<SceneStore>, path: impl AsRef<Path>, debounce: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            path: path.as_ref().to_path_buf(),
            debounce,
            shutdown_tx,
        }
    }

    /// 启动监听，返回后台任务句柄
    ///
    /// 底层 watcher 随后台任务一同存活，任务退出时释放。
    pub fn start(&self) -> Result<JoinHandle<()>> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .context("场景文件路径缺少文件名")?;
        let watch_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        // notify 回调运行在其自有线程，通过 channel 转发到 tokio 任务
        let (event_tx, mut event_rx) = mpsc::channel::<()>(16);

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    let relevant = matches!(
                        event.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    ) && event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));

                    if relevant {
                        let _ = event_tx.try_send(());
                    }
                }
                Err(e) => {
                    warn!(error = %e, "文件监听器事件错误");
                }
            })
            .context("创建文件监听器失败")?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .context("启动文件监听失败")?;

        info!(path = %self.path.display(), "场景文件监听已启动");

        let store = self.store.clone();
        let debounce = self.debounce;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            let _watcher = watcher;

            loop {
                tokio::select! {
                    received = event_rx.recv() => {
                        if received.is_none() {
                            break;
                        }
                        // Debounce：等待窗口期后清空积压事件，只重载一次
                        tokio::time::sleep(debounce).await;
                        while event_rx.try_recv().is_ok() {}

                        match store.reload() {
                            Ok(snapshot) => {
                                metrics::record_config_reload(true, snapshot.scenes.len());
                                info!(
                                    scenes = snapshot.scenes.len(),
                                    scenarios = snapshot.scenarios.len(),
                                    "场景文件变更，已重新加载"
                                );
                            }
                            Err(e) => {
                                metrics::record_config_reload(false, 0);
                                error!(error = %e, "场景文件重新加载失败，保留当前配置");
                            }
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("场景文件监听已停止");
                            break;
                        }
                    }
                }
            }
        });

        Ok(handle)
    }

    /// 停止监听
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_file_change_triggers_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenes.yaml");
        fs::write(&path, "scenes:\n  a:\n    url: http://a\n").unwrap();

        let store = Arc::new(SceneStore::new());
        store.load(&path).unwrap();

        let watcher = SceneWatcher::new(store.clone(), &path, Duration::from_millis(50));
        let handle = watcher.start().unwrap();

        fs::write(&path, "scenes:\n  a:\n    url: http://a\n  b:\n    url: http://b\n").unwrap();

        let mut reloaded = false;
        for _ in 0..100 {
            if store.counts().0 == 2 {
                reloaded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(reloaded, "文件变更后应自动重载");

        watcher.stop();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_requires_file_name() {
        let store = Arc::new(SceneStore::new());
        let watcher = SceneWatcher::new(store, "/", Duration::from_millis(10));
        assert!(watcher.start().is_err());
    }
}
