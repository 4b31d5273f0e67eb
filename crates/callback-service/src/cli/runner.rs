//! 命令执行器
//!
//! 负责执行各 CLI 子命令的具体逻辑。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use callback_shared::config::AppConfig;

use crate::routes::build_app;
use crate::scenario::{ScenarioResult, ScenarioRunner};
use crate::scenes::{SceneStore, SceneWatcher};
use crate::sender::{CallbackDispatcher, CallbackResult, HttpSender};
use crate::state::AppState;
use crate::{Variables, variables};

use super::commands::SceneSource;

/// 命令执行器
///
/// 持有已加载的应用配置，CLI 参数在各命令中覆盖对应配置项。
pub struct CommandRunner {
    config: AppConfig,
}

impl CommandRunner {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    fn scenes_path(&self, source: &SceneSource) -> PathBuf {
        source
            .scenes
            .clone()
            .unwrap_or_else(|| self.config.scenes.file.clone())
    }

    fn sender(&self) -> Result<HttpSender> {
        HttpSender::from_config(&self.config.sender).context("初始化回调发送器失败")
    }

    /// 本地命令使用的场景存储，加载失败直接报错
    fn load_store(&self, source: &SceneSource) -> Result<SceneStore> {
        let path = self.scenes_path(source);
        let store = SceneStore::new();
        store
            .load(&path)
            .with_context(|| format!("加载场景配置失败: {}", path.display()))?;
        Ok(store)
    }

    /// 执行 serve 命令
    ///
    /// 场景文件缺失或解析失败时服务依然启动，可在修复后调用 reload 接口。
    pub async fn run_serve(&self, port: Option<u16>, watch: bool, source: &SceneSource) -> Result<()> {
        let path = self.scenes_path(source);
        let store = Arc::new(SceneStore::new());

        match store.load(&path) {
            Ok(snapshot) => {
                for dangling in snapshot.dangling_steps() {
                    warn!(
                        scenario = %dangling.scenario_id,
                        step = dangling.step_index,
                        scene = %dangling.scene_id,
                        "批量场景步骤引用了不存在的场景"
                    );
                }
            }
            Err(e) if e.is_not_found() => {
                warn!(path = %path.display(), "场景配置文件不存在，服务以空配置启动");
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "场景配置加载失败，服务以空配置启动");
            }
        }

        let watcher = if watch || self.config.scenes.watch {
            let watcher = SceneWatcher::new(store.clone(), &path, self.config.scenes.debounce());
            match watcher.start() {
                Ok(_) => Some(watcher),
                Err(e) => {
                    warn!(error = %e, "场景文件监听启动失败，仅支持手动重载");
                    None
                }
            }
        } else {
            None
        };

        let sender: Arc<dyn CallbackDispatcher> = Arc::new(self.sender()?);
        let state = AppState::new(store, sender, self.config.scenes.default_env.clone());
        let app = build_app(state);

        let addr = format!(
            "{}:{}",
            self.config.server.host,
            port.unwrap_or(self.config.server.port)
        );
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("绑定地址失败: {}", addr))?;

        info!("回调模拟服务已启动: http://{}", addr);
        info!("  POST /api/callback/{{scene_id}} - 执行回调场景");
        info!("  POST /api/scenario/{{scenario_id}} - 执行批量场景");
        info!("  GET  /api/scenes | /api/scenarios - 查询配置");
        info!("  POST /api/scenes/reload - 重新加载配置");
        info!("按 Ctrl+C 停止服务");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("服务器运行失败")?;

        if let Some(watcher) = watcher {
            watcher.stop();
        }

        info!("回调模拟服务已停止");
        Ok(())
    }

    /// 执行 fire 命令
    pub async fn run_fire(
        &self,
        scene_id: &str,
        env: Option<&str>,
        dry_run: bool,
        vars: &[(String, String)],
        source: &SceneSource,
    ) -> Result<CallbackResult> {
        let store = self.load_store(source)?;
        let Some(scene) = store.get_scene(scene_id) else {
            bail!("场景不存在: {}\n使用 'list' 查看所有可用场景", scene_id);
        };

        let env = env.unwrap_or(self.config.scenes.default_env.as_str());
        let query: HashMap<String, String> = vars.iter().cloned().collect();
        let merged = variables::merge(&scene, &store.env_variables(env), &query, None);

        info!(scene = scene_id, env, dry_run, "执行回调场景");
        let result = self.sender()?.send(&scene, &merged, dry_run).await;
        print_json(&result)?;

        if !result.success {
            bail!("回调执行失败: {}", result.message);
        }
        Ok(result)
    }

    /// 执行 run 命令
    pub async fn run_scenario(
        &self,
        scenario_id: &str,
        env: Option<&str>,
        dry_run: bool,
        vars: &[(String, String)],
        source: &SceneSource,
    ) -> Result<ScenarioResult> {
        let store = self.load_store(source)?;
        let snapshot = store.snapshot().context("场景配置尚未加载")?;
        let Some(scenario) = snapshot.scenario(scenario_id) else {
            bail!("批量场景不存在: {}\n使用 'list' 查看所有可用批量场景", scenario_id);
        };

        let env = env.unwrap_or(self.config.scenes.default_env.as_str());
        let common: Variables = vars
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        let runner = ScenarioRunner::new(Arc::new(self.sender()?));
        let result = runner.run(&snapshot, &scenario, env, &common, dry_run).await;
        print_json(&result)?;

        if !result.success {
            bail!(
                "批量场景执行失败: {}/{} 步骤成功",
                result.completed_steps,
                result.total_steps
            );
        }
        Ok(result)
    }

    /// 执行 list 命令
    pub fn run_list(&self, source: &SceneSource) -> Result<()> {
        let store = self.load_store(source)?;

        println!("\n场景:");
        println!("{}", "-".repeat(60));
        for scene in store.list_scenes() {
            println!("  {:<24} {:<7} {}", scene.id, scene.method, scene.name);
        }

        println!("\n批量场景:");
        println!("{}", "-".repeat(60));
        for scenario in store.list_scenarios() {
            println!(
                "  {:<24} {} 步  {}",
                scenario.id,
                scenario.steps.len(),
                scenario.name
            );
        }
        println!("{}", "-".repeat(60));
        println!("\n使用示例: callback-server fire <scene> --dry-run");
        Ok(())
    }

    /// 执行 validate 命令
    ///
    /// 悬空的步骤引用只作为警告输出，不视为校验失败。
    pub fn run_validate(&self, source: &SceneSource) -> Result<()> {
        let path = self.scenes_path(source);
        let store = self.load_store(source)?;
        let snapshot = store.snapshot().context("场景配置尚未加载")?;

        println!("配置文件: {}", path.display());
        println!(
            "环境: {}  场景: {}  批量场景: {}",
            snapshot.environments.len(),
            snapshot.scenes.len(),
            snapshot.scenarios.len()
        );

        let dangling = snapshot.dangling_steps();
        if dangling.is_empty() {
            println!("校验通过");
        } else {
            println!("警告: {} 个步骤引用了不存在的场景", dangling.len());
            for step in &dangling {
                println!(
                    "  {} 第 {} 步 -> {}",
                    step.scenario_id, step.step_index, step.scene_id
                );
            }
        }
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "安装 CTRL+C 信号处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "安装 SIGTERM 信号处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("收到关闭信号，正在停止服务...");
}
