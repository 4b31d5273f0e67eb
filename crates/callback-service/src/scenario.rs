//! 批量场景执行器
//!
//! 按顺序执行批量场景中的每一步，步骤之间按 `delay_after` 等待。
//! 单个步骤失败（包括引用的场景不存在）不会中断后续步骤。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use callback_shared::observability::metrics;

use crate::Variables;
use crate::scenes::{Scenario, Snapshot};
use crate::sender::{CallbackDispatcher, CallbackResult};
use crate::variables::merge_for_scenario;

/// 批量场景执行结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// 所有步骤都成功时为 true
    pub success: bool,
    pub scenario_id: String,
    pub scenario_name: String,
    pub total_steps: usize,
    /// 成功的步骤数
    pub completed_steps: usize,
    /// 与步骤一一对应
    pub results: Vec<CallbackResult>,
}

/// 批量场景执行器
#[derive(Clone)]
pub struct ScenarioRunner {
    dispatcher: Arc<dyn CallbackDispatcher>,
}

impl ScenarioRunner {
    pub fn new(dispatcher: Arc<dyn CallbackDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// 执行批量场景
    ///
    /// 整个执行过程只使用传入的同一个快照，执行期间的重载不影响本次执行。
    #[instrument(skip(self, snapshot, scenario, common), fields(scenario = %scenario.id))]
    pub async fn run(
        &self,
        snapshot: &Snapshot,
        scenario: &Scenario,
        env: &str,
        common: &Variables,
        dry_run: bool,
    ) -> ScenarioResult {
        info!(steps = scenario.steps.len(), env, dry_run, "开始执行批量场景");

        let env_vars = snapshot.env_variables(env);
        let mut results = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            let Some(scene) = snapshot.scene(&step.scene) else {
                warn!(step = index, scene = %step.scene, "步骤引用的场景不存在，跳过");
                results.push(CallbackResult::scene_not_found(&step.scene));
                continue;
            };

            let variables = merge_for_scenario(&scene, &env_vars, common);
            let result = self.dispatcher.send(&scene, &variables, dry_run).await;
            debug!(step = index, scene = %scene.id, success = result.success, "步骤执行完成");
            results.push(result);

            if !dry_run && step.delay_after > 0.0 {
                match Duration::try_from_secs_f64(step.delay_after) {
                    Ok(delay) => {
                        debug!(step = index, delay_secs = step.delay_after, "步骤间等待");
                        sleep(delay).await;
                    }
                    Err(_) => {
                        warn!(step = index, delay_secs = step.delay_after, "delay_after 无效，跳过等待");
                    }
                }
            }
        }

        let completed_steps = results.iter().filter(|r| r.success).count();
        let success = completed_steps == results.len();

        info!(
            total_steps = results.len(),
            completed_steps,
            success,
            "批量场景执行完成"
        );
        metrics::record_scenario_run(&scenario.id, success);

        ScenarioResult {
            success,
            scenario_id: scenario.id.clone(),
            scenario_name: scenario.name.clone(),
            total_steps: scenario.steps.len(),
            completed_steps,
            results,
        }
    }
}
