//! HTTP API 客户端
//!
//! 供自动化测试调用回调模拟服务。
//!
//! ```rust,ignore
//! let client = CallbackClient::new("http://localhost:8000")?;
//! let vars = json!({"order_id": "ORD-1"}).as_object().cloned().unwrap();
//! let result = client.fire("order-paid", None, false, &vars).await?;
//! assert!(result.success);
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::Variables;
use crate::dto::{HealthResponse, ReloadResponse, SceneSummary, ScenarioSummary};
use crate::scenario::ScenarioResult;
use crate::scenes::{Scenario, Scene};
use crate::sender::CallbackResult;

/// 回调模拟服务客户端
#[derive(Clone)]
pub struct CallbackClient {
    client: Client,
    base_url: String,
}

impl CallbackClient {
    pub fn new(base_url: &str) -> Result<Self> {
        // 批量场景包含步骤间等待，超时需要比单次回调宽松
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("创建 HTTP 客户端失败")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 触发单个回调场景
    ///
    /// `env` 为空时使用服务端默认环境；变量为空时不发送请求体。
    pub async fn fire(
        &self,
        scene_id: &str,
        env: Option<&str>,
        dry_run: bool,
        variables: &Variables,
    ) -> Result<CallbackResult> {
        let request = self.client.post(self.url(&format!("/api/callback/{}", scene_id)));
        self.execute(with_params(request, env, dry_run, variables))
            .await
    }

    /// 触发批量场景，变量作为公共变量应用到所有步骤
    pub async fn fire_scenario(
        &self,
        scenario_id: &str,
        env: Option<&str>,
        dry_run: bool,
        variables: &Variables,
    ) -> Result<ScenarioResult> {
        let request = self
            .client
            .post(self.url(&format!("/api/scenario/{}", scenario_id)));
        self.execute(with_params(request, env, dry_run, variables))
            .await
    }

    pub async fn list_scenes(&self) -> Result<Vec<SceneSummary>> {
        self.get("/api/scenes").await
    }

    pub async fn get_scene(&self, scene_id: &str) -> Result<Scene> {
        self.get(&format!("/api/scenes/{}", scene_id)).await
    }

    pub async fn list_scenarios(&self) -> Result<Vec<ScenarioSummary>> {
        self.get("/api/scenarios").await
    }

    pub async fn get_scenario(&self, scenario_id: &str) -> Result<Scenario> {
        self.get(&format!("/api/scenarios/{}", scenario_id)).await
    }

    /// 热加载配置
    pub async fn reload(&self) -> Result<ReloadResponse> {
        self.execute(self.client.post(self.url("/api/scenes/reload")))
            .await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("/health").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(self.client.get(self.url(path))).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = request.send().await?;
        self.handle_response(resp).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn handle_response<T: DeserializeOwned>(&self, resp: Response) -> Result<T> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp.json().await?)
        } else {
            let error_text = resp.text().await.unwrap_or_default();
            Err(anyhow::anyhow!("API 错误 {}: {}", status, error_text))
        }
    }
}

/// 附加 env / dry_run 查询参数与 JSON 请求体
fn with_params(
    mut request: RequestBuilder,
    env: Option<&str>,
    dry_run: bool,
    variables: &Variables,
) -> RequestBuilder {
    if let Some(env) = env.filter(|e| !e.is_empty()) {
        request = request.query(&[("env", env)]);
    }
    if dry_run {
        request = request.query(&[("dry_run", "true")]);
    }
    if !variables.is_empty() {
        request = request.json(variables);
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn built(request: RequestBuilder) -> reqwest::Request {
        request.build().unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = CallbackClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.url("/health"), "http://localhost:8000/health");
    }

    #[test]
    fn test_with_params_minimal() {
        let client = Client::new();
        let request = built(with_params(
            client.post("http://h/api/callback/a"),
            None,
            false,
            &Variables::new(),
        ));

        assert_eq!(request.url().query(), None);
        assert!(request.body().is_none());
    }

    #[test]
    fn test_with_params_full() {
        let client = Client::new();
        let vars = json!({"order_id": "ORD-1"}).as_object().cloned().unwrap();
        let request = built(with_params(
            client.post("http://h/api/callback/a"),
            Some("staging"),
            true,
            &vars,
        ));

        assert_eq!(request.url().query(), Some("env=staging&dry_run=true"));
        assert_eq!(
            request.headers()["content-type"],
            "application/json"
        );
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, br#"{"order_id":"ORD-1"}"#);
    }
}
