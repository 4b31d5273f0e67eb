//! 回调发送器
//!
//! 通过 `CallbackDispatcher` trait 抽象"渲染并发送一个场景"的行为：
//! `HttpSender` 是基于 reqwest 的真实实现，场景编排执行器只依赖 trait，
//! 测试中可替换为 mock。
//!
//! 发送过程中的任何失败（超时、连接错误、非法请求）都折叠为
//! `success = false` 的 [`CallbackResult`]，不会向上传播。

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use callback_shared::config::SenderConfig;
use callback_shared::error::{CallbackError, Result};
use callback_shared::observability::metrics;

use crate::Variables;
use crate::scenes::Scene;
use crate::template::{render, render_dict};

/// Dry Run 结果消息
pub const DRY_RUN_MESSAGE: &str = "[Dry Run] preview only, request not sent";

/// 单次回调执行结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackResult {
    pub success: bool,
    pub message: String,
    pub scene_id: String,
    pub scene_name: String,
    pub request_url: Option<String>,
    pub request_method: Option<String>,
    pub request_headers: Option<BTreeMap<String, String>>,
    pub request_body: Option<String>,
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
    pub duration_ms: Option<f64>,
}

impl CallbackResult {
    /// 失败结果，仅携带场景标识和错误信息
    pub fn failure(
        scene_id: impl Into<String>,
        scene_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            scene_id: scene_id.into(),
            scene_name: scene_name.into(),
            ..Default::default()
        }
    }

    /// 批量场景中引用的场景不存在
    pub fn scene_not_found(scene_id: &str) -> Self {
        Self::failure(scene_id, "", format!("scene not found: {}", scene_id))
    }

    fn with_request(mut self, request: RenderedRequest) -> Self {
        self.request_url = Some(request.url);
        self.request_method = Some(request.method);
        self.request_headers = Some(request.headers);
        self.request_body = request.body;
        self
    }
}

/// 渲染后的请求
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    /// 场景未配置请求体时为 None
    pub body: Option<String>,
}

/// 渲染场景的 URL、请求头和请求体
pub fn render_request(scene: &Scene, variables: &Variables) -> RenderedRequest {
    RenderedRequest {
        url: render(&scene.url, variables),
        method: scene.method.clone(),
        headers: render_dict(&scene.headers, variables),
        body: (!scene.body.is_empty()).then(|| render(&scene.body, variables)),
    }
}

/// 按字符数截断（不会切断多字节字符）
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// 毫秒耗时，保留两位小数
fn duration_millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

/// 回调发送器 trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallbackDispatcher: Send + Sync {
    /// 渲染并发送场景请求；dry_run 时只渲染不发送
    async fn send(&self, scene: &Scene, variables: &Variables, dry_run: bool) -> CallbackResult;
}

/// 基于 reqwest 的 HTTP 发送器
#[derive(Clone)]
pub struct HttpSender {
    client: Client,
    max_response_chars: usize,
}

/// 实际发出请求后拿到的响应
struct SentResponse {
    status: u16,
    body: String,
    duration_ms: f64,
}

impl HttpSender {
    /// 创建发送器，超时作用于整个请求（连接 + 读取响应体）
    pub fn new(timeout: Duration, max_response_chars: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CallbackError::Internal(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            client,
            max_response_chars,
        })
    }

    pub fn from_config(config: &SenderConfig) -> Result<Self> {
        Self::new(config.timeout(), config.max_response_chars)
    }

    async fn execute(&self, request: &RenderedRequest) -> Result<SentResponse> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| CallbackError::Internal(format!("invalid HTTP method: {}", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify)?;
        let duration_ms = duration_millis(start.elapsed());

        Ok(SentResponse {
            status,
            body: truncate_chars(&text, self.max_response_chars),
            duration_ms,
        })
    }
}

/// 把 reqwest 错误归类为超时、传输错误或其他错误
fn classify(err: reqwest::Error) -> CallbackError {
    if err.is_timeout() {
        CallbackError::Timeout
    } else if err.is_builder() {
        CallbackError::Internal(err.to_string())
    } else {
        CallbackError::Transport(err.to_string())
    }
}

#[async_trait]
impl CallbackDispatcher for HttpSender {
    #[instrument(skip(self, scene, variables), fields(scene = %scene.id))]
    async fn send(&self, scene: &Scene, variables: &Variables, dry_run: bool) -> CallbackResult {
        let request = render_request(scene, variables);

        if dry_run {
            debug!(url = %request.url, method = %request.method, "Dry Run，仅渲染请求");
            metrics::record_callback(&scene.id, "dry_run", None);
            return CallbackResult {
                success: true,
                message: DRY_RUN_MESSAGE.to_string(),
                scene_id: scene.id.clone(),
                scene_name: scene.name.clone(),
                ..Default::default()
            }
            .with_request(request);
        }

        match self.execute(&request).await {
            Ok(response) => {
                let success = (200..300).contains(&response.status);
                let message = if success {
                    "request succeeded".to_string()
                } else {
                    format!("HTTP {}", response.status)
                };

                info!(
                    url = %request.url,
                    method = %request.method,
                    status = response.status,
                    duration_ms = response.duration_ms,
                    "回调请求已发送"
                );
                metrics::record_callback(
                    &scene.id,
                    if success { "success" } else { "http_error" },
                    Some(response.duration_ms / 1000.0),
                );

                CallbackResult {
                    success,
                    message,
                    scene_id: scene.id.clone(),
                    scene_name: scene.name.clone(),
                    response_status: Some(response.status),
                    response_body: Some(response.body),
                    duration_ms: Some(response.duration_ms),
                    ..Default::default()
                }
                .with_request(request)
            }
            Err(err) => {
                let (outcome, message) = match &err {
                    CallbackError::Timeout => ("timeout", "request timed out".to_string()),
                    CallbackError::Transport(detail) => {
                        ("transport_error", format!("request error: {}", detail))
                    }
                    other => ("failed", format!("send failed: {}", other)),
                };

                warn!(url = %request.url, error = %err, "回调请求失败");
                metrics::record_callback(&scene.id, outcome, None);

                CallbackResult::failure(&scene.id, &scene.name, message)
            }
        }
    }
}
