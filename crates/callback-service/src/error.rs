//! API 错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// HTTP API 错误类型
///
/// 发送失败和重载失败都放在正常响应体中返回，这里只剩资源不存在。
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Scene not found: {0}")]
    SceneNotFound(String),
    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SceneNotFound(_) | Self::ScenarioNotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SceneNotFound(_) => "SCENE_NOT_FOUND",
            Self::ScenarioNotFound(_) => "SCENARIO_NOT_FOUND",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": self.to_string(),
            "data": serde_json::Value::Null
        });

        (self.status_code(), axum::Json(body)).into_response()
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_found_response_body() {
        let response = ApiError::SceneNotFound("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "SCENE_NOT_FOUND");
        assert_eq!(body["message"], "Scene not found: nope");
        assert!(body["data"].is_null());
    }

    #[test]
    fn test_scenario_not_found_code() {
        let err = ApiError::ScenarioNotFound("flow".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "SCENARIO_NOT_FOUND");
    }
}
