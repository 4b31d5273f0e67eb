//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use callback_shared::observability::middleware as obs_middleware;

use crate::{handlers, state::AppState};

/// 构建单个回调与场景查询路由
fn callback_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/callback/{scene_id}",
            post(handlers::callback::execute_callback),
        )
        .route("/scenes", get(handlers::callback::list_scenes))
        .route("/scenes/reload", post(handlers::callback::reload_scenes))
        .route("/scenes/{scene_id}", get(handlers::callback::get_scene))
}

/// 构建批量场景路由
fn scenario_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/scenario/{scenario_id}",
            post(handlers::scenario::execute_scenario),
        )
        .route("/scenarios", get(handlers::scenario::list_scenarios))
        .route(
            "/scenarios/{scenario_id}",
            get(handlers::scenario::get_scenario),
        )
}

/// 构建完整的 API 路由（不含 /api 前缀）
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(callback_routes())
        .merge(scenario_routes())
}

/// 构建完整应用
///
/// 挂载 /api 路由、服务信息与健康检查，并附加 CORS、请求追踪和请求 ID 中间件。
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        .nest("/api", api_routes())
        .layer(cors)
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::scenes::SceneStore;
    use crate::sender::{CallbackResult, HttpSender, MockCallbackDispatcher};

    const CONFIG: &str = r#"
environments:
  test:
    host: test.local
    token: env-token
  staging:
    host: staging.local
scenes:
  order-paid:
    name: 订单支付
    description: 支付成功回调
    url: "http://{{host}}/pay/{{order_id}}"
    method: post
    headers:
      Content-Type: application/json
      Authorization: "Bearer {{token}}"
    body: '{"order_id":"{{order_id}}","amount":{{amount}}}'
    defaults:
      order_id: ORD-001
      amount: 100
      token: default-token
  refund:
    url: "http://{{host}}/refund"
scenarios:
  flow:
    name: 下单流程
    steps:
      - scene: order-paid
        delay_after: 5
      - scene: missing
      - scene: refund
"#;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("scenes.yaml");
        fs::write(&path, content).unwrap();
        path
    }

    fn loaded_store(dir: &tempfile::TempDir) -> Arc<SceneStore> {
        let store = Arc::new(SceneStore::new());
        store.load(write_config(dir, CONFIG)).unwrap();
        store
    }

    fn app_with_sender(store: Arc<SceneStore>) -> Router {
        let sender = HttpSender::new(Duration::from_secs(5), 2000).unwrap();
        build_app(AppState::new(store, Arc::new(sender), "test"))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_routes_construction() {
        let _callback = callback_routes();
        let _scenario = scenario_routes();
        let _api = api_routes();
    }

    #[tokio::test]
    async fn test_dry_run_callback_renders_merged_variables() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with_sender(loaded_store(&dir));

        let (status, body) = send(
            app,
            post_json(
                "/api/callback/order-paid?dry_run=true&order_id=ORD-Q&amount=5",
                json!({"amount": 42}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "[Dry Run] preview only, request not sent");
        assert_eq!(body["request_url"], "http://test.local/pay/ORD-Q");
        assert_eq!(body["request_method"], "POST");
        assert_eq!(body["request_headers"]["Authorization"], "Bearer env-token");
        assert_eq!(body["request_body"], r#"{"order_id":"ORD-Q","amount":42}"#);
        assert!(body["response_status"].is_null());
        assert!(body["duration_ms"].is_null());
    }

    #[tokio::test]
    async fn test_callback_uses_requested_env() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with_sender(loaded_store(&dir));

        let (_, body) = send(
            app,
            post_empty("/api/callback/order-paid?env=staging&dry_run=1"),
        )
        .await;

        assert_eq!(body["request_url"], "http://staging.local/pay/ORD-001");
        assert_eq!(body["request_headers"]["Authorization"], "Bearer default-token");
    }

    #[tokio::test]
    async fn test_empty_env_param_is_not_default_env() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with_sender(loaded_store(&dir));

        // env= 指向名为空串的环境，不回退到默认的 test 环境
        let (status, body) =
            send(app, post_empty("/api/callback/order-paid?env=&dry_run=true")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["request_url"], "http://{{host}}/pay/ORD-001");
        assert_eq!(body["request_headers"]["Authorization"], "Bearer default-token");
    }

    #[tokio::test]
    async fn test_callback_ignores_non_json_body() {
        let dir = tempfile::tempdir().unwrap();
        let store = loaded_store(&dir);

        let mut dispatcher = MockCallbackDispatcher::new();
        dispatcher
            .expect_send()
            .withf(|_, vars, dry_run| vars["order_id"] == "ORD-001" && !*dry_run)
            .times(1)
            .returning(|scene, _, _| CallbackResult {
                success: true,
                message: "request succeeded".to_string(),
                scene_id: scene.id.clone(),
                ..Default::default()
            });
        let app = build_app(AppState::new(store, Arc::new(dispatcher), "test"));

        let request = Request::builder()
            .method("POST")
            .uri("/api/callback/order-paid?dry_run=maybe")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(r#"{"order_id": "IGNORED"}"#))
            .unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_unknown_scene_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with_sender(loaded_store(&dir));

        let (status, body) = send(app.clone(), post_empty("/api/callback/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "SCENE_NOT_FOUND");
        assert!(body["data"].is_null());

        let (status, _) = send(app, get("/api/scenes/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unloaded_store_returns_404_for_callbacks() {
        let app = app_with_sender(Arc::new(SceneStore::new()));

        let (status, _) = send(app.clone(), post_empty("/api/callback/order-paid")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(app, get("/api/scenes")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_list_and_get_scenes() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with_sender(loaded_store(&dir));

        let (status, body) = send(app.clone(), get("/api/scenes")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["id"], "order-paid");
        assert_eq!(body[0]["method"], "POST");
        assert_eq!(body[1]["id"], "refund");
        assert_eq!(body[1]["name"], "refund");

        let (status, body) = send(app, get("/api/scenes/order-paid")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "订单支付");
        assert_eq!(body["defaults"]["amount"], 100);
    }

    #[tokio::test]
    async fn test_list_and_get_scenarios() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with_sender(loaded_store(&dir));

        let (_, body) = send(app.clone(), get("/api/scenarios")).await;
        assert_eq!(body[0]["id"], "flow");
        assert_eq!(body[0]["steps_count"], 3);

        let (status, body) = send(app.clone(), get("/api/scenarios/flow")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["steps"][0]["delay_after"], 5.0);

        let (status, body) = send(app, get("/api/scenarios/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "SCENARIO_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_dry_run_scenario_with_missing_step() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with_sender(loaded_store(&dir));

        let (status, body) = send(
            app,
            post_json("/api/scenario/flow?dry_run=yes", json!({"order_id": "ORD-C"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["total_steps"], 3);
        assert_eq!(body["completed_steps"], 2);
        assert_eq!(body["results"][0]["request_url"], "http://test.local/pay/ORD-C");
        assert_eq!(body["results"][1]["message"], "scene not found: missing");
        assert_eq!(body["results"][1]["scene_name"], "");
        assert_eq!(body["results"][2]["request_url"], "http://test.local/refund");
    }

    #[tokio::test]
    async fn test_reload_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = loaded_store(&dir);
        let app = app_with_sender(store.clone());

        fs::write(dir.path().join("scenes.yaml"), "scenes:\n  only:\n    url: http://x\n").unwrap();
        let (status, body) = send(app.clone(), post_empty("/api/scenes/reload")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["scenes_count"], 1);
        assert_eq!(body["scenarios_count"], 0);

        fs::write(dir.path().join("scenes.yaml"), "scenes: [broken").unwrap();
        let (status, body) = send(app, post_empty("/api/scenes/reload")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["scenes_count"], 0);
        assert_eq!(store.counts(), (1, 0));
    }

    #[tokio::test]
    async fn test_reload_without_loaded_file_reports_failure() {
        let app = app_with_sender(Arc::new(SceneStore::new()));

        let (status, body) = send(app, post_empty("/api/scenes/reload")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with_sender(loaded_store(&dir));

        let (status, body) = send(app.clone(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "healthy", "scenes_loaded": true, "scenes_count": 2, "scenarios_count": 1})
        );

        let (status, body) = send(app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["endpoints"]["reload"], "/api/scenes/reload");
    }

    #[tokio::test]
    async fn test_cors_and_request_id_headers() {
        let app = app_with_sender(Arc::new(SceneStore::new()));

        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://example.com")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        assert!(response.headers().contains_key("x-request-id"));
    }
}
