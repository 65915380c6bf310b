//! Router tests driven through `tower::ServiceExt::oneshot`

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use backplane_api::{create_router, AppState};
use backplane_core::BackendError;
use backplane_gateway::{
    AggregatorConfig, BackendRegistry, CommandGate, StatusAggregator, DEFAULT_COMMAND_TIMEOUT,
};
use backplane_probes::MockBackend;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    redis: Arc<MockBackend>,
    postgres: Arc<MockBackend>,
    qdrant: Arc<MockBackend>,
}

fn app(assistant_configured: bool) -> TestApp {
    let redis = Arc::new(MockBackend::demo_key_value("redis"));
    let postgres = Arc::new(MockBackend::demo_relational("postgresql"));
    let elasticsearch = Arc::new(MockBackend::demo_search("elasticsearch"));
    let qdrant = Arc::new(MockBackend::demo_vector("qdrant"));

    let mut registry = BackendRegistry::new();
    registry.register_backend(redis.clone());
    registry.register_backend(postgres.clone());
    registry.register_backend(elasticsearch);
    registry.register_backend(qdrant.clone());

    let aggregator = Arc::new(StatusAggregator::new(
        Arc::new(registry),
        AggregatorConfig::default(),
    ));
    let gate = Arc::new(CommandGate::new(aggregator.clone(), DEFAULT_COMMAND_TIMEOUT));
    let router = create_router(AppState::new(aggregator, gate, assistant_configured));

    TestApp {
        router,
        redis,
        postgres,
        qdrant,
    }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn query(router: &Router, backend: &str, command: &str) -> (StatusCode, Value) {
    send(
        router,
        Method::POST,
        &format!("/v1/backends/{}/query", backend),
        Some(json!({ "command": command })),
    )
    .await
}

#[tokio::test]
async fn health_returns_ok() {
    let app = app(false);
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn status_lists_every_backend() {
    let app = app(false);
    app.qdrant
        .fail_with(BackendError::ConnectionRefused("port 6333".to_string()));

    let (status, body) = send(&app.router, Method::GET, "/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);

    let backends = body["backends"].as_object().unwrap();
    assert_eq!(backends.len(), 4);
    assert_eq!(body["backends"]["redis"]["healthy"], json!(true));
    assert_eq!(body["backends"]["redis"]["kind"], json!("key_value"));
    assert_eq!(body["backends"]["qdrant"]["healthy"], json!(false));
    assert_eq!(
        body["backends"]["qdrant"]["detail"],
        json!("Connection refused: port 6333")
    );
    assert!(body["taken_at"].is_string());
}

#[tokio::test]
async fn status_is_cached_unless_refresh_requested() {
    let app = app(false);
    send(&app.router, Method::GET, "/v1/status", None).await;
    send(&app.router, Method::GET, "/v1/status", None).await;
    assert_eq!(app.redis.health_checks(), 1);

    send(&app.router, Method::GET, "/v1/status?refresh=true", None).await;
    assert_eq!(app.redis.health_checks(), 2);

    send(&app.router, Method::POST, "/v1/status/refresh", None).await;
    assert_eq!(app.redis.health_checks(), 3);
}

#[tokio::test]
async fn count_reports_connected_backends() {
    let app = app(false);
    app.postgres.set_healthy(false);

    let (status, body) = send(&app.router, Method::GET, "/v1/status/count", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "connected": 3, "total": 4, "all_healthy": false })
    );
}

#[tokio::test]
async fn backends_are_listed_in_name_order() {
    let app = app(false);
    let (_, body) = send(&app.router, Method::GET, "/v1/backends", None).await;

    let names: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["elasticsearch", "postgresql", "qdrant", "redis"]);
    assert_eq!(body["items"][0]["href"], json!("/v1/backends/elasticsearch/summary"));
}

#[tokio::test]
async fn summary_for_known_and_unknown_backends() {
    let app = app(false);

    let (status, body) = send(&app.router, Method::GET, "/v1/backends/redis/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["status"], json!("complete"));
    assert_eq!(body["summary"]["session_count"], json!(3));
    assert_eq!(body["summary"]["counter_count"], json!(4));

    let (status, body) =
        send(&app.router, Method::GET, "/v1/backends/mongodb/summary", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("not_found"));
}

#[tokio::test]
async fn details_for_relational_and_unsupported_backends() {
    let app = app(false);

    let (status, body) =
        send(&app.router, Method::GET, "/v1/backends/postgresql/details", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], json!("relational"));
    assert_eq!(body["details"]["status"], json!("complete"));
    assert_eq!(body["details"]["data"]["customers"].as_array().unwrap().len(), 3);
    assert!(body["details"]["data"]["total_sales"].is_number());

    let (status, body) = send(&app.router, Method::GET, "/v1/backends/qdrant/details", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["details"]["status"], json!("unsupported"));

    let (status, _) = send(&app.router, Method::GET, "/v1/backends/mongodb/details", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn details_of_a_down_backend_are_an_error_value() {
    let app = app(false);
    app.redis.set_healthy(false);

    let (status, body) = send(&app.router, Method::GET, "/v1/backends/redis/details", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["details"], json!({ "status": "error", "data": {} }));
}

#[tokio::test]
async fn query_returns_sorted_set_members() {
    let app = app(false);
    let (status, body) = query(&app.router, "redis", "SMEMBERS categories:all").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend"], json!("redis"));
    assert_eq!(body["output"]["type"], json!("list"));
    let members = body["output"]["value"].as_array().unwrap();
    let mut sorted = members.clone();
    sorted.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
    assert_eq!(members, &sorted);
}

#[tokio::test]
async fn query_hash_returns_map() {
    let app = app(false);
    let (status, body) = query(&app.router, "redis", "HGETALL session:user1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"]["type"], json!("map"));
    assert_eq!(body["output"]["value"]["username"], json!("tanaka"));
}

#[tokio::test]
async fn rejected_command_is_400_and_never_executes() {
    let app = app(false);
    let (status, body) = query(&app.router, "postgresql", "DELETE FROM customers").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("bad_request"));
    assert!(body["message"].as_str().unwrap().contains("DELETE"));
    assert_eq!(app.postgres.executions(), 0);
    assert_eq!(app.postgres.health_checks(), 0);
}

#[tokio::test]
async fn unknown_backend_query_is_404() {
    let app = app(false);
    let (status, _) = query(&app.router, "mongodb", "KEYS *").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unhealthy_backend_query_is_503() {
    let app = app(false);
    app.qdrant.set_healthy(false);

    let (status, body) = query(&app.router, "qdrant", "FILTER limit=2").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], json!("service_unavailable"));
    assert_eq!(app.qdrant.executions(), 0);
}

#[tokio::test]
async fn failed_execution_is_502() {
    let app = app(false);
    app.postgres
        .set_execution_error(Some(BackendError::BackendExecution(
            "column \"nope\" does not exist".to_string(),
        )));

    let (status, body) = query(&app.router, "postgresql", "SELECT nope FROM customers").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["message"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn assistant_ready_only_when_configured_and_all_healthy() {
    let unconfigured = app(false);
    let (_, body) = send(&unconfigured.router, Method::GET, "/v1/assistant", None).await;
    assert_eq!(body, json!({ "configured": false, "ready": false }));

    let configured = app(true);
    let (_, body) = send(&configured.router, Method::GET, "/v1/assistant", None).await;
    assert_eq!(body, json!({ "configured": true, "ready": true }));

    configured.redis.set_healthy(false);
    send(&configured.router, Method::POST, "/v1/status/refresh", None).await;
    let (_, body) = send(&configured.router, Method::GET, "/v1/assistant", None).await;
    assert_eq!(body, json!({ "configured": true, "ready": false }));
}
