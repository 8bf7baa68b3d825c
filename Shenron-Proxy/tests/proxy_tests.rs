use reqwest::StatusCode;
use serde_json::{json, Value};
use shenron_proxy::{app, AppState, Config};
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serve the proxy on an ephemeral port and return its `/api.php` URL.
async fn spawn_proxy(backend_url: String, lm_studio_url: String) -> String {
    let state = AppState::new(Config::new(0, backend_url, lm_studio_url));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    format!("http://{address}/api.php")
}

async fn proxy_for(backend: &MockServer, lm: &MockServer) -> String {
    spawn_proxy(backend.uri(), format!("{}/v1", lm.uri())).await
}

async fn call(url: &str, body: Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_relays_status_and_body() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"status": "degraded"})))
        .mount(&backend)
        .await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, body) = call(&proxy, json!({"action": "health"})).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"status": "degraded"}));
}

#[tokio::test]
async fn test_metrics_relays_backend_payload() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/shenron/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"wishes_granted": 12})))
        .mount(&backend)
        .await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, body) = call(&proxy, json!({"action": "metrics"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["wishes_granted"], 12);
}

#[tokio::test]
async fn test_root_path_serves_actions_too() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "operational"})))
        .mount(&backend)
        .await;

    let proxy = proxy_for(&backend, &lm).await;
    let root = proxy.trim_end_matches("api.php").to_string();
    let (status, body) = call(&root, json!({"action": "health"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
}

#[tokio::test]
async fn test_start_wish_forwards_normalized_payload() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/shenron/grant-wish"))
        .and(body_json(json!({
            "query": "status of the web servers",
            "power_mode": "council",
            "use_rag": true,
            "async_mode": true,
            "agent_mode": true
        })))
        .respond_with(
            ResponseTemplate::new(202).set_body_json(json!({"job_id": "abc", "status": "queued"})),
        )
        .expect(1)
        .mount(&backend)
        .await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, body) = call(
        &proxy,
        json!({
            "action": "start_wish",
            "query": "  status of the web servers  ",
            "agent_mode": "1"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["job_id"], "abc");
}

#[tokio::test]
async fn test_start_wish_keeps_caller_options() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/shenron/grant-wish"))
        .and(body_partial_json(json!({
            "power_mode": "ultra",
            "use_rag": false,
            "agent_mode": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": "xyz"})))
        .expect(1)
        .mount(&backend)
        .await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, _) = call(
        &proxy,
        json!({
            "action": "start_wish",
            "query": "full audit",
            "power_mode": "ultra",
            "use_rag": false,
            "agent_mode": 0
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_start_wish_rejects_blank_query() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, body) = call(&proxy, json!({"action": "start_wish", "query": "   "})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing or empty 'query' parameter");
}

#[tokio::test]
async fn test_wish_status_encodes_job_id() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/shenron/job-status/job%2042"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "running"})))
        .expect(1)
        .mount(&backend)
        .await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, body) = call(&proxy, json!({"action": "wish_status", "job_id": "job 42"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_wish_status_relays_not_found() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/shenron/job-status/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Job not found"})))
        .mount(&backend)
        .await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, body) = call(&proxy, json!({"action": "wish_status", "job_id": "gone"})).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Job not found");
}

#[tokio::test]
async fn test_wish_status_requires_job_id() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, body) = call(&proxy, json!({"action": "wish_status"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing 'job_id' parameter");
}

#[tokio::test]
async fn test_cancel_wish_posts_empty_list() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/shenron/cancel-job/abc"))
        .and(body_json(json!([])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&backend)
        .await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, body) = call(&proxy, json!({"action": "cancel_wish", "job_id": "abc"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_fast_mode_builds_chat_completion() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_json(json!({
            "model": "goku-7b",
            "messages": [{"role": "user", "content": "hello"}],
            "temperature": 0.7,
            "max_tokens": 2048
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "hi"}}]
        })))
        .expect(1)
        .mount(&lm)
        .await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, body) = call(
        &proxy,
        json!({"action": "fast_mode", "warrior_id": "goku-7b", "query": " hello "}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["choices"][0]["message"]["content"], "hi");
}

#[tokio::test]
async fn test_fast_mode_requires_warrior_and_query() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, body) = call(&proxy, json!({"action": "fast_mode", "query": "hello"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing 'warrior_id' or 'query'");

    let (status, _) = call(&proxy, json!({"action": "fast_mode", "warrior_id": "goku-7b"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lm_health_summarizes_models() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "goku-7b"}, {"id": "vegeta-13b"}]
        })))
        .mount(&lm)
        .await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, body) = call(&proxy, json!({"action": "lm_health"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["model_count"], 2);
    assert_eq!(body["models"][1]["id"], "vegeta-13b");
    assert_eq!(body["message"], "LM Studio online");
}

#[tokio::test]
async fn test_lm_health_error_status_is_unavailable() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"data": [{"id": "x"}]})))
        .mount(&lm)
        .await;

    let proxy = proxy_for(&backend, &lm).await;
    let (status, body) = call(&proxy, json!({"action": "lm_health"})).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["model_count"], 0);
    assert_eq!(body["message"], "LM Studio responded with an error");
}

#[tokio::test]
async fn test_lm_health_unreachable() {
    let backend = MockServer::start().await;
    let proxy = spawn_proxy(backend.uri(), "http://127.0.0.1:1/v1".to_string()).await;

    let (status, body) = call(&proxy, json!({"action": "lm_health"})).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "LM Studio unreachable");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_python_heartbeat_requires_operational_status() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "operational"})))
        .up_to_n_times(1)
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "degraded"})))
        .mount(&backend)
        .await;

    let proxy = proxy_for(&backend, &lm).await;

    let (status, body) = call(&proxy, json!({"action": "python_heartbeat"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["latency_ms"].is_u64());
    assert_eq!(body["payload"]["status"], "operational");
    assert_eq!(body["message"], "Python backend heartbeat OK");

    let (status, body) = call(&proxy, json!({"action": "python_heartbeat"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Python backend heartbeat failed");
}

#[tokio::test]
async fn test_python_heartbeat_unreachable() {
    let lm = MockServer::start().await;
    let proxy = spawn_proxy("http://127.0.0.1:1".to_string(), lm.uri()).await;

    let (status, body) = call(&proxy, json!({"action": "python_heartbeat"})).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert!(body["latency_ms"].is_null());
}

#[tokio::test]
async fn test_pass_through_transport_failure_is_500() {
    let lm = MockServer::start().await;
    let proxy = spawn_proxy("http://127.0.0.1:1".to_string(), lm.uri()).await;

    let (status, body) = call(&proxy, json!({"action": "health"})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_action_is_rejected() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    let proxy = proxy_for(&backend, &lm).await;

    let (status, body) = call(&proxy, json!({"action": "dance"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Unknown action", "action": "dance"}));
}

#[tokio::test]
async fn test_non_json_body_counts_as_empty() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    let proxy = proxy_for(&backend, &lm).await;

    let response = reqwest::Client::new()
        .post(&proxy)
        .body("not json at all")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "Unknown action", "action": null}));
}

#[tokio::test]
async fn test_preflight_allows_any_origin() {
    let backend = MockServer::start().await;
    let lm = MockServer::start().await;
    let proxy = proxy_for(&backend, &lm).await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, &proxy)
        .header("Origin", "http://shenron.local")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
