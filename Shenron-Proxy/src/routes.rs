use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::{
    error::{ProxyError, Result},
    state::AppState,
    upstream::{self, Reply},
};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const METRICS_TIMEOUT: Duration = Duration::from_secs(8);
const START_TIMEOUT: Duration = Duration::from_secs(10);
const STATUS_TIMEOUT: Duration = Duration::from_secs(8);
const CANCEL_TIMEOUT: Duration = Duration::from_secs(5);
const FAST_MODE_TIMEOUT: Duration = Duration::from_secs(60);

type Input = Map<String, Value>;

/// Single entry point for every UI request. The JSON body names an
/// `action`; anything that is not a JSON object counts as `{}`.
pub async fn action_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let input: Input = serde_json::from_slice(&body).unwrap_or_default();
    let action = input.get("action").and_then(Value::as_str).map(str::to_string);

    debug!("Dispatching action {:?}", action);

    match action.as_deref() {
        Some("health") => health(&state).await,
        Some("metrics") => metrics(&state).await,
        Some("lm_health") => lm_health(&state).await,
        Some("start_wish") => start_wish(&state, &input).await,
        Some("wish_status") => wish_status(&state, &input).await,
        Some("cancel_wish") => cancel_wish(&state, &input).await,
        Some("fast_mode") => fast_mode(&state, &input).await,
        Some("python_heartbeat") => python_heartbeat(&state).await,
        _ => {
            warn!("Rejecting unknown action {:?}", action);
            Err(ProxyError::UnknownAction(action))
        }
    }
}

async fn health(state: &AppState) -> Result<Response> {
    let url = upstream::url(&state.config.backend_url, "/health", None)?;
    relay(upstream::send(&state.http, Method::GET, url, None, HEALTH_TIMEOUT).await?)
}

async fn metrics(state: &AppState) -> Result<Response> {
    let url = upstream::url(&state.config.backend_url, "/api/shenron/metrics", None)?;
    relay(upstream::send(&state.http, Method::GET, url, None, METRICS_TIMEOUT).await?)
}

async fn lm_health(state: &AppState) -> Result<Response> {
    let url = upstream::url(&state.config.lm_studio_url, "/models", None)?;

    let body = match upstream::send(&state.http, Method::GET, url, None, HEALTH_TIMEOUT).await {
        Ok(reply) => {
            let success = reply.status.is_success();
            let models = match reply.json_object().remove("data") {
                Some(Value::Array(models)) if success => models,
                _ => Vec::new(),
            };
            json!({
                "success": success,
                "model_count": models.len(),
                "models": models,
                "message": if success { "LM Studio online" } else { "LM Studio responded with an error" },
            })
        }
        Err(e) => {
            warn!("LM Studio unreachable: {e}");
            json!({
                "success": false,
                "error": e.to_string(),
                "message": "LM Studio unreachable",
            })
        }
    };

    Ok(summary(body))
}

async fn start_wish(state: &AppState, input: &Input) -> Result<Response> {
    let query = text(input, "query");
    if query.is_empty() {
        return Err(ProxyError::MissingField("Missing or empty 'query' parameter"));
    }

    let payload = json!({
        "query": query,
        "power_mode": value_or(input, "power_mode", json!("council")),
        "use_rag": value_or(input, "use_rag", json!(true)),
        "async_mode": true,
        "agent_mode": truthy(input.get("agent_mode")),
    });

    let url = upstream::url(&state.config.backend_url, "/api/shenron/grant-wish", None)?;
    relay(upstream::send(&state.http, Method::POST, url, Some(&payload), START_TIMEOUT).await?)
}

async fn wish_status(state: &AppState, input: &Input) -> Result<Response> {
    let job_id = job_id(input)?;
    let url = upstream::url(
        &state.config.backend_url,
        "/api/shenron/job-status/",
        Some(&job_id),
    )?;
    relay(upstream::send(&state.http, Method::GET, url, None, STATUS_TIMEOUT).await?)
}

async fn cancel_wish(state: &AppState, input: &Input) -> Result<Response> {
    let job_id = job_id(input)?;
    let url = upstream::url(
        &state.config.backend_url,
        "/api/shenron/cancel-job/",
        Some(&job_id),
    )?;
    let empty = json!([]);
    relay(upstream::send(&state.http, Method::POST, url, Some(&empty), CANCEL_TIMEOUT).await?)
}

async fn fast_mode(state: &AppState, input: &Input) -> Result<Response> {
    let model = input.get("warrior_id").filter(|v| !is_blank(v)).cloned();
    let query = text(input, "query");
    let Some(model) = model.filter(|_| !query.is_empty()) else {
        return Err(ProxyError::MissingField("Missing 'warrior_id' or 'query'"));
    };

    let payload = json!({
        "model": model,
        "messages": [{ "role": "user", "content": query }],
        "temperature": value_or(input, "temperature", json!(0.7)),
        "max_tokens": value_or(input, "max_tokens", json!(2048)),
    });

    let url = upstream::url(&state.config.lm_studio_url, "/chat/completions", None)?;
    relay(upstream::send(&state.http, Method::POST, url, Some(&payload), FAST_MODE_TIMEOUT).await?)
}

async fn python_heartbeat(state: &AppState) -> Result<Response> {
    let url = upstream::url(&state.config.backend_url, "/health", None)?;
    let started = Instant::now();

    let body = match upstream::send(&state.http, Method::GET, url, None, HEALTH_TIMEOUT).await {
        Ok(reply) => {
            let latency_ms = started.elapsed().as_millis() as u64;
            let payload = reply.json_object();
            let success = reply.status.is_success()
                && payload.get("status").and_then(Value::as_str) == Some("operational");
            json!({
                "success": success,
                "latency_ms": latency_ms,
                "payload": payload,
                "message": if success { "Python backend heartbeat OK" } else { "Python backend heartbeat failed" },
            })
        }
        Err(e) => {
            warn!("Python backend heartbeat failed: {e}");
            json!({
                "success": false,
                "latency_ms": null,
                "error": e.to_string(),
                "message": "Python backend heartbeat failed",
            })
        }
    };

    Ok(summary(body))
}

/// Pass the upstream status and body through untouched.
fn relay(reply: Reply) -> Result<Response> {
    Ok((reply.status, [(CONTENT_TYPE, "application/json")], reply.body).into_response())
}

/// 200 when the summary reports success, 503 otherwise.
fn summary(body: Value) -> Response {
    let status = if body["success"] == Value::Bool(true) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

fn text<'a>(input: &'a Input, key: &str) -> &'a str {
    input.get(key).and_then(Value::as_str).unwrap_or("").trim()
}

fn job_id(input: &Input) -> Result<String> {
    match input.get("job_id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ProxyError::MissingField("Missing 'job_id' parameter")),
    }
}

fn value_or(input: &Input, key: &str, default: Value) -> Value {
    match input.get(key) {
        Some(v) if !v.is_null() => v.clone(),
        _ => default,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Loose truthiness: `null`, `false`, `0`, `""`, `"0"` and empty
/// collections are false.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty() && s != "0",
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(value: Value) -> Input {
        match value {
            Value::Object(map) => map,
            _ => panic!("test input must be an object"),
        }
    }

    #[test]
    fn test_truthy() {
        assert!(!truthy(None));
        assert!(!truthy(Some(&json!(null))));
        assert!(!truthy(Some(&json!(false))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&json!("0"))));
        assert!(!truthy(Some(&json!([]))));
        assert!(truthy(Some(&json!(true))));
        assert!(truthy(Some(&json!(1))));
        assert!(truthy(Some(&json!("yes"))));
    }

    #[test]
    fn test_text_trims_and_ignores_non_strings() {
        let input = input(json!({ "query": "  status  ", "count": 3 }));
        assert_eq!(text(&input, "query"), "status");
        assert_eq!(text(&input, "count"), "");
        assert_eq!(text(&input, "missing"), "");
    }

    #[test]
    fn test_job_id() {
        assert_eq!(job_id(&input(json!({ "job_id": "abc" }))).unwrap(), "abc");
        assert_eq!(job_id(&input(json!({ "job_id": 42 }))).unwrap(), "42");
        assert!(job_id(&input(json!({ "job_id": "" }))).is_err());
        assert!(job_id(&input(json!({}))).is_err());
    }

    #[test]
    fn test_value_or_skips_null() {
        let input = input(json!({ "power_mode": null, "use_rag": false }));
        assert_eq!(value_or(&input, "power_mode", json!("council")), json!("council"));
        assert_eq!(value_or(&input, "use_rag", json!(true)), json!(false));
    }
}
