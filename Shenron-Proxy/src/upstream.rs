//! Outbound HTTP to the Python backend and LM Studio.

use std::time::Duration;

use axum::body::Bytes;
use reqwest::{
    header::ACCEPT,
    Client, Method, StatusCode, Url,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ProxyError, Result};

/// Status and raw body of an upstream answer.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Reply {
    /// The body as a JSON object, or an empty map when it is anything else.
    pub fn json_object(&self) -> Map<String, Value> {
        serde_json::from_slice(&self.body).unwrap_or_default()
    }
}

/// Send one request and collect the reply. Non-2xx statuses are not errors
/// here; only transport failures and timeouts are.
pub async fn send(
    http: &Client,
    method: Method,
    url: Url,
    payload: Option<&Value>,
    timeout: Duration,
) -> Result<Reply> {
    debug!("{method} {url}");

    let mut request = http
        .request(method, url)
        .header(ACCEPT, "application/json")
        .timeout(timeout);
    if let Some(payload) = payload {
        request = request.json(payload);
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.bytes().await?;

    Ok(Reply { status, body })
}

/// Join `base` with `path`, then append `segment` percent-encoded as a
/// single path segment.
pub fn url(base: &str, path: &str, segment: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(&format!("{base}{path}"))
        .map_err(|e| ProxyError::Upstream(format!("invalid upstream url {base}{path}: {e}")))?;

    if let Some(segment) = segment {
        url.path_segments_mut()
            .map_err(|_| ProxyError::Upstream(format!("upstream url {base} cannot take a path")))?
            .pop_if_empty()
            .push(segment);
    }

    Ok(url)
}
