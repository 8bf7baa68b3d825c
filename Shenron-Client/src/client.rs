use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::config::PollConfig;
use crate::error::{Result, ShenronError};
use crate::events::WishEvent;
use crate::poller;
use crate::session::WishSession;
use crate::types::*;
use crate::WishApi;

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Async client for the SHENRON wish API.
///
/// Every call is a `POST` to a single endpoint with a JSON body naming the
/// `action`, which is the envelope the SHENRON proxy speaks. The client
/// holds no job state of its own; pair it with a [`WishSession`] to track
/// the wish in flight.
///
/// # Example
/// ```no_run
/// use shenron_client::{PollConfig, ShenronClient, WishRequest, WishSession};
///
/// # async fn example() -> shenron_client::Result<()> {
/// let client = ShenronClient::new("http://127.0.0.1:8080/api.php");
/// let session = WishSession::new();
/// let outcome = client
///     .grant_wish(&session, &WishRequest::auto("status"), &PollConfig::default(), |e| {
///         println!("{:?}", e)
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ShenronClient {
    http: Client,
    endpoint: String,
}

impl ShenronClient {
    /// Create a new client pointing at the proxy's action endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: normalize(endpoint.into()),
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, timeouts, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_action(
        &self,
        body: &Value,
        timeout: Option<Duration>,
        context: &str,
    ) -> Result<reqwest::Response> {
        let mut request = self.http.post(&self.endpoint).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        request.send().await.map_err(|e| ShenronError::Network {
            context: format!("{} ({})", context, self.endpoint),
            source: e,
        })
    }

    /// Read the whole body and decode it. A body that is not the expected
    /// JSON is a [`ShenronError::InvalidResponse`], not a network failure.
    async fn read_json<T: DeserializeOwned>(resp: reqwest::Response, action: &str) -> Result<T> {
        let body = resp.text().await.map_err(|e| ShenronError::Network {
            context: format!("Failed to read {} response", action),
            source: e,
        })?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(action, error = %e, %body, "undecodable response");
            ShenronError::InvalidResponse(format!("Malformed {} response: {}", action, e))
        })
    }

    // ── Health ──────────────────────────────────────────────────────

    /// Check whether the backend answers its health probe.
    pub async fn health(&self) -> Result<bool> {
        let resp = self
            .post_action(
                &json!({"action": "health"}),
                Some(Duration::from_secs(5)),
                "Cannot reach SHENRON",
            )
            .await?;
        Ok(resp.status().is_success())
    }

    /// Measure backend liveness and latency through the proxy.
    pub async fn heartbeat(&self) -> Result<Heartbeat> {
        let resp = self
            .post_action(
                &json!({"action": "python_heartbeat"}),
                Some(Duration::from_secs(10)),
                "Cannot reach SHENRON",
            )
            .await?;
        // 503 still carries a summary body.
        let status = resp.status();
        match Self::read_json::<Heartbeat>(resp, "python_heartbeat").await {
            Ok(heartbeat) => Ok(heartbeat),
            Err(ShenronError::InvalidResponse(_)) if !status.is_success() => Ok(Heartbeat {
                success: false,
                latency_ms: None,
                message: Some(format!("Heartbeat failed with HTTP {}", status.as_u16())),
            }),
            Err(e) => Err(e),
        }
    }

    // ── Wish lifecycle ──────────────────────────────────────────────

    /// Queue a wish. Returns the backend's job ticket.
    pub async fn start_wish(&self, request: &WishRequest) -> Result<WishTicket> {
        let mut body = serde_json::to_value(request)?;
        body["action"] = json!("start_wish");

        let resp = self
            .post_action(&body, None, "Unable to queue wish")
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status, %body, "failed to queue wish");
            return Err(ShenronError::Http { status, body });
        }

        let json: Value = Self::read_json(resp, "start_wish").await?;
        parse_ticket(&json)
    }

    /// Fetch the status of a job. Returns `None` if the backend does not
    /// know the job (yet).
    pub async fn wish_status(&self, job_id: &str) -> Result<Option<WishStatus>> {
        let body = json!({"action": "wish_status", "job_id": job_id});
        let resp = self
            .post_action(&body, None, "Unable to fetch job status")
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(job_id, status, %body, "failed to fetch job status");
            return Err(ShenronError::Http { status, body });
        }

        let status = Self::read_json::<WishStatus>(resp, "wish_status").await?;
        Ok(Some(status))
    }

    /// Ask the backend to cancel a job. Returns whether it acknowledged.
    pub async fn cancel_wish(&self, job_id: &str) -> Result<bool> {
        let body = json!({"action": "cancel_wish", "job_id": job_id});
        let resp = self
            .post_action(&body, Some(Duration::from_secs(10)), "Unable to cancel wish")
            .await?;
        let json: Value = resp.json().await.unwrap_or_default();
        Ok(json.get("success").and_then(Value::as_bool).unwrap_or(false))
    }

    /// Submit a wish and poll it to a terminal state.
    ///
    /// See [`poller::grant_wish`] for the full contract.
    pub async fn grant_wish<F>(
        &self,
        session: &WishSession,
        request: &WishRequest,
        config: &PollConfig,
        on_event: F,
    ) -> Result<WishOutcome>
    where
        F: FnMut(WishEvent),
    {
        poller::grant_wish(self, session, request, config, on_event).await
    }
}

impl WishApi for ShenronClient {
    async fn start_wish(&self, request: &WishRequest) -> Result<WishTicket> {
        ShenronClient::start_wish(self, request).await
    }

    async fn wish_status(&self, job_id: &str) -> Result<Option<WishStatus>> {
        ShenronClient::wish_status(self, job_id).await
    }

    async fn cancel_wish(&self, job_id: &str) -> Result<bool> {
        ShenronClient::cancel_wish(self, job_id).await
    }
}

fn parse_ticket(json: &Value) -> Result<WishTicket> {
    let job_id = json
        .get("job_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty());

    match job_id {
        Some(id) => Ok(WishTicket {
            job_id: id.to_string(),
            status: json
                .get("status")
                .and_then(Value::as_str)
                .map(JobStatus::from_wire)
                .unwrap_or_default(),
        }),
        None => {
            tracing::error!(response = %json, "start_wish response carried no job id");
            let message = json
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Failed to start wish job");
            Err(ShenronError::SubmissionFailed(message.to_string()))
        }
    }
}
