use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Backend processing tier. Selects the poll cadence and timeout budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerMode {
    /// Fast single-warrior response.
    Lightning,
    /// Balanced consensus and synthesis across the council.
    #[default]
    Council,
    /// Maximum accuracy multi-pass.
    Ultra,
}

const ULTRA_KEYWORDS: &[&str] = &[
    "optimize entire",
    "analyze all",
    "fix everything",
    "diagnose and fix",
    "design and deploy",
    "autonomous",
    "make it perfect",
    "best possible",
    "maximum accuracy",
    "full analysis",
    "complete solution",
];

const LIGHTNING_KEYWORDS: &[&str] = &[
    "quick", "fast", "what is", "simple", "restart", "status", "show me", "list", "check",
    "tell me", "what are",
];

impl PowerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerMode::Lightning => "lightning",
            PowerMode::Council => "council",
            PowerMode::Ultra => "ultra",
        }
    }

    /// Pick a power mode from the wording and length of a query.
    ///
    /// Ultra wins over lightning when both match; anything that matches
    /// neither falls back to council.
    pub fn detect(query: &str) -> PowerMode {
        let lower = query.to_lowercase();
        let word_count = query.split_whitespace().count();

        let complex = word_count > 50 || (lower.contains(" and ") && lower.contains(" then "));
        if complex || ULTRA_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return PowerMode::Ultra;
        }

        if word_count < 10 || LIGHTNING_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return PowerMode::Lightning;
        }

        PowerMode::Council
    }
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lightning" => Ok(PowerMode::Lightning),
            "council" => Ok(PowerMode::Council),
            "ultra" => Ok(PowerMode::Ultra),
            other => Err(format!("Unknown power mode: {}", other)),
        }
    }
}

/// Lifecycle state of a wish job as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    ActionRequired,
    /// The backend omitted the status or sent one this client does not know.
    #[default]
    Unknown,
}

impl JobStatus {
    pub fn from_wire(s: &str) -> JobStatus {
        match s {
            "queued" => JobStatus::Queued,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            "action_required" => JobStatus::ActionRequired,
            _ => JobStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::ActionRequired => "action_required",
            JobStatus::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::ActionRequired
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value
            .as_ref()
            .and_then(Value::as_str)
            .map(JobStatus::from_wire)
            .unwrap_or_default())
    }
}

/// Severity attached to a backend job event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Success,
    Error,
    Warning,
    #[default]
    #[serde(other)]
    Info,
}

/// One entry of a job's append-only event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    #[serde(default)]
    pub message: String,
}

/// Parameters for submitting a wish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishRequest {
    pub query: String,
    pub power_mode: PowerMode,
    pub use_rag: bool,
    pub agent_mode: bool,
}

impl WishRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            power_mode: PowerMode::default(),
            use_rag: true,
            agent_mode: false,
        }
    }

    /// Submit with a power mode chosen by [`PowerMode::detect`].
    pub fn auto(query: impl Into<String>) -> Self {
        let query = query.into();
        let mode = PowerMode::detect(&query);
        Self::new(query).power_mode(mode)
    }

    pub fn power_mode(mut self, mode: PowerMode) -> Self {
        self.power_mode = mode;
        self
    }

    pub fn use_rag(mut self, enabled: bool) -> Self {
        self.use_rag = enabled;
        self
    }

    pub fn agent_mode(mut self, enabled: bool) -> Self {
        self.agent_mode = enabled;
        self
    }
}

/// Acknowledgement of a queued wish.
#[derive(Debug, Clone, PartialEq)]
pub struct WishTicket {
    pub job_id: String,
    pub status: JobStatus,
}

/// Status payload for a wish job. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WishStatus {
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub progress: Option<f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub events: Vec<JobEvent>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub pending_actions: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub estimated_remaining: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub elapsed_seconds: Option<f64>,
    #[serde(default)]
    pub power_mode: Option<String>,
}

impl WishStatus {
    /// Backend message, or `Status: <STATUS>` when it is missing or blank.
    pub fn display_message(&self) -> String {
        match self.message.as_deref() {
            Some(m) if !m.trim().is_empty() => m.to_string(),
            _ => format!("Status: {}", self.status.as_str().to_uppercase()),
        }
    }
}

/// Successful terminal outcome of a wish.
#[derive(Debug, Clone, PartialEq)]
pub enum WishOutcome {
    /// The backend completed the wish and returned its result payload.
    Granted { result: Value },
    /// The backend stopped and needs the caller to act on pending follow-ups.
    ActionRequired {
        pending_actions: Vec<Value>,
        result: Option<Value>,
    },
}

impl WishOutcome {
    pub fn result(&self) -> Option<&Value> {
        match self {
            WishOutcome::Granted { result } => Some(result),
            WishOutcome::ActionRequired { result, .. } => result.as_ref(),
        }
    }
}

/// Liveness summary for the backend, as measured by the proxy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Heartbeat {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_f64))
}

// Non-arrays read as empty; malformed entries are skipped.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}
