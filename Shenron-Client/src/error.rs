use std::time::Duration;

use thiserror::Error;

/// Errors returned by wish submission and polling.
///
/// `action_required` is not represented here; it is a successful
/// [`WishOutcome`](crate::WishOutcome) that asks the caller to follow up.
#[derive(Error, Debug)]
pub enum ShenronError {
    /// The start request succeeded at the HTTP level but carried no job id.
    #[error("{0}")]
    SubmissionFailed(String),

    /// The status lookup kept answering 404 past the tolerance window.
    #[error("Job {job_id} not found. Please try again.")]
    NotFound { job_id: String },

    /// The proxy or backend answered with a non-success HTTP status.
    #[error("SHENRON returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// The backend reported the job as failed.
    #[error("{0}")]
    BackendFailed(String),

    /// The wish was cancelled, locally or by the backend.
    #[error("Wish cancelled by user.")]
    Cancelled,

    /// No terminal status arrived within the power mode's budget.
    #[error("Request timed out after {budget:?}. SHENRON may still be processing wish {job_id}.")]
    TimedOut { job_id: String, budget: Duration },

    /// A response was missing fields or could not be interpreted.
    #[error("{0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShenronError {
    /// True for outcomes the user asked for rather than failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ShenronError::Cancelled)
    }

    /// True when the poll budget ran out without a terminal status.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ShenronError::TimedOut { .. })
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ShenronError>;
