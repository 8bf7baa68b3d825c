//! # shenron-client
//!
//! Async Rust client for the SHENRON wish API. Submit a question to the
//! multi-warrior orchestration backend and follow it to a result.
//!
//! ## Features
//!
//! - **Submit-then-poll**: queue a wish, then poll its status at a
//!   power-mode-dependent cadence until it completes, fails, asks for
//!   follow-up actions, is cancelled, or runs out of budget
//! - **Typed progress**: every poll becomes a [`WishEvent`]; backend log
//!   events are delivered exactly once, in order
//! - **Cooperative cancellation**: [`WishSession::cancel`] stops the loop
//!   at its next check and sends a best-effort cancel to the backend
//! - **Per-mode budgets**: lightning, council and ultra each get their own
//!   timeout and poll interval via [`PollConfig`]
//! - **Power mode detection**: [`PowerMode::detect`] picks a tier from
//!   the query wording
//!
//! ## Quick Start
//!
//! ```no_run
//! use shenron_client::{PollConfig, ShenronClient, WishEvent, WishOutcome, WishRequest, WishSession};
//!
//! # async fn example() -> shenron_client::Result<()> {
//! let client = ShenronClient::new("http://127.0.0.1:8080/api.php");
//! let session = WishSession::new();
//!
//! let request = WishRequest::auto("status of the web servers");
//! let outcome = client
//!     .grant_wish(&session, &request, &PollConfig::default(), |event| {
//!         if let WishEvent::Progress(p) = event {
//!             println!("{:>5.1}% {}", p.percent, p.message);
//!         }
//!     })
//!     .await?;
//!
//! if let WishOutcome::Granted { result } = outcome {
//!     println!("{}", result["synthesized_answer"]);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod poller;
pub mod progress;
pub mod session;
pub mod types;

pub use client::ShenronClient;
pub use config::{ModeBudget, PollConfig, PollConfigBuilder};
pub use error::{Result, ShenronError};
pub use events::{ProgressUpdate, WishEvent};
pub use poller::grant_wish;
pub use session::{ActiveWish, WishSession};
pub use types::{
    EventKind, Heartbeat, JobEvent, JobStatus, PowerMode, WishOutcome, WishRequest, WishStatus,
    WishTicket,
};

/// The three backend calls the poll loop depends on.
///
/// [`ShenronClient`] implements this over HTTP. Implement it yourself to
/// drive [`grant_wish`] against another transport or a scripted backend.
///
/// # Example
///
/// ```rust
/// use shenron_client::{Result, WishApi, WishRequest, WishStatus, WishTicket, JobStatus};
///
/// #[derive(Clone)]
/// struct Oracle;
///
/// impl WishApi for Oracle {
///     async fn start_wish(&self, _request: &WishRequest) -> Result<WishTicket> {
///         Ok(WishTicket { job_id: "local".into(), status: JobStatus::Queued })
///     }
///
///     async fn wish_status(&self, _job_id: &str) -> Result<Option<WishStatus>> {
///         Ok(Some(WishStatus {
///             status: JobStatus::Completed,
///             result: Some(serde_json::json!({"synthesized_answer": "ok"})),
///             ..Default::default()
///         }))
///     }
///
///     async fn cancel_wish(&self, _job_id: &str) -> Result<bool> {
///         Ok(true)
///     }
/// }
/// ```
pub trait WishApi: Send + Sync {
    /// Queue a wish and return its job ticket.
    fn start_wish(
        &self,
        request: &WishRequest,
    ) -> impl std::future::Future<Output = Result<WishTicket>> + Send;

    /// Fetch a job's status. `None` means the backend answered 404.
    fn wish_status(
        &self,
        job_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<WishStatus>>> + Send;

    /// Request cancellation. Returns whether the backend acknowledged it.
    fn cancel_wish(&self, job_id: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
}
