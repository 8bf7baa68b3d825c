use serde::Serialize;

use crate::types::{JobEvent, JobStatus, PowerMode};

/// Progress snapshot derived from one status poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub job_id: String,
    pub status: JobStatus,
    /// 0–100. Backend-supplied when available, otherwise estimated.
    pub percent: f64,
    pub message: String,
    /// `Mode: council • ETA: 30s • Elapsed: 12s` style summary.
    pub meta: String,
}

/// Notifications emitted while a wish is in flight.
///
/// Exactly one of `Granted`, `ActionRequired`, `Failed`, `Cancelled` or
/// `TimedOut` is emitted per wish, always last.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WishEvent {
    /// The backend accepted the wish.
    Queued {
        job_id: String,
        power_mode: PowerMode,
    },
    Progress(ProgressUpdate),
    /// The display message changed since the previous poll.
    StatusChanged {
        job_id: String,
        status: JobStatus,
        message: String,
    },
    /// A backend event not seen before, in log order.
    Log { job_id: String, event: JobEvent },
    Granted { job_id: String },
    ActionRequired {
        job_id: String,
        pending_actions: usize,
    },
    Failed { job_id: String, error: String },
    Cancelled { job_id: String },
    TimedOut { job_id: String, budget_secs: u64 },
}

impl WishEvent {
    pub fn job_id(&self) -> &str {
        match self {
            WishEvent::Queued { job_id, .. }
            | WishEvent::StatusChanged { job_id, .. }
            | WishEvent::Log { job_id, .. }
            | WishEvent::Granted { job_id }
            | WishEvent::ActionRequired { job_id, .. }
            | WishEvent::Failed { job_id, .. }
            | WishEvent::Cancelled { job_id }
            | WishEvent::TimedOut { job_id, .. } => job_id,
            WishEvent::Progress(update) => &update.job_id,
        }
    }

    /// True for the final event of a wish.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WishEvent::Granted { .. }
                | WishEvent::ActionRequired { .. }
                | WishEvent::Failed { .. }
                | WishEvent::Cancelled { .. }
                | WishEvent::TimedOut { .. }
        )
    }
}
