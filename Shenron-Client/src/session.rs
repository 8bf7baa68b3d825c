use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::types::PowerMode;

/// Snapshot of the wish a session is currently tracking.
#[derive(Debug, Clone)]
pub struct ActiveWish {
    pub job_id: String,
    pub power_mode: PowerMode,
    pub cancelled: bool,
    pub started_at: Instant,
}

impl ActiveWish {
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[derive(Debug)]
struct Tracked {
    job_id: String,
    power_mode: PowerMode,
    started_at: Instant,
    token: CancellationToken,
}

/// Caller-owned context tracking at most one in-flight wish.
///
/// Clones share the same slot, so a UI handler can hold one clone to call
/// [`cancel`](Self::cancel) while the poll loop runs with another.
#[derive(Debug, Clone, Default)]
pub struct WishSession {
    slot: Arc<Mutex<Option<Tracked>>>,
}

impl WishSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Tracked>> {
        // Poisoning is recovered from; the slot is only ever replaced wholesale.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The wish currently being tracked, if any.
    pub fn active(&self) -> Option<ActiveWish> {
        self.lock().as_ref().map(|t| ActiveWish {
            job_id: t.job_id.clone(),
            power_mode: t.power_mode,
            cancelled: t.token.is_cancelled(),
            started_at: t.started_at,
        })
    }

    pub fn is_idle(&self) -> bool {
        self.lock().is_none()
    }

    /// Request cancellation of the active wish.
    ///
    /// Returns `false` when nothing is tracked or it was already cancelled.
    /// The poll loop notices at its next check and sends the backend a
    /// best-effort cancel request.
    pub fn cancel(&self) -> bool {
        match self.lock().as_ref() {
            Some(t) if !t.token.is_cancelled() => {
                tracing::info!(job_id = %t.job_id, "wish cancellation requested");
                t.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Start tracking `job_id`, replacing whatever was tracked before.
    pub(crate) fn begin(&self, job_id: &str, power_mode: PowerMode) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self.lock().replace(Tracked {
            job_id: job_id.to_string(),
            power_mode,
            started_at: Instant::now(),
            token: token.clone(),
        });
        if let Some(previous) = previous {
            tracing::debug!(
                previous = %previous.job_id,
                next = %job_id,
                "dropping tracking of previous wish"
            );
        }
        token
    }

    /// Stop tracking `job_id`. A newer wish that replaced it is left alone.
    pub(crate) fn finish(&self, job_id: &str) {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|t| t.job_id == job_id) {
            *slot = None;
        }
    }
}
