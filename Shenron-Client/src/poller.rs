//! Submit-then-poll state machine for a single wish.
//!
//! ```text
//! queued ──► running ──► completed | failed | cancelled | action_required
//! ```
//!
//! The loop owns no global state: the caller's [`WishSession`] tracks the
//! job, and every notification goes through the `on_event` observer.

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{ModeBudget, PollConfig};
use crate::error::{Result, ShenronError};
use crate::events::{ProgressUpdate, WishEvent};
use crate::progress::{estimate_progress, meta_line, QUEUED_PERCENT};
use crate::session::WishSession;
use crate::types::{JobStatus, WishOutcome, WishRequest, WishStatus};
use crate::WishApi;

const DEFAULT_FAILURE: &str = "SHENRON failed to grant the wish.";

/// Submit `request` and poll it until it reaches a terminal state.
///
/// Returns `Ok` for [`WishOutcome::Granted`] and
/// [`WishOutcome::ActionRequired`]. Everything else is an error:
/// [`ShenronError::BackendFailed`], [`ShenronError::Cancelled`],
/// [`ShenronError::TimedOut`], [`ShenronError::NotFound`] once more than
/// `not_found_tolerance` consecutive lookups answered 404, or the
/// transport error of the first failing request.
///
/// Once the job is queued, `session` tracks it until this function returns
/// or its future is dropped, and exactly one terminal [`WishEvent`] is
/// emitted last. A failed submission emits nothing.
///
/// Cancellation via [`WishSession::cancel`] is checked before and after
/// each wait; the wait itself is cut short. A cancel that arrives during a
/// status lookup turns that lookup's error or timeout into
/// [`ShenronError::Cancelled`]. Either way, one best-effort `cancel_wish`
/// request is sent on a detached task and not awaited.
pub async fn grant_wish<A, F>(
    api: &A,
    session: &WishSession,
    request: &WishRequest,
    config: &PollConfig,
    mut on_event: F,
) -> Result<WishOutcome>
where
    A: WishApi + Clone + 'static,
    F: FnMut(WishEvent),
{
    let preview: String = request.query.chars().take(60).collect();
    tracing::info!(
        power_mode = %request.power_mode,
        agent_mode = request.agent_mode,
        query = %preview,
        "submitting wish"
    );

    let ticket = api.start_wish(request).await?;
    let job_id = ticket.job_id;
    tracing::info!(job_id = %job_id, status = %ticket.status, "wish job queued");

    let token = session.begin(&job_id, request.power_mode);
    let tracking = Tracking {
        session,
        job_id: &job_id,
    };
    on_event(WishEvent::Queued {
        job_id: job_id.clone(),
        power_mode: request.power_mode,
    });
    on_event(WishEvent::Progress(ProgressUpdate {
        job_id: job_id.clone(),
        status: ticket.status,
        percent: QUEUED_PERCENT,
        message: "Wish queued for SHENRON...".to_string(),
        meta: format!("Job ID: {}", job_id),
    }));

    let budget = config.budget(request.power_mode);
    let mut poll = PollState::new(&job_id, budget, config.not_found_tolerance);
    let mut result = poll.run(api, &token, &mut on_event).await;

    // Cancelled while a lookup was in flight: the backend has not been told yet.
    if token.is_cancelled() && !poll.cancel_requested {
        request_cancel(api, &job_id);
        if result.is_err() {
            result = Err(ShenronError::Cancelled);
        }
    }

    drop(tracking);
    on_event(terminal_event(&job_id, budget, &result));
    log_outcome(&job_id, &poll, &result);
    result
}

/// Clears the session's record of the job however `grant_wish` exits,
/// including when its future is dropped mid-poll.
struct Tracking<'a> {
    session: &'a WishSession,
    job_id: &'a str,
}

impl Drop for Tracking<'_> {
    fn drop(&mut self) {
        self.session.finish(self.job_id);
    }
}

struct PollState<'a> {
    job_id: &'a str,
    budget: ModeBudget,
    not_found_tolerance: u32,
    started: Instant,
    attempts: u32,
    consecutive_not_found: u32,
    seen_events: usize,
    last_message: Option<String>,
    cancel_requested: bool,
}

impl<'a> PollState<'a> {
    fn new(job_id: &'a str, budget: ModeBudget, not_found_tolerance: u32) -> Self {
        Self {
            job_id,
            budget,
            not_found_tolerance,
            started: Instant::now(),
            attempts: 0,
            consecutive_not_found: 0,
            seen_events: 0,
            last_message: None,
            cancel_requested: false,
        }
    }

    async fn run<A, F>(
        &mut self,
        api: &A,
        token: &CancellationToken,
        on_event: &mut F,
    ) -> Result<WishOutcome>
    where
        A: WishApi + Clone + 'static,
        F: FnMut(WishEvent),
    {
        let deadline = self.started + self.budget.timeout;

        while Instant::now() < deadline {
            self.abort_if_cancelled(api, token)?;

            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(self.budget.poll_interval) => {}
            }
            self.attempts += 1;

            self.abort_if_cancelled(api, token)?;

            let Some(status) = api.wish_status(self.job_id).await? else {
                self.consecutive_not_found += 1;
                if self.consecutive_not_found <= self.not_found_tolerance {
                    tracing::warn!(
                        job_id = self.job_id,
                        attempts = self.attempts,
                        "job not found yet, retrying"
                    );
                    continue;
                }
                return Err(ShenronError::NotFound {
                    job_id: self.job_id.to_string(),
                });
            };
            self.consecutive_not_found = 0;

            if let Some(outcome) = self.observe(status, on_event)? {
                return Ok(outcome);
            }
        }

        Err(ShenronError::TimedOut {
            job_id: self.job_id.to_string(),
            budget: self.budget.timeout,
        })
    }

    /// Surface one status response. Returns the outcome once terminal.
    fn observe<F>(&mut self, status: WishStatus, on_event: &mut F) -> Result<Option<WishOutcome>>
    where
        F: FnMut(WishEvent),
    {
        if status.events.len() > self.seen_events {
            for event in &status.events[self.seen_events..] {
                tracing::debug!(job_id = self.job_id, kind = ?event.kind, "{}", event.message);
                on_event(WishEvent::Log {
                    job_id: self.job_id.to_string(),
                    event: event.clone(),
                });
            }
            self.seen_events = status.events.len();
        }

        let message = status.display_message();
        let meta = meta_line(&status, self.job_id);
        let percent = status.progress.unwrap_or_else(|| {
            estimate_progress(status.status, self.started.elapsed(), self.budget.timeout)
        });

        on_event(WishEvent::Progress(ProgressUpdate {
            job_id: self.job_id.to_string(),
            status: status.status,
            percent,
            message: message.clone(),
            meta: meta.clone(),
        }));

        if self.last_message.as_deref() != Some(message.as_str()) {
            on_event(WishEvent::StatusChanged {
                job_id: self.job_id.to_string(),
                status: status.status,
                message: message.clone(),
            });
            self.last_message = Some(message);
        }

        match status.status {
            JobStatus::Completed => {
                // Keep polling until the result payload is attached.
                let Some(result) = status.result else {
                    return Ok(None);
                };
                on_event(WishEvent::Progress(ProgressUpdate {
                    job_id: self.job_id.to_string(),
                    status: JobStatus::Completed,
                    percent: 100.0,
                    message: "Wish granted".to_string(),
                    meta,
                }));
                Ok(Some(WishOutcome::Granted { result }))
            }
            JobStatus::ActionRequired => Ok(Some(WishOutcome::ActionRequired {
                pending_actions: status.pending_actions,
                result: status.result,
            })),
            JobStatus::Failed => {
                let error = status
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE.to_string());
                Err(ShenronError::BackendFailed(error))
            }
            JobStatus::Cancelled => Err(ShenronError::Cancelled),
            JobStatus::Queued | JobStatus::Running | JobStatus::Unknown => Ok(None),
        }
    }

    fn abort_if_cancelled<A>(&mut self, api: &A, token: &CancellationToken) -> Result<()>
    where
        A: WishApi + Clone + 'static,
    {
        if !token.is_cancelled() {
            return Ok(());
        }

        if !self.cancel_requested {
            request_cancel(api, self.job_id);
            self.cancel_requested = true;
        }
        Err(ShenronError::Cancelled)
    }
}

/// Fire one best-effort cancel at the backend without waiting for it.
fn request_cancel<A>(api: &A, job_id: &str)
where
    A: WishApi + Clone + 'static,
{
    let api = api.clone();
    let job_id = job_id.to_string();
    tokio::spawn(async move {
        match api.cancel_wish(&job_id).await {
            Ok(true) => tracing::info!(job_id = %job_id, "cancellation acknowledged by server"),
            Ok(false) => tracing::warn!(job_id = %job_id, "cancellation request not acknowledged"),
            Err(e) => tracing::warn!(job_id = %job_id, error = %e, "failed to request cancellation"),
        }
    });
}

fn terminal_event(job_id: &str, budget: ModeBudget, result: &Result<WishOutcome>) -> WishEvent {
    let job_id = job_id.to_string();
    match result {
        Ok(WishOutcome::Granted { .. }) => WishEvent::Granted { job_id },
        Ok(WishOutcome::ActionRequired {
            pending_actions, ..
        }) => WishEvent::ActionRequired {
            job_id,
            pending_actions: pending_actions.len(),
        },
        Err(ShenronError::Cancelled) => WishEvent::Cancelled { job_id },
        Err(ShenronError::TimedOut { .. }) => WishEvent::TimedOut {
            job_id,
            budget_secs: budget.timeout.as_secs(),
        },
        Err(e) => WishEvent::Failed {
            job_id,
            error: e.to_string(),
        },
    }
}

fn log_outcome(job_id: &str, poll: &PollState<'_>, result: &Result<WishOutcome>) {
    let elapsed = poll.started.elapsed().as_secs_f64();
    match result {
        Ok(WishOutcome::Granted { .. }) => {
            tracing::info!(job_id, attempts = poll.attempts, elapsed, "wish job completed")
        }
        Ok(WishOutcome::ActionRequired {
            pending_actions, ..
        }) => tracing::info!(
            job_id,
            pending = pending_actions.len(),
            "wish requires follow-up actions"
        ),
        Err(ShenronError::Cancelled) => {
            tracing::info!(job_id, attempts = poll.attempts, elapsed, "wish job cancelled")
        }
        Err(e) => tracing::error!(job_id, attempts = poll.attempts, error = %e, "wish job did not complete"),
    }
}
