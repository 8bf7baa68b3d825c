use std::time::Duration;

use crate::types::PowerMode;

/// Wall-clock budget and poll cadence for one power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeBudget {
    /// Upper bound on the whole poll loop.
    pub timeout: Duration,
    /// Wait between consecutive status requests.
    pub poll_interval: Duration,
}

impl ModeBudget {
    pub const fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

/// Configuration for the wish poll loop.
///
/// Use [`PollConfig::builder()`] for ergonomic construction, or
/// [`PollConfig::default()`] for the stock budgets (lightning 2 min,
/// council 5 min, ultra 30 min).
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub lightning: ModeBudget,
    pub council: ModeBudget,
    pub ultra: ModeBudget,

    /// Consecutive 404 status lookups tolerated before giving up.
    pub not_found_tolerance: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            lightning: ModeBudget::new(Duration::from_secs(2 * 60), Duration::from_millis(1500)),
            council: ModeBudget::new(Duration::from_secs(5 * 60), Duration::from_secs(3)),
            ultra: ModeBudget::new(Duration::from_secs(30 * 60), Duration::from_secs(3)),
            not_found_tolerance: 3,
        }
    }
}

impl PollConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> PollConfigBuilder {
        PollConfigBuilder::default()
    }

    /// Budget applied to a wish submitted in `mode`.
    pub fn budget(&self, mode: PowerMode) -> ModeBudget {
        match mode {
            PowerMode::Lightning => self.lightning,
            PowerMode::Council => self.council,
            PowerMode::Ultra => self.ultra,
        }
    }
}

/// Builder for [`PollConfig`].
#[derive(Default)]
pub struct PollConfigBuilder {
    config: PollConfig,
}

impl PollConfigBuilder {
    /// Override the timeout and poll interval for a single power mode.
    pub fn with_budget(mut self, mode: PowerMode, budget: ModeBudget) -> Self {
        match mode {
            PowerMode::Lightning => self.config.lightning = budget,
            PowerMode::Council => self.config.council = budget,
            PowerMode::Ultra => self.config.ultra = budget,
        }
        self
    }

    /// Override only the timeout for a power mode.
    pub fn with_timeout(self, mode: PowerMode, timeout: Duration) -> Self {
        let mut budget = self.config.budget(mode);
        budget.timeout = timeout;
        self.with_budget(mode, budget)
    }

    /// Override only the poll interval for a power mode.
    pub fn with_poll_interval(self, mode: PowerMode, interval: Duration) -> Self {
        let mut budget = self.config.budget(mode);
        budget.poll_interval = interval;
        self.with_budget(mode, budget)
    }

    /// Set how many consecutive 404s are tolerated while the backend
    /// persists a freshly queued job.
    pub fn with_not_found_tolerance(mut self, attempts: u32) -> Self {
        self.config.not_found_tolerance = attempts;
        self
    }

    /// Build the final [`PollConfig`].
    pub fn build(self) -> PollConfig {
        self.config
    }
}
