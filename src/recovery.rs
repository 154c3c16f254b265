//! Exponential-backoff reconnection policy for worker supervision.
//! This lives above the grabber's own run loop: the
//! grabber reports a terminal status for a single connection attempt,
//! and it's the supervisor's job to decide whether, and how long to
//! wait, before trying that source again.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// What a supervisor should do after a worker's source attempt ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryAction {
    /// Reconnect immediately; used after a clean disconnect with no
    /// prior failures recorded for this source.
    Retry,
    /// Reconnect after the given backoff delay.
    RetryAfterDelay(Duration),
    /// Stop retrying this source; the retry budget is exhausted.
    GiveUp,
}

/// Backoff tuning, independent per policy instance.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of consecutive failed attempts before giving up.
    /// `None` retries forever.
    pub max_retries: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Tracks per-source failure counts and hands out backoff decisions.
///
/// One instance is shared across all of a supervisor's sources, keyed
/// by the source's configured name, rather than one instance per
/// source.
pub struct RecoveryManager {
    config: RecoveryConfig,
    failure_counts: HashMap<String, u32>,
    last_attempt: HashMap<String, Instant>,
}

impl RecoveryManager {
    pub fn new() -> Self {
        Self::with_config(RecoveryConfig::default())
    }

    pub fn with_config(config: RecoveryConfig) -> Self {
        Self {
            config,
            failure_counts: HashMap::new(),
            last_attempt: HashMap::new(),
        }
    }

    /// Record a failed attempt for `source` and decide what to do next.
    pub fn on_failure(&mut self, source: &str) -> RecoveryAction {
        let count = self.failure_counts.get(source).copied().unwrap_or(0) + 1;
        self.failure_counts.insert(source.to_string(), count);
        self.last_attempt.insert(source.to_string(), Instant::now());

        if let Some(max) = self.config.max_retries {
            if count > max {
                warn!(source, attempts = count, "giving up after exhausting retry budget");
                return RecoveryAction::GiveUp;
            }
        }

        let delay = self.calculate_delay(count - 1);
        info!(source, attempt = count, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
        RecoveryAction::RetryAfterDelay(delay)
    }

    /// A source connected and streamed at least one frame; clear its
    /// failure history so the next disconnect starts backoff from zero.
    pub fn on_success(&mut self, source: &str) {
        if self.failure_counts.remove(source).is_some() {
            info!(source, "recovered, resetting backoff");
        }
        self.last_attempt.remove(source);
    }

    pub fn failure_count(&self, source: &str) -> u32 {
        self.failure_counts.get(source).copied().unwrap_or(0)
    }

    pub fn has_exhausted_retries(&self, source: &str) -> bool {
        match self.config.max_retries {
            Some(max) => self.failure_count(source) > max,
            None => false,
        }
    }

    fn calculate_delay(&self, prior_failures: u32) -> Duration {
        let delay_ms = self
            .config
            .base_delay
            .as_millis()
            .saturating_mul(1u128 << prior_failures.min(32)) as u64;
        Duration::from_millis(delay_ms).min(self.config.max_delay)
    }
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self::new()
    }
}
