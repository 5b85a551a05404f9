//! Reconciler timing and retry configuration.

use std::time::Duration;

/// Default number of creation/resolution attempts.
pub const DEFAULT_MAX_CREATION_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default upper bound on a single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(4);

/// Default wall-clock budget for resolving one shared anchor.
pub const DEFAULT_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay between resolutions in a batch.
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(100);

/// Configuration for [`AnchorReconciler`](super::AnchorReconciler).
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerConfig {
    /// Attempts per request, including the first. At least 1.
    pub max_creation_attempts: u32,

    /// Backoff before retry `n` (0-based) is `base_delay * 2^n`.
    pub base_delay: Duration,

    /// Cap on a single backoff delay.
    pub max_delay: Duration,

    /// Wall-clock budget for one resolution, attempts and backoff included.
    pub resolution_timeout: Duration,

    /// Delay between consecutive resolutions in `resolve_many_in_area`.
    pub pacing_delay: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_creation_attempts: DEFAULT_MAX_CREATION_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            resolution_timeout: DEFAULT_RESOLUTION_TIMEOUT,
            pacing_delay: DEFAULT_PACING_DELAY,
        }
    }
}

impl ReconcilerConfig {
    /// Set the attempt count (minimum 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_creation_attempts = attempts.max(1);
        self
    }

    /// Set the backoff parameters.
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    pub fn with_resolution_timeout(mut self, timeout: Duration) -> Self {
        self.resolution_timeout = timeout;
        self
    }

    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = delay;
        self
    }

    /// Attempt count, never zero.
    pub(crate) fn attempts(&self) -> u32 {
        self.max_creation_attempts.max(1)
    }

    /// Delay before retry number `retry` (0 for the first retry).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(20));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}
