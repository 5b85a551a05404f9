//! Position quality tracker.
//!
//! Turns the stream of [`GeospatialFix`] updates and local tracking health
//! into a [`PositioningState`]. Placement is only permitted in `Ready`:
//! anchoring a citadel at the wrong real-world location is the failure this
//! component exists to prevent.
//!
//! # State Machine
//!
//! ```text
//! Initializing ──► Localizing ──► Ready ◄──► LowAccuracy
//!                      │            │            │
//!                      └────────────┴─────┬──────┘
//!                                         ▼
//!                                    NotTracking ──► Localizing (reacquire)
//! ```
//!
//! `Localizing` is reported while accuracy has not yet been met since the
//! last (re)acquisition and the localization timeout has not elapsed.
//! After the timeout, or after accuracy degrades once `Ready` was reached,
//! the state is `LowAccuracy`. There is no terminal failure state.

use std::time::Instant;

use super::state::{AccuracyThresholds, FixError, GeospatialFix, PositioningState};

/// Derives positioning quality from fixes.
#[derive(Debug, Clone)]
pub struct PositionQualityTracker {
    thresholds: AccuracyThresholds,
    state: PositioningState,
    fix: Option<GeospatialFix>,
    /// When localization started after the last (re)acquire.
    localization_started: Option<Instant>,
    /// Whether `Ready` was reached since the last (re)acquire.
    localized: bool,
}

impl Default for PositionQualityTracker {
    fn default() -> Self {
        Self::new(AccuracyThresholds::default())
    }
}

impl PositionQualityTracker {
    /// Create a tracker in `Initializing` state.
    pub fn new(thresholds: AccuracyThresholds) -> Self {
        Self {
            thresholds,
            state: PositioningState::Initializing,
            fix: None,
            localization_started: None,
            localized: false,
        }
    }

    /// Ingest a fix, using the current time for the localization clock.
    pub fn ingest_fix(
        &mut self,
        fix: GeospatialFix,
        local_tracking_ok: bool,
    ) -> Result<PositioningState, FixError> {
        self.ingest_fix_at(fix, local_tracking_ok, Instant::now())
    }

    /// Ingest a fix observed at `now`.
    ///
    /// Invalid fixes are rejected and leave the state untouched.
    pub fn ingest_fix_at(
        &mut self,
        fix: GeospatialFix,
        local_tracking_ok: bool,
        now: Instant,
    ) -> Result<PositioningState, FixError> {
        fix.validate()?;
        self.fix = Some(fix);

        let next = if !local_tracking_ok {
            self.localization_started = None;
            self.localized = false;
            PositioningState::NotTracking
        } else {
            let started = *self.localization_started.get_or_insert(now);
            if self.thresholds.accepts(&fix) {
                self.localized = true;
                PositioningState::Ready
            } else if !self.localized
                && now.saturating_duration_since(started) < self.thresholds.localization_timeout
            {
                PositioningState::Localizing
            } else {
                PositioningState::LowAccuracy
            }
        };

        if next != self.state {
            tracing::debug!(
                from = %self.state,
                to = %next,
                h_acc_m = fix.horizontal_accuracy,
                v_acc_m = fix.vertical_accuracy,
                hdg_acc_deg = fix.heading_accuracy,
                tracking = local_tracking_ok,
                "Positioning state changed"
            );
        }

        self.state = next;
        Ok(next)
    }

    /// True only when the state is `Ready`.
    #[inline]
    pub fn is_placement_allowed(&self) -> bool {
        self.state.allows_placement()
    }

    /// Current positioning state.
    #[inline]
    pub fn current_state(&self) -> PositioningState {
        self.state
    }

    /// Most recent valid fix.
    #[inline]
    pub fn current_fix(&self) -> Option<GeospatialFix> {
        self.fix
    }

    /// The configured thresholds.
    pub fn thresholds(&self) -> &AccuracyThresholds {
        &self.thresholds
    }

    /// Whether localization has been running longer than the timeout
    /// without reaching `Ready`. The caller may use this to abort.
    pub fn localization_timed_out(&self) -> bool {
        self.localization_timed_out_at(Instant::now())
    }

    /// [`Self::localization_timed_out`] evaluated at `now`.
    pub fn localization_timed_out_at(&self, now: Instant) -> bool {
        match self.localization_started {
            Some(started) if !self.localized => {
                now.saturating_duration_since(started) >= self.thresholds.localization_timeout
            }
            _ => false,
        }
    }
}
