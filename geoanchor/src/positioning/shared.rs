//! Shared wrapper for the position quality tracker.
//!
//! The positioning feed writes, the reconciler reads. State changes are
//! broadcast so the UI layer can show "keep moving" style hints.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::provider::PositioningUpdate;
use super::state::{FixError, GeospatialFix, PositioningState};
use super::tracker::PositionQualityTracker;

/// Capacity of the positioning state broadcast channel.
const STATE_CHANNEL_CAPACITY: usize = 16;

/// Thread-safe handle to a [`PositionQualityTracker`].
///
/// Cloning is cheap; all clones observe the same tracker.
#[derive(Clone)]
pub struct SharedPositionQuality {
    inner: Arc<RwLock<PositionQualityTracker>>,
    state_tx: broadcast::Sender<PositioningState>,
}

impl SharedPositionQuality {
    /// Wrap a tracker.
    pub fn new(tracker: PositionQualityTracker) -> Self {
        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(tracker)),
            state_tx,
        }
    }

    /// Ingest one update from the positioning provider.
    pub fn ingest(&self, update: PositioningUpdate) -> Result<PositioningState, FixError> {
        self.ingest_fix(update.fix, update.tracking.is_ok())
    }

    /// Ingest a raw fix and local tracking flag.
    pub fn ingest_fix(
        &self,
        fix: GeospatialFix,
        local_tracking_ok: bool,
    ) -> Result<PositioningState, FixError> {
        let (previous, next) = {
            let mut tracker = self.inner.write();
            let previous = tracker.current_state();
            let next = tracker.ingest_fix(fix, local_tracking_ok)?;
            (previous, next)
        };

        if previous != next {
            // No subscribers is fine
            let _ = self.state_tx.send(next);
        }
        Ok(next)
    }

    /// True only when positioning is `Ready`.
    pub fn is_placement_allowed(&self) -> bool {
        self.inner.read().is_placement_allowed()
    }

    /// Current positioning state.
    pub fn current_state(&self) -> PositioningState {
        self.inner.read().current_state()
    }

    /// Most recent valid fix.
    pub fn current_fix(&self) -> Option<GeospatialFix> {
        self.inner.read().current_fix()
    }

    /// Whether localization exceeded its timeout without reaching `Ready`.
    pub fn localization_timed_out(&self) -> bool {
        self.inner.read().localization_timed_out()
    }

    /// Subscribe to positioning state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<PositioningState> {
        self.state_tx.subscribe()
    }
}

impl Default for SharedPositionQuality {
    fn default() -> Self {
        Self::new(PositionQualityTracker::default())
    }
}
