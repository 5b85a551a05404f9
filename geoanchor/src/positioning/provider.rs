//! Positioning provider abstraction.
//!
//! The engine never talks to a platform SDK directly. A [`PositioningProvider`]
//! yields [`PositioningUpdate`]s; which implementation is used is decided when
//! the session is composed:
//!
//! - [`ChannelPositioningProvider`] - bridge for SDK-backed glue code that pushes
//!   updates into an mpsc channel from the platform callback thread
//! - [`MockPositioningProvider`] - deterministic scripted sequence for tests
//!   and simulation

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

use super::state::{GeospatialFix, LocalTrackingState};

/// One tick from the positioning provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositioningUpdate {
    /// The geospatial fix.
    pub fix: GeospatialFix,
    /// Local tracking health at the time of the fix.
    pub tracking: LocalTrackingState,
}

impl PositioningUpdate {
    /// Update with healthy local tracking.
    pub fn tracking(fix: GeospatialFix) -> Self {
        Self {
            fix,
            tracking: LocalTrackingState::Tracking,
        }
    }
}

/// Source of positioning updates.
///
/// Returns `None` once the provider is exhausted or disconnected.
pub trait PositioningProvider: Send {
    /// Wait for the next update.
    fn next_update(&mut self) -> impl Future<Output = Option<PositioningUpdate>> + Send;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Provider fed through an mpsc channel by platform glue code.
pub struct ChannelPositioningProvider {
    rx: mpsc::Receiver<PositioningUpdate>,
}

impl ChannelPositioningProvider {
    /// Create a provider and the sender the platform side pushes into.
    pub fn channel(capacity: usize) -> (mpsc::Sender<PositioningUpdate>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

impl PositioningProvider for ChannelPositioningProvider {
    async fn next_update(&mut self) -> Option<PositioningUpdate> {
        self.rx.recv().await
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Deterministic provider replaying a fixed sequence of updates.
pub struct MockPositioningProvider {
    updates: VecDeque<PositioningUpdate>,
    interval: Duration,
}

impl MockPositioningProvider {
    /// Replay `updates` back to back.
    pub fn new(updates: impl IntoIterator<Item = PositioningUpdate>) -> Self {
        Self {
            updates: updates.into_iter().collect(),
            interval: Duration::ZERO,
        }
    }

    /// Wait `interval` before yielding each update.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// A device standing still at one spot while its accuracy converges.
    ///
    /// Horizontal and vertical accuracy fall linearly from `start_accuracy_m`
    /// to `end_accuracy_m` over `steps` updates; heading accuracy follows at
    /// 1.5x the horizontal figure, the way compass error usually lags GPS.
    pub fn converging(
        latitude: f64,
        longitude: f64,
        altitude: f64,
        start_accuracy_m: f32,
        end_accuracy_m: f32,
        steps: usize,
    ) -> Self {
        let steps = steps.max(1);
        let updates = (0..steps).map(|i| {
            let t = if steps == 1 {
                1.0
            } else {
                i as f32 / (steps - 1) as f32
            };
            let accuracy = start_accuracy_m + (end_accuracy_m - start_accuracy_m) * t;
            let fix = GeospatialFix::new(
                latitude,
                longitude,
                altitude,
                accuracy,
                accuracy,
                accuracy * 1.5,
            )
            .with_heading(0.0);
            PositioningUpdate::tracking(fix)
        });
        Self::new(updates)
    }

    /// Number of updates still to be replayed.
    pub fn remaining(&self) -> usize {
        self.updates.len()
    }
}

impl PositioningProvider for MockPositioningProvider {
    async fn next_update(&mut self) -> Option<PositioningUpdate> {
        if self.updates.is_empty() {
            return None;
        }
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        self.updates.pop_front()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_replays_in_order_then_ends() {
        let a = GeospatialFix::new(1.0, 2.0, 3.0, 5.0, 5.0, 5.0);
        let b = GeospatialFix::new(1.5, 2.5, 3.0, 4.0, 4.0, 4.0);
        let mut provider = MockPositioningProvider::new([
            PositioningUpdate::tracking(a),
            PositioningUpdate::tracking(b),
        ]);

        assert_eq!(provider.next_update().await.unwrap().fix, a);
        assert_eq!(provider.next_update().await.unwrap().fix, b);
        assert!(provider.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_converging_accuracy_improves() {
        let mut provider = MockPositioningProvider::converging(37.7, -122.4, 10.0, 30.0, 3.0, 4);
        assert_eq!(provider.remaining(), 4);

        let first = provider.next_update().await.unwrap();
        assert_eq!(first.fix.horizontal_accuracy, 30.0);
        assert_eq!(first.fix.heading_accuracy, 45.0);

        let mut last = first;
        while let Some(update) = provider.next_update().await {
            assert!(update.fix.horizontal_accuracy < last.fix.horizontal_accuracy);
            last = update;
        }
        assert!((last.fix.horizontal_accuracy - 3.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_channel_provider_ends_when_sender_dropped() {
        let (tx, mut provider) = ChannelPositioningProvider::channel(4);
        let fix = GeospatialFix::new(1.0, 2.0, 3.0, 5.0, 5.0, 5.0);

        tx.send(PositioningUpdate::tracking(fix)).await.unwrap();
        drop(tx);

        assert_eq!(provider.next_update().await.unwrap().fix, fix);
        assert!(provider.next_update().await.is_none());
    }
}
