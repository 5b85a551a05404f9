//! Background tasks feeding positioning updates into the engine.
//!
//! The fix stream is single-producer/single-consumer: one provider, one
//! consumer task. The positioning feed drives only the quality tracker; the
//! session feed also applies local tracking changes to the anchor registry,
//! moving anchors between `Active`, `Degraded` and `Lost`. Either task stops
//! when the provider ends or the cancellation token fires.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::provider::PositioningProvider;
use super::shared::SharedPositionQuality;
use super::state::LocalTrackingState;
use crate::anchor::SharedAnchorRegistry;

/// Spawns the positioning feed.
///
/// Invalid fixes are logged and skipped; they never stop the feed.
pub fn spawn_positioning_feed<P>(
    provider: P,
    quality: SharedPositionQuality,
    cancellation: CancellationToken,
) -> JoinHandle<()>
where
    P: PositioningProvider + 'static,
{
    tokio::spawn(run_feed(provider, quality, None, cancellation))
}

/// Spawns the positioning feed and routes local tracking to `registry`.
///
/// The registry sees the tracking state of the first update and every
/// change after it; repeated states are not re-applied. Tracking is applied
/// even when the fix in the same update is invalid.
pub fn spawn_session_feed<P>(
    provider: P,
    quality: SharedPositionQuality,
    registry: SharedAnchorRegistry,
    cancellation: CancellationToken,
) -> JoinHandle<()>
where
    P: PositioningProvider + 'static,
{
    tokio::spawn(run_feed(provider, quality, Some(registry), cancellation))
}

async fn run_feed<P: PositioningProvider>(
    mut provider: P,
    quality: SharedPositionQuality,
    registry: Option<SharedAnchorRegistry>,
    cancellation: CancellationToken,
) {
    tracing::info!(
        provider = provider.name(),
        anchors = registry.is_some(),
        "Positioning feed started"
    );

    let mut last_tracking: Option<LocalTrackingState> = None;

    loop {
        let update = tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                tracing::debug!("Positioning feed cancelled");
                break;
            }
            update = provider.next_update() => update,
        };

        let Some(update) = update else {
            tracing::debug!(provider = provider.name(), "Positioning provider exhausted");
            break;
        };

        if let Some(registry) = &registry {
            if last_tracking != Some(update.tracking) {
                let changed = registry.apply_tracking_state(update.tracking);
                tracing::debug!(tracking = %update.tracking, changed, "Local tracking changed");
                last_tracking = Some(update.tracking);
            }
        }

        if let Err(e) = quality.ingest(update) {
            tracing::warn!(error = %e, "Discarding invalid geospatial fix");
        }
    }

    tracing::info!("Positioning feed stopped");
}
