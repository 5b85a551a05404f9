//! Placement and resolution protocol.
//!
//! Every geospatial request follows the same shape:
//!
//! 1. Gate on positioning quality (`Ready` only).
//! 2. Register the anchor so the id exists before any platform call.
//! 3. Call the primitive, retrying transient failures with exponential
//!    backoff. A fatal failure aborts at once.
//! 4. On success attach the local pose (`Active`); on any failure remove
//!    the anchor so nothing is left pending.
//!
//! Cancellation is observed before each attempt and while waiting on the
//! primitive or a backoff delay.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::ReconcilerConfig;
use super::error::{PlacementError, PrimitiveError};
use super::primitive::{AnchorPrimitives, HitTestProvider, ScreenPoint};
use crate::anchor::{
    Anchor, AnchorEvent, AnchorId, AnchorKind, AnchorOrigin, LifecycleState, LocalPose,
    PayloadId, RegistryError, SharedAnchor, SharedAnchorRegistry,
};
use crate::coord::GeoPose;
use crate::positioning::SharedPositionQuality;

/// The platform call a request retries.
#[derive(Clone, Copy)]
enum Request<'a> {
    Create(&'a GeoPose),
    Resolve(&'a SharedAnchor),
}

impl Request<'_> {
    fn label(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Resolve(_) => "resolve",
        }
    }

    fn fatal(&self, error: PrimitiveError) -> PlacementError {
        match self {
            Self::Create(_) => PlacementError::CreationFailed(error.message),
            Self::Resolve(_) => PlacementError::ResolutionFailed(error.message),
        }
    }
}

/// Places and resolves anchors against the platform.
///
/// Operations on the same anchor id must not run concurrently; the caller
/// serialises them.
pub struct AnchorReconciler<P> {
    positioning: SharedPositionQuality,
    registry: SharedAnchorRegistry,
    primitives: P,
    config: ReconcilerConfig,
}

impl<P: AnchorPrimitives> AnchorReconciler<P> {
    pub fn new(
        positioning: SharedPositionQuality,
        registry: SharedAnchorRegistry,
        primitives: P,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            positioning,
            registry,
            primitives,
            config,
        }
    }

    pub fn positioning(&self) -> &SharedPositionQuality {
        &self.positioning
    }

    pub fn registry(&self) -> &SharedAnchorRegistry {
        &self.registry
    }

    pub fn primitives(&self) -> &P {
        &self.primitives
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Create a geospatial anchor at `target` for `payload`.
    ///
    /// Fails with `InsufficientAccuracy` without registering anything when
    /// positioning is not `Ready`.
    pub async fn place_at_coordinate(
        &self,
        target: GeoPose,
        payload: PayloadId,
        cancellation: &CancellationToken,
    ) -> Result<Anchor, PlacementError> {
        self.check_positioning()?;

        let id = {
            let mut registry = self.registry.lock();
            let anchor =
                registry.register(AnchorKind::Geospatial, Some(target), AnchorOrigin::Originator)?;
            registry.set_payload(&anchor.id(), payload.clone())?;
            anchor.id()
        };

        tracing::debug!(
            anchor = %id,
            payload = %payload,
            target = %target,
            provider = self.primitives.name(),
            "Placing anchor"
        );

        let result = self
            .with_retries(Request::Create(&target), cancellation)
            .await;
        let anchor = self.finish(id, result)?;

        tracing::info!(anchor = %id, payload = %payload, "Anchor placed");
        self.registry.publish(AnchorEvent::Created(anchor.clone()));
        Ok(anchor)
    }

    /// Resolve an anchor created by another device.
    ///
    /// An anchor already `Active` under the same id is returned as is; a
    /// `Degraded` or `Lost` one is resolved again. Attempts and backoff share
    /// the `resolution_timeout` budget.
    pub async fn resolve_known_anchor(
        &self,
        shared: SharedAnchor,
        payload: Option<PayloadId>,
        cancellation: &CancellationToken,
    ) -> Result<Anchor, PlacementError> {
        if let Some(anchor) = self.active_with_payload(&shared.id, payload.clone())? {
            tracing::trace!(anchor = %shared.id, "Anchor already active");
            return Ok(anchor);
        }

        self.check_positioning()?;

        let id = {
            let mut registry = self.registry.lock();
            let existing = registry.get(&shared.id).map(|a| a.state());
            match existing {
                Some(LifecycleState::Degraded | LifecycleState::Lost) => {
                    registry.begin_reresolution(&shared.id)?;
                }
                Some(state) => {
                    return Err(RegistryError::InvalidState {
                        id: shared.id,
                        state,
                        operation: "resolve",
                    }
                    .into());
                }
                None => {
                    registry.register(
                        AnchorKind::Geospatial,
                        Some(shared.target),
                        AnchorOrigin::Shared(shared.id),
                    )?;
                }
            }
            if let Some(payload) = payload {
                registry.set_payload(&shared.id, payload)?;
            }
            shared.id
        };

        tracing::debug!(
            anchor = %id,
            target = %shared.target,
            provider = self.primitives.name(),
            "Resolving anchor"
        );

        let started = Instant::now();
        let timeout = self.config.resolution_timeout;
        let result = match tokio::time::timeout(
            timeout,
            self.with_retries(Request::Resolve(&shared), cancellation),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PlacementError::ResolutionTimeout {
                elapsed: started.elapsed(),
            }),
        };
        let anchor = self.finish(id, result)?;

        tracing::info!(
            anchor = %id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Anchor resolved"
        );
        self.registry.publish(AnchorEvent::Resolved(anchor.clone()));
        Ok(anchor)
    }

    /// Resolve a batch of shared anchors one after another.
    ///
    /// Each entry's payload is attached on success. Entries already `Active`
    /// only get their payload set, without a platform call. A pacing delay
    /// separates consecutive resolutions. Returns how many entries are
    /// `Active` when the batch ends, so anchors removed or lost while the
    /// batch ran are not counted.
    pub async fn resolve_many_in_area(
        &self,
        entries: &[(SharedAnchor, PayloadId)],
        cancellation: &CancellationToken,
    ) -> usize {
        let mut attempted = false;

        for (entry, payload) in entries {
            if cancellation.is_cancelled() {
                break;
            }

            match self.active_with_payload(&entry.id, Some(payload.clone())) {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(
                        anchor = %entry.id,
                        error = %e,
                        "Batch resolution skipped entry"
                    );
                    continue;
                }
            }

            if attempted && !self.config.pacing_delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => break,
                    _ = tokio::time::sleep(self.config.pacing_delay) => {}
                }
            }
            attempted = true;

            match self
                .resolve_known_anchor(*entry, Some(payload.clone()), cancellation)
                .await
            {
                Ok(_) => {}
                Err(PlacementError::Cancelled) => break,
                Err(e) => {
                    tracing::debug!(
                        anchor = %entry.id,
                        error = %e,
                        "Batch resolution skipped entry"
                    );
                }
            }
        }

        let resolved = {
            let registry = self.registry.lock();
            entries
                .iter()
                .filter(|(entry, _)| registry.is_active(&entry.id))
                .count()
        };

        tracing::debug!(
            total = entries.len(),
            resolved,
            cancelled = cancellation.is_cancelled(),
            "Batch resolution finished"
        );
        resolved
    }

    /// Place a local-frame anchor without consulting positioning.
    ///
    /// The anchor is flagged for a later geospatial upgrade.
    pub fn place_local_fallback(&self, pose: LocalPose, payload: PayloadId) -> Anchor {
        let pose = self.primitives.create_local_anchor(pose);
        let anchor = self
            .registry
            .lock()
            .register_local(pose, Some(payload.clone()), true);

        tracing::info!(anchor = %anchor.id(), payload = %payload, "Local fallback anchor placed");
        self.registry.publish(AnchorEvent::Created(anchor.clone()));
        anchor
    }

    /// Hit test `point` and place a local fallback anchor on the surface.
    ///
    /// Returns `None` when no surface was hit.
    pub fn place_from_screen<H: HitTestProvider + ?Sized>(
        &self,
        point: ScreenPoint,
        hit_test: &H,
        payload: PayloadId,
    ) -> Option<Anchor> {
        match hit_test.hit_test(point) {
            Some(pose) => Some(self.place_local_fallback(pose, payload)),
            None => {
                tracing::debug!(x = point.x, y = point.y, "Hit test found no surface");
                None
            }
        }
    }

    /// Total backoff a request sleeps through if every attempt fails.
    pub fn worst_case_backoff(&self) -> Duration {
        (0..self.config.attempts().saturating_sub(1))
            .map(|retry| self.config.backoff(retry))
            .sum()
    }

    fn check_positioning(&self) -> Result<(), PlacementError> {
        let state = self.positioning.current_state();
        if state.allows_placement() {
            Ok(())
        } else {
            tracing::debug!(state = %state, "Placement gated by positioning");
            Err(PlacementError::InsufficientAccuracy { state })
        }
    }

    fn active_with_payload(
        &self,
        id: &AnchorId,
        payload: Option<PayloadId>,
    ) -> Result<Option<Anchor>, PlacementError> {
        let mut registry = self.registry.lock();
        if !registry.is_active(id) {
            return Ok(None);
        }
        if let Some(payload) = payload {
            registry.set_payload(id, payload)?;
        }
        Ok(registry.get(id).cloned())
    }

    /// Record the outcome of a request in the registry.
    fn finish(
        &self,
        id: AnchorId,
        result: Result<LocalPose, PlacementError>,
    ) -> Result<Anchor, PlacementError> {
        let error = match result {
            Ok(pose) => {
                let attached = self.registry.lock().attach_local_pose(&id, pose);
                match attached {
                    Ok(anchor) => return Ok(anchor),
                    // Removed by the caller while the request was in flight
                    Err(e) => PlacementError::Registry(e),
                }
            }
            Err(e) => e,
        };

        self.registry.remove(&id);
        match &error {
            PlacementError::Cancelled => {
                tracing::debug!(anchor = %id, "Anchor request cancelled");
            }
            _ => {
                tracing::warn!(anchor = %id, error = %error, "Anchor request failed");
                self.registry.publish(AnchorEvent::Failed {
                    id,
                    error: error.clone(),
                });
            }
        }
        Err(error)
    }

    /// Run `request` until it succeeds, fails fatally or runs out of attempts.
    async fn with_retries(
        &self,
        request: Request<'_>,
        cancellation: &CancellationToken,
    ) -> Result<LocalPose, PlacementError> {
        let attempts = self.config.attempts();

        for attempt in 1..=attempts {
            if cancellation.is_cancelled() {
                return Err(PlacementError::Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(PlacementError::Cancelled),
                result = self.call(request) => result,
            };

            match result {
                Ok(pose) => {
                    tracing::trace!(op = request.label(), attempt, "Primitive succeeded");
                    return Ok(pose);
                }
                Err(e) if !e.is_retryable => {
                    return Err(request.fatal(e));
                }
                Err(e) => {
                    tracing::debug!(
                        op = request.label(),
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Transient primitive failure"
                    );
                }
            }

            if attempt < attempts {
                let delay = self.config.backoff(attempt - 1);
                tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => return Err(PlacementError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Err(PlacementError::Timeout { attempts })
    }

    async fn call(&self, request: Request<'_>) -> Result<LocalPose, PrimitiveError> {
        match request {
            Request::Create(target) => self.primitives.create_geospatial_anchor(target).await,
            Request::Resolve(shared) => self.primitives.resolve_geospatial_anchor(shared).await,
        }
    }
}
