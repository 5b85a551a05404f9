//! Platform anchor primitives.
//!
//! The reconciler never talks to an AR SDK directly. Anchor creation,
//! resolution and hit testing go through the traits in this module so the
//! platform binding is chosen when the session is composed.
//!
//! [`SimulatedAnchorPrimitives`] is a deterministic implementation for tests
//! and the CLI simulation: it maps geospatial targets into the local frame
//! relative to a fixed session origin.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::error::PrimitiveError;
use crate::anchor::{LocalPose, SharedAnchor};
use crate::coord::{heading_to_rotation, to_local_position, GeoPose};

/// Anchor operations provided by the platform.
///
/// Errors carry `is_retryable`; the reconciler retries transient failures
/// with backoff and aborts on fatal ones.
pub trait AnchorPrimitives: Send + Sync {
    /// Create a geospatial anchor at `target`, returning its local pose.
    fn create_geospatial_anchor(
        &self,
        target: &GeoPose,
    ) -> impl Future<Output = Result<LocalPose, PrimitiveError>> + Send;

    /// Resolve an anchor created elsewhere, returning its local pose.
    fn resolve_geospatial_anchor(
        &self,
        shared: &SharedAnchor,
    ) -> impl Future<Output = Result<LocalPose, PrimitiveError>> + Send;

    /// Create a local-frame anchor at `pose`. Always succeeds.
    fn create_local_anchor(&self, pose: LocalPose) -> LocalPose;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

impl<T: AnchorPrimitives> AnchorPrimitives for Arc<T> {
    fn create_geospatial_anchor(
        &self,
        target: &GeoPose,
    ) -> impl Future<Output = Result<LocalPose, PrimitiveError>> + Send {
        (**self).create_geospatial_anchor(target)
    }

    fn resolve_geospatial_anchor(
        &self,
        shared: &SharedAnchor,
    ) -> impl Future<Output = Result<LocalPose, PrimitiveError>> + Send {
        (**self).resolve_geospatial_anchor(shared)
    }

    fn create_local_anchor(&self, pose: LocalPose) -> LocalPose {
        (**self).create_local_anchor(pose)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A point on the screen in normalized coordinates (0..1, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Center of the screen.
    pub fn center() -> Self {
        Self::new(0.5, 0.5)
    }

    fn is_on_screen(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

/// Finds a surface under a screen point.
pub trait HitTestProvider {
    /// Pose of the first surface hit, or `None`.
    fn hit_test(&self, point: ScreenPoint) -> Option<LocalPose>;
}

/// Hit tester against a flat ground plane in front of a static camera.
///
/// The lower half of the screen maps onto the ground from `near_m` to
/// `far_m` ahead of the camera; the upper half sees sky and never hits.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundPlaneHitTest {
    /// Camera height above the ground in meters.
    pub camera_height_m: f64,
    /// Distance of the ground at the bottom screen edge.
    pub near_m: f64,
    /// Distance of the ground just below the horizon.
    pub far_m: f64,
    /// Lateral extent of the view at `far_m`.
    pub width_m: f64,
}

impl Default for GroundPlaneHitTest {
    fn default() -> Self {
        Self {
            camera_height_m: 1.5,
            near_m: 1.0,
            far_m: 20.0,
            width_m: 10.0,
        }
    }
}

impl HitTestProvider for GroundPlaneHitTest {
    fn hit_test(&self, point: ScreenPoint) -> Option<LocalPose> {
        if !point.is_on_screen() || point.y <= 0.5 {
            return None;
        }

        // 0 at the horizon, 1 at the bottom edge
        let t = f64::from(point.y - 0.5) * 2.0;
        let distance = self.far_m + (self.near_m - self.far_m) * t;
        let lateral = f64::from(point.x - 0.5) * self.width_m * distance / self.far_m;

        // Camera looks north (+z); ground is camera_height below it
        Some(LocalPose::at(lateral, -self.camera_height_m, distance))
    }
}

/// Deterministic in-process anchor primitives.
///
/// Local poses are the ENU offset of the target from the session origin.
/// Failures queued with [`push_failure`](Self::push_failure) are returned by
/// the next geospatial calls in order, before any success.
pub struct SimulatedAnchorPrimitives {
    origin: GeoPose,
    latency: Duration,
    failures: Mutex<VecDeque<PrimitiveError>>,
    create_calls: AtomicU32,
    resolve_calls: AtomicU32,
}

impl SimulatedAnchorPrimitives {
    /// Primitives for a session whose local origin is at `origin`.
    pub fn new(origin: GeoPose) -> Self {
        Self {
            origin,
            latency: Duration::ZERO,
            failures: Mutex::new(VecDeque::new()),
            create_calls: AtomicU32::new(0),
            resolve_calls: AtomicU32::new(0),
        }
    }

    /// Simulate platform latency on each geospatial call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue failures for the next geospatial calls.
    pub fn with_failures(self, failures: impl IntoIterator<Item = PrimitiveError>) -> Self {
        self.failures.lock().extend(failures);
        self
    }

    /// Queue one failure.
    pub fn push_failure(&self, error: PrimitiveError) {
        self.failures.lock().push_back(error);
    }

    /// Session origin.
    pub fn origin(&self) -> &GeoPose {
        &self.origin
    }

    /// Number of `create_geospatial_anchor` calls so far.
    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::Relaxed)
    }

    /// Number of `resolve_geospatial_anchor` calls so far.
    pub fn resolve_calls(&self) -> u32 {
        self.resolve_calls.load(Ordering::Relaxed)
    }

    fn local_pose_for(&self, target: &GeoPose) -> LocalPose {
        LocalPose::new(
            to_local_position(&self.origin, target),
            heading_to_rotation(target.heading),
        )
    }

    async fn simulate(&self, target: &GeoPose) -> Result<LocalPose, PrimitiveError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failure = self.failures.lock().pop_front();
        match failure {
            Some(error) => Err(error),
            None => Ok(self.local_pose_for(target)),
        }
    }
}

impl AnchorPrimitives for SimulatedAnchorPrimitives {
    async fn create_geospatial_anchor(&self, target: &GeoPose) -> Result<LocalPose, PrimitiveError> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate(target).await
    }

    async fn resolve_geospatial_anchor(
        &self,
        shared: &SharedAnchor,
    ) -> Result<LocalPose, PrimitiveError> {
        self.resolve_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate(&shared.target).await
    }

    fn create_local_anchor(&self, pose: LocalPose) -> LocalPose {
        pose
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
