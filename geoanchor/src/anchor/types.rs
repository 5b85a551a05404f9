//! Anchor value types.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use nalgebra::{UnitQuaternion, Vector3};
use uuid::Uuid;

use crate::coord::GeoPose;

/// Opaque unique anchor identifier.
///
/// Generated by the registry for anchors this device originates, or adopted
/// from shared anchor data when resolving an anchor created elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(Uuid);

impl AnchorId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for AnchorId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for AnchorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to the external object parented to an anchor
/// (a citadel, a resource marker). Never interpreted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PayloadId(String);

impl PayloadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PayloadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PayloadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an anchor is tied to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKind {
    /// Local tracking frame only; not portable across devices.
    Local,
    /// Tied to an absolute geospatial coordinate.
    Geospatial,
    /// Hosted via visual feature maps.
    CloudFeatureBased,
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "Local"),
            Self::Geospatial => write!(f, "Geospatial"),
            Self::CloudFeatureBased => write!(f, "CloudFeatureBased"),
        }
    }
}

/// Anchor lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Waiting for the platform to create the anchor.
    PendingCreation,
    /// Waiting for the platform to resolve a shared anchor.
    PendingResolution,
    /// Tracked with a valid local pose.
    Active,
    /// Local tracking is limited; pose may drift.
    Degraded,
    /// Local tracking lost; pose is not trustworthy.
    Lost,
    /// Removed and evicted from the registry.
    Removed,
}

impl LifecycleState {
    /// Creation or resolution in progress.
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingCreation | Self::PendingResolution)
    }

    /// Has a local pose and follows tracking changes.
    #[inline]
    pub fn is_tracked(&self) -> bool {
        matches!(self, Self::Active | Self::Degraded | Self::Lost)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingCreation => write!(f, "PendingCreation"),
            Self::PendingResolution => write!(f, "PendingResolution"),
            Self::Active => write!(f, "Active"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Lost => write!(f, "Lost"),
            Self::Removed => write!(f, "Removed"),
        }
    }
}

/// Position and rotation in the session's local tracking frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPose {
    /// Position in meters.
    pub position: Vector3<f64>,
    /// Orientation.
    pub rotation: UnitQuaternion<f64>,
}

impl LocalPose {
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    /// Pose at `position` with identity rotation.
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self::new(Vector3::new(x, y, z), UnitQuaternion::identity())
    }

    /// The frame origin.
    pub fn identity() -> Self {
        Self::at(0.0, 0.0, 0.0)
    }
}

/// Where a registration comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorOrigin {
    /// This device creates the anchor; a fresh id is generated.
    Originator,
    /// Resolving an anchor another device created; its id is adopted.
    Shared(AnchorId),
}

/// Anchor data supplied by the persistence layer for resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharedAnchor {
    /// Id assigned by the originating device.
    pub id: AnchorId,
    /// Where the anchor lives.
    pub target: GeoPose,
}

impl SharedAnchor {
    pub fn new(id: AnchorId, target: GeoPose) -> Self {
        Self { id, target }
    }
}

/// An anchor and its lifecycle.
///
/// Only the [`AnchorRegistry`](super::AnchorRegistry) mutates anchors; the
/// values handed out are snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub(super) id: AnchorId,
    pub(super) kind: AnchorKind,
    pub(super) target: Option<GeoPose>,
    pub(super) local_pose: Option<LocalPose>,
    pub(super) state: LifecycleState,
    pub(super) created_at: Instant,
    pub(super) last_updated_at: Instant,
    pub(super) payload: Option<PayloadId>,
    pub(super) upgrade_pending: bool,
}

impl Anchor {
    pub fn id(&self) -> AnchorId {
        self.id
    }

    pub fn kind(&self) -> AnchorKind {
        self.kind
    }

    /// Geospatial target; always present for `Geospatial` anchors.
    pub fn target(&self) -> Option<&GeoPose> {
        self.target.as_ref()
    }

    /// Local pose; always present for `Active` anchors.
    pub fn local_pose(&self) -> Option<&LocalPose> {
        self.local_pose.as_ref()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_updated_at(&self) -> Instant {
        self.last_updated_at
    }

    pub fn payload(&self) -> Option<&PayloadId> {
        self.payload.as_ref()
    }

    /// Local fallback anchor awaiting a later geospatial upgrade.
    pub fn upgrade_pending(&self) -> bool {
        self.upgrade_pending
    }

    /// Time since the anchor was last updated.
    pub fn since_update(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_updated_at)
    }

    /// Shareable data for other devices, available for geospatial anchors.
    pub fn to_shared(&self) -> Option<SharedAnchor> {
        match (self.kind, self.target) {
            (AnchorKind::Geospatial, Some(target)) => Some(SharedAnchor::new(self.id, target)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_id_round_trips_through_string() {
        let id = AnchorId::generate();
        let parsed: AnchorId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_anchor_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<AnchorId>().is_err());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(AnchorId::generate(), AnchorId::generate());
    }

    #[test]
    fn test_lifecycle_predicates() {
        assert!(LifecycleState::PendingCreation.is_pending());
        assert!(LifecycleState::PendingResolution.is_pending());
        assert!(!LifecycleState::Active.is_pending());

        assert!(LifecycleState::Active.is_tracked());
        assert!(LifecycleState::Degraded.is_tracked());
        assert!(LifecycleState::Lost.is_tracked());
        assert!(!LifecycleState::Removed.is_tracked());
        assert!(!LifecycleState::PendingCreation.is_tracked());
    }

    #[test]
    fn test_payload_display() {
        assert_eq!(PayloadId::from("citadel-1").to_string(), "citadel-1");
    }
}
