//! Anchor lifecycle events for the rendering/payload layer.

use super::types::{Anchor, AnchorId, LifecycleState};
use crate::reconciler::PlacementError;

/// Events broadcast as anchors are created, resolved, fail or change state.
#[derive(Debug, Clone)]
pub enum AnchorEvent {
    /// An anchor this device placed became active.
    Created(Anchor),
    /// A shared anchor was resolved in the local frame.
    Resolved(Anchor),
    /// A placement or resolution request failed.
    Failed { id: AnchorId, error: PlacementError },
    /// Any lifecycle transition, including registration and removal.
    StateChanged { id: AnchorId, state: LifecycleState },
}

impl AnchorEvent {
    /// The anchor this event concerns.
    pub fn anchor_id(&self) -> AnchorId {
        match self {
            Self::Created(anchor) | Self::Resolved(anchor) => anchor.id(),
            Self::Failed { id, .. } | Self::StateChanged { id, .. } => *id,
        }
    }
}
