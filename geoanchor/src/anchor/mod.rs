//! Anchors and their lifecycle.
//!
//! The [`AnchorRegistry`] owns every anchor in a session and is the single
//! writer of lifecycle state. Lifecycle changes are published as
//! [`AnchorEvent`]s so the payload layer can parent and unparent objects.
//!
//! ```text
//! PendingCreation ──┐
//!                   ├──► Active ◄──► Degraded ◄──► Lost
//! PendingResolution ┘      │            │           │
//!         ▲                │            └─────┬─────┘
//!         └────────────────┼──── begin_reresolution
//!                          ▼
//!                       Removed (from any state, evicts)
//! ```

mod error;
mod events;
mod registry;
mod types;

pub use error::RegistryError;
pub use events::AnchorEvent;
pub use registry::{
    AnchorRegistry, SharedAnchorRegistry, DEFAULT_EVENT_CAPACITY, MAX_REMOVED_TOMBSTONES,
};
pub use types::{
    Anchor, AnchorId, AnchorKind, AnchorOrigin, LifecycleState, LocalPose, PayloadId,
    SharedAnchor,
};
