//! Anchor reconciliation.
//!
//! Bridges the registry and the platform: places anchors at geospatial
//! targets, resolves anchors shared by other devices, and falls back to
//! local anchors when positioning is not good enough.
//!
//! # Components
//!
//! - [`AnchorReconciler`] - placement and resolution protocol
//! - [`AnchorPrimitives`] / [`HitTestProvider`] - platform seams
//! - [`SimulatedAnchorPrimitives`] - deterministic platform for tests and
//!   simulation
//! - [`ReconcilerConfig`] - retry, backoff and timeout settings

mod config;
mod engine;
mod error;
mod primitive;

pub use config::{
    ReconcilerConfig, DEFAULT_BASE_DELAY, DEFAULT_MAX_CREATION_ATTEMPTS, DEFAULT_MAX_DELAY,
    DEFAULT_PACING_DELAY, DEFAULT_RESOLUTION_TIMEOUT,
};
pub use engine::AnchorReconciler;
pub use error::{PlacementError, PrimitiveError};
pub use primitive::{
    AnchorPrimitives, GroundPlaneHitTest, HitTestProvider, ScreenPoint, SimulatedAnchorPrimitives,
};
