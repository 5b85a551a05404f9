//! Positioning quality.
//!
//! Consumes geospatial fixes and local tracking health and decides whether
//! geospatial anchor operations can be trusted right now.
//!
//! # Components
//!
//! - [`state`] - `GeospatialFix`, `PositioningState`, `AccuracyThresholds`
//! - [`tracker`] - `PositionQualityTracker` state machine
//! - [`shared`] - `SharedPositionQuality` handle with state broadcasts
//! - [`provider`] - `PositioningProvider` trait with channel and mock sources
//! - [`feed`] - background tasks wiring a provider into the tracker and the
//!   anchor registry

mod feed;
mod provider;
mod shared;
mod state;
mod tracker;

pub use feed::{spawn_positioning_feed, spawn_session_feed};
pub use provider::{
    ChannelPositioningProvider, MockPositioningProvider, PositioningProvider, PositioningUpdate,
};
pub use shared::SharedPositionQuality;
pub use state::{
    AccuracyThresholds, FixError, GeospatialFix, LocalTrackingState, PositioningState,
    DEFAULT_LOCALIZATION_TIMEOUT, DEFAULT_MAX_HEADING_ACCURACY_DEG,
    DEFAULT_MAX_HORIZONTAL_ACCURACY_M, DEFAULT_MAX_VERTICAL_ACCURACY_M,
};
pub use tracker::PositionQualityTracker;
