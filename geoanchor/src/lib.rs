//! geoanchor - Geospatial anchor placement and resolution
//!
//! This library decides when a device's geospatial fix is trustworthy,
//! places anchors at real-world coordinates, resolves anchors created by
//! other devices so everyone sees the same object in the same place, and
//! manages anchor lifecycle as local tracking comes and goes.
//!
//! # Composition
//!
//! Components are plain values wired together by the caller:
//!
//! ```ignore
//! use geoanchor::anchor::SharedAnchorRegistry;
//! use geoanchor::positioning::{spawn_session_feed, SharedPositionQuality};
//! use geoanchor::reconciler::AnchorReconciler;
//!
//! let config = geoanchor::config::ConfigFile::load()?;
//! let quality = SharedPositionQuality::new(PositionQualityTracker::new(config.to_thresholds()));
//! let registry = SharedAnchorRegistry::default();
//! // Fixes gate placement; local tracking moves anchors Active/Degraded/Lost
//! let feed = spawn_session_feed(provider, quality.clone(), registry.clone(), cancellation.clone());
//!
//! let reconciler = AnchorReconciler::new(
//!     quality,
//!     registry,
//!     platform_primitives,
//!     config.to_reconciler_config(),
//! );
//! let anchor = reconciler
//!     .place_at_coordinate(target, "citadel-1".into(), &cancellation)
//!     .await?;
//! ```

pub mod anchor;
pub mod config;
pub mod coord;
pub mod logging;
pub mod positioning;
pub mod reconciler;

/// Version of the geoanchor library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
