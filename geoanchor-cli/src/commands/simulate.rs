//! Simulated placement session.
//!
//! Drives the full engine against a scripted positioning feed and simulated
//! AR primitives: waits for positioning to converge, places a citadel at a
//! coordinate, resolves anchors "other players" placed nearby, and falls
//! back to a screen-space anchor when positioning never becomes ready.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use geoanchor::anchor::{
    AnchorEvent, AnchorId, LifecycleState, PayloadId, SharedAnchor, SharedAnchorRegistry,
};
use geoanchor::coord::{haversine_distance, GeoPose};
use geoanchor::positioning::{
    spawn_session_feed, GeospatialFix, LocalTrackingState, MockPositioningProvider,
    PositionQualityTracker, PositioningUpdate, SharedPositionQuality,
};
use geoanchor::reconciler::{
    AnchorReconciler, GroundPlaneHitTest, PlacementError, PrimitiveError, ScreenPoint,
    SimulatedAnchorPrimitives,
};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Meters per degree of latitude, close enough for laying out a demo ring.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Arguments for `simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Device latitude in decimal degrees
    #[arg(long, default_value_t = 37.7749, allow_negative_numbers = true)]
    pub lat: f64,

    /// Device longitude in decimal degrees
    #[arg(long, default_value_t = -122.4194, allow_negative_numbers = true)]
    pub lon: f64,

    /// Device altitude in meters above the ellipsoid
    #[arg(long, default_value_t = 10.0, allow_negative_numbers = true)]
    pub alt: f64,

    /// Meters north of the device to place the citadel
    #[arg(long, default_value_t = 15.0)]
    pub distance: f64,

    /// Horizontal accuracy of the first fix in meters
    #[arg(long, default_value_t = 40.0)]
    pub start_accuracy: f32,

    /// Horizontal accuracy of the last fix in meters
    #[arg(long, default_value_t = 3.0)]
    pub end_accuracy: f32,

    /// Number of positioning fixes to replay
    #[arg(long, default_value_t = 10)]
    pub steps: usize,

    /// Milliseconds between positioning fixes
    #[arg(long, default_value_t = 200)]
    pub interval_ms: u64,

    /// Number of anchors other players placed nearby
    #[arg(long, default_value_t = 3)]
    pub shared: usize,

    /// Radius of the ring of shared anchors in meters
    #[arg(long, default_value_t = 25.0)]
    pub shared_radius: f64,

    /// Transient primitive failures to inject before calls succeed
    #[arg(long, default_value_t = 0)]
    pub failures: usize,

    /// Simulated primitive latency in milliseconds
    #[arg(long, default_value_t = 50)]
    pub latency_ms: u64,

    /// Briefly lose local tracking after placement
    #[arg(long)]
    pub tracking_glitch: bool,

    /// Enable debug-level logging
    #[arg(long)]
    pub debug: bool,

    /// Mirror log output to the terminal
    #[arg(long)]
    pub log_stdout: bool,
}

/// Run the simulated session.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug, args.log_stdout)?;
    runner.log_startup("simulate");

    let origin = GeoPose::facing_north(args.lat, args.lon, args.alt)?;
    let runtime = runner.runtime()?;
    let config = runner.config();

    runtime.block_on(async {
        let quality =
            SharedPositionQuality::new(PositionQualityTracker::new(config.to_thresholds()));
        let registry = SharedAnchorRegistry::default();
        let failures = (0..args.failures)
            .map(|i| PrimitiveError::transient(format!("simulated hiccup {}", i + 1)));
        let primitives = Arc::new(
            SimulatedAnchorPrimitives::new(origin)
                .with_latency(Duration::from_millis(args.latency_ms))
                .with_failures(failures),
        );
        let reconciler = AnchorReconciler::new(
            quality.clone(),
            registry.clone(),
            Arc::clone(&primitives),
            config.to_reconciler_config(),
        );

        let cancellation = CancellationToken::new();
        let printer = spawn_event_printer(&registry, cancellation.clone());

        let interval = Duration::from_millis(args.interval_ms);
        let provider = MockPositioningProvider::converging(
            args.lat,
            args.lon,
            args.alt,
            args.start_accuracy,
            args.end_accuracy,
            args.steps,
        )
        .with_interval(interval);

        println!("Positioning: {} fixes, {} ms apart", args.steps, args.interval_ms);
        let ready = wait_for_ready(
            &quality,
            &registry,
            provider,
            cancellation.clone(),
            interval,
            args.steps,
        )
        .await;

        let result = if ready {
            run_geospatial(&reconciler, &args, &origin, &cancellation).await
        } else {
            println!(
                "Positioning never became ready ({}); using a local fallback anchor",
                quality.current_state()
            );
            place_fallback(&reconciler);
            Ok(())
        };

        if args.tracking_glitch {
            let glitch = tracking_glitch(&args, interval);
            let _ = spawn_session_feed(
                glitch,
                quality.clone(),
                registry.clone(),
                cancellation.clone(),
            )
            .await;
            println!(
                "Tracking restored: {} anchor(s) active",
                registry.all_active().len()
            );
        }

        print_summary(&registry, &origin);
        println!(
            "Primitive calls: {} create, {} resolve",
            primitives.create_calls(),
            primitives.resolve_calls()
        );

        cancellation.cancel();
        let _ = printer.await;
        result
    })
}

/// Replay the scripted feed and wait until placement is allowed.
///
/// Returns false when the feed ends without reaching `Ready`.
async fn wait_for_ready(
    quality: &SharedPositionQuality,
    registry: &SharedAnchorRegistry,
    provider: MockPositioningProvider,
    cancellation: CancellationToken,
    interval: Duration,
    steps: usize,
) -> bool {
    // Subscribe before the feed starts so no transition is missed.
    let mut states = quality.subscribe();
    let feed = spawn_session_feed(provider, quality.clone(), registry.clone(), cancellation);

    let budget = interval * (steps as u32 + 1) + Duration::from_secs(1);
    let wait = async {
        loop {
            match states.recv().await {
                Ok(state) => {
                    println!("  positioning: {}", state);
                    if state.allows_placement() {
                        return true;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return false,
            }
        }
    };

    let ready = tokio::select! {
        ready = tokio::time::timeout(budget, wait) => ready.unwrap_or(false),
        _ = feed => quality.is_placement_allowed(),
    };

    ready || quality.is_placement_allowed()
}

async fn run_geospatial(
    reconciler: &AnchorReconciler<Arc<SimulatedAnchorPrimitives>>,
    args: &SimulateArgs,
    origin: &GeoPose,
    cancellation: &CancellationToken,
) -> Result<(), CliError> {
    let target = GeoPose::new(
        origin.latitude + args.distance / METERS_PER_DEGREE,
        origin.longitude,
        origin.altitude,
        180.0,
    )?;

    println!("Placing citadel at {}", target);
    let citadel = match reconciler
        .place_at_coordinate(target, PayloadId::new("citadel"), cancellation)
        .await
    {
        Ok(anchor) => anchor,
        Err(PlacementError::InsufficientAccuracy { state }) => {
            println!("Positioning dropped to {} before placement", state);
            place_fallback(reconciler);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    info!(anchor = %citadel.id(), "Citadel placed");

    let mut nearby: Vec<(SharedAnchor, PayloadId)> =
        shared_ring(origin, args.shared, args.shared_radius)?
            .into_iter()
            .enumerate()
            .map(|(i, shared)| (shared, PayloadId::new(format!("rival-{}", i + 1))))
            .collect();
    // Our own citadel shows up in the area query too; it is already active.
    if let Some(shared) = citadel.to_shared() {
        nearby.push((shared, PayloadId::new("citadel")));
    }

    println!("Resolving {} nearby anchor(s)", nearby.len());
    let resolved = reconciler
        .resolve_many_in_area(&nearby, cancellation)
        .await;
    println!("Resolved {} of {}", resolved, nearby.len());

    Ok(())
}

/// A short loss of full tracking: one `Limited` fix, then recovery.
fn tracking_glitch(args: &SimulateArgs, interval: Duration) -> MockPositioningProvider {
    let accuracy = args.end_accuracy;
    let fix = GeospatialFix::new(args.lat, args.lon, args.alt, accuracy, accuracy, accuracy * 1.5)
        .with_heading(0.0);
    MockPositioningProvider::new([
        PositioningUpdate {
            fix,
            tracking: LocalTrackingState::Limited,
        },
        PositioningUpdate::tracking(fix),
    ])
    .with_interval(interval)
}

fn place_fallback(reconciler: &AnchorReconciler<Arc<SimulatedAnchorPrimitives>>) {
    let point = ScreenPoint::new(0.5, 0.8);
    match reconciler.place_from_screen(point, &GroundPlaneHitTest::default(), "citadel".into()) {
        Some(anchor) => println!("Local anchor {} placed from screen tap", anchor.id()),
        None => println!("Screen tap did not hit a surface"),
    }
}

/// Anchors evenly spaced on a circle around `origin`.
fn shared_ring(origin: &GeoPose, count: usize, radius: f64) -> Result<Vec<SharedAnchor>, CliError> {
    let lon_scale = METERS_PER_DEGREE * origin.latitude.to_radians().cos().max(1e-6);

    (0..count)
        .map(|i| {
            let bearing = std::f64::consts::TAU * i as f64 / count as f64;
            let target = GeoPose::new(
                origin.latitude + radius * bearing.cos() / METERS_PER_DEGREE,
                origin.longitude + radius * bearing.sin() / lon_scale,
                origin.altitude,
                bearing.to_degrees(),
            )?;
            Ok(SharedAnchor::new(AnchorId::from(Uuid::new_v4()), target))
        })
        .collect()
}

fn spawn_event_printer(
    registry: &SharedAnchorRegistry,
    cancellation: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    spawn_event_sink(registry, cancellation, print_event)
}

/// Forward registry events to `sink` until cancelled.
///
/// Events already queued when cancellation fires are still delivered.
fn spawn_event_sink<F>(
    registry: &SharedAnchorRegistry,
    cancellation: CancellationToken,
    mut sink: F,
) -> tokio::task::JoinHandle<()>
where
    F: FnMut(AnchorEvent) + Send + 'static,
{
    let mut events = registry.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    while let Ok(event) = events.try_recv() {
                        sink(event);
                    }
                    break;
                }
                event = events.recv() => event,
            };
            match event {
                Ok(event) => sink(event),
                Err(RecvError::Lagged(n)) => println!("  ({} events skipped)", n),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_event(event: AnchorEvent) {
    match event {
        AnchorEvent::Created(anchor) => {
            println!("  + created {} ({})", anchor.id(), anchor.kind())
        }
        AnchorEvent::Resolved(anchor) => println!("  + resolved {}", anchor.id()),
        AnchorEvent::Failed { id, error } => println!("  ! {} failed: {}", id, error),
        AnchorEvent::StateChanged { id, state } => match state {
            LifecycleState::Degraded | LifecycleState::Lost => {
                println!("  ~ {} {}", id, state)
            }
            _ => {}
        },
    }
}

fn print_summary(registry: &SharedAnchorRegistry, origin: &GeoPose) {
    println!();
    println!("Anchors:");
    for anchor in registry.snapshot() {
        let distance = anchor
            .target()
            .map(|t| {
                format!(
                    "{:.1} m away",
                    haversine_distance(origin.latitude, origin.longitude, t.latitude, t.longitude)
                )
            })
            .unwrap_or_else(|| "local".to_string());
        let position = anchor
            .local_pose()
            .map(|p| {
                format!(
                    "({:.2}, {:.2}, {:.2})",
                    p.position.x, p.position.y, p.position.z
                )
            })
            .unwrap_or_else(|| "-".to_string());
        let payload = anchor.payload().map(|p| p.as_str()).unwrap_or("-");

        println!(
            "  {}  {:<10} {:<8} {:<10} {:<24} {}",
            anchor.id(),
            anchor.kind().to_string(),
            anchor.state().to_string(),
            payload,
            position,
            distance
        );
    }
}
