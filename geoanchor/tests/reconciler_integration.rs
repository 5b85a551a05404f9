//! Integration tests for anchor placement and resolution.
//!
//! These tests verify the complete flows:
//! - Positioning gate → placement (accuracy and tracking health)
//! - Retry with backoff, retry bound and fatal abort
//! - Shared anchor resolution, batch resolution and the resolution timeout
//! - Cancellation cleanup
//! - Positioning feed and local tracking feed driving state
//!
//! Run with: `cargo test --test reconciler_integration`

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use geoanchor::anchor::{
    AnchorEvent, AnchorId, AnchorKind, AnchorRegistry, LifecycleState, PayloadId, SharedAnchor,
    SharedAnchorRegistry,
};
use geoanchor::coord::GeoPose;
use geoanchor::positioning::{
    spawn_positioning_feed, spawn_session_feed, AccuracyThresholds, GeospatialFix,
    LocalTrackingState, MockPositioningProvider, PositionQualityTracker, PositioningState,
    PositioningUpdate, SharedPositionQuality,
};
use geoanchor::reconciler::{
    AnchorReconciler, PlacementError, PrimitiveError, ReconcilerConfig,
    SimulatedAnchorPrimitives,
};

// ============================================================================
// Test Helpers
// ============================================================================

type TestReconciler = AnchorReconciler<Arc<SimulatedAnchorPrimitives>>;

const SF_LAT: f64 = 37.7749;
const SF_LON: f64 = -122.4194;

fn session_origin() -> GeoPose {
    GeoPose::facing_north(SF_LAT, SF_LON, 10.0).unwrap()
}

/// The fix from the accuracy scenarios: 5 m / 3 m / 5 deg.
fn good_fix() -> GeospatialFix {
    GeospatialFix::new(SF_LAT, SF_LON, 10.0, 5.0, 3.0, 5.0)
}

fn positioning_with(fix: GeospatialFix, tracking_ok: bool) -> SharedPositionQuality {
    let positioning = SharedPositionQuality::new(PositionQualityTracker::new(
        AccuracyThresholds::default(),
    ));
    positioning.ingest_fix(fix, tracking_ok).unwrap();
    positioning
}

fn create_reconciler(
    positioning: SharedPositionQuality,
    primitives: SimulatedAnchorPrimitives,
    config: ReconcilerConfig,
) -> (TestReconciler, Arc<SimulatedAnchorPrimitives>) {
    let primitives = Arc::new(primitives);
    let reconciler = AnchorReconciler::new(
        positioning,
        SharedAnchorRegistry::new(AnchorRegistry::new()),
        Arc::clone(&primitives),
        config,
    );
    (reconciler, primitives)
}

fn ready_reconciler(
    primitives: SimulatedAnchorPrimitives,
) -> (TestReconciler, Arc<SimulatedAnchorPrimitives>) {
    create_reconciler(
        positioning_with(good_fix(), true),
        primitives,
        ReconcilerConfig::default(),
    )
}

/// A shared anchor some meters from the origin, as another device created it.
fn shared_anchor_near(north_deg: f64) -> SharedAnchor {
    SharedAnchor::new(
        AnchorId::from(Uuid::new_v4()),
        GeoPose::new(SF_LAT + north_deg, SF_LON, 10.0, 90.0).unwrap(),
    )
}

/// Pair each shared anchor with a payload named after its position in the batch.
fn with_payloads(anchors: &[SharedAnchor]) -> Vec<(SharedAnchor, PayloadId)> {
    anchors
        .iter()
        .enumerate()
        .map(|(i, anchor)| (*anchor, PayloadId::new(format!("citadel-{}", i))))
        .collect()
}

fn transient_failures(count: usize) -> Vec<PrimitiveError> {
    (0..count)
        .map(|i| PrimitiveError::transient(format!("tracking hiccup {}", i)))
        .collect()
}

// ============================================================================
// Accuracy gate
// ============================================================================

#[tokio::test]
async fn test_accuracy_gate_blocks_placement_without_primitive_calls() {
    let thresholds = AccuracyThresholds::default();

    for excess in [0.5_f32, 1.0, 5.0, 50.0] {
        let fix = GeospatialFix::new(
            SF_LAT,
            SF_LON,
            10.0,
            thresholds.max_horizontal_m + excess,
            thresholds.max_vertical_m + excess,
            thresholds.max_heading_deg + excess,
        );
        let positioning = positioning_with(fix, true);
        assert!(!positioning.is_placement_allowed());

        let (reconciler, primitives) = create_reconciler(
            positioning,
            SimulatedAnchorPrimitives::new(session_origin()),
            ReconcilerConfig::default(),
        );

        let result = reconciler
            .place_at_coordinate(
                session_origin(),
                "citadel-1".into(),
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(PlacementError::InsufficientAccuracy { .. })
        ));
        assert_eq!(primitives.create_calls(), 0);
        assert!(reconciler.registry().is_empty());
    }
}

#[tokio::test]
async fn test_good_fix_with_tracking_places_active_geospatial_anchor() {
    let positioning = positioning_with(good_fix(), true);
    assert_eq!(positioning.current_state(), PositioningState::Ready);

    let (reconciler, primitives) = create_reconciler(
        positioning,
        SimulatedAnchorPrimitives::new(session_origin()),
        ReconcilerConfig::default(),
    );
    let target = GeoPose::facing_north(SF_LAT, SF_LON, 10.0).unwrap();

    let anchor = reconciler
        .place_at_coordinate(target, "citadel-1".into(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(anchor.kind(), AnchorKind::Geospatial);
    assert_eq!(anchor.state(), LifecycleState::Active);
    assert_eq!(anchor.target(), Some(&target));
    assert!(anchor.local_pose().is_some());
    assert_eq!(primitives.create_calls(), 1);
}

#[tokio::test]
async fn test_good_fix_without_tracking_is_insufficient_accuracy() {
    let positioning = positioning_with(good_fix(), false);
    assert_eq!(positioning.current_state(), PositioningState::NotTracking);

    let (reconciler, primitives) = create_reconciler(
        positioning,
        SimulatedAnchorPrimitives::new(session_origin()),
        ReconcilerConfig::default(),
    );

    let result = reconciler
        .place_at_coordinate(
            session_origin(),
            "citadel-1".into(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(
        result,
        Err(PlacementError::InsufficientAccuracy {
            state: PositioningState::NotTracking
        })
    );
    assert_eq!(primitives.create_calls(), 0);
}

#[tokio::test]
async fn test_resolution_gated_without_registering() {
    let (reconciler, primitives) = create_reconciler(
        SharedPositionQuality::default(),
        SimulatedAnchorPrimitives::new(session_origin()),
        ReconcilerConfig::default(),
    );
    let shared = shared_anchor_near(0.0001);

    let result = reconciler
        .resolve_known_anchor(shared, Some("citadel-9".into()), &CancellationToken::new())
        .await;

    assert_eq!(
        result,
        Err(PlacementError::InsufficientAccuracy {
            state: PositioningState::Initializing
        })
    );
    assert_eq!(primitives.resolve_calls(), 0);
    assert!(reconciler.registry().is_empty());
}

// ============================================================================
// Retry behavior
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_two_transient_failures_then_success() {
    let (reconciler, primitives) = ready_reconciler(
        SimulatedAnchorPrimitives::new(session_origin()).with_failures(transient_failures(2)),
    );
    let start = tokio::time::Instant::now();

    let anchor = reconciler
        .place_at_coordinate(
            session_origin(),
            "citadel-1".into(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(anchor.state(), LifecycleState::Active);
    assert_eq!(primitives.create_calls(), 3);
    // 500 ms then 1 s of backoff
    assert!(start.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_always_transient_stops_after_max_attempts() {
    let (reconciler, primitives) = ready_reconciler(
        SimulatedAnchorPrimitives::new(session_origin()).with_failures(transient_failures(100)),
    );
    let mut events = reconciler.registry().subscribe();

    let result = reconciler
        .place_at_coordinate(
            session_origin(),
            "citadel-1".into(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result, Err(PlacementError::Timeout { attempts: 3 }));
    assert_eq!(primitives.create_calls(), 3);
    assert!(reconciler.registry().is_empty());

    let mut saw_removed = false;
    let mut saw_failed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            AnchorEvent::StateChanged {
                state: LifecycleState::Removed,
                ..
            } => saw_removed = true,
            AnchorEvent::Failed { error, .. } => {
                assert_eq!(error, PlacementError::Timeout { attempts: 3 });
                saw_failed = true;
            }
            _ => {}
        }
    }
    assert!(saw_removed);
    assert!(saw_failed);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_count_follows_config() {
    let (reconciler, primitives) = create_reconciler(
        positioning_with(good_fix(), true),
        SimulatedAnchorPrimitives::new(session_origin()).with_failures(transient_failures(100)),
        ReconcilerConfig::default().with_max_attempts(5),
    );

    let result = reconciler
        .place_at_coordinate(
            session_origin(),
            "citadel-1".into(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result, Err(PlacementError::Timeout { attempts: 5 }));
    assert_eq!(primitives.create_calls(), 5);
}

#[tokio::test]
async fn test_fatal_resolution_failure_aborts_immediately() {
    let (reconciler, primitives) = ready_reconciler(
        SimulatedAnchorPrimitives::new(session_origin())
            .with_failures([PrimitiveError::fatal("anchor expired")]),
    );
    let shared = shared_anchor_near(0.0001);

    let result = reconciler
        .resolve_known_anchor(shared, None, &CancellationToken::new())
        .await;

    assert_eq!(
        result,
        Err(PlacementError::ResolutionFailed("anchor expired".to_string()))
    );
    assert_eq!(primitives.resolve_calls(), 1);
    assert!(reconciler.registry().get(&shared.id).is_none());
}

// ============================================================================
// Resolution
// ============================================================================

#[tokio::test]
async fn test_resolve_adopts_shared_id() {
    let (reconciler, primitives) =
        ready_reconciler(SimulatedAnchorPrimitives::new(session_origin()));
    let shared = shared_anchor_near(0.0005);

    let anchor = reconciler
        .resolve_known_anchor(shared, Some("citadel-9".into()), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(anchor.id(), shared.id);
    assert_eq!(anchor.state(), LifecycleState::Active);
    assert_eq!(anchor.payload().map(|p| p.as_str()), Some("citadel-9"));
    assert_eq!(primitives.resolve_calls(), 1);

    // ~55 m north of the session origin
    let pose = anchor.local_pose().unwrap();
    assert!((pose.position.z - 55.5).abs() < 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_resolution_timeout_covers_attempts_and_backoff() {
    let (reconciler, primitives) = ready_reconciler(
        SimulatedAnchorPrimitives::new(session_origin())
            .with_latency(Duration::from_secs(20))
            .with_failures(transient_failures(100)),
    );
    let shared = shared_anchor_near(0.0001);

    let result = reconciler
        .resolve_known_anchor(shared, None, &CancellationToken::new())
        .await;

    match result {
        Err(PlacementError::ResolutionTimeout { elapsed }) => {
            assert!(elapsed >= Duration::from_secs(30));
        }
        other => panic!("expected resolution timeout, got {:?}", other),
    }
    // 20 s, 0.5 s backoff, then the second attempt is cut off at 30 s
    assert_eq!(primitives.resolve_calls(), 2);
    assert!(reconciler.registry().is_empty());
}

#[tokio::test]
async fn test_batch_skips_active_entries() {
    let (reconciler, primitives) =
        ready_reconciler(SimulatedAnchorPrimitives::new(session_origin()));
    let token = CancellationToken::new();

    let already = shared_anchor_near(0.0002);
    reconciler
        .resolve_known_anchor(already, None, &token)
        .await
        .unwrap();
    assert_eq!(primitives.resolve_calls(), 1);

    let entries = with_payloads(&[
        already,
        shared_anchor_near(0.0004),
        shared_anchor_near(0.0006),
    ]);
    let resolved = reconciler.resolve_many_in_area(&entries, &token).await;

    assert_eq!(resolved, 3);
    // Only the two new entries reached the platform
    assert_eq!(primitives.resolve_calls(), 3);
    assert_eq!(reconciler.registry().all_active().len(), 3);
}

#[tokio::test]
async fn test_batch_attaches_each_entry_payload() {
    let (reconciler, _) = ready_reconciler(SimulatedAnchorPrimitives::new(session_origin()));
    let token = CancellationToken::new();

    let already = shared_anchor_near(0.0002);
    reconciler
        .resolve_known_anchor(already, None, &token)
        .await
        .unwrap();

    let entries = with_payloads(&[
        already,
        shared_anchor_near(0.0004),
        shared_anchor_near(0.0006),
    ]);
    reconciler.resolve_many_in_area(&entries, &token).await;

    for (entry, payload) in &entries {
        let anchor = reconciler.registry().get(&entry.id).unwrap();
        assert_eq!(anchor.payload(), Some(payload));
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_counts_only_successes_and_paces() {
    let (reconciler, primitives) = ready_reconciler(
        SimulatedAnchorPrimitives::new(session_origin())
            .with_failures([PrimitiveError::fatal("not found")]),
    );
    let entries = with_payloads(&[
        shared_anchor_near(0.0001),
        shared_anchor_near(0.0002),
        shared_anchor_near(0.0003),
    ]);
    let start = tokio::time::Instant::now();

    let resolved = reconciler
        .resolve_many_in_area(&entries, &CancellationToken::new())
        .await;

    assert_eq!(resolved, 2);
    assert_eq!(primitives.resolve_calls(), 3);
    assert!(reconciler.registry().get(&entries[0].0.id).is_none());
    // Two pacing gaps between three attempts
    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_batch_counts_anchors_active_at_end() {
    let (reconciler, _) = ready_reconciler(SimulatedAnchorPrimitives::new(session_origin()));
    let entries = with_payloads(&[
        shared_anchor_near(0.0001),
        shared_anchor_near(0.0002),
        shared_anchor_near(0.0003),
    ]);

    // Removed by the caller during the first pacing gap
    let registry = reconciler.registry().clone();
    let first = entries[0].0.id;
    let cleanup = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        registry.remove(&first)
    });

    let resolved = reconciler
        .resolve_many_in_area(&entries, &CancellationToken::new())
        .await;

    assert!(cleanup.await.unwrap());
    assert_eq!(resolved, 2);
    assert_eq!(reconciler.registry().all_active().len(), 2);
}

#[tokio::test]
async fn test_batch_stops_when_cancelled() {
    let (reconciler, primitives) =
        ready_reconciler(SimulatedAnchorPrimitives::new(session_origin()));
    let token = CancellationToken::new();
    token.cancel();

    let entries = with_payloads(&[shared_anchor_near(0.0001), shared_anchor_near(0.0002)]);
    let resolved = reconciler.resolve_many_in_area(&entries, &token).await;

    assert_eq!(resolved, 0);
    assert_eq!(primitives.resolve_calls(), 0);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_removes_anchor() {
    let (reconciler, primitives) = ready_reconciler(
        SimulatedAnchorPrimitives::new(session_origin()).with_failures(transient_failures(100)),
    );
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let result = reconciler
        .place_at_coordinate(session_origin(), "citadel-1".into(), &token)
        .await;

    assert_eq!(result, Err(PlacementError::Cancelled));
    // Cancelled inside the first 500 ms backoff
    assert_eq!(primitives.create_calls(), 1);
    assert!(reconciler.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_resolve_call_removes_anchor() {
    let (reconciler, primitives) = ready_reconciler(
        SimulatedAnchorPrimitives::new(session_origin()).with_latency(Duration::from_secs(5)),
    );
    let mut events = reconciler.registry().subscribe();
    let token = CancellationToken::new();
    let shared = shared_anchor_near(0.0001);

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let result = reconciler.resolve_known_anchor(shared, None, &token).await;

    assert_eq!(result, Err(PlacementError::Cancelled));
    assert_eq!(primitives.resolve_calls(), 1);
    assert!(reconciler.registry().get(&shared.id).is_none());
    assert!(reconciler.registry().is_empty());

    let states: Vec<LifecycleState> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|event| match event {
            AnchorEvent::StateChanged { state, .. } => Some(state),
            AnchorEvent::Failed { .. } => panic!("cancellation is not a failure"),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![LifecycleState::PendingResolution, LifecycleState::Removed]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_resolve_backoff_removes_anchor() {
    let (reconciler, primitives) = ready_reconciler(
        SimulatedAnchorPrimitives::new(session_origin()).with_failures(transient_failures(100)),
    );
    let token = CancellationToken::new();
    let shared = shared_anchor_near(0.0001);

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let result = reconciler.resolve_known_anchor(shared, None, &token).await;

    assert_eq!(result, Err(PlacementError::Cancelled));
    // Cancelled inside the first 500 ms backoff
    assert_eq!(primitives.resolve_calls(), 1);
    assert!(reconciler.registry().is_empty());
}

// ============================================================================
// Removal and tracking
// ============================================================================

#[tokio::test]
async fn test_remove_twice_is_idempotent() {
    let (reconciler, _) = ready_reconciler(SimulatedAnchorPrimitives::new(session_origin()));
    let anchor = reconciler
        .place_at_coordinate(
            session_origin(),
            "citadel-1".into(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(reconciler.registry().remove(&anchor.id()));
    assert!(!reconciler.registry().remove(&anchor.id()));

    assert!(reconciler.registry().get(&anchor.id()).is_none());
    assert!(reconciler.registry().all_active().is_empty());
}

#[tokio::test]
async fn test_tracking_feed_moves_anchors_and_back() {
    let (reconciler, _) = ready_reconciler(SimulatedAnchorPrimitives::new(session_origin()));
    let token = CancellationToken::new();

    let geo = reconciler
        .place_at_coordinate(session_origin(), "citadel-1".into(), &token)
        .await
        .unwrap();
    let local = reconciler.place_local_fallback(
        geoanchor::anchor::LocalPose::at(1.0, 0.0, 2.0),
        "marker-1".into(),
    );
    let registry = reconciler.registry();

    assert_eq!(registry.apply_tracking_state(LocalTrackingState::Limited), 2);
    assert_eq!(
        registry.get(&geo.id()).unwrap().state(),
        LifecycleState::Degraded
    );

    assert_eq!(
        registry.apply_tracking_state(LocalTrackingState::NotTracking),
        2
    );
    assert_eq!(registry.get(&local.id()).unwrap().state(), LifecycleState::Lost);
    assert!(registry.all_active().is_empty());

    assert_eq!(registry.apply_tracking_state(LocalTrackingState::Tracking), 2);
    let active: Vec<AnchorId> = registry.all_active().iter().map(|a| a.id()).collect();
    assert_eq!(active, vec![geo.id(), local.id()]);
}

#[tokio::test(start_paused = true)]
async fn test_positioning_feed_unlocks_placement() {
    let positioning = SharedPositionQuality::default();
    let (reconciler, primitives) = create_reconciler(
        positioning.clone(),
        SimulatedAnchorPrimitives::new(session_origin()),
        ReconcilerConfig::default(),
    );
    let token = CancellationToken::new();

    let mut states = positioning.subscribe();
    let provider = MockPositioningProvider::converging(SF_LAT, SF_LON, 10.0, 40.0, 4.0, 10)
        .with_interval(Duration::from_secs(1));
    let feed = spawn_positioning_feed(provider, positioning.clone(), token.clone());

    // Not ready yet: first fix is 40 m
    assert_eq!(states.recv().await.unwrap(), PositioningState::Localizing);
    let early = reconciler
        .place_at_coordinate(session_origin(), "citadel-1".into(), &token)
        .await;
    assert!(matches!(
        early,
        Err(PlacementError::InsufficientAccuracy {
            state: PositioningState::Localizing
        })
    ));

    assert_eq!(states.recv().await.unwrap(), PositioningState::Ready);
    let anchor = reconciler
        .place_at_coordinate(session_origin(), "citadel-1".into(), &token)
        .await
        .unwrap();
    assert_eq!(anchor.state(), LifecycleState::Active);
    assert_eq!(primitives.create_calls(), 1);

    feed.await.unwrap();
}

#[tokio::test]
async fn test_session_feed_drives_anchor_lifecycle() {
    let positioning = positioning_with(good_fix(), true);
    let (reconciler, _) = create_reconciler(
        positioning.clone(),
        SimulatedAnchorPrimitives::new(session_origin()),
        ReconcilerConfig::default(),
    );
    let token = CancellationToken::new();
    let anchor = reconciler
        .place_at_coordinate(session_origin(), "citadel-1".into(), &token)
        .await
        .unwrap();

    let lost = PositioningUpdate {
        fix: good_fix(),
        tracking: LocalTrackingState::NotTracking,
    };
    let provider = MockPositioningProvider::new([lost]);
    spawn_session_feed(
        provider,
        positioning.clone(),
        reconciler.registry().clone(),
        token.clone(),
    )
    .await
    .unwrap();

    assert_eq!(positioning.current_state(), PositioningState::NotTracking);
    assert_eq!(
        reconciler.registry().get(&anchor.id()).unwrap().state(),
        LifecycleState::Lost
    );

    let provider = MockPositioningProvider::new([PositioningUpdate::tracking(good_fix())]);
    spawn_session_feed(
        provider,
        positioning.clone(),
        reconciler.registry().clone(),
        token,
    )
    .await
    .unwrap();

    assert_eq!(positioning.current_state(), PositioningState::Ready);
    assert_eq!(
        reconciler.registry().get(&anchor.id()).unwrap().state(),
        LifecycleState::Active
    );
}
