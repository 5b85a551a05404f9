//! Anchor registry - the authoritative store of anchors.
//!
//! The registry is the only place anchor ids are generated and the only
//! mutator of anchor state. It enforces:
//!
//! - a `Geospatial` anchor always carries a target coordinate
//! - an `Active` anchor always carries a local pose
//! - one anchor per id
//! - `Removed` happens once, after which the anchor is evicted
//!
//! Every transition is published as [`AnchorEvent::StateChanged`].
//!
//! Anchors are kept in registration order, which is also `created_at` order,
//! so snapshots are reproducible.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use super::error::RegistryError;
use super::events::AnchorEvent;
use super::types::{
    Anchor, AnchorId, AnchorKind, AnchorOrigin, LifecycleState, LocalPose, PayloadId,
};
use crate::coord::GeoPose;
use crate::positioning::LocalTrackingState;

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Most recent removals remembered for `InvalidState` reporting.
///
/// Older removed ids are forgotten and report `NotFound` instead.
pub const MAX_REMOVED_TOMBSTONES: usize = 1024;

/// Store of all known anchors.
pub struct AnchorRegistry {
    /// Anchors keyed by registration sequence.
    anchors: BTreeMap<u64, Anchor>,
    /// Id to sequence lookup.
    index: HashMap<AnchorId, u64>,
    /// Recently removed ids, to tell misuse apart from unknown ids.
    /// Bounded by [`MAX_REMOVED_TOMBSTONES`], oldest evicted first.
    removed: HashSet<AnchorId>,
    removed_order: VecDeque<AnchorId>,
    next_seq: u64,
    events: broadcast::Sender<AnchorEvent>,
}

impl Default for AnchorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AnchorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create an empty registry with a custom event channel capacity.
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            anchors: BTreeMap::new(),
            index: HashMap::new(),
            removed: HashSet::new(),
            removed_order: VecDeque::new(),
            next_seq: 0,
            events,
        }
    }

    /// Register a new anchor.
    ///
    /// Originated anchors start in `PendingCreation` with a fresh id. Shared
    /// anchors adopt the given id and start in `PendingResolution`; only
    /// geospatial anchors can be shared.
    pub fn register(
        &mut self,
        kind: AnchorKind,
        target: Option<GeoPose>,
        origin: AnchorOrigin,
    ) -> Result<Anchor, RegistryError> {
        match (kind, target) {
            (AnchorKind::Geospatial, None) => {
                return Err(RegistryError::InvalidArgument(
                    "geospatial anchor requires a target coordinate".to_string(),
                ));
            }
            (_, Some(target)) => {
                target
                    .validate()
                    .map_err(|e| RegistryError::InvalidArgument(e.to_string()))?;
            }
            _ => {}
        }

        let (id, state) = match origin {
            AnchorOrigin::Originator => (AnchorId::generate(), LifecycleState::PendingCreation),
            AnchorOrigin::Shared(id) => {
                if kind != AnchorKind::Geospatial {
                    return Err(RegistryError::InvalidArgument(format!(
                        "only geospatial anchors can be resolved from shared data, got {}",
                        kind
                    )));
                }
                (id, LifecycleState::PendingResolution)
            }
        };

        if let Some(existing) = self.get(&id) {
            return Err(RegistryError::InvalidState {
                id,
                state: existing.state,
                operation: "register",
            });
        }

        let now = Instant::now();
        let anchor = Anchor {
            id,
            kind,
            target,
            local_pose: None,
            state,
            created_at: now,
            last_updated_at: now,
            payload: None,
            upgrade_pending: false,
        };
        self.insert(anchor.clone());

        Ok(anchor)
    }

    /// Register a local anchor whose pose is already known.
    ///
    /// The anchor passes through `PendingCreation` straight to `Active`.
    /// Cannot fail: the id is fresh and local anchors need no target.
    pub fn register_local(
        &mut self,
        pose: LocalPose,
        payload: Option<PayloadId>,
        upgrade_pending: bool,
    ) -> Anchor {
        let now = Instant::now();
        let mut anchor = Anchor {
            id: AnchorId::generate(),
            kind: AnchorKind::Local,
            target: None,
            local_pose: None,
            state: LifecycleState::PendingCreation,
            created_at: now,
            last_updated_at: now,
            payload,
            upgrade_pending,
        };
        self.insert(anchor.clone());

        anchor.local_pose = Some(pose);
        anchor.state = LifecycleState::Active;
        self.replace(anchor.clone());
        self.publish(AnchorEvent::StateChanged {
            id: anchor.id,
            state: LifecycleState::Active,
        });

        anchor
    }

    /// Associate the external payload object with an anchor.
    pub fn set_payload(&mut self, id: &AnchorId, payload: PayloadId) -> Result<(), RegistryError> {
        let anchor = self.anchor_mut(id, "set payload of")?;
        anchor.payload = Some(payload);
        Ok(())
    }

    /// Flag a local anchor for a later geospatial upgrade.
    pub fn mark_upgrade_pending(&mut self, id: &AnchorId) -> Result<(), RegistryError> {
        let anchor = self.anchor_mut(id, "flag for upgrade")?;
        if anchor.kind != AnchorKind::Local {
            return Err(RegistryError::InvalidArgument(format!(
                "only local anchors can await a geospatial upgrade, {} is {}",
                id, anchor.kind
            )));
        }
        anchor.upgrade_pending = true;
        Ok(())
    }

    /// Set the local pose of a pending anchor, making it `Active`.
    pub fn attach_local_pose(
        &mut self,
        id: &AnchorId,
        pose: LocalPose,
    ) -> Result<Anchor, RegistryError> {
        let anchor = self.anchor_mut(id, "attach pose to")?;
        if !anchor.state.is_pending() {
            return Err(RegistryError::InvalidState {
                id: *id,
                state: anchor.state,
                operation: "attach pose to",
            });
        }

        anchor.local_pose = Some(pose);
        let snapshot = self.transition(id, LifecycleState::Active)?;
        Ok(snapshot)
    }

    /// Refresh the pose of a tracked anchor (platform pose correction).
    pub fn update_local_pose(
        &mut self,
        id: &AnchorId,
        pose: LocalPose,
    ) -> Result<(), RegistryError> {
        let anchor = self.anchor_mut(id, "update pose of")?;
        if !anchor.state.is_tracked() {
            return Err(RegistryError::InvalidState {
                id: *id,
                state: anchor.state,
                operation: "update pose of",
            });
        }
        anchor.local_pose = Some(pose);
        anchor.last_updated_at = Instant::now();
        Ok(())
    }

    /// Local tracking limited for this anchor.
    pub fn mark_degraded(&mut self, id: &AnchorId) -> Result<(), RegistryError> {
        self.mark_tracked(id, LifecycleState::Degraded, "degrade")
    }

    /// Local tracking lost for this anchor.
    pub fn mark_lost(&mut self, id: &AnchorId) -> Result<(), RegistryError> {
        self.mark_tracked(id, LifecycleState::Lost, "lose")
    }

    /// Local tracking recovered for this anchor.
    pub fn mark_active(&mut self, id: &AnchorId) -> Result<(), RegistryError> {
        self.mark_tracked(id, LifecycleState::Active, "activate")
    }

    /// Move a degraded or lost geospatial anchor back to `PendingResolution`
    /// so it can be resolved again.
    pub fn begin_reresolution(&mut self, id: &AnchorId) -> Result<Anchor, RegistryError> {
        let anchor = self.anchor_mut(id, "re-resolve")?;
        let allowed = anchor.kind == AnchorKind::Geospatial
            && matches!(anchor.state, LifecycleState::Degraded | LifecycleState::Lost);
        if !allowed {
            return Err(RegistryError::InvalidState {
                id: *id,
                state: anchor.state,
                operation: "re-resolve",
            });
        }
        self.transition(id, LifecycleState::PendingResolution)
    }

    /// Apply a local tracking change to every tracked anchor.
    ///
    /// Returns the number of anchors whose state changed.
    pub fn apply_tracking_state(&mut self, tracking: LocalTrackingState) -> usize {
        let target = match tracking {
            LocalTrackingState::Tracking => LifecycleState::Active,
            LocalTrackingState::Limited => LifecycleState::Degraded,
            LocalTrackingState::NotTracking => LifecycleState::Lost,
        };

        let ids: Vec<AnchorId> = self
            .anchors
            .values()
            .filter(|a| a.state.is_tracked() && a.state != target)
            .map(|a| a.id)
            .collect();

        for id in &ids {
            // Ids come from tracked anchors, so the transition cannot fail
            let _ = self.transition(id, target);
        }

        if !ids.is_empty() {
            tracing::debug!(tracking = %tracking, changed = ids.len(), "Applied tracking state");
        }
        ids.len()
    }

    /// Remove an anchor. Idempotent: returns false when nothing was removed.
    pub fn remove(&mut self, id: &AnchorId) -> bool {
        let Some(seq) = self.index.remove(id) else {
            return false;
        };
        self.anchors.remove(&seq);
        self.remember_removed(*id);

        tracing::debug!(anchor = %id, "Anchor removed");
        self.publish(AnchorEvent::StateChanged {
            id: *id,
            state: LifecycleState::Removed,
        });
        true
    }

    /// Look up an anchor.
    pub fn get(&self, id: &AnchorId) -> Option<&Anchor> {
        self.index.get(id).and_then(|seq| self.anchors.get(seq))
    }

    /// Whether the id is registered and `Active`.
    pub fn is_active(&self, id: &AnchorId) -> bool {
        self.get(id)
            .is_some_and(|a| a.state == LifecycleState::Active)
    }

    /// All `Active` anchors, oldest first.
    pub fn all_active(&self) -> impl Iterator<Item = &Anchor> {
        self.iter().filter(|a| a.state == LifecycleState::Active)
    }

    /// Every registered anchor, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.values()
    }

    /// Local fallback anchors awaiting a geospatial upgrade.
    pub fn pending_upgrades(&self) -> impl Iterator<Item = &Anchor> {
        self.iter().filter(|a| a.upgrade_pending)
    }

    /// Tracked anchors not updated for longer than `max_age`.
    pub fn stale(&self, max_age: Duration, now: Instant) -> impl Iterator<Item = &Anchor> {
        self.iter()
            .filter(move |a| a.state.is_tracked() && a.since_update(now) > max_age)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<AnchorEvent> {
        self.events.subscribe()
    }

    /// Publish an event; dropped silently when nobody listens.
    pub(crate) fn publish(&self, event: AnchorEvent) {
        let _ = self.events.send(event);
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<AnchorEvent> {
        self.events.clone()
    }

    fn insert(&mut self, anchor: Anchor) {
        let id = anchor.id;
        let (kind, state) = (anchor.kind, anchor.state);

        let seq = self.next_seq;
        self.next_seq += 1;
        if self.removed.remove(&id) {
            self.removed_order.retain(|r| *r != id);
        }
        self.index.insert(id, seq);
        self.anchors.insert(seq, anchor);

        tracing::debug!(anchor = %id, kind = %kind, state = %state, "Anchor registered");
        self.publish(AnchorEvent::StateChanged { id, state });
    }

    fn remember_removed(&mut self, id: AnchorId) {
        if self.removed.insert(id) {
            self.removed_order.push_back(id);
        }
        while self.removed_order.len() > MAX_REMOVED_TOMBSTONES {
            if let Some(oldest) = self.removed_order.pop_front() {
                self.removed.remove(&oldest);
            }
        }
    }

    fn replace(&mut self, anchor: Anchor) {
        if let Some(seq) = self.index.get(&anchor.id) {
            self.anchors.insert(*seq, anchor);
        }
    }

    fn anchor_mut(
        &mut self,
        id: &AnchorId,
        operation: &'static str,
    ) -> Result<&mut Anchor, RegistryError> {
        match self.index.get(id) {
            Some(seq) => self
                .anchors
                .get_mut(seq)
                .ok_or(RegistryError::NotFound(*id)),
            None if self.removed.contains(id) => Err(RegistryError::InvalidState {
                id: *id,
                state: LifecycleState::Removed,
                operation,
            }),
            None => Err(RegistryError::NotFound(*id)),
        }
    }

    fn mark_tracked(
        &mut self,
        id: &AnchorId,
        state: LifecycleState,
        operation: &'static str,
    ) -> Result<(), RegistryError> {
        let anchor = self.anchor_mut(id, operation)?;
        if anchor.state == state {
            return Ok(());
        }
        if !anchor.state.is_tracked() || anchor.local_pose.is_none() {
            return Err(RegistryError::InvalidState {
                id: *id,
                state: anchor.state,
                operation,
            });
        }
        self.transition(id, state)?;
        Ok(())
    }

    fn transition(
        &mut self,
        id: &AnchorId,
        state: LifecycleState,
    ) -> Result<Anchor, RegistryError> {
        let anchor = self.anchor_mut(id, "transition")?;
        let from = anchor.state;
        anchor.state = state;
        anchor.last_updated_at = Instant::now();
        let snapshot = anchor.clone();

        tracing::trace!(anchor = %id, from = %from, to = %state, "Anchor transition");
        self.publish(AnchorEvent::StateChanged { id: *id, state });
        Ok(snapshot)
    }
}

/// Thread-safe handle to an [`AnchorRegistry`].
///
/// Locks are held only for the duration of a single call, never across an
/// await point.
#[derive(Clone)]
pub struct SharedAnchorRegistry {
    inner: Arc<Mutex<AnchorRegistry>>,
    events: broadcast::Sender<AnchorEvent>,
}

impl SharedAnchorRegistry {
    pub fn new(registry: AnchorRegistry) -> Self {
        let events = registry.event_sender();
        Self {
            inner: Arc::new(Mutex::new(registry)),
            events,
        }
    }

    /// Lock the registry for a compound operation.
    pub fn lock(&self) -> MutexGuard<'_, AnchorRegistry> {
        self.inner.lock()
    }

    /// Snapshot of an anchor.
    pub fn get(&self, id: &AnchorId) -> Option<Anchor> {
        self.inner.lock().get(id).cloned()
    }

    /// Whether the id is registered and `Active`.
    pub fn is_active(&self, id: &AnchorId) -> bool {
        self.inner.lock().is_active(id)
    }

    /// Snapshot of all `Active` anchors, oldest first.
    pub fn all_active(&self) -> Vec<Anchor> {
        self.inner.lock().all_active().cloned().collect()
    }

    /// Snapshot of every anchor, oldest first.
    pub fn snapshot(&self) -> Vec<Anchor> {
        self.inner.lock().iter().cloned().collect()
    }

    /// Remove an anchor (idempotent).
    pub fn remove(&self, id: &AnchorId) -> bool {
        self.inner.lock().remove(id)
    }

    /// Apply a local tracking change to every tracked anchor.
    pub fn apply_tracking_state(&self, tracking: LocalTrackingState) -> usize {
        self.inner.lock().apply_tracking_state(tracking)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<AnchorEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: AnchorEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for SharedAnchorRegistry {
    fn default() -> Self {
        Self::new(AnchorRegistry::new())
    }
}
