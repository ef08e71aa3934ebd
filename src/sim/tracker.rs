//! Object lifecycle tracking
//!
//! Owns every live falling object and drives it through
//! `Falling → Landed → Confirming | FailedPending → FadingOut → Removed`.
//! Off-screen objects are retired regardless of their state.
//!
//! Receipt completions arrive asynchronously and may refer to objects that
//! were retired in the meantime; every handler looks the hash up first and
//! drops the completion if it is gone.

use std::collections::HashMap;
use std::f32::consts::PI;

use glam::Vec2;
use rand::Rng;

use crate::chain::{ChainError, ChainRequest, ReceiptLookup, TransactionRecord, TxHash};
use crate::consts::{BURST_LARGE, OFFSCREEN_MARGIN};
use crate::physics::{BodyHandle, PhysicsWorld};
use crate::square_around;
use crate::tuning::Tuning;

use super::mapper::{Hsl, map_transaction};
use super::object::{FallingObject, LifecycleState, TransactionDetails};

/// Tracker settings, copied out of [`Tuning`]
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub confirmation_threshold: u64,
    pub status_poll_interval_ms: u64,
    pub chain_reaction_radius: f32,
    pub chain_reaction_delay_ms: u64,
    pub fade_step: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
}

impl From<&Tuning> for TrackerConfig {
    fn from(t: &Tuning) -> Self {
        Self {
            confirmation_threshold: t.confirmation_threshold,
            status_poll_interval_ms: t.status_poll_interval_ms,
            chain_reaction_radius: t.chain_reaction_radius,
            chain_reaction_delay_ms: t.chain_reaction_delay_ms,
            fade_step: t.fade_step,
            viewport_width: t.viewport_width,
            viewport_height: t.viewport_height,
        }
    }
}

/// Why an object left the world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Faded,
    OffScreen,
}

/// Side effects requested by the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// Lookup to forward to the chain source
    Request(ChainRequest),
    /// Particle burst
    Burst { at: Vec2, color: Hsl, count: u32 },
    /// Reached the confirmation threshold and started fading
    Confirmed(TxHash),
    /// Reverted; `affected` neighbours were scheduled to fade
    Failed { hash: TxHash, affected: usize },
    Removed {
        hash: TxHash,
        reason: RemovalReason,
        /// Neither scored nor struck the player
        dodged: bool,
    },
}

#[derive(Debug, Clone, Copy)]
struct ScheduledFade {
    hash: TxHash,
    due_ms: u64,
}

/// Live object set and lifecycle state machine
#[derive(Debug)]
pub struct LifecycleTracker {
    config: TrackerConfig,
    /// Spawn order
    objects: Vec<FallingObject>,
    by_body: HashMap<BodyHandle, TxHash>,
    scheduled: Vec<ScheduledFade>,
    head: u64,
    selected: Option<TxHash>,
}

impl LifecycleTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            objects: Vec::new(),
            by_body: HashMap::new(),
            scheduled: Vec::new(),
            head: 0,
            selected: None,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // === Queries ===

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FallingObject> {
        self.objects.iter()
    }

    pub fn get(&self, hash: &TxHash) -> Option<&FallingObject> {
        self.objects.iter().find(|o| o.hash() == *hash)
    }

    fn index_of(&self, hash: &TxHash) -> Option<usize> {
        self.objects.iter().position(|o| o.hash() == *hash)
    }

    pub fn is_live(&self, hash: &TxHash) -> bool {
        self.index_of(hash).is_some()
    }

    pub fn hash_for_body(&self, body: BodyHandle) -> Option<TxHash> {
        self.by_body.get(&body).copied()
    }

    pub fn object_for_body(&self, body: BodyHandle) -> Option<&FallingObject> {
        let hash = self.hash_for_body(body)?;
        self.get(&hash)
    }

    pub fn object_for_body_mut(&mut self, body: BodyHandle) -> Option<&mut FallingObject> {
        let hash = self.hash_for_body(body)?;
        self.objects.iter_mut().find(|o| o.hash() == hash)
    }

    pub fn is_scheduled(&self, hash: &TxHash) -> bool {
        self.scheduled.iter().any(|s| s.hash == *hash)
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    /// Highest block number seen
    pub fn head(&self) -> u64 {
        self.head
    }

    pub fn selected(&self) -> Option<TxHash> {
        self.selected
    }

    // === Spawning ===

    /// Map `tx` and drop it in above the viewport. Returns `None` when an
    /// object with the same hash is already live.
    pub fn spawn<W: PhysicsWorld, R: Rng>(
        &mut self,
        tx: TransactionRecord,
        world: &mut W,
        rng: &mut R,
        fall_speed: f32,
        now_ms: u64,
    ) -> Option<TxHash> {
        let hash = tx.hash;
        if self.is_live(&hash) {
            log::warn!("Transaction {} already live, not spawning", hash.short());
            return None;
        }

        let descriptor = map_transaction(&tx);
        let half = descriptor.size / 2.0;
        let span = (self.config.viewport_width - descriptor.size).max(0.0);
        let x = half + rng.random::<f32>() * span;
        let angle = rng.random_range(-PI / 8.0..PI / 8.0);

        let body = world.create_body(&descriptor.body_spec(angle), Vec2::new(x, -descriptor.size));
        let initial_speed = (descriptor.physics.fall_speed + fall_speed) / 2.0;
        world.set_velocity(body, Vec2::new(0.0, initial_speed));
        world.set_angular_velocity(body, descriptor.physics.spin);

        log::debug!(
            "Spawned {} as {} (size {:.0})",
            hash.short(),
            descriptor.category.as_str(),
            descriptor.size
        );
        self.by_body.insert(body, hash);
        self.objects
            .push(FallingObject::new(tx, body, descriptor, now_ms));
        Some(hash)
    }

    // === Per-tick update ===

    /// Advance every object by one tick
    pub fn update<W: PhysicsWorld>(
        &mut self,
        world: &mut W,
        now_ms: u64,
        fall_speed: f32,
    ) -> Vec<TrackerEvent> {
        let mut events = Vec::new();
        self.fire_due_fades(now_ms);

        let manual_motion = !world.integrates_motion();
        let offscreen_y = self.config.viewport_height + OFFSCREEN_MARGIN;
        let mut retire: Vec<(TxHash, RemovalReason, Option<Vec2>)> = Vec::new();

        for obj in &mut self.objects {
            let Some(mut pos) = world.position(obj.body) else {
                log::debug!("Body for {} vanished, retiring", obj.hash().short());
                retire.push((obj.hash(), RemovalReason::OffScreen, None));
                continue;
            };

            if manual_motion && !obj.grounded {
                pos.y += fall_speed;
                world.set_position(obj.body, pos);
            }

            // Strictly beyond the margin
            if pos.y > offscreen_y {
                retire.push((obj.hash(), RemovalReason::OffScreen, None));
                continue;
            }

            if obj.state == LifecycleState::FailedPending {
                obj.state = LifecycleState::FadingOut;
            }

            if obj.state.awaits_receipt()
                && !obj.status_in_flight
                && now_ms.saturating_sub(obj.last_status_poll_ms)
                    >= self.config.status_poll_interval_ms
            {
                obj.status_in_flight = true;
                obj.last_status_poll_ms = now_ms;
                events.push(TrackerEvent::Request(ChainRequest::Receipt(obj.hash())));
            }

            if obj.state == LifecycleState::FadingOut {
                let old = obj.scale;
                obj.scale = (old - self.config.fade_step).max(0.0);
                if obj.scale <= f32::EPSILON {
                    retire.push((obj.hash(), RemovalReason::Faded, Some(pos)));
                } else {
                    world.scale_body(obj.body, obj.scale / old);
                }
            }
        }

        for (hash, reason, burst_at) in retire {
            if let Some(obj) = self.remove(&hash, world) {
                if let Some(at) = burst_at {
                    events.push(TrackerEvent::Burst {
                        at,
                        color: obj.color(now_ms),
                        count: BURST_LARGE,
                    });
                }
                events.push(TrackerEvent::Removed {
                    hash,
                    reason,
                    dodged: !obj.scored && !obj.struck_player,
                });
            }
        }
        events
    }

    fn fire_due_fades(&mut self, now_ms: u64) {
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.scheduled)
            .into_iter()
            .partition(|s| s.due_ms <= now_ms);
        self.scheduled = pending;
        for fade in due {
            let Some(obj) = self.objects.iter_mut().find(|o| o.hash() == fade.hash) else {
                continue;
            };
            if !obj.state.is_fading() {
                log::debug!("Chain reaction reached {}", fade.hash.short());
                obj.state = LifecycleState::FadingOut;
            }
        }
    }

    /// Release an object's body and forget it. Idempotent.
    fn remove<W: PhysicsWorld>(&mut self, hash: &TxHash, world: &mut W) -> Option<FallingObject> {
        let idx = self.index_of(hash)?;
        let mut obj = self.objects.remove(idx);
        world.remove_body(obj.body);
        self.by_body.remove(&obj.body);
        self.scheduled.retain(|s| s.hash != *hash);
        if self.selected == Some(*hash) {
            self.selected = None;
        }
        obj.state = LifecycleState::Removed;
        log::debug!("Removed {}", hash.short());
        Some(obj)
    }

    // === Async completions ===

    /// Integrate a receipt lookup. Completions for retired objects are dropped.
    pub fn on_receipt<W: PhysicsWorld>(
        &mut self,
        hash: TxHash,
        result: Result<ReceiptLookup, ChainError>,
        world: &W,
        now_ms: u64,
    ) -> Vec<TrackerEvent> {
        let threshold = self.config.confirmation_threshold;
        let Some(idx) = self.index_of(&hash) else {
            log::debug!("Discarding receipt for retired {}", hash.short());
            return Vec::new();
        };
        self.objects[idx].status_in_flight = false;

        let lookup = match result {
            Ok(lookup) => lookup,
            Err(e) => {
                log::warn!("Receipt lookup for {} failed: {e}", hash.short());
                return Vec::new();
            }
        };
        self.head = self.head.max(lookup.head);

        let obj = &mut self.objects[idx];
        let Some(receipt) = lookup.receipt else {
            return Vec::new();
        };
        if !obj.state.awaits_receipt() {
            return Vec::new();
        }

        obj.receipt_block = Some(receipt.block_number);
        if receipt.success {
            obj.state = LifecycleState::Confirming;
            obj.observe_confirmations(self.head.saturating_sub(receipt.block_number));
            log::debug!(
                "{} mined in {} ({} confirmations)",
                hash.short(),
                receipt.block_number,
                obj.confirmations
            );
            if obj.confirmations >= threshold {
                obj.state = LifecycleState::FadingOut;
                return vec![TrackerEvent::Confirmed(hash)];
            }
            Vec::new()
        } else {
            obj.state = LifecycleState::FailedPending;
            obj.darkened = true;
            let affected = self.chain_reaction(&hash, world, now_ms);
            log::info!("{} reverted, chain reaction hits {affected}", hash.short());
            vec![TrackerEvent::Failed { hash, affected }]
        }
    }

    /// Schedule fades for every live, non-fading object within the radius
    fn chain_reaction<W: PhysicsWorld>(&mut self, origin: &TxHash, world: &W, now_ms: u64) -> usize {
        let Some(center) = self.get(origin).and_then(|o| world.position(o.body)) else {
            return 0;
        };
        let radius = self.config.chain_reaction_radius;
        let (min, max) = square_around(center, radius);
        let due_ms = now_ms + self.config.chain_reaction_delay_ms;

        let mut affected = 0;
        for body in world.bodies_in_region(min, max) {
            let Some(obj) = self.object_for_body(body) else {
                continue;
            };
            let hash = obj.hash();
            if hash == *origin
                || obj.state.is_fading()
                || obj.state == LifecycleState::FailedPending
                || self.is_scheduled(&hash)
            {
                continue;
            }
            let Some(pos) = world.position(body) else {
                continue;
            };
            if pos.distance(center) <= radius {
                self.scheduled.push(ScheduledFade { hash, due_ms });
                affected += 1;
            }
        }
        affected
    }

    /// New head block: confirming objects gain confirmations
    pub fn on_new_block(&mut self, number: u64) -> Vec<TrackerEvent> {
        self.head = self.head.max(number);
        let threshold = self.config.confirmation_threshold;
        let mut events = Vec::new();
        for obj in &mut self.objects {
            if obj.state != LifecycleState::Confirming {
                continue;
            }
            if let Some(block) = obj.receipt_block {
                obj.observe_confirmations(self.head.saturating_sub(block));
                if obj.confirmations >= threshold {
                    obj.state = LifecycleState::FadingOut;
                    events.push(TrackerEvent::Confirmed(obj.hash()));
                }
            }
        }
        events
    }

    /// Object touched the ground (or a landed object)
    pub fn on_ground_contact<W: PhysicsWorld>(&mut self, body: BodyHandle, world: &mut W) -> bool {
        let Some(obj) = self.object_for_body_mut(body) else {
            return false;
        };
        if obj.grounded {
            return false;
        }
        obj.grounded = true;
        if obj.state == LifecycleState::Falling {
            obj.state = LifecycleState::Landed;
        }
        world.set_static(body, true);
        world.set_velocity(body, Vec2::ZERO);
        world.set_angular_velocity(body, 0.0);
        true
    }

    /// Whether `body` is a landed object others can rest on
    pub fn is_grounded_body(&self, body: BodyHandle) -> bool {
        self.object_for_body(body).is_some_and(|o| o.grounded)
    }

    // === Player-facing helpers ===

    /// Object under the pointer
    pub fn object_at<W: PhysicsWorld>(&self, world: &W, point: Vec2) -> Option<&FallingObject> {
        world
            .body_at_point(point)
            .and_then(|body| self.object_for_body(body))
    }

    /// Select the object under the pointer and describe it
    pub fn select_at<W: PhysicsWorld>(&mut self, world: &W, point: Vec2) -> Option<TransactionDetails> {
        let threshold = self.config.confirmation_threshold;
        let details = self
            .object_at(world, point)
            .map(|o| (o.hash(), TransactionDetails::of(o, threshold)));
        self.selected = details.as_ref().map(|(h, _)| *h);
        details.map(|(_, d)| d)
    }

    /// Force the newest object to full confirmation (debug aid)
    pub fn confirm_latest(&mut self) -> Option<TxHash> {
        let threshold = self.config.confirmation_threshold;
        let obj = self.objects.iter_mut().rev().find(|o| !o.state.is_fading())?;
        obj.observe_confirmations(threshold);
        obj.state = LifecycleState::FadingOut;
        Some(obj.hash())
    }

    /// Start fading every non-fading object within `radius` of `center`
    pub fn fade_within<W: PhysicsWorld>(&mut self, world: &W, center: Vec2, radius: f32) -> usize {
        let mut count = 0;
        for obj in &mut self.objects {
            if obj.state.is_fading() {
                continue;
            }
            if world
                .position(obj.body)
                .is_some_and(|p| p.distance(center) <= radius)
            {
                obj.state = LifecycleState::FadingOut;
                count += 1;
            }
        }
        count
    }

    /// Release every body and forget all state
    pub fn cleanup<W: PhysicsWorld>(&mut self, world: &mut W) {
        for obj in self.objects.drain(..) {
            world.remove_body(obj.body);
        }
        self.by_body.clear();
        self.scheduled.clear();
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Address, ReceiptInfo};
    use crate::consts::SIM_DT_MS;
    use crate::physics::KinematicWorld;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn tx(n: u8) -> TransactionRecord {
        TransactionRecord {
            hash: TxHash([n; 32]),
            from: Address::default(),
            to: Some(Address([1; 20])),
            value: 0,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            nonce: n as u64,
            input: Vec::new(),
        }
    }

    fn setup() -> (LifecycleTracker, KinematicWorld, Pcg32) {
        let tracker = LifecycleTracker::new(TrackerConfig::from(&Tuning::default()));
        let world = KinematicWorld::new(0.0).without_integration();
        (tracker, world, Pcg32::seed_from_u64(42))
    }

    fn place(
        tracker: &mut LifecycleTracker,
        world: &mut KinematicWorld,
        rng: &mut Pcg32,
        n: u8,
        at: Vec2,
    ) -> TxHash {
        let hash = tracker.spawn(tx(n), world, rng, 2.0, 0).unwrap();
        let body = tracker.get(&hash).unwrap().body;
        world.set_position(body, at);
        hash
    }

    fn receipt(success: bool, block: u64, head: u64) -> Result<ReceiptLookup, ChainError> {
        Ok(ReceiptLookup {
            receipt: Some(ReceiptInfo {
                success,
                block_number: block,
            }),
            head,
        })
    }

    #[test]
    fn test_duplicate_hash_not_spawned() {
        let (mut tracker, mut world, mut rng) = setup();
        assert!(tracker.spawn(tx(1), &mut world, &mut rng, 2.0, 0).is_some());
        assert!(tracker.spawn(tx(1), &mut world, &mut rng, 2.0, 0).is_none());
        assert_eq!(tracker.len(), 1);
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_manual_motion_when_world_does_not_integrate() {
        let (mut tracker, mut world, mut rng) = setup();
        let h = place(&mut tracker, &mut world, &mut rng, 1, Vec2::new(100.0, 0.0));
        tracker.update(&mut world, 0, 3.0);
        let body = tracker.get(&h).unwrap().body;
        assert_eq!(world.position(body).unwrap().y, 3.0);
    }

    #[test]
    fn test_offscreen_boundary_is_exclusive() {
        let (mut tracker, mut world, mut rng) = setup();
        let limit = 600.0 + OFFSCREEN_MARGIN;
        let a = place(&mut tracker, &mut world, &mut rng, 1, Vec2::new(100.0, limit));
        let b = place(&mut tracker, &mut world, &mut rng, 2, Vec2::new(300.0, limit + 0.5));
        let events = tracker.update(&mut world, 0, 0.0);
        assert!(tracker.is_live(&a));
        assert!(!tracker.is_live(&b));
        assert!(events.contains(&TrackerEvent::Removed {
            hash: b,
            reason: RemovalReason::OffScreen,
            dodged: true,
        }));
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_late_receipt_after_offscreen_is_ignored() {
        let (mut tracker, mut world, mut rng) = setup();
        let h = place(&mut tracker, &mut world, &mut rng, 1, Vec2::new(100.0, 100.0));
        let events = tracker.update(&mut world, 2000, 0.0);
        assert_eq!(events, vec![TrackerEvent::Request(ChainRequest::Receipt(h))]);

        let body = tracker.get(&h).unwrap().body;
        world.set_position(body, Vec2::new(100.0, 2000.0));
        let events = tracker.update(&mut world, 2016, 0.0);
        let removals = events
            .iter()
            .filter(|e| matches!(e, TrackerEvent::Removed { .. }))
            .count();
        assert_eq!(removals, 1);

        let late = tracker.on_receipt(h, receipt(false, 10, 12), &world, 2100);
        assert!(late.is_empty());
        assert!(tracker.is_empty());
        assert_eq!(tracker.scheduled_count(), 0);
        assert!(tracker.update(&mut world, 2200, 0.0).is_empty());
    }

    #[test]
    fn test_one_receipt_lookup_in_flight() {
        let (mut tracker, mut world, mut rng) = setup();
        let h = place(&mut tracker, &mut world, &mut rng, 1, Vec2::new(100.0, 100.0));
        assert!(tracker.update(&mut world, 1999, 0.0).is_empty());
        assert_eq!(tracker.update(&mut world, 2000, 0.0).len(), 1);
        // Still in flight long after the interval
        assert!(tracker.update(&mut world, 9000, 0.0).is_empty());

        // Error clears the flag; the interval has long passed so it retries
        tracker.on_receipt(h, Err(ChainError::Transport("down".into())), &world, 9000);
        assert_eq!(tracker.update(&mut world, 9001, 0.0).len(), 1);
        assert!(tracker.update(&mut world, 12_000, 0.0).is_empty());
    }

    #[test]
    fn test_confirmation_threshold_then_fade() {
        let (mut tracker, mut world, mut rng) = setup();
        let h = place(&mut tracker, &mut world, &mut rng, 1, Vec2::new(100.0, 100.0));

        assert!(tracker.on_receipt(h, receipt(true, 100, 101), &world, 0).is_empty());
        let obj = tracker.get(&h).unwrap();
        assert_eq!(obj.state, LifecycleState::Confirming);
        assert_eq!(obj.confirmations, 1);

        assert!(tracker.on_new_block(102).is_empty());
        assert_eq!(tracker.on_new_block(103), vec![TrackerEvent::Confirmed(h)]);
        assert_eq!(tracker.get(&h).unwrap().state, LifecycleState::FadingOut);
        // Stale head does not lower confirmations
        tracker.on_new_block(90);
        assert_eq!(tracker.get(&h).unwrap().confirmations, 3);

        let mut removed = false;
        for tick in 0..25u64 {
            let events = tracker.update(&mut world, tick * SIM_DT_MS as u64, 0.0);
            if events.iter().any(|e| matches!(e, TrackerEvent::Burst { .. })) {
                removed = true;
                break;
            }
        }
        assert!(removed);
        assert!(tracker.is_empty());
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_failure_chain_reaction_respects_radius() {
        let (mut tracker, mut world, mut rng) = setup();
        let origin = place(&mut tracker, &mut world, &mut rng, 1, Vec2::new(400.0, 300.0));
        let near = place(&mut tracker, &mut world, &mut rng, 2, Vec2::new(450.0, 300.0));
        let edge = place(&mut tracker, &mut world, &mut rng, 3, Vec2::new(400.0, 400.0));
        let far = place(&mut tracker, &mut world, &mut rng, 4, Vec2::new(550.0, 300.0));
        let corner = place(&mut tracker, &mut world, &mut rng, 5, Vec2::new(480.0, 380.0));
        let fading = place(&mut tracker, &mut world, &mut rng, 6, Vec2::new(380.0, 300.0));
        tracker.fade_within(&world, Vec2::new(380.0, 300.0), 1.0);

        let events = tracker.on_receipt(origin, receipt(false, 10, 10), &world, 1000);
        assert_eq!(events, vec![TrackerEvent::Failed { hash: origin, affected: 2 }]);
        assert!(tracker.is_scheduled(&near));
        assert!(tracker.is_scheduled(&edge));
        assert!(!tracker.is_scheduled(&far));
        assert!(!tracker.is_scheduled(&corner));
        assert!(!tracker.is_scheduled(&fading));
        assert!(tracker.get(&origin).unwrap().darkened);

        // Delay not yet elapsed
        tracker.update(&mut world, 1299, 0.0);
        assert_eq!(tracker.get(&near).unwrap().state, LifecycleState::Falling);
        assert_eq!(tracker.get(&origin).unwrap().state, LifecycleState::FadingOut);

        tracker.update(&mut world, 1300, 0.0);
        assert_eq!(tracker.get(&near).unwrap().state, LifecycleState::FadingOut);
        assert_eq!(tracker.get(&edge).unwrap().state, LifecycleState::FadingOut);
        assert_eq!(tracker.get(&far).unwrap().state, LifecycleState::Falling);
        assert_eq!(tracker.scheduled_count(), 0);
    }

    #[test]
    fn test_second_failure_does_not_double_schedule() {
        let (mut tracker, mut world, mut rng) = setup();
        let a = place(&mut tracker, &mut world, &mut rng, 1, Vec2::new(400.0, 300.0));
        let b = place(&mut tracker, &mut world, &mut rng, 2, Vec2::new(420.0, 300.0));
        let c = place(&mut tracker, &mut world, &mut rng, 3, Vec2::new(440.0, 300.0));
        tracker.on_receipt(a, receipt(false, 1, 1), &world, 0);
        // a is already doomed, c is already scheduled
        let events = tracker.on_receipt(b, receipt(false, 1, 1), &world, 10);
        assert_eq!(events, vec![TrackerEvent::Failed { hash: b, affected: 0 }]);
        assert!(tracker.is_scheduled(&c));
        assert_eq!(tracker.scheduled_count(), 2);
    }

    #[test]
    fn test_land_and_select() {
        let (mut tracker, mut world, mut rng) = setup();
        let h = place(&mut tracker, &mut world, &mut rng, 1, Vec2::new(200.0, 200.0));
        let body = tracker.get(&h).unwrap().body;
        assert!(tracker.on_ground_contact(body, &mut world));
        assert!(!tracker.on_ground_contact(body, &mut world));
        assert_eq!(tracker.get(&h).unwrap().state, LifecycleState::Landed);
        assert_eq!(world.is_static(body), Some(true));

        let details = tracker.select_at(&world, Vec2::new(200.0, 200.0)).unwrap();
        assert_eq!(details.hash, h.to_string());
        assert_eq!(tracker.selected(), Some(h));
        assert!(tracker.select_at(&world, Vec2::new(0.0, 0.0)).is_none());
        assert_eq!(tracker.selected(), None);
    }

    #[test]
    fn test_cleanup_releases_bodies() {
        let (mut tracker, mut world, mut rng) = setup();
        for n in 0..4 {
            tracker.spawn(tx(n), &mut world, &mut rng, 2.0, 0);
        }
        assert_eq!(world.body_count(), 4);
        tracker.cleanup(&mut world);
        assert!(tracker.is_empty());
        assert_eq!(world.body_count(), 0);
    }
}
