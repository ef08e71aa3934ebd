//! The game: one owner for every piece of simulation state
//!
//! Generic over the physics world and the chain source so the same loop
//! runs against matter.js and a live node in the browser, and against
//! [`KinematicWorld`](crate::physics::KinematicWorld) and
//! [`ScriptedChainSource`](crate::chain::ScriptedChainSource) in tests.

use std::collections::HashSet;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::audio::{AudioMix, SoundEffect};
use crate::chain::{
    ChainEvent, ChainRequest, ChainSource, SubscriptionId, Topic, TransactionRecord, TxHash,
};
use crate::consts::*;
use crate::physics::{BodyHandle, BodyLabel, BodySpec, Collider, PhysicsWorld};
use crate::tuning::Tuning;

use super::blackhole::BlackHole;
use super::buffer::TxBuffer;
use super::collision::{Contact, Strike, StrikeContext, classify, judge_strike};
use super::congestion::{CongestionEstimator, DifficultyController};
use super::mapper::Hsl;
use super::object::TransactionDetails;
use super::powerup::{EffectChange, PowerUpScheduler};
use super::state::{GameEvent, GameState};
use super::tracker::{LifecycleTracker, RemovalReason, TrackerConfig, TrackerEvent};

/// Player body color
pub const PLAYER_COLOR: Hsl = Hsl {
    h: PLAYER_HUE,
    s: 100.0,
    l: 50.0,
};

pub struct Game<W: PhysicsWorld, S: ChainSource> {
    pub(super) tuning: Tuning,
    pub(super) rng: Pcg32,
    pub(super) state: GameState,
    pub(super) world: W,
    pub(super) chain: S,
    pub(super) buffer: TxBuffer,
    pub(super) tracker: LifecycleTracker,
    pub(super) estimator: CongestionEstimator,
    pub(super) controller: DifficultyController,
    pub(super) powerups: PowerUpScheduler,
    pub(super) black_hole: BlackHole,
    pub(super) player: BodyHandle,
    pub(super) ground: BodyHandle,
    pub(super) player_grounded: bool,
    subscriptions: Vec<SubscriptionId>,
    /// Transaction lookups in flight
    fetching: HashSet<TxHash>,
    /// Monotonic across restarts; chain sources pace themselves on it
    pub(super) clock_ms: f64,
    /// Clock reading when the current run began
    pub(super) session_start_ms: u64,
    pub(super) last_spawn_ms: u64,
    pub(super) selection: Option<TransactionDetails>,
}

impl<W: PhysicsWorld, S: ChainSource> Game<W, S> {
    /// Build the arena and subscribe to the chain. Subscription failures are
    /// logged; the game still runs, just without new objects.
    pub fn new(tuning: Tuning, mut world: W, chain: S, seed: u64) -> Self {
        let (player, ground) = build_arena(&mut world, &tuning);
        let mut game = Self {
            rng: Pcg32::seed_from_u64(seed),
            state: GameState::new(seed, tuning.initial_lives),
            buffer: TxBuffer::new(tuning.buffer_capacity),
            tracker: LifecycleTracker::new(TrackerConfig::from(&tuning)),
            estimator: CongestionEstimator::new(&tuning),
            controller: DifficultyController::new(&tuning),
            powerups: PowerUpScheduler::new(&tuning),
            black_hole: BlackHole::new(&tuning),
            world,
            chain,
            player,
            ground,
            player_grounded: true,
            subscriptions: Vec::new(),
            fetching: HashSet::new(),
            clock_ms: 0.0,
            session_start_ms: 0,
            last_spawn_ms: 0,
            selection: None,
            tuning,
        };
        game.subscribe();
        log::info!("Game started (seed {seed})");
        game
    }

    fn subscribe(&mut self) {
        for topic in [Topic::PendingTransactions, Topic::NewBlocks] {
            match self.chain.subscribe(topic) {
                Ok(id) => self.subscriptions.push(id),
                Err(e) => log::warn!("Subscribing to {topic:?} failed: {e}"),
            }
        }
    }

    // === Accessors ===

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn chain(&self) -> &S {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut S {
        &mut self.chain
    }

    pub fn tracker(&self) -> &LifecycleTracker {
        &self.tracker
    }

    pub fn buffer(&self) -> &TxBuffer {
        &self.buffer
    }

    pub fn powerups(&self) -> &PowerUpScheduler {
        &self.powerups
    }

    pub fn estimator(&self) -> &CongestionEstimator {
        &self.estimator
    }

    pub fn controller(&self) -> &DifficultyController {
        &self.controller
    }

    pub fn black_hole(&self) -> &BlackHole {
        &self.black_hole
    }

    pub fn player(&self) -> BodyHandle {
        self.player
    }

    pub fn player_position(&self) -> Vec2 {
        self.world
            .position(self.player)
            .unwrap_or(Vec2::new(self.tuning.viewport_width / 2.0, self.tuning.floor_y()))
    }

    /// Player color this frame; `None` while blinking off
    pub fn player_color(&self) -> Option<Hsl> {
        (!self.powerups.is_blinking(self.now_ms())).then_some(PLAYER_COLOR)
    }

    pub fn now_ms(&self) -> u64 {
        self.clock_ms as u64
    }

    /// Tooltip for the last clicked object
    pub fn selection(&self) -> Option<&TransactionDetails> {
        self.selection.as_ref()
    }

    pub fn audio_mix(&self) -> AudioMix {
        self.controller.mix()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.state.drain_events()
    }

    // === Chain events ===

    /// Route every completion and notification that arrived since last tick
    pub(super) fn process_chain_events(&mut self, now_ms: u64) {
        for event in self.chain.poll_events(now_ms) {
            match event {
                ChainEvent::PendingTransaction(hash) => self.on_pending(hash),
                ChainEvent::Transaction { hash, result } => {
                    self.fetching.remove(&hash);
                    match result {
                        Ok(Some(tx)) => self.on_transaction(tx),
                        Ok(None) => log::debug!("Transaction {} not found", hash.short()),
                        Err(e) => log::warn!("Fetching {} failed: {e}", hash.short()),
                    }
                }
                ChainEvent::Receipt { hash, result } => {
                    let events = self.tracker.on_receipt(hash, result, &self.world, now_ms);
                    self.apply_tracker_events(events);
                }
                ChainEvent::NewBlock(number) => {
                    let events = self.tracker.on_new_block(number);
                    self.apply_tracker_events(events);
                }
                ChainEvent::NetworkSample(Ok(sample)) => {
                    let status = self.estimator.observe(sample, &self.tuning, now_ms);
                    self.controller
                        .retarget(status.congestion_level, &mut self.rng);
                    self.state.emit(GameEvent::NetworkStatus(status));
                    if self.black_hole.observe_pending(status.pending_tx_count) {
                        self.state.emit(GameEvent::BlackHoleReady);
                    }
                }
                ChainEvent::NetworkSample(Err(e)) => self.estimator.sample_failed(&e, now_ms),
            }
        }

        if self.estimator.due(now_ms) {
            self.estimator.begin_sample(now_ms);
            self.chain.request(ChainRequest::NetworkSample);
        }
    }

    /// Fetch a pending transaction only while the buffer can take it
    fn on_pending(&mut self, hash: TxHash) {
        if self.buffer.len() + self.fetching.len() >= self.buffer.capacity()
            || self.fetching.contains(&hash)
            || self.buffer.contains(&hash)
            || self.tracker.is_live(&hash)
        {
            return;
        }
        self.fetching.insert(hash);
        self.chain.request(ChainRequest::Transaction(hash));
    }

    fn on_transaction(&mut self, tx: TransactionRecord) {
        if self.tracker.is_live(&tx.hash) || self.buffer.contains(&tx.hash) {
            return;
        }
        let hash = tx.hash;
        if !self.buffer.offer(tx) {
            log::debug!("Buffer full, dropping {}", hash.short());
        }
    }

    pub(super) fn apply_tracker_events(&mut self, events: Vec<TrackerEvent>) {
        for event in events {
            match event {
                TrackerEvent::Request(request) => self.chain.request(request),
                TrackerEvent::Burst { at, color, count } => {
                    self.state.emit(GameEvent::Burst { at, color, count })
                }
                TrackerEvent::Confirmed(_) => self.state.emit(GameEvent::Sound(SoundEffect::Confirm)),
                TrackerEvent::Failed { .. } => self.state.emit(GameEvent::Sound(SoundEffect::Revert)),
                TrackerEvent::Removed {
                    reason: RemovalReason::OffScreen,
                    dodged: true,
                    ..
                } => self.state.add_score(self.tuning.dodge_points),
                TrackerEvent::Removed { .. } => {}
            }
        }
    }

    // === Collisions ===

    pub(super) fn resolve_collisions(&mut self, now_ms: u64) {
        for pair in self.world.drain_collision_starts() {
            match classify(pair, &self.world) {
                Contact::PlayerObject(body) => self.on_player_object(body, now_ms),
                Contact::PlayerPowerUp(body) => self.on_player_power_up(body, now_ms),
                Contact::PlayerSupport => self.player_grounded = true,
                Contact::ObjectGround(body) => self.land(body),
                Contact::ObjectObject(a, b) => {
                    match (self.tracker.is_grounded_body(a), self.tracker.is_grounded_body(b)) {
                        (true, false) => self.land(b),
                        (false, true) => self.land(a),
                        _ => {}
                    }
                }
                Contact::Other => {}
            }
            if self.state.is_over() {
                break;
            }
        }
    }

    fn land(&mut self, body: BodyHandle) {
        if !self.tracker.on_ground_contact(body, &mut self.world) {
            return;
        }
        let Some(obj) = self.tracker.object_for_body_mut(body) else {
            return;
        };
        if obj.scored || obj.struck_player {
            return;
        }
        obj.scored = true;
        self.state.add_score(self.tuning.dodge_points);
    }

    fn on_player_object(&mut self, body: BodyHandle, now_ms: u64) {
        if self.tracker.is_grounded_body(body) {
            // Standing on (or walking into) the pile
            self.player_grounded = true;
            return;
        }
        let player_pos = self.player_position();
        let ctx = StrikeContext {
            invincible: self.powerups.is_invincible(),
            in_grace: self.state.in_grace(now_ms),
            min_impact_speed: self.tuning.min_impact_speed,
        };
        let object_pos = self.world.position(body).unwrap_or(player_pos);
        let object_vel = self.world.velocity(body).unwrap_or(Vec2::ZERO);
        let Some(obj) = self.tracker.object_for_body_mut(body) else {
            return;
        };
        let strike = judge_strike(object_pos, object_vel, player_pos, obj.struck_player, &ctx);
        if strike.marks_object() {
            obj.struck_player = true;
        }
        let color = obj.color(now_ms);

        match strike {
            Strike::Hit => {
                self.state.lose_life(now_ms, self.tuning.hit_grace_ms);
                self.state.emit(GameEvent::Burst {
                    at: player_pos,
                    color,
                    count: BURST_LARGE,
                });
                self.state.emit(GameEvent::Sound(SoundEffect::Collision));
            }
            Strike::Graze => {
                self.state.emit(GameEvent::Burst {
                    at: object_pos,
                    color,
                    count: BURST_SMALL,
                });
                self.state.emit(GameEvent::Sound(SoundEffect::Bump));
            }
            Strike::Shielded | Strike::Ignored => {}
        }
    }

    fn on_player_power_up(&mut self, body: BodyHandle, now_ms: u64) {
        let at = self.world.position(body).unwrap_or(self.player_position());
        let Some(power_up) = self.powerups.collect(body, &mut self.world) else {
            return;
        };
        let change = self
            .powerups
            .apply(power_up.kind, now_ms, &mut self.world, self.player);
        self.apply_effect_change(change);
        self.state.emit(GameEvent::Burst {
            at,
            color: power_up.kind.color(),
            count: BURST_SMALL,
        });
        self.state.emit(GameEvent::Sound(SoundEffect::PowerUp));
        self.powerups
            .spawn_replacement(&mut self.world, &mut self.rng, now_ms);
    }

    pub(super) fn apply_effect_change(&mut self, change: EffectChange) {
        match change {
            EffectChange::Applied {
                kind, duration_ms, ..
            } => self
                .state
                .emit(GameEvent::PowerUpEffect { kind, duration_ms }),
            EffectChange::Expired(kind) => self.state.emit(GameEvent::PowerUpExpired(kind)),
        }
    }

    // === Teardown ===

    /// Release every body and subscription
    pub fn cleanup(&mut self) {
        self.tracker.cleanup(&mut self.world);
        self.powerups.cleanup(&mut self.world, Some(self.player));
        for id in self.subscriptions.drain(..) {
            self.chain.unsubscribe(id);
        }
        self.world.remove_body(self.player);
        self.world.remove_body(self.ground);
        self.buffer.clear();
        self.fetching.clear();
        self.selection = None;
        self.black_hole.reset();
        log::info!("Game cleaned up");
    }

    /// Start over with a new seed; keeps the session high score
    pub fn restart(&mut self, seed: u64) {
        self.cleanup();
        let (player, ground) = build_arena(&mut self.world, &self.tuning);
        self.player = player;
        self.ground = ground;
        self.player_grounded = true;
        self.rng = Pcg32::seed_from_u64(seed);
        self.state.restart(seed, self.tuning.initial_lives);
        self.estimator = CongestionEstimator::new(&self.tuning);
        self.controller = DifficultyController::new(&self.tuning);
        self.session_start_ms = self.now_ms();
        self.last_spawn_ms = self.session_start_ms;
        self.subscribe();
        log::info!("Game restarted (seed {seed})");
    }
}

/// Ground slab and player
fn build_arena<W: PhysicsWorld>(world: &mut W, tuning: &Tuning) -> (BodyHandle, BodyHandle) {
    let w = tuning.viewport_width;
    let floor_y = tuning.floor_y();
    let ground_top = floor_y + PLAYER_HEIGHT / 2.0;
    let ground = world.create_body(
        &BodySpec::new(
            BodyLabel::Ground,
            Collider::Rect {
                half: Vec2::new(w / 2.0, GROUND_THICKNESS / 2.0),
            },
        )
        .fixed(),
        Vec2::new(w / 2.0, ground_top + GROUND_THICKNESS / 2.0),
    );
    let mut spec = BodySpec::new(
        BodyLabel::Player,
        Collider::Rect {
            half: Vec2::new(PLAYER_WIDTH / 2.0, PLAYER_HEIGHT / 2.0),
        },
    );
    spec.friction = 0.1;
    spec.restitution = 0.2;
    let player = world.create_body(&spec, Vec2::new(w / 2.0, floor_y));
    (player, ground)
}
