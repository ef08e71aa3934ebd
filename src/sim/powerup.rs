//! Power-ups and timed effects
//!
//! Power-ups are sensor bodies drifting down at a fixed speed. Collecting
//! one applies a time-boxed effect. At most one effect of each kind is
//! active; collecting the same kind again pushes its expiry out instead of
//! stacking a second timer. All expiry happens in one sweep per tick.

use std::collections::HashMap;

use glam::Vec2;
use rand::Rng;

use crate::consts::{OFFSCREEN_MARGIN, POWER_UP_FALL_SPEED, POWER_UP_RADIUS};
use crate::physics::{BodyHandle, BodyLabel, BodySpec, Collider, PhysicsWorld};
use crate::tuning::Tuning;

use super::mapper::Hsl;

/// Blink half-period while invincible (ms)
const BLINK_PERIOD_MS: u64 = 100;

/// Effect granted by a power-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerUpKind {
    LowGravity,
    SmallSize,
    Invincibility,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 3] = [
        PowerUpKind::LowGravity,
        PowerUpKind::SmallSize,
        PowerUpKind::Invincibility,
    ];

    pub fn duration_ms(self, tuning: &Tuning) -> u64 {
        match self {
            PowerUpKind::LowGravity => tuning.low_gravity_duration_ms,
            PowerUpKind::SmallSize => tuning.small_size_duration_ms,
            PowerUpKind::Invincibility => tuning.invincibility_duration_ms,
        }
    }

    pub fn color(self) -> Hsl {
        match self {
            PowerUpKind::LowGravity => Hsl { h: 60.0, s: 100.0, l: 50.0 },
            PowerUpKind::SmallSize => Hsl { h: 180.0, s: 100.0, l: 50.0 },
            PowerUpKind::Invincibility => Hsl { h: 300.0, s: 100.0, l: 50.0 },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerUpKind::LowGravity => "Low Gravity",
            PowerUpKind::SmallSize => "Small Size",
            PowerUpKind::Invincibility => "Invincibility",
        }
    }
}

/// A collectible in the world
#[derive(Debug, Clone)]
pub struct PowerUp {
    /// Creation order
    pub id: u32,
    pub kind: PowerUpKind,
    pub body: BodyHandle,
    pub spawned_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveEffect {
    pub kind: PowerUpKind,
    pub expires_at_ms: u64,
}

/// Outcome of applying or expiring an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectChange {
    Applied {
        kind: PowerUpKind,
        duration_ms: u64,
        /// The kind was already active and only its expiry moved
        refreshed: bool,
    },
    Expired(PowerUpKind),
}

#[derive(Debug, Clone)]
struct SchedulerConfig {
    spawn_chance: f64,
    max_power_ups: usize,
    low_gravity: f32,
    small_size_factor: f32,
    durations: [u64; 3],
    viewport_width: f32,
    viewport_height: f32,
}

/// Live power-ups and active effects
#[derive(Debug)]
pub struct PowerUpScheduler {
    config: SchedulerConfig,
    power_ups: Vec<PowerUp>,
    by_body: HashMap<BodyHandle, u32>,
    effects: Vec<ActiveEffect>,
    next_id: u32,
}

impl PowerUpScheduler {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            config: SchedulerConfig {
                spawn_chance: tuning.power_up_spawn_chance.clamp(0.0, 1.0),
                max_power_ups: tuning.max_power_ups,
                low_gravity: tuning.low_gravity,
                small_size_factor: tuning.small_size_factor,
                durations: PowerUpKind::ALL.map(|k| k.duration_ms(tuning)),
                viewport_width: tuning.viewport_width,
                viewport_height: tuning.viewport_height,
            },
            power_ups: Vec::new(),
            by_body: HashMap::new(),
            effects: Vec::new(),
            next_id: 1,
        }
    }

    fn duration(&self, kind: PowerUpKind) -> u64 {
        match kind {
            PowerUpKind::LowGravity => self.config.durations[0],
            PowerUpKind::SmallSize => self.config.durations[1],
            PowerUpKind::Invincibility => self.config.durations[2],
        }
    }

    // === Queries ===

    pub fn power_ups(&self) -> &[PowerUp] {
        &self.power_ups
    }

    pub fn effects(&self) -> &[ActiveEffect] {
        &self.effects
    }

    pub fn is_active(&self, kind: PowerUpKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    pub fn is_invincible(&self) -> bool {
        self.is_active(PowerUpKind::Invincibility)
    }

    /// Player flicker cue while invincible
    pub fn is_blinking(&self, now_ms: u64) -> bool {
        self.is_invincible() && (now_ms / BLINK_PERIOD_MS) % 2 == 0
    }

    pub fn remaining_ms(&self, kind: PowerUpKind, now_ms: u64) -> Option<u64> {
        self.effects
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.expires_at_ms.saturating_sub(now_ms))
    }

    /// Low gravity overrides the congestion-driven value while active
    pub fn effective_gravity(&self, controller_gravity: f32) -> f32 {
        if self.is_active(PowerUpKind::LowGravity) {
            self.config.low_gravity
        } else {
            controller_gravity
        }
    }

    pub fn is_power_up_body(&self, body: BodyHandle) -> bool {
        self.by_body.contains_key(&body)
    }

    // === Per-tick sweep ===

    /// Expire effects, retire stray power-ups and roll for a new one
    pub fn update<W: PhysicsWorld, R: Rng>(
        &mut self,
        world: &mut W,
        rng: &mut R,
        now_ms: u64,
        player: BodyHandle,
    ) -> Vec<EffectChange> {
        let mut changes = Vec::new();

        let (expired, active): (Vec<_>, Vec<_>) = std::mem::take(&mut self.effects)
            .into_iter()
            .partition(|e| now_ms >= e.expires_at_ms);
        self.effects = active;
        for effect in expired {
            self.revert(effect.kind, world, player);
            changes.push(EffectChange::Expired(effect.kind));
        }

        let manual_motion = !world.integrates_motion();
        let limit = self.config.viewport_height + OFFSCREEN_MARGIN;
        let mut gone = Vec::new();
        for p in &self.power_ups {
            let Some(mut pos) = world.position(p.body) else {
                gone.push(p.body);
                continue;
            };
            if manual_motion {
                pos.y += POWER_UP_FALL_SPEED;
                world.set_position(p.body, pos);
            }
            if pos.y > limit {
                gone.push(p.body);
            }
        }
        for body in gone {
            self.remove(body, world);
        }

        if self.power_ups.len() < self.config.max_power_ups
            && rng.random_bool(self.config.spawn_chance)
        {
            self.spawn(world, rng, now_ms);
        }
        changes
    }

    /// Place a random power-up near the top of the viewport
    pub fn spawn<W: PhysicsWorld, R: Rng>(&mut self, world: &mut W, rng: &mut R, now_ms: u64) -> PowerUpKind {
        let kind = PowerUpKind::ALL[rng.random_range(0..PowerUpKind::ALL.len())];
        let x = rng.random::<f32>() * (self.config.viewport_width - 100.0).max(0.0) + 50.0;
        let spec = BodySpec::new(
            BodyLabel::PowerUp,
            Collider::Circle {
                radius: POWER_UP_RADIUS,
            },
        )
        .sensor();
        let body = world.create_body(&spec, Vec2::new(x, 50.0));
        world.set_velocity(body, Vec2::new(0.0, POWER_UP_FALL_SPEED));

        let id = self.next_id;
        self.next_id += 1;
        self.by_body.insert(body, id);
        self.power_ups.push(PowerUp {
            id,
            kind,
            body,
            spawned_at_ms: now_ms,
        });
        log::debug!("Spawned power-up #{id} ({})", kind.as_str());
        kind
    }

    /// Replacement after a pickup, subject to the live cap
    pub fn spawn_replacement<W: PhysicsWorld, R: Rng>(
        &mut self,
        world: &mut W,
        rng: &mut R,
        now_ms: u64,
    ) -> Option<PowerUpKind> {
        (self.power_ups.len() < self.config.max_power_ups).then(|| self.spawn(world, rng, now_ms))
    }

    /// Resolve a touched body to its power-up and release it
    pub fn collect<W: PhysicsWorld>(&mut self, body: BodyHandle, world: &mut W) -> Option<PowerUp> {
        self.remove(body, world)
    }

    fn remove<W: PhysicsWorld>(&mut self, body: BodyHandle, world: &mut W) -> Option<PowerUp> {
        let id = self.by_body.remove(&body)?;
        let idx = self.power_ups.iter().position(|p| p.id == id)?;
        world.remove_body(body);
        Some(self.power_ups.remove(idx))
    }

    // === Effects ===

    /// Start or refresh an effect
    pub fn apply<W: PhysicsWorld>(
        &mut self,
        kind: PowerUpKind,
        now_ms: u64,
        world: &mut W,
        player: BodyHandle,
    ) -> EffectChange {
        let duration_ms = self.duration(kind);
        let expires_at_ms = now_ms + duration_ms;

        if let Some(effect) = self.effects.iter_mut().find(|e| e.kind == kind) {
            effect.expires_at_ms = expires_at_ms;
            log::debug!("Refreshed {} for {duration_ms} ms", kind.as_str());
            return EffectChange::Applied {
                kind,
                duration_ms,
                refreshed: true,
            };
        }

        if kind == PowerUpKind::SmallSize {
            world.scale_body(player, self.config.small_size_factor);
        }
        self.effects.push(ActiveEffect {
            kind,
            expires_at_ms,
        });
        log::info!("{} active for {duration_ms} ms", kind.as_str());
        EffectChange::Applied {
            kind,
            duration_ms,
            refreshed: false,
        }
    }

    fn revert<W: PhysicsWorld>(&self, kind: PowerUpKind, world: &mut W, player: BodyHandle) {
        if kind == PowerUpKind::SmallSize {
            world.scale_body(player, 1.0 / self.config.small_size_factor);
        }
        log::debug!("{} expired", kind.as_str());
    }

    /// Release every power-up and drop all effects, restoring the player size
    pub fn cleanup<W: PhysicsWorld>(&mut self, world: &mut W, player: Option<BodyHandle>) {
        for p in self.power_ups.drain(..) {
            world.remove_body(p.body);
        }
        self.by_body.clear();
        if let Some(player) = player {
            for effect in std::mem::take(&mut self.effects) {
                self.revert(effect.kind, world, player);
            }
        }
        self.effects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::KinematicWorld;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn setup(tuning: &Tuning) -> (PowerUpScheduler, KinematicWorld, BodyHandle, Pcg32) {
        let mut world = KinematicWorld::new(0.0).without_integration();
        let player = world.create_body(
            &BodySpec::new(BodyLabel::Player, Collider::Rect { half: Vec2::splat(15.0) }),
            Vec2::new(400.0, 550.0),
        );
        (PowerUpScheduler::new(tuning), world, player, Pcg32::seed_from_u64(5))
    }

    #[test]
    fn test_reapply_refreshes_instead_of_stacking() {
        let tuning = Tuning::default();
        let (mut sched, mut world, player, _) = setup(&tuning);

        let first = sched.apply(PowerUpKind::SmallSize, 0, &mut world, player);
        assert!(matches!(first, EffectChange::Applied { refreshed: false, .. }));
        assert_eq!(world.half_extents(player), Some(Vec2::splat(7.5)));

        let second = sched.apply(PowerUpKind::SmallSize, 2000, &mut world, player);
        assert!(matches!(second, EffectChange::Applied { refreshed: true, .. }));
        assert_eq!(sched.effects().len(), 1);
        // Not shrunk twice
        assert_eq!(world.half_extents(player), Some(Vec2::splat(7.5)));
        assert_eq!(sched.remaining_ms(PowerUpKind::SmallSize, 2000), Some(3000));
    }

    #[test]
    fn test_expiry_reverts_exactly_once() {
        let tuning = Tuning {
            power_up_spawn_chance: 0.0,
            ..Tuning::default()
        };
        let (mut sched, mut world, player, mut rng) = setup(&tuning);
        sched.apply(PowerUpKind::SmallSize, 0, &mut world, player);
        sched.apply(PowerUpKind::SmallSize, 1000, &mut world, player);

        assert!(sched.update(&mut world, &mut rng, 3999, player).is_empty());
        let changes = sched.update(&mut world, &mut rng, 4000, player);
        assert_eq!(changes, vec![EffectChange::Expired(PowerUpKind::SmallSize)]);
        assert_eq!(world.half_extents(player), Some(Vec2::splat(15.0)));
        assert!(sched.update(&mut world, &mut rng, 9000, player).is_empty());
    }

    #[test]
    fn test_low_gravity_overrides_controller() {
        let tuning = Tuning::default();
        let (mut sched, mut world, player, _) = setup(&tuning);
        assert_eq!(sched.effective_gravity(0.9), 0.9);
        sched.apply(PowerUpKind::LowGravity, 0, &mut world, player);
        assert_eq!(sched.effective_gravity(0.9), tuning.low_gravity);
    }

    #[test]
    fn test_invincibility_blinks() {
        let tuning = Tuning::default();
        let (mut sched, mut world, player, _) = setup(&tuning);
        assert!(!sched.is_blinking(0));
        sched.apply(PowerUpKind::Invincibility, 0, &mut world, player);
        assert!(sched.is_invincible());
        assert!(sched.is_blinking(50));
        assert!(!sched.is_blinking(150));
    }

    #[test]
    fn test_spawn_respects_cap_and_retires_offscreen() {
        let tuning = Tuning {
            power_up_spawn_chance: 1.0,
            max_power_ups: 2,
            ..Tuning::default()
        };
        let (mut sched, mut world, player, mut rng) = setup(&tuning);
        for t in 0..5 {
            sched.update(&mut world, &mut rng, t, player);
        }
        assert_eq!(sched.power_ups().len(), 2);
        assert!(sched.spawn_replacement(&mut world, &mut rng, 5).is_none());

        let body = sched.power_ups()[0].body;
        world.set_position(body, Vec2::new(100.0, 701.0));
        sched.update(&mut world, &mut rng, 6, player);
        // Retired and immediately replaced by the spawn roll
        assert!(!world.contains(body));
        assert_eq!(sched.power_ups().len(), 2);
    }

    #[test]
    fn test_collect_resolves_side_table() {
        let tuning = Tuning::default();
        let (mut sched, mut world, player, mut rng) = setup(&tuning);
        let kind = sched.spawn(&mut world, &mut rng, 0);
        let body = sched.power_ups()[0].body;
        assert!(sched.is_power_up_body(body));
        assert_eq!(sched.collect(body, &mut world).map(|p| p.kind), Some(kind));
        assert!(sched.collect(body, &mut world).is_none());
        assert!(!world.contains(body));
        assert!(!sched.is_power_up_body(player));
    }
}
