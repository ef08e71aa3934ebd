//! Fixed timestep simulation tick
//!
//! Core game loop: chain events, input, spawning, physics, collisions,
//! lifecycle, power-ups and scoring, always in that order.

use glam::Vec2;

use super::game::Game;
use super::state::{GameEvent, GamePhase};
use crate::audio::SoundEffect;
use crate::chain::ChainSource;
use crate::consts::*;
use crate::physics::PhysicsWorld;

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub move_left: bool,
    pub move_right: bool,
    pub jump: bool,
    /// Action key (black hole presses)
    pub action: bool,
    /// Pointer click in world coordinates
    pub select: Option<Vec2>,
    /// Pause toggle
    pub pause: bool,
    /// Fast-forward the newest object to confirmed (debug)
    pub confirm_latest: bool,
    /// Idle/demo mode - AI plays the game
    pub idle_mode: bool,
}

impl<W: PhysicsWorld, S: ChainSource> Game<W, S> {
    /// Advance the game by one fixed timestep
    pub fn tick(&mut self, input: &TickInput) {
        if input.pause {
            self.state.toggle_pause();
        }
        // Don't tick if paused or game over
        if self.state.phase != GamePhase::Playing {
            return;
        }

        self.clock_ms += SIM_DT_MS;
        let now = self.now_ms();
        self.state.time_ticks += 1;
        self.state.time_ms = now - self.session_start_ms;

        self.process_chain_events(now);
        self.buffer.maintain();

        let mut input = input.clone();
        if input.idle_mode {
            self.autopilot(&mut input);
        }
        self.apply_input(&input, now);

        self.spawn_due(now);

        self.controller.step();
        let gravity = self.powerups.effective_gravity(self.controller.gravity());
        self.world.set_gravity(gravity);
        self.world.step(SIM_DT_MS);
        self.resolve_collisions(now);

        let fall_speed = self.controller.fall_speed();
        let events = self.tracker.update(&mut self.world, now, fall_speed);
        self.apply_tracker_events(events);

        let changes = self
            .powerups
            .update(&mut self.world, &mut self.rng, now, self.player);
        for change in changes {
            self.apply_effect_change(change);
        }

        self.constrain_player();
        // Survival point
        self.state.add_score(1);
    }

    fn apply_input(&mut self, input: &TickInput, now_ms: u64) {
        if let Some(point) = input.select {
            self.selection = self.tracker.select_at(&self.world, point);
        }

        if input.confirm_latest {
            if let Some(hash) = self.tracker.confirm_latest() {
                log::debug!("Forced confirmation of {}", hash.short());
            }
        }

        if input.action && self.black_hole.press(now_ms) {
            let center = self.player_position();
            let swallowed = self
                .tracker
                .fade_within(&self.world, center, self.black_hole.radius());
            log::info!("Black hole swallowed {swallowed} objects");
            self.state.emit(GameEvent::BlackHoleTriggered { swallowed });
            self.state.emit(GameEvent::Sound(SoundEffect::BlackHole));
        }

        let dir = input.move_right as i8 - input.move_left as i8;
        let mut vel = self.world.velocity(self.player).unwrap_or(Vec2::ZERO);
        vel.x = dir as f32 * self.tuning.move_speed;
        if input.jump && self.player_grounded {
            vel.y = -self.tuning.jump_force;
            self.player_grounded = false;
            self.state.emit(GameEvent::Sound(SoundEffect::Jump));
        }
        self.world.set_velocity(self.player, vel);
    }

    /// Place one buffered transaction when the spawn interval has elapsed
    fn spawn_due(&mut self, now_ms: u64) {
        let elapsed = now_ms.saturating_sub(self.last_spawn_ms) as f32;
        if elapsed < self.controller.spawn_interval_ms() {
            return;
        }
        self.last_spawn_ms = now_ms;
        if let Some(tx) = self.buffer.sample_one(&mut self.rng) {
            let fall_speed = self.controller.fall_speed();
            self.tracker
                .spawn(tx, &mut self.world, &mut self.rng, fall_speed, now_ms);
        }
    }

    /// Keep the player inside the viewport
    fn constrain_player(&mut self) {
        let Some(mut pos) = self.world.position(self.player) else {
            return;
        };
        let half = PLAYER_WIDTH / 2.0;
        let max_x = self.tuning.viewport_width - half;
        if pos.x < half || pos.x > max_x {
            pos.x = pos.x.clamp(half, max_x);
            self.world.set_position(self.player, pos);
            let vel = self.world.velocity(self.player).unwrap_or(Vec2::ZERO);
            self.world.set_velocity(self.player, Vec2::new(0.0, vel.y));
        }
        if pos.y >= self.tuning.floor_y() - 0.5 {
            self.player_grounded = true;
        }
    }

    /// Steer away from the most threatening falling object; otherwise drift
    /// toward the nearest power-up. Fires the black hole whenever it can.
    fn autopilot(&self, input: &mut TickInput) {
        let player = self.player_position();
        let reach = PLAYER_WIDTH / 2.0 + 20.0;

        let threat = self
            .tracker
            .iter()
            .filter(|o| !o.grounded && !o.state.is_fading())
            .filter_map(|o| {
                let p = self.world.position(o.body)?;
                let lane = o.descriptor.size / 2.0 + reach;
                (p.y < player.y && (p.x - player.x).abs() < lane).then_some(p)
            })
            .max_by(|a, b| a.y.total_cmp(&b.y));

        input.move_left = false;
        input.move_right = false;
        if let Some(p) = threat {
            let wall_left = player.x - reach < PLAYER_WIDTH;
            let wall_right = player.x + reach > self.tuning.viewport_width - PLAYER_WIDTH;
            let go_left = if p.x >= player.x { !wall_left } else { wall_right };
            input.move_left = go_left;
            input.move_right = !go_left;
        } else if let Some(target) = self
            .powerups
            .power_ups()
            .iter()
            .filter_map(|pu| self.world.position(pu.body))
            .min_by(|a, b| a.distance(player).total_cmp(&b.distance(player)))
        {
            let dx = target.x - player.x;
            if dx.abs() > self.tuning.move_speed {
                input.move_left = dx < 0.0;
                input.move_right = dx > 0.0;
            }
        }

        input.action = self.black_hole.is_available();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{Address, NetworkSample, ScriptedChainSource, TransactionRecord, TxHash};
    use crate::chain::scripted::TrafficProfile;
    use crate::physics::KinematicWorld;
    use crate::sim::powerup::PowerUpKind;
    use crate::tuning::Tuning;

    type TestGame = Game<KinematicWorld, ScriptedChainSource>;

    fn game_with(tuning: Tuning) -> TestGame {
        Game::new(
            tuning,
            KinematicWorld::new(0.0),
            ScriptedChainSource::manual(),
            12345,
        )
    }

    fn game() -> TestGame {
        game_with(Tuning::default())
    }

    fn tx(n: u8) -> TransactionRecord {
        TransactionRecord {
            hash: TxHash([n; 32]),
            from: Address([2; 20]),
            to: Some(Address([3; 20])),
            value: 0,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            nonce: n as u64,
            input: Vec::new(),
        }
    }

    fn count(events: &[GameEvent], pred: impl Fn(&GameEvent) -> bool) -> usize {
        events.iter().filter(|e| pred(e)).count()
    }

    /// Spawn an object directly and drop it onto the player
    fn drop_on_player(game: &mut TestGame, n: u8) -> TxHash {
        let hash = game
            .tracker
            .spawn(tx(n), &mut game.world, &mut game.rng, 2.0, 0)
            .unwrap();
        let body = game.tracker.get(&hash).unwrap().body;
        let half = game.world.half_extents(body).unwrap();
        let player = game.player_position();
        game.world.set_position(
            body,
            Vec2::new(player.x, player.y - PLAYER_HEIGHT / 2.0 - half.y - 2.0),
        );
        game.world.set_velocity(body, Vec2::new(0.0, 8.0));
        hash
    }

    #[test]
    fn test_tick_pause() {
        let mut game = game();
        game.tick(&TickInput::default());
        assert_eq!(game.state().time_ticks, 1);

        let pause = TickInput {
            pause: true,
            ..Default::default()
        };
        game.tick(&pause);
        assert_eq!(game.state().phase, GamePhase::Paused);
        game.tick(&TickInput::default());
        assert_eq!(game.state().time_ticks, 1);

        game.tick(&pause);
        assert_eq!(game.state().phase, GamePhase::Playing);
        assert_eq!(game.state().time_ticks, 2);
    }

    #[test]
    fn test_pending_transaction_becomes_object() {
        let mut game = game();
        game.tick(&TickInput::default());
        game.chain_mut().inject_pending(tx(7));

        let mut spawned = false;
        for _ in 0..120 {
            game.tick(&TickInput::default());
            if game.tracker().is_live(&TxHash([7; 32])) {
                spawned = true;
                break;
            }
        }
        assert!(spawned);
        assert!(game.buffer().is_empty());
        let fetches = game
            .chain()
            .requests()
            .iter()
            .filter(|r| matches!(r, crate::chain::ChainRequest::Transaction(_)))
            .count();
        assert_eq!(fetches, 1);
    }

    #[test]
    fn test_fetching_respects_buffer_room() {
        let mut game = game_with(Tuning {
            buffer_capacity: 2,
            ..Tuning::default()
        });
        game.tick(&TickInput::default());
        for n in 0..5 {
            game.chain_mut().inject_pending(tx(n));
        }
        game.tick(&TickInput::default());
        game.tick(&TickInput::default());
        let fetches = game
            .chain()
            .requests()
            .iter()
            .filter(|r| matches!(r, crate::chain::ChainRequest::Transaction(_)))
            .count();
        assert_eq!(fetches, 2);
        assert!(game.buffer().len() <= 2);
    }

    #[test]
    fn test_network_sample_pushes_status() {
        let mut game = game();
        game.tick(&TickInput::default());
        game.tick(&TickInput::default());
        let events = game.drain_events();
        let status = events.iter().find_map(|e| match e {
            GameEvent::NetworkStatus(s) => Some(*s),
            _ => None,
        });
        let status = status.expect("status after first sample");
        assert_eq!(status.pending_tx_count, 100);
        assert!((status.congestion_level - 0.27).abs() < 1e-4);
    }

    #[test]
    fn test_failed_sample_keeps_previous_congestion() {
        let mut game = game();
        game.tick(&TickInput::default());
        game.chain_mut().fail_next(1);
        game.tick(&TickInput::default());
        assert_eq!(game.estimator().congestion(), 0.5);
        assert_eq!(game.estimator().sample_count(), 0);
    }

    #[test]
    fn test_hit_from_above_costs_a_life() {
        let mut game = game();
        game.tick(&TickInput::default());
        game.drain_events();
        drop_on_player(&mut game, 1);
        game.tick(&TickInput::default());

        let events = game.drain_events();
        assert_eq!(game.state().lives, 2);
        assert_eq!(count(&events, |e| *e == GameEvent::Sound(SoundEffect::Collision)), 1);
        assert!(game.tracker().get(&TxHash([1; 32])).unwrap().struck_player);
    }

    #[test]
    fn test_invincible_hit_is_silent() {
        let mut game = game();
        game.tick(&TickInput::default());
        let (now, player) = (game.now_ms(), game.player);
        game.powerups
            .apply(PowerUpKind::Invincibility, now, &mut game.world, player);
        game.drain_events();

        drop_on_player(&mut game, 1);
        game.tick(&TickInput::default());
        let events = game.drain_events();
        assert_eq!(game.state().lives, 3);
        assert_eq!(
            count(&events, |e| matches!(
                e,
                GameEvent::Sound(SoundEffect::Collision | SoundEffect::Bump)
            )),
            0
        );
        assert_eq!(count(&events, |e| matches!(e, GameEvent::LivesChanged(_))), 0);
    }

    #[test]
    fn test_game_over_once_and_lives_never_negative() {
        let mut game = game_with(Tuning {
            initial_lives: 1,
            ..Tuning::default()
        });
        game.tick(&TickInput::default());
        drop_on_player(&mut game, 1);
        drop_on_player(&mut game, 2);
        game.tick(&TickInput::default());
        assert_eq!(game.state().lives, 0);
        assert!(game.state().is_over());

        let score = game.state().score;
        for _ in 0..10 {
            game.tick(&TickInput::default());
        }
        let events = game.drain_events();
        assert_eq!(count(&events, |e| matches!(e, GameEvent::GameOver { .. })), 1);
        assert_eq!(game.state().score, score);
        assert_eq!(game.state().lives, 0);
    }

    #[test]
    fn test_landing_awards_dodge_points() {
        let mut game = game();
        game.tick(&TickInput::default());
        let hash = game
            .tracker
            .spawn(tx(4), &mut game.world, &mut game.rng, 2.0, 0)
            .unwrap();
        let body = game.tracker.get(&hash).unwrap().body;
        let half = game.world.half_extents(body).unwrap();
        let ground_top = game.tuning.floor_y() + PLAYER_HEIGHT / 2.0;
        // Far from the player, just above the ground
        game.world
            .set_position(body, Vec2::new(60.0, ground_top - half.y - 1.0));
        game.world.set_velocity(body, Vec2::new(0.0, 4.0));
        let before = game.state().score;
        game.tick(&TickInput::default());

        let obj = game.tracker().get(&hash).unwrap();
        assert!(obj.grounded && obj.scored);
        assert_eq!(game.world().is_static(body), Some(true));
        assert_eq!(game.state().score, before + 1 + game.tuning.dodge_points);
    }

    #[test]
    fn test_power_up_pickup_applies_and_replaces() {
        let mut game = game_with(Tuning {
            power_up_spawn_chance: 0.0,
            ..Tuning::default()
        });
        game.tick(&TickInput::default());
        let (now, player) = (game.now_ms(), game.player_position());
        let kind = game.powerups.spawn(&mut game.world, &mut game.rng, now);
        let body = game.powerups.power_ups()[0].body;
        game.world.set_position(body, player);
        game.drain_events();
        game.tick(&TickInput::default());

        let events = game.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::PowerUpEffect { kind: k, .. } if *k == kind
        )));
        assert_eq!(count(&events, |e| *e == GameEvent::Sound(SoundEffect::PowerUp)), 1);
        assert!(game.powerups().is_active(kind));
        assert!(!game.world().contains(body));
        assert_eq!(game.powerups().power_ups().len(), 1);
    }

    #[test]
    fn test_black_hole_unlocks_and_fires() {
        let mut game = game();
        game.chain_mut().set_network(NetworkSample {
            gas_price_gwei: 80.0,
            pending_tx_count: 1000,
        });
        game.tick(&TickInput::default());
        game.tick(&TickInput::default());
        assert!(game.black_hole().is_available());
        assert!(game.drain_events().contains(&GameEvent::BlackHoleReady));

        let near = drop_on_player(&mut game, 9);
        let body = game.tracker.get(&near).unwrap().body;
        game.world.set_velocity(body, Vec2::ZERO);
        let p = game.player_position();
        game.world.set_position(body, p - Vec2::new(0.0, 150.0));

        let press = TickInput {
            action: true,
            ..Default::default()
        };
        for _ in 0..3 {
            game.tick(&press);
        }
        let events = game.drain_events();
        assert!(events.contains(&GameEvent::BlackHoleTriggered { swallowed: 1 }));
        assert!(!game.black_hole().is_available());
        assert!(game.tracker().get(&near).is_none_or(|o| o.state.is_fading()));
    }

    #[test]
    fn test_select_shows_details() {
        let mut game = game();
        game.tick(&TickInput::default());
        let hash = game
            .tracker
            .spawn(tx(5), &mut game.world, &mut game.rng, 2.0, 0)
            .unwrap();
        let body = game.tracker.get(&hash).unwrap().body;
        game.world.set_position(body, Vec2::new(100.0, 200.0));
        game.tick(&TickInput {
            select: game.world().position(body),
            ..Default::default()
        });
        assert_eq!(game.selection().map(|d| d.hash.clone()), Some(hash.to_string()));
    }

    #[test]
    fn test_cleanup_releases_everything() {
        let mut game = Game::new(
            Tuning::default(),
            KinematicWorld::new(0.0),
            ScriptedChainSource::simulated(3, TrafficProfile::default()),
            3,
        );
        let idle = TickInput {
            idle_mode: true,
            ..Default::default()
        };
        for _ in 0..300 {
            game.tick(&idle);
        }
        assert_eq!(game.chain().subscription_count(), 2);
        game.cleanup();
        assert_eq!(game.world().body_count(), 0);
        assert_eq!(game.chain().subscription_count(), 0);
        assert!(game.tracker().is_empty());
    }

    #[test]
    fn test_low_gravity_drives_world_until_expiry() {
        let mut game = game_with(Tuning {
            power_up_spawn_chance: 0.0,
            low_gravity_duration_ms: 500,
            ..Tuning::default()
        });
        game.tick(&TickInput::default());
        let (now, player) = (game.now_ms(), game.player);
        game.powerups
            .apply(PowerUpKind::LowGravity, now, &mut game.world, player);

        game.tick(&TickInput::default());
        assert_eq!(game.world().gravity(), game.tuning.low_gravity);
        assert_ne!(game.controller().gravity(), game.tuning.low_gravity);

        for _ in 0..40 {
            game.tick(&TickInput::default());
        }
        assert!(!game.powerups().is_active(PowerUpKind::LowGravity));
        assert_eq!(game.world().gravity(), game.controller().gravity());
    }

    #[test]
    fn test_restart_keeps_chain_traffic_flowing() {
        let mut game = Game::new(
            Tuning::default(),
            KinematicWorld::new(0.0),
            ScriptedChainSource::simulated(3, TrafficProfile::default()),
            3,
        );
        let idle = TickInput {
            idle_mode: true,
            ..Default::default()
        };
        let last_fetch = |game: &TestGame| {
            game.chain().requests().iter().rev().find_map(|r| match r {
                crate::chain::ChainRequest::Transaction(hash) => Some(*hash),
                _ => None,
            })
        };
        // One minute of play
        for _ in 0..3600 {
            game.tick(&idle);
        }
        let before = last_fetch(&game);
        assert!(before.is_some());

        game.restart(4);
        assert_eq!(game.state().time_ms, 0);
        // Ten seconds into the new run
        for _ in 0..600 {
            game.tick(&idle);
        }
        assert_ne!(last_fetch(&game), before);
        assert!(!game.tracker().is_empty());
        assert!((9_990..=10_010).contains(&game.state().time_ms));
    }

    #[test]
    fn test_determinism() {
        let run = || {
            let mut game = Game::new(
                Tuning::default(),
                KinematicWorld::new(0.0),
                ScriptedChainSource::simulated(77, TrafficProfile::default()),
                77,
            );
            let idle = TickInput {
                idle_mode: true,
                ..Default::default()
            };
            for _ in 0..900 {
                game.tick(&idle);
            }
            (
                game.state().score,
                game.state().lives,
                game.tracker().len(),
                game.player_position(),
            )
        };
        assert_eq!(run(), run());
    }
}
