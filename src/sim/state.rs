//! Game state and the events the sim emits
//!
//! Score, lives and phase live here; world objects live in the tracker and
//! the physics world.

use glam::Vec2;

use crate::audio::SoundEffect;

use super::congestion::NetworkStatus;
use super::mapper::Hsl;
use super::powerup::PowerUpKind;

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Active gameplay
    Playing,
    /// Game is paused
    Paused,
    /// Lives exhausted; terminal
    GameOver,
}

/// Something presentation or audio should react to
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    ScoreChanged(u64),
    LivesChanged(u8),
    NetworkStatus(NetworkStatus),
    GameOver { final_score: u64 },
    PowerUpEffect { kind: PowerUpKind, duration_ms: u64 },
    PowerUpExpired(PowerUpKind),
    Sound(SoundEffect),
    /// Particle burst for the renderer
    Burst { at: Vec2, color: Hsl, count: u32 },
    BlackHoleReady,
    BlackHoleTriggered { swallowed: usize },
}

/// Score, lives and phase
#[derive(Debug, Clone)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub score: u64,
    /// Best score this session
    pub high_score: u64,
    pub lives: u8,
    pub phase: GamePhase,
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Sim clock (ms since start)
    pub time_ms: u64,
    /// No life can be lost before this time
    pub grace_until_ms: u64,
    /// Events since the last drain
    pub events: Vec<GameEvent>,
}

impl GameState {
    pub fn new(seed: u64, lives: u8) -> Self {
        Self {
            seed,
            score: 0,
            high_score: 0,
            lives,
            phase: GamePhase::Playing,
            time_ticks: 0,
            time_ms: 0,
            grace_until_ms: 0,
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_over(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    pub fn add_score(&mut self, points: u64) {
        if points == 0 || self.is_over() {
            return;
        }
        self.score += points;
        self.high_score = self.high_score.max(self.score);
        self.emit(GameEvent::ScoreChanged(self.score));
    }

    /// Inside the post-hit grace window
    pub fn in_grace(&self, now_ms: u64) -> bool {
        now_ms < self.grace_until_ms
    }

    /// Take one life. Reaching zero ends the game exactly once; further
    /// calls are no-ops. Returns whether a life was taken.
    pub fn lose_life(&mut self, now_ms: u64, grace_ms: u64) -> bool {
        if self.lives == 0 || self.is_over() {
            return false;
        }
        self.lives -= 1;
        self.grace_until_ms = now_ms + grace_ms;
        self.emit(GameEvent::LivesChanged(self.lives));
        log::info!("Life lost, {} remaining", self.lives);
        if self.lives == 0 {
            self.phase = GamePhase::GameOver;
            self.emit(GameEvent::Sound(SoundEffect::GameOver));
            self.emit(GameEvent::GameOver {
                final_score: self.score,
            });
            log::info!("Game over with score {}", self.score);
        }
        true
    }

    /// Toggle pause; no effect once the game is over
    pub fn toggle_pause(&mut self) {
        self.phase = match self.phase {
            GamePhase::Playing => GamePhase::Paused,
            GamePhase::Paused => GamePhase::Playing,
            GamePhase::GameOver => GamePhase::GameOver,
        };
    }

    /// Fresh run keeping the session high score
    pub fn restart(&mut self, seed: u64, lives: u8) {
        let high_score = self.high_score;
        *self = Self::new(seed, lives);
        self.high_score = high_score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lose_life_to_game_over_once() {
        let mut state = GameState::new(1, 2);
        assert!(state.lose_life(0, 0));
        assert!(state.lose_life(10, 0));
        assert_eq!(state.phase, GamePhase::GameOver);
        assert!(!state.lose_life(20, 0));
        assert_eq!(state.lives, 0);

        let overs = state
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::GameOver { .. }))
            .count();
        assert_eq!(overs, 1);
    }

    #[test]
    fn test_grace_window() {
        let mut state = GameState::new(1, 3);
        state.lose_life(1000, 500);
        assert!(state.in_grace(1499));
        assert!(!state.in_grace(1500));
    }

    #[test]
    fn test_score_frozen_after_game_over() {
        let mut state = GameState::new(1, 1);
        state.add_score(5);
        state.lose_life(0, 0);
        state.add_score(5);
        assert_eq!(state.score, 5);
        assert_eq!(state.high_score, 5);
    }

    #[test]
    fn test_pause_toggle_and_restart() {
        let mut state = GameState::new(1, 3);
        state.toggle_pause();
        assert_eq!(state.phase, GamePhase::Paused);
        state.toggle_pause();
        assert_eq!(state.phase, GamePhase::Playing);

        state.add_score(40);
        state.restart(2, 3);
        assert_eq!(state.score, 0);
        assert_eq!(state.high_score, 40);
        assert_eq!(state.seed, 2);
    }
}
