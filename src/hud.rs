//! Presentation bridge
//!
//! HUD widgets are pushed to, never polled. [`HudBridge`] turns a tick's
//! worth of [`GameEvent`]s into [`Presentation`] calls, collapsing repeated
//! score updates so the DOM is touched once per frame.

use crate::sim::congestion::NetworkStatus;
use crate::sim::powerup::PowerUpKind;
use crate::sim::state::GameEvent;

/// Capability set exposed to HUD widgets
pub trait Presentation {
    fn on_score_changed(&mut self, score: u64);
    fn on_lives_changed(&mut self, lives: u8);
    fn on_network_status(&mut self, status: &NetworkStatus);
    fn on_game_over(&mut self, final_score: u64);
    fn on_power_up_effect(&mut self, kind: PowerUpKind, duration_ms: u64);
    fn on_black_hole_ready(&mut self);

    fn on_power_up_expired(&mut self, _kind: PowerUpKind) {}
    fn on_black_hole_triggered(&mut self, _swallowed: usize) {}
}

/// Event-to-widget dispatcher
#[derive(Debug, Default)]
pub struct HudBridge {
    last_score: Option<u64>,
}

impl HudBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch<P: Presentation + ?Sized>(&mut self, events: &[GameEvent], hud: &mut P) {
        let latest_score = events.iter().rev().find_map(|e| match e {
            GameEvent::ScoreChanged(score) => Some(*score),
            _ => None,
        });

        for event in events {
            match event {
                GameEvent::ScoreChanged(_) => {}
                GameEvent::LivesChanged(lives) => hud.on_lives_changed(*lives),
                GameEvent::NetworkStatus(status) => hud.on_network_status(status),
                GameEvent::GameOver { final_score } => hud.on_game_over(*final_score),
                GameEvent::PowerUpEffect { kind, duration_ms } => {
                    hud.on_power_up_effect(*kind, *duration_ms)
                }
                GameEvent::PowerUpExpired(kind) => hud.on_power_up_expired(*kind),
                GameEvent::BlackHoleReady => hud.on_black_hole_ready(),
                GameEvent::BlackHoleTriggered { swallowed } => {
                    hud.on_black_hole_triggered(*swallowed)
                }
                GameEvent::Sound(_) | GameEvent::Burst { .. } => {}
            }
        }

        if let Some(score) = latest_score.filter(|s| self.last_score != Some(*s)) {
            hud.on_score_changed(score);
            self.last_score = Some(score);
        }
    }

    /// Forget the last pushed score (after a restart)
    pub fn reset(&mut self) {
        self.last_score = None;
    }
}
