//! Black hole ability
//!
//! Unlocked when the mempool gets crowded. Triggered by pressing the action
//! key several times in quick succession; each press must follow the
//! previous one within the press window or the count starts over.

use crate::tuning::Tuning;

#[derive(Debug, Clone)]
pub struct BlackHole {
    available: bool,
    presses: u32,
    last_press_ms: Option<u64>,
    threshold: u64,
    required_presses: u32,
    window_ms: u64,
    radius: f32,
}

impl BlackHole {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            available: false,
            presses: 0,
            last_press_ms: None,
            threshold: tuning.black_hole_threshold,
            required_presses: tuning.black_hole_presses.max(1),
            window_ms: tuning.black_hole_press_window_ms,
            radius: tuning.black_hole_radius,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Feed a mempool size. Returns true when this sample unlocked the ability.
    pub fn observe_pending(&mut self, pending_tx_count: u64) -> bool {
        if self.available || pending_tx_count <= self.threshold {
            return false;
        }
        self.available = true;
        self.presses = 0;
        self.last_press_ms = None;
        log::info!("Black hole ready ({pending_tx_count} pending)");
        true
    }

    /// Register an action press. Returns true when the ability fires; it is
    /// consumed and must be unlocked again.
    pub fn press(&mut self, now_ms: u64) -> bool {
        if !self.available {
            return false;
        }
        let in_window = self
            .last_press_ms
            .is_some_and(|last| now_ms.saturating_sub(last) <= self.window_ms);
        self.presses = if in_window { self.presses + 1 } else { 1 };
        self.last_press_ms = Some(now_ms);

        if self.presses >= self.required_presses {
            self.available = false;
            self.presses = 0;
            self.last_press_ms = None;
            return true;
        }
        false
    }

    /// Debug aid: unlock without a network sample
    pub fn force_available(&mut self) {
        self.available = true;
    }

    pub fn reset(&mut self) {
        self.available = false;
        self.presses = 0;
        self.last_press_ms = None;
    }
}
