//! Data-driven game balance
//!
//! Every value here is a tuning choice rather than a structural one. Loaded
//! from LocalStorage on web (JSON override), defaults otherwise.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid tuning values
#[derive(Error, Debug)]
pub enum TuningError {
    #[error("failed to parse tuning JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("congestion weights must sum to 1.0, got {0}")]
    Weights(f32),

    #[error("{name}: min {min} exceeds max {max}")]
    Range { name: &'static str, min: f32, max: f32 },

    #[error("{0} must be positive")]
    NonPositive(&'static str),
}

/// Balance knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Viewport ===
    pub viewport_width: f32,
    pub viewport_height: f32,

    // === Node ===
    /// JSON-RPC endpoint. `None` plays against the simulated network.
    pub rpc_url: Option<String>,
    /// Filter polling interval for the JSON-RPC transport (ms)
    pub rpc_poll_interval_ms: u64,

    // === Transaction buffer ===
    /// Maximum buffered, not-yet-placed transactions
    pub buffer_capacity: usize,

    // === Object lifecycle ===
    /// Confirmations needed before a confirmed object fades
    pub confirmation_threshold: u64,
    /// Interval between receipt polls for one object (ms)
    pub status_poll_interval_ms: u64,
    /// Radius of the failed-transaction chain reaction
    pub chain_reaction_radius: f32,
    /// Delay before chain-reaction fades start (ms)
    pub chain_reaction_delay_ms: u64,
    /// Scale lost per tick while fading
    pub fade_step: f32,

    // === Congestion ===
    /// Interval between network samples (ms)
    pub network_sample_interval_ms: u64,
    /// Gas price (gwei) treated as fully congested
    pub congestion_gas_ceiling_gwei: f32,
    /// Pending transaction count treated as fully congested
    pub congestion_pending_ceiling: f32,
    pub congestion_gas_weight: f32,
    pub congestion_pending_weight: f32,
    /// Congestion assumed before the first sample
    pub initial_congestion: f32,
    /// Exponential smoothing factor applied every tick
    pub smoothing_factor: f32,

    // === Difficulty ===
    pub gravity_min: f32,
    pub gravity_max: f32,
    pub gravity_base: f32,
    pub gravity_scale: f32,
    pub spawn_interval_base_ms: f32,
    pub spawn_interval_min_ms: f32,
    pub spawn_interval_max_ms: f32,
    /// Fractional jitter applied to the spawn interval target
    pub spawn_interval_variance: f32,
    pub fall_speed_min: f32,
    pub fall_speed_max: f32,

    // === Player ===
    pub initial_lives: u8,
    pub move_speed: f32,
    pub jump_force: f32,
    /// Minimum downward speed for a strike to cost a life
    pub min_impact_speed: f32,
    /// Grace period after losing a life (ms)
    pub hit_grace_ms: u64,
    /// Points for an object that lands or leaves without hitting the player
    pub dodge_points: u64,

    // === Power-ups ===
    pub power_up_spawn_chance: f64,
    pub max_power_ups: usize,
    pub low_gravity: f32,
    pub small_size_factor: f32,
    pub low_gravity_duration_ms: u64,
    pub small_size_duration_ms: u64,
    pub invincibility_duration_ms: u64,

    // === Black hole ===
    pub black_hole_threshold: u64,
    pub black_hole_presses: u32,
    pub black_hole_press_window_ms: u64,
    pub black_hole_radius: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            viewport_width: 800.0,
            viewport_height: 600.0,

            rpc_url: None,
            rpc_poll_interval_ms: 1000,

            buffer_capacity: 20,

            confirmation_threshold: 3,
            status_poll_interval_ms: 2000,
            chain_reaction_radius: 100.0,
            chain_reaction_delay_ms: 300,
            fade_step: 0.05,

            network_sample_interval_ms: 5000,
            congestion_gas_ceiling_gwei: 100.0,
            congestion_pending_ceiling: 500.0,
            congestion_gas_weight: 0.7,
            congestion_pending_weight: 0.3,
            initial_congestion: 0.5,
            smoothing_factor: 0.1,

            gravity_min: 0.3,
            gravity_max: 1.0,
            gravity_base: 0.3,
            gravity_scale: 1.0,
            spawn_interval_base_ms: 1000.0,
            spawn_interval_min_ms: 300.0,
            spawn_interval_max_ms: 2000.0,
            spawn_interval_variance: 0.2,
            fall_speed_min: 2.0,
            fall_speed_max: 6.0,

            initial_lives: 3,
            move_speed: 5.0,
            jump_force: 10.0,
            min_impact_speed: 1.0,
            hit_grace_ms: 1000,
            dodge_points: 10,

            power_up_spawn_chance: 0.005,
            max_power_ups: 3,
            low_gravity: 0.2,
            small_size_factor: 0.5,
            low_gravity_duration_ms: 5000,
            small_size_duration_ms: 3000,
            invincibility_duration_ms: 2000,

            black_hole_threshold: 300,
            black_hole_presses: 3,
            black_hole_press_window_ms: 500,
            black_hole_radius: 250.0,
        }
    }
}

impl Tuning {
    /// Parse and validate a JSON override (missing fields fall back to defaults)
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Check structural consistency
    pub fn validate(&self) -> Result<(), TuningError> {
        let weights = self.congestion_gas_weight + self.congestion_pending_weight;
        if (weights - 1.0).abs() > 1e-3 {
            return Err(TuningError::Weights(weights));
        }
        check_range("gravity", self.gravity_min, self.gravity_max)?;
        check_range(
            "spawn_interval_ms",
            self.spawn_interval_min_ms,
            self.spawn_interval_max_ms,
        )?;
        check_range("fall_speed", self.fall_speed_min, self.fall_speed_max)?;
        if self.congestion_gas_ceiling_gwei <= 0.0 {
            return Err(TuningError::NonPositive("congestion_gas_ceiling_gwei"));
        }
        if self.congestion_pending_ceiling <= 0.0 {
            return Err(TuningError::NonPositive("congestion_pending_ceiling"));
        }
        if self.fade_step <= 0.0 {
            return Err(TuningError::NonPositive("fade_step"));
        }
        if self.small_size_factor <= 0.0 {
            return Err(TuningError::NonPositive("small_size_factor"));
        }
        Ok(())
    }

    /// Player resting line (center y of a grounded player)
    pub fn floor_y(&self) -> f32 {
        self.viewport_height - crate::consts::PLAYER_FLOOR_OFFSET
    }

    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "chainfall_tuning";

    /// Load tuning from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(tuning) => {
                        log::info!("Loaded tuning override from LocalStorage");
                        return tuning;
                    }
                    Err(e) => log::warn!("Ignoring stored tuning: {e}"),
                }
            }
        }

        log::info!("Using default tuning");
        Self::default()
    }

    /// Native stub
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }
}

fn check_range(name: &'static str, min: f32, max: f32) -> Result<(), TuningError> {
    if min > max {
        Err(TuningError::Range { name, min, max })
    } else {
        Ok(())
    }
}
