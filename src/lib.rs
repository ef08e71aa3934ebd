//! Chainfall - dodge the mempool
//!
//! Core modules:
//! - `sim`: Deterministic simulation (buffering, mapping, lifecycle, difficulty)
//! - `chain`: Chain data source abstraction and JSON-RPC wire codec
//! - `physics`: Physics engine abstraction plus a kinematic reference world
//! - `audio`: Congestion-driven music mix
//! - `hud`: Presentation bridge
//! - `particles`: Visual burst particles
//! - `tuning`: Data-driven game balance
//! - `web`: Browser adapters for the traits above (wasm32 only)

pub mod audio;
pub mod chain;
pub mod hud;
pub mod particles;
pub mod physics;
pub mod sim;
pub mod tuning;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use tuning::Tuning;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, matches the browser frame rate)
    pub const SIM_DT_MS: f64 = 1000.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 4;

    /// Objects this far below the viewport are retired
    pub const OFFSCREEN_MARGIN: f32 = 100.0;

    /// Player body
    pub const PLAYER_WIDTH: f32 = 30.0;
    pub const PLAYER_HEIGHT: f32 = 30.0;
    /// Player hue (degrees); falling objects never use it
    pub const PLAYER_HUE: f32 = 120.0;
    /// Distance of the player's resting line from the bottom edge
    pub const PLAYER_FLOOR_OFFSET: f32 = 50.0;

    /// Ground slab thickness
    pub const GROUND_THICKNESS: f32 = 20.0;

    /// Power-up pickup radius and constant fall speed (units per tick)
    pub const POWER_UP_RADIUS: f32 = 15.0;
    pub const POWER_UP_FALL_SPEED: f32 = 2.0;

    /// Gravity acceleration per tick at gravity scale 1.0
    pub const GRAVITY_ACCEL: f32 = 0.25;

    /// Particle counts for burst requests
    pub const BURST_SMALL: u32 = 10;
    pub const BURST_LARGE: u32 = 15;
}

/// Clamp to the unit interval (NaN maps to 0)
#[inline]
pub fn clamp01(x: f32) -> f32 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Normalize a hue to [0, 360)
#[inline]
pub fn normalize_hue(hue: f32) -> f32 {
    hue.rem_euclid(360.0)
}

/// Axis-aligned bounds centered on `center` with half extent `radius`
#[inline]
pub fn square_around(center: Vec2, radius: f32) -> (Vec2, Vec2) {
    let r = Vec2::splat(radius);
    (center - r, center + r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp01_handles_nan_and_overflow() {
        assert_eq!(clamp01(f32::NAN), 0.0);
        assert_eq!(clamp01(7.0), 1.0);
        assert_eq!(clamp01(-3.0), 0.0);
        assert_eq!(clamp01(0.25), 0.25);
    }

    #[test]
    fn test_normalize_hue_wraps() {
        assert!((normalize_hue(370.0) - 10.0).abs() < 1e-4);
        assert!((normalize_hue(-30.0) - 330.0).abs() < 1e-4);
    }
}
