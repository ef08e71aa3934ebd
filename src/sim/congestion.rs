//! Network congestion estimate and the difficulty parameters it drives
//!
//! Samples arrive every few seconds; the parameters they imply are never
//! assigned directly. Each tick every parameter moves a fixed fraction of
//! the way toward its target.

use rand::Rng;

use crate::audio::{AudioMix, TrackId};
use crate::chain::{ChainError, NetworkSample};
use crate::tuning::Tuning;
use crate::{clamp01, lerp};

/// Weighted, normalized busyness of the network in `[0, 1]`
pub fn congestion(gas_price_gwei: f64, pending_tx_count: u64, tuning: &Tuning) -> f32 {
    let gas = clamp01((gas_price_gwei / tuning.congestion_gas_ceiling_gwei as f64) as f32);
    let pending = clamp01(pending_tx_count as f32 / tuning.congestion_pending_ceiling);
    clamp01(tuning.congestion_gas_weight * gas + tuning.congestion_pending_weight * pending)
}

/// Snapshot pushed to presentation on every successful resample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkStatus {
    pub gas_price: f64,
    pub pending_tx_count: u64,
    pub congestion_level: f32,
}

/// Last network observation and the sampling schedule
#[derive(Debug, Clone)]
pub struct CongestionEstimator {
    gas_price_gwei: f64,
    pending_tx_count: u64,
    congestion: f32,
    last_update_ms: Option<u64>,
    interval_ms: u64,
    in_flight: bool,
    samples: u64,
}

impl CongestionEstimator {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            gas_price_gwei: 0.0,
            pending_tx_count: 0,
            congestion: clamp01(tuning.initial_congestion),
            last_update_ms: None,
            interval_ms: tuning.network_sample_interval_ms,
            in_flight: false,
            samples: 0,
        }
    }

    /// A new sample should be requested
    pub fn due(&self, now_ms: u64) -> bool {
        if self.in_flight {
            return false;
        }
        match self.last_update_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        }
    }

    pub fn begin_sample(&mut self, now_ms: u64) {
        self.in_flight = true;
        self.last_update_ms = Some(now_ms);
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Fold in a fresh sample
    pub fn observe(&mut self, sample: NetworkSample, tuning: &Tuning, now_ms: u64) -> NetworkStatus {
        self.in_flight = false;
        self.last_update_ms = Some(now_ms);
        self.gas_price_gwei = sample.gas_price_gwei.max(0.0);
        self.pending_tx_count = sample.pending_tx_count;
        self.congestion = congestion(self.gas_price_gwei, self.pending_tx_count, tuning);
        self.samples += 1;
        log::debug!(
            "Network sample: {:.1} gwei, {} pending, congestion {:.2}",
            self.gas_price_gwei,
            self.pending_tx_count,
            self.congestion
        );
        self.status()
    }

    /// Keep the previous value; retry next interval
    pub fn sample_failed(&mut self, err: &ChainError, now_ms: u64) {
        self.in_flight = false;
        self.last_update_ms = Some(now_ms);
        log::warn!("Network sample failed, keeping congestion {:.2}: {err}", self.congestion);
    }

    pub fn congestion(&self) -> f32 {
        self.congestion
    }

    pub fn pending_tx_count(&self) -> u64 {
        self.pending_tx_count
    }

    /// Successful samples so far
    pub fn sample_count(&self) -> u64 {
        self.samples
    }

    pub fn status(&self) -> NetworkStatus {
        NetworkStatus {
            gas_price: self.gas_price_gwei,
            pending_tx_count: self.pending_tx_count,
            congestion_level: self.congestion,
        }
    }
}

/// Exponentially smoothed value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothed {
    pub current: f32,
    pub target: f32,
}

impl Smoothed {
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
        }
    }

    /// Move `factor` of the remaining distance toward the target
    pub fn step(&mut self, factor: f32) -> f32 {
        self.current += (self.target - self.current) * factor;
        self.current
    }

    pub fn get(&self) -> f32 {
        self.current
    }
}

/// Congestion-driven gameplay and audio parameters
#[derive(Debug, Clone)]
pub struct DifficultyController {
    pub gravity: Smoothed,
    pub spawn_interval_ms: Smoothed,
    pub fall_speed: Smoothed,
    pub volumes: [Smoothed; 4],
    pub playback_rate: Smoothed,
    smoothing: f32,
    gravity_range: (f32, f32),
    gravity_base: f32,
    gravity_scale: f32,
    spawn_range: (f32, f32),
    spawn_base: f32,
    spawn_variance: f32,
    fall_range: (f32, f32),
}

impl DifficultyController {
    /// Parameters start at the targets for `initial_congestion` without jitter
    pub fn new(tuning: &Tuning) -> Self {
        let mut controller = Self {
            gravity: Smoothed::new(tuning.gravity_base),
            spawn_interval_ms: Smoothed::new(tuning.spawn_interval_base_ms),
            fall_speed: Smoothed::new(tuning.fall_speed_min),
            volumes: TrackId::ALL.map(|t| Smoothed::new(t.bounds().initial)),
            playback_rate: Smoothed::new(1.0),
            smoothing: clamp01(tuning.smoothing_factor),
            gravity_range: (tuning.gravity_min, tuning.gravity_max),
            gravity_base: tuning.gravity_base,
            gravity_scale: tuning.gravity_scale,
            spawn_range: (tuning.spawn_interval_min_ms, tuning.spawn_interval_max_ms),
            spawn_base: tuning.spawn_interval_base_ms,
            spawn_variance: tuning.spawn_interval_variance,
            fall_range: (tuning.fall_speed_min, tuning.fall_speed_max),
        };
        let c = clamp01(tuning.initial_congestion);
        controller.gravity = Smoothed::new(controller.gravity_target(c));
        controller.spawn_interval_ms = Smoothed::new(controller.spawn_target(c, 0.0));
        controller.fall_speed = Smoothed::new(controller.fall_target(c));
        controller
    }

    fn gravity_target(&self, c: f32) -> f32 {
        let (min, max) = self.gravity_range;
        (self.gravity_base + c * (max - min) * self.gravity_scale).clamp(min, max)
    }

    /// `jitter` in `[-1, 1]`, scaled by the variance fraction
    fn spawn_target(&self, c: f32, jitter: f32) -> f32 {
        let (min, max) = self.spawn_range;
        let base = self.spawn_base - c * (self.spawn_base - min);
        (base * (1.0 + jitter * self.spawn_variance)).clamp(min, max)
    }

    fn fall_target(&self, c: f32) -> f32 {
        lerp(self.fall_range.0, self.fall_range.1, c)
    }

    /// Recompute every target from a new congestion value
    pub fn retarget<R: Rng>(&mut self, congestion: f32, rng: &mut R) {
        let c = clamp01(congestion);
        let jitter = rng.random_range(-1.0..=1.0);
        self.gravity.target = self.gravity_target(c);
        self.spawn_interval_ms.target = self.spawn_target(c, jitter);
        self.fall_speed.target = self.fall_target(c);
        for track in TrackId::ALL {
            let b = track.bounds();
            let t = if track.rises_with_congestion() { c } else { 1.0 - c };
            self.volumes[track.index()].target = lerp(b.min, b.max, t);
        }
        self.playback_rate.target = 1.0 + 0.2 * c;
    }

    /// Advance every parameter one tick
    pub fn step(&mut self) {
        let f = self.smoothing;
        self.gravity.step(f);
        self.spawn_interval_ms.step(f);
        self.fall_speed.step(f);
        for v in &mut self.volumes {
            v.step(f);
        }
        self.playback_rate.step(f);
    }

    pub fn gravity(&self) -> f32 {
        self.gravity.get()
    }

    pub fn spawn_interval_ms(&self) -> f32 {
        self.spawn_interval_ms.get()
    }

    pub fn fall_speed(&self) -> f32 {
        self.fall_speed.get()
    }

    pub fn mix(&self) -> AudioMix {
        AudioMix {
            volumes: self.volumes.map(|v| v.get()),
            playback_rate: self.playback_rate.get(),
        }
    }
}
