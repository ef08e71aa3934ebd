//! Burst particles
//!
//! Purely visual: fed from [`GameEvent::Burst`] after each frame's ticks and
//! never read back by the simulation, so it keeps its own RNG.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::sim::mapper::Hsl;
use crate::sim::state::GameEvent;

/// Maximum live particles; the oldest are dropped first
pub const MAX_PARTICLES: usize = 256;

/// Seconds a particle lives at full size
const LIFETIME_SECS: f32 = 1.0;
/// Initial speed range (units per second)
const MIN_SPEED: f32 = 300.0;
const MAX_SPEED: f32 = 600.0;
/// Downward pull (units per second squared)
const GRAVITY: f32 = 400.0;

/// A particle for visual effects
#[derive(Debug, Clone)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub color: Hsl,
    /// 0-1, decreases over time; doubles as opacity
    pub life: f32,
    pub size: f32,
}

#[derive(Debug)]
pub struct ParticleField {
    particles: Vec<Particle>,
    rng: Pcg32,
}

impl ParticleField {
    pub fn new(seed: u64) -> Self {
        Self {
            particles: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Spawn a burst for every burst request in `events`
    pub fn absorb(&mut self, events: &[GameEvent]) {
        for event in events {
            if let GameEvent::Burst { at, color, count } = event {
                self.burst(*at, *color, *count);
            }
        }
    }

    /// Radial explosion of `count` particles around `at`
    pub fn burst(&mut self, at: Vec2, color: Hsl, count: u32) {
        if count == 0 {
            return;
        }
        for i in 0..count {
            let angle = TAU * i as f32 / count as f32;
            let speed = self.rng.random_range(MIN_SPEED..MAX_SPEED);
            self.particles.push(Particle {
                pos: at,
                vel: Vec2::from_angle(angle) * speed,
                color,
                life: 1.0,
                size: self.rng.random_range(3.0..8.0),
            });
        }
        let overflow = self.particles.len().saturating_sub(MAX_PARTICLES);
        if overflow > 0 {
            self.particles.drain(..overflow);
        }
    }

    /// Advance by `dt` seconds and drop dead particles
    pub fn update(&mut self, dt: f32) {
        for particle in &mut self.particles {
            particle.pos += particle.vel * dt;
            particle.vel.y += GRAVITY * dt;
            particle.vel *= 0.98;
            particle.life -= dt / LIFETIME_SECS;
            particle.size *= 0.995;
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}
