//! Physics engine abstraction
//!
//! The simulation only needs a narrow slice of a rigid-body engine: body
//! creation, a handful of mutators, spatial queries and collision-start
//! notifications. The browser build forwards these calls to a JS engine;
//! [`KinematicWorld`] is a small deterministic implementation used by the
//! native demo and by tests.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;

use crate::consts::{GRAVITY_ACCEL, SIM_DT_MS};

/// Opaque body handle. Never reused within one world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u32);

/// What a body represents, used to classify collision pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyLabel {
    Player,
    Object,
    PowerUp,
    Ground,
}

/// Collision geometry
#[derive(Debug, Clone, PartialEq)]
pub enum Collider {
    Circle { radius: f32 },
    Rect { half: Vec2 },
    /// Convex or concave outline, relative to the body center
    Polygon { vertices: Vec<Vec2> },
}

impl Collider {
    /// Half extents of the axis-aligned bounding box
    pub fn half_extents(&self) -> Vec2 {
        match self {
            Collider::Circle { radius } => Vec2::splat(*radius),
            Collider::Rect { half } => *half,
            Collider::Polygon { vertices } => vertices
                .iter()
                .fold(Vec2::ZERO, |acc, v| acc.max(v.abs())),
        }
    }
}

/// Everything needed to create a body
#[derive(Debug, Clone, PartialEq)]
pub struct BodySpec {
    pub label: BodyLabel,
    pub collider: Collider,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub is_static: bool,
    /// Sensors report collisions but are never pushed
    pub is_sensor: bool,
    pub angle: f32,
}

impl BodySpec {
    pub fn new(label: BodyLabel, collider: Collider) -> Self {
        Self {
            label,
            collider,
            density: 0.001,
            friction: 0.1,
            restitution: 0.0,
            is_static: false,
            is_sensor: false,
            angle: 0.0,
        }
    }

    pub fn fixed(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }
}

/// Capability set consumed by the simulation
pub trait PhysicsWorld {
    fn create_body(&mut self, spec: &BodySpec, position: Vec2) -> BodyHandle;
    /// Release a body. Unknown handles are ignored.
    fn remove_body(&mut self, body: BodyHandle);
    fn contains(&self, body: BodyHandle) -> bool;
    fn label(&self, body: BodyHandle) -> Option<BodyLabel>;
    fn position(&self, body: BodyHandle) -> Option<Vec2>;
    fn velocity(&self, body: BodyHandle) -> Option<Vec2>;
    fn set_position(&mut self, body: BodyHandle, position: Vec2);
    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2);
    fn set_angular_velocity(&mut self, body: BodyHandle, omega: f32);
    fn set_static(&mut self, body: BodyHandle, is_static: bool);
    /// Scale relative to the current size
    fn scale_body(&mut self, body: BodyHandle, factor: f32);
    fn set_gravity(&mut self, gravity: f32);
    /// Bodies whose bounds overlap the region
    fn bodies_in_region(&self, min: Vec2, max: Vec2) -> Vec<BodyHandle>;
    /// Topmost body containing the point
    fn body_at_point(&self, point: Vec2) -> Option<BodyHandle>;
    fn step(&mut self, dt_ms: f64);
    /// Pairs that started touching since the last drain
    fn drain_collision_starts(&mut self) -> Vec<(BodyHandle, BodyHandle)>;
    /// Whether `step` moves dynamic bodies. When false the simulation moves
    /// falling objects itself.
    fn integrates_motion(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
struct KinematicBody {
    label: BodyLabel,
    half: Vec2,
    pos: Vec2,
    vel: Vec2,
    angle: f32,
    omega: f32,
    is_static: bool,
    is_sensor: bool,
}

impl KinematicBody {
    fn min(&self) -> Vec2 {
        self.pos - self.half
    }

    fn max(&self) -> Vec2 {
        self.pos + self.half
    }

    fn overlaps(&self, other: &KinematicBody) -> bool {
        let d = (self.pos - other.pos).abs();
        let reach = self.half + other.half;
        d.x < reach.x && d.y < reach.y
    }
}

/// Axis-aligned kinematic world: gravity, integration, push-out against
/// static bodies and collision-start detection. Bodies are iterated in
/// handle order so runs are reproducible.
#[derive(Debug)]
pub struct KinematicWorld {
    bodies: BTreeMap<BodyHandle, KinematicBody>,
    next_handle: u32,
    gravity: f32,
    integrate: bool,
    touching: BTreeSet<(BodyHandle, BodyHandle)>,
    started: Vec<(BodyHandle, BodyHandle)>,
}

impl KinematicWorld {
    pub fn new(gravity: f32) -> Self {
        Self {
            bodies: BTreeMap::new(),
            next_handle: 1,
            gravity,
            integrate: true,
            touching: BTreeSet::new(),
            started: Vec::new(),
        }
    }

    /// Collision detection only; bodies move only when told to
    pub fn without_integration(mut self) -> Self {
        self.integrate = false;
        self
    }

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Current AABB half extents
    pub fn half_extents(&self, body: BodyHandle) -> Option<Vec2> {
        self.bodies.get(&body).map(|b| b.half)
    }

    pub fn angle(&self, body: BodyHandle) -> Option<f32> {
        self.bodies.get(&body).map(|b| b.angle)
    }

    pub fn is_static(&self, body: BodyHandle) -> Option<bool> {
        self.bodies.get(&body).map(|b| b.is_static)
    }

    fn detect_contacts(&mut self) {
        let bodies: Vec<(BodyHandle, &KinematicBody)> =
            self.bodies.iter().map(|(h, b)| (*h, b)).collect();
        let mut now_touching = BTreeSet::new();
        for (i, (ha, a)) in bodies.iter().enumerate() {
            for (hb, b) in bodies.iter().skip(i + 1) {
                if a.is_static && b.is_static {
                    continue;
                }
                if a.overlaps(b) {
                    now_touching.insert((*ha, *hb));
                }
            }
        }
        for pair in &now_touching {
            if !self.touching.contains(pair) {
                self.started.push(*pair);
            }
        }
        self.touching = now_touching;
    }

    fn resolve_static_contacts(&mut self) {
        let statics: Vec<KinematicBody> = self
            .bodies
            .values()
            .filter(|b| b.is_static && !b.is_sensor)
            .cloned()
            .collect();
        for body in self.bodies.values_mut() {
            if body.is_static || body.is_sensor {
                continue;
            }
            for wall in &statics {
                if body.overlaps(wall) && body.pos.y <= wall.pos.y {
                    body.pos.y = wall.min().y - body.half.y;
                    if body.vel.y > 0.0 {
                        body.vel.y = 0.0;
                    }
                }
            }
        }
    }
}

impl PhysicsWorld for KinematicWorld {
    fn create_body(&mut self, spec: &BodySpec, position: Vec2) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        self.bodies.insert(
            handle,
            KinematicBody {
                label: spec.label,
                half: spec.collider.half_extents(),
                pos: position,
                vel: Vec2::ZERO,
                angle: spec.angle,
                omega: 0.0,
                is_static: spec.is_static,
                is_sensor: spec.is_sensor,
            },
        );
        handle
    }

    fn remove_body(&mut self, body: BodyHandle) {
        self.bodies.remove(&body);
        self.touching.retain(|(a, b)| *a != body && *b != body);
        self.started.retain(|(a, b)| *a != body && *b != body);
    }

    fn contains(&self, body: BodyHandle) -> bool {
        self.bodies.contains_key(&body)
    }

    fn label(&self, body: BodyHandle) -> Option<BodyLabel> {
        self.bodies.get(&body).map(|b| b.label)
    }

    fn position(&self, body: BodyHandle) -> Option<Vec2> {
        self.bodies.get(&body).map(|b| b.pos)
    }

    fn velocity(&self, body: BodyHandle) -> Option<Vec2> {
        self.bodies.get(&body).map(|b| b.vel)
    }

    fn set_position(&mut self, body: BodyHandle, position: Vec2) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.pos = position;
        }
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.vel = velocity;
        }
    }

    fn set_angular_velocity(&mut self, body: BodyHandle, omega: f32) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.omega = omega;
        }
    }

    fn set_static(&mut self, body: BodyHandle, is_static: bool) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.is_static = is_static;
            if is_static {
                b.vel = Vec2::ZERO;
                b.omega = 0.0;
            }
        }
    }

    fn scale_body(&mut self, body: BodyHandle, factor: f32) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.half *= factor;
        }
    }

    fn set_gravity(&mut self, gravity: f32) {
        self.gravity = gravity;
    }

    fn bodies_in_region(&self, min: Vec2, max: Vec2) -> Vec<BodyHandle> {
        self.bodies
            .iter()
            .filter(|(_, b)| {
                let (bmin, bmax) = (b.min(), b.max());
                bmin.x <= max.x && bmax.x >= min.x && bmin.y <= max.y && bmax.y >= min.y
            })
            .map(|(h, _)| *h)
            .collect()
    }

    fn body_at_point(&self, point: Vec2) -> Option<BodyHandle> {
        self.bodies
            .iter()
            .rev()
            .find(|(_, b)| {
                let (bmin, bmax) = (b.min(), b.max());
                point.cmpge(bmin).all() && point.cmple(bmax).all()
            })
            .map(|(h, _)| *h)
    }

    fn step(&mut self, dt_ms: f64) {
        if self.integrate {
            let k = (dt_ms / SIM_DT_MS) as f32;
            let accel = self.gravity * GRAVITY_ACCEL;
            for body in self.bodies.values_mut() {
                if body.is_static {
                    continue;
                }
                // Sensors (power-ups) are driven by explicit velocity only
                if !body.is_sensor {
                    body.vel.y += accel * k;
                }
                body.pos += body.vel * k;
                body.angle += body.omega * k;
            }
        }
        self.detect_contacts();
        self.resolve_static_contacts();
    }

    fn drain_collision_starts(&mut self) -> Vec<(BodyHandle, BodyHandle)> {
        std::mem::take(&mut self.started)
    }

    fn integrates_motion(&self) -> bool {
        self.integrate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ground(world: &mut KinematicWorld) -> BodyHandle {
        let spec = BodySpec::new(
            BodyLabel::Ground,
            Collider::Rect {
                half: Vec2::new(400.0, 10.0),
            },
        )
        .fixed();
        world.create_body(&spec, Vec2::new(400.0, 600.0))
    }

    fn crate_box(world: &mut KinematicWorld, pos: Vec2) -> BodyHandle {
        let spec = BodySpec::new(BodyLabel::Object, Collider::Rect { half: Vec2::splat(10.0) });
        world.create_body(&spec, pos)
    }

    #[test]
    fn test_gravity_accelerates_dynamic_bodies() {
        let mut world = KinematicWorld::new(1.0);
        let b = crate_box(&mut world, Vec2::new(100.0, 0.0));
        world.step(SIM_DT_MS);
        world.step(SIM_DT_MS);
        let v = world.velocity(b).unwrap();
        assert!((v.y - 2.0 * GRAVITY_ACCEL).abs() < 1e-5);
        assert!(world.position(b).unwrap().y > 0.0);
    }

    #[test]
    fn test_collision_start_reported_once() {
        let mut world = KinematicWorld::new(1.0);
        let g = ground(&mut world);
        let b = crate_box(&mut world, Vec2::new(100.0, 585.0));
        world.step(SIM_DT_MS);
        assert_eq!(world.drain_collision_starts(), vec![(g, b)]);
        // Still resting on the ground: no new start
        world.step(SIM_DT_MS);
        assert!(world.drain_collision_starts().is_empty());
        // Pushed out on top of the ground
        assert!(world.position(b).unwrap().y <= 580.0 + 1e-3);
    }

    #[test]
    fn test_without_integration_keeps_positions() {
        let mut world = KinematicWorld::new(1.0).without_integration();
        let b = crate_box(&mut world, Vec2::new(100.0, 0.0));
        world.set_velocity(b, Vec2::new(0.0, 5.0));
        world.step(SIM_DT_MS);
        assert_eq!(world.position(b), Some(Vec2::new(100.0, 0.0)));
        assert!(!world.integrates_motion());
    }

    #[test]
    fn test_queries_and_removal() {
        let mut world = KinematicWorld::new(1.0);
        let a = crate_box(&mut world, Vec2::new(0.0, 0.0));
        let b = crate_box(&mut world, Vec2::new(200.0, 0.0));
        let hits = world.bodies_in_region(Vec2::new(-5.0, -5.0), Vec2::new(5.0, 5.0));
        assert_eq!(hits, vec![a]);
        assert_eq!(world.body_at_point(Vec2::new(205.0, 3.0)), Some(b));
        world.remove_body(b);
        assert!(!world.contains(b));
        assert_eq!(world.body_at_point(Vec2::new(205.0, 3.0)), None);
        world.remove_body(b);
    }

    #[test]
    fn test_scale_is_relative() {
        let mut world = KinematicWorld::new(1.0);
        let a = crate_box(&mut world, Vec2::ZERO);
        world.scale_body(a, 0.5);
        world.scale_body(a, 2.0);
        assert_eq!(world.half_extents(a), Some(Vec2::splat(10.0)));
    }
}
