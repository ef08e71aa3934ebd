//! matter.js bridge
//!
//! The page loads matter.js as the global `Matter`. Bodies live on the JS
//! side keyed by our handle; labels stay on the Rust side so contact
//! classification never crosses the boundary.

use std::collections::HashMap;

use glam::Vec2;
use wasm_bindgen::prelude::*;

use crate::particles::ParticleField;
use crate::physics::{BodyHandle, BodyLabel, BodySpec, Collider, PhysicsWorld};

#[wasm_bindgen(inline_js = "
    let engine = null;
    const bodies = new Map();
    const starts = [];
    let particles = new Float32Array(0);
    let particleFills = [];

    export function physics_init(gravity) {
        engine = Matter.Engine.create();
        engine.gravity.y = gravity;
        bodies.clear();
        starts.length = 0;
        Matter.Events.on(engine, 'collisionStart', (event) => {
            for (const pair of event.pairs) {
                starts.push(pair.bodyA.plugin.handle, pair.bodyB.plugin.handle);
            }
        });
    }

    export function physics_create(handle, kind, a, b, vertices, x, y, opts) {
        const options = {
            density: opts[0],
            friction: opts[1],
            restitution: opts[2],
            isStatic: opts[3] > 0,
            isSensor: opts[4] > 0,
            angle: opts[5],
            plugin: { handle },
        };
        let body;
        if (kind === 0) {
            body = Matter.Bodies.circle(x, y, a, options);
        } else if (kind === 1) {
            body = Matter.Bodies.rectangle(x, y, a * 2, b * 2, options);
        } else {
            const pts = [];
            for (let i = 0; i + 1 < vertices.length; i += 2) {
                pts.push({ x: vertices[i], y: vertices[i + 1] });
            }
            body = Matter.Bodies.fromVertices(x, y, [pts], options);
        }
        if (options.isSensor && !options.isStatic) {
            body.frictionAir = 0;
        }
        bodies.set(handle, body);
        Matter.Composite.add(engine.world, body);
    }

    export function physics_remove(handle) {
        const body = bodies.get(handle);
        if (body) {
            Matter.Composite.remove(engine.world, body);
            bodies.delete(handle);
        }
    }

    export function physics_vec(handle, which) {
        const body = bodies.get(handle);
        if (!body) return new Float32Array(0);
        const v = which === 0 ? body.position : body.velocity;
        return new Float32Array([v.x, v.y]);
    }

    export function physics_set_position(handle, x, y) {
        const body = bodies.get(handle);
        if (body) Matter.Body.setPosition(body, { x, y });
    }

    export function physics_set_velocity(handle, x, y) {
        const body = bodies.get(handle);
        if (body) Matter.Body.setVelocity(body, { x, y });
    }

    export function physics_set_angular_velocity(handle, omega) {
        const body = bodies.get(handle);
        if (body) Matter.Body.setAngularVelocity(body, omega);
    }

    export function physics_set_static(handle, isStatic) {
        const body = bodies.get(handle);
        if (body) Matter.Body.setStatic(body, isStatic);
    }

    export function physics_scale(handle, factor) {
        const body = bodies.get(handle);
        if (body) Matter.Body.scale(body, factor, factor);
    }

    export function physics_set_gravity(gravity) {
        if (engine) engine.gravity.y = gravity;
    }

    export function physics_query_region(minX, minY, maxX, maxY) {
        const found = Matter.Query.region(Array.from(bodies.values()), {
            min: { x: minX, y: minY },
            max: { x: maxX, y: maxY },
        });
        return new Uint32Array(found.map((b) => b.plugin.handle));
    }

    export function physics_query_point(x, y) {
        const found = Matter.Query.point(Array.from(bodies.values()), { x, y });
        return found.length > 0 ? found[found.length - 1].plugin.handle : -1;
    }

    export function physics_step(dtMs) {
        if (engine) Matter.Engine.update(engine, dtMs);
    }

    export function physics_attach_canvas(canvasId, width, height) {
        const canvas = document.getElementById(canvasId);
        if (!canvas || !engine) return false;
        const render = Matter.Render.create({
            canvas,
            engine,
            options: { width, height, wireframes: false, background: '#0d0d14' },
        });
        Matter.Events.on(render, 'afterRender', () => {
            const ctx = render.context;
            ctx.save();
            for (let i = 0; i < particleFills.length; i++) {
                const o = i * 4;
                ctx.globalAlpha = particles[o + 3];
                ctx.fillStyle = particleFills[i];
                ctx.beginPath();
                ctx.arc(particles[o], particles[o + 1], particles[o + 2], 0, Math.PI * 2);
                ctx.fill();
            }
            ctx.restore();
        });
        Matter.Render.run(render);
        return true;
    }

    export function physics_set_particles(data, fills) {
        particles = data.slice();
        particleFills = fills.length > 0 ? fills.split('|') : [];
    }

    export function physics_paint(handle, fill, opacity) {
        const body = bodies.get(handle);
        if (body) {
            body.render.fillStyle = fill;
            body.render.opacity = opacity;
        }
    }

    export function physics_drain_starts() {
        const out = new Uint32Array(starts);
        starts.length = 0;
        return out;
    }
")]
extern "C" {
    fn physics_init(gravity: f32);
    fn physics_create(
        handle: u32,
        kind: u32,
        a: f32,
        b: f32,
        vertices: &[f32],
        x: f32,
        y: f32,
        opts: &[f32],
    );
    fn physics_remove(handle: u32);
    fn physics_vec(handle: u32, which: u32) -> js_sys::Float32Array;
    fn physics_set_position(handle: u32, x: f32, y: f32);
    fn physics_set_velocity(handle: u32, x: f32, y: f32);
    fn physics_set_angular_velocity(handle: u32, omega: f32);
    fn physics_set_static(handle: u32, is_static: bool);
    fn physics_scale(handle: u32, factor: f32);
    fn physics_set_gravity(gravity: f32);
    fn physics_query_region(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> js_sys::Uint32Array;
    fn physics_query_point(x: f32, y: f32) -> i32;
    fn physics_step(dt_ms: f64);
    fn physics_drain_starts() -> js_sys::Uint32Array;
    fn physics_attach_canvas(canvas_id: &str, width: f32, height: f32) -> bool;
    fn physics_paint(handle: u32, fill: &str, opacity: f32);
    fn physics_set_particles(data: &[f32], fills: &str);
}

const POSITION: u32 = 0;
const VELOCITY: u32 = 1;

/// Physics world backed by matter.js. One per page.
pub struct MatterWorld {
    labels: HashMap<BodyHandle, BodyLabel>,
    next_handle: u32,
}

impl MatterWorld {
    pub fn new(gravity: f32) -> Self {
        physics_init(gravity);
        Self {
            labels: HashMap::new(),
            next_handle: 0,
        }
    }

    /// Draw the world into `<canvas id=canvas_id>` with matter's renderer
    pub fn attach_canvas(&self, canvas_id: &str, width: f32, height: f32) -> bool {
        physics_attach_canvas(canvas_id, width, height)
    }

    /// Set a body's fill color and opacity for the next frame
    pub fn paint(&self, body: BodyHandle, fill: &str, opacity: f32) {
        if self.contains(body) {
            physics_paint(body.0, fill, opacity);
        }
    }

    /// Hand the current particles to the renderer's overlay pass
    pub fn paint_particles(&self, field: &ParticleField) {
        let mut data = Vec::with_capacity(field.len() * 4);
        let mut fills = Vec::with_capacity(field.len());
        for p in field.iter() {
            data.extend_from_slice(&[p.pos.x, p.pos.y, p.size, p.life.clamp(0.0, 1.0)]);
            fills.push(p.color.to_css());
        }
        physics_set_particles(&data, &fills.join("|"));
    }

    fn read_vec(&self, body: BodyHandle, which: u32) -> Option<Vec2> {
        if !self.contains(body) {
            return None;
        }
        let v = physics_vec(body.0, which).to_vec();
        (v.len() == 2).then(|| Vec2::new(v[0], v[1]))
    }
}

impl PhysicsWorld for MatterWorld {
    fn create_body(&mut self, spec: &BodySpec, position: Vec2) -> BodyHandle {
        self.next_handle += 1;
        let handle = BodyHandle(self.next_handle);

        let (kind, a, b, vertices) = match &spec.collider {
            Collider::Circle { radius } => (0, *radius, *radius, Vec::new()),
            Collider::Rect { half } => (1, half.x, half.y, Vec::new()),
            Collider::Polygon { vertices } => {
                let flat = vertices.iter().flat_map(|v| [v.x, v.y]).collect();
                (2, 0.0, 0.0, flat)
            }
        };
        let opts = [
            spec.density,
            spec.friction,
            spec.restitution,
            if spec.is_static { 1.0 } else { 0.0 },
            if spec.is_sensor { 1.0 } else { 0.0 },
            spec.angle,
        ];
        physics_create(handle.0, kind, a, b, &vertices, position.x, position.y, &opts);
        self.labels.insert(handle, spec.label);
        handle
    }

    fn remove_body(&mut self, body: BodyHandle) {
        if self.labels.remove(&body).is_some() {
            physics_remove(body.0);
        }
    }

    fn contains(&self, body: BodyHandle) -> bool {
        self.labels.contains_key(&body)
    }

    fn label(&self, body: BodyHandle) -> Option<BodyLabel> {
        self.labels.get(&body).copied()
    }

    fn position(&self, body: BodyHandle) -> Option<Vec2> {
        self.read_vec(body, POSITION)
    }

    fn velocity(&self, body: BodyHandle) -> Option<Vec2> {
        self.read_vec(body, VELOCITY)
    }

    fn set_position(&mut self, body: BodyHandle, position: Vec2) {
        if self.contains(body) {
            physics_set_position(body.0, position.x, position.y);
        }
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        if self.contains(body) {
            physics_set_velocity(body.0, velocity.x, velocity.y);
        }
    }

    fn set_angular_velocity(&mut self, body: BodyHandle, omega: f32) {
        if self.contains(body) {
            physics_set_angular_velocity(body.0, omega);
        }
    }

    fn set_static(&mut self, body: BodyHandle, is_static: bool) {
        if self.contains(body) {
            physics_set_static(body.0, is_static);
        }
    }

    fn scale_body(&mut self, body: BodyHandle, factor: f32) {
        if self.contains(body) {
            physics_scale(body.0, factor);
        }
    }

    fn set_gravity(&mut self, gravity: f32) {
        physics_set_gravity(gravity);
    }

    fn bodies_in_region(&self, min: Vec2, max: Vec2) -> Vec<BodyHandle> {
        physics_query_region(min.x, min.y, max.x, max.y)
            .to_vec()
            .into_iter()
            .map(BodyHandle)
            .collect()
    }

    fn body_at_point(&self, point: Vec2) -> Option<BodyHandle> {
        let hit = physics_query_point(point.x, point.y);
        u32::try_from(hit).ok().map(BodyHandle)
    }

    fn step(&mut self, dt_ms: f64) {
        physics_step(dt_ms);
    }

    fn drain_collision_starts(&mut self) -> Vec<(BodyHandle, BodyHandle)> {
        physics_drain_starts()
            .to_vec()
            .chunks_exact(2)
            .map(|pair| (BodyHandle(pair[0]), BodyHandle(pair[1])))
            .collect()
    }
}
