//! Chainfall entry point
//!
//! Handles platform-specific initialization and runs the game loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlElement, KeyboardEvent, MouseEvent};

    use chainfall::Tuning;
    use chainfall::audio::MusicSystem;
    use chainfall::chain::scripted::TrafficProfile;
    use chainfall::chain::{ChainSource, ScriptedChainSource};
    use chainfall::consts::*;
    use chainfall::hud::HudBridge;
    use chainfall::particles::ParticleField;
    use chainfall::sim::{Game, GamePhase, TickInput};
    use chainfall::web::{DomHud, MatterWorld, RpcChainSource, WebAudioSink};

    type WebGame = Game<MatterWorld, Box<dyn ChainSource>>;

    /// Everything the frame loop owns
    struct App {
        game: WebGame,
        hud: DomHud,
        bridge: HudBridge,
        music: MusicSystem,
        sink: WebAudioSink,
        particles: ParticleField,
        accumulator: f64,
        last_time: f64,
        input: TickInput,
        /// CSS pixels to world units
        pointer_scale: Vec2,
    }

    impl App {
        /// Run simulation ticks
        fn update(&mut self, dt_ms: f64) {
            self.accumulator += dt_ms.min(100.0);

            let mut substeps = 0;
            while self.accumulator >= SIM_DT_MS && substeps < MAX_SUBSTEPS {
                let input = self.input.clone();
                self.game.tick(&input);
                self.accumulator -= SIM_DT_MS;
                substeps += 1;

                // Clear one-shot inputs after processing
                self.input.jump = false;
                self.input.action = false;
                self.input.select = None;
                self.input.pause = false;
                self.input.confirm_latest = false;
            }
        }

        /// Push this frame's events to the HUD, the speakers and the particles
        fn present(&mut self, dt_ms: f64) {
            let events = self.game.drain_events();
            self.bridge.dispatch(&events, &mut self.hud);
            self.particles.absorb(&events);
            self.particles.update((dt_ms.min(100.0) / 1000.0) as f32);
            self.music.handle_events(&mut self.sink, &events);
            self.music.apply_mix(&mut self.sink, &self.game.audio_mix());
            self.hud.show_details(self.game.selection());
            self.hud.set_paused(self.game.state().phase == GamePhase::Paused);
            self.paint();
        }

        fn paint(&self) {
            let now = self.game.now_ms();
            let world = self.game.world();
            for object in self.game.tracker().iter() {
                world.paint(object.body, &object.color(now).to_css(), object.opacity());
            }
            for power_up in self.game.powerups().power_ups() {
                world.paint(power_up.body, &power_up.kind.color().to_css(), 1.0);
            }
            // Blink while invincible
            let (fill, opacity) = match self.game.player_color() {
                Some(color) => (color.to_css(), 1.0),
                None => (String::from("#ffffff"), 0.3),
            };
            world.paint(self.game.player(), &fill, opacity);
            world.paint_particles(&self.particles);
        }

        /// Audio needs a user gesture before it may start
        fn unlock_audio(&mut self) {
            if !self.music.is_initialized() {
                self.sink.resume();
                self.music.initialize(&mut self.sink);
            }
        }

        fn restart(&mut self, seed: u64) {
            self.game.restart(seed);
            self.bridge.reset();
            self.hud.reset();
            self.particles.clear();
            self.accumulator = 0.0;
            let idle_mode = self.input.idle_mode;
            self.input = TickInput {
                idle_mode,
                ..TickInput::default()
            };
            log::info!("Game restarted with seed: {}", seed);
        }
    }

    fn chain_source(tuning: &Tuning, seed: u64) -> Box<dyn ChainSource> {
        match &tuning.rpc_url {
            Some(url) => Box::new(RpcChainSource::new(url, tuning.rpc_poll_interval_ms)),
            None => {
                log::info!("No rpc_url configured - using the simulated network");
                Box::new(ScriptedChainSource::simulated(seed, TrafficProfile::default()))
            }
        }
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Chainfall starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let canvas: HtmlElement = document
            .get_element_by_id("canvas")
            .expect("no canvas")
            .dyn_into()
            .expect("not an element");

        let tuning = Tuning::load();
        let seed = js_sys::Date::now() as u64;

        let world = MatterWorld::new(tuning.gravity_base);
        if !world.attach_canvas("canvas", tuning.viewport_width, tuning.viewport_height) {
            log::warn!("Renderer not attached - is matter.js loaded?");
        }

        let client_w = canvas.client_width().max(1) as f32;
        let client_h = canvas.client_height().max(1) as f32;
        let pointer_scale = Vec2::new(
            tuning.viewport_width / client_w,
            tuning.viewport_height / client_h,
        );

        let chain = chain_source(&tuning, seed);
        let game = Game::new(tuning, world, chain, seed);
        log::info!("Game initialized with seed: {}", seed);

        let app = Rc::new(RefCell::new(App {
            game,
            hud: DomHud::new(document.clone()),
            bridge: HudBridge::new(),
            music: MusicSystem::new(),
            sink: WebAudioSink::new(),
            particles: ParticleField::new(seed),
            accumulator: 0.0,
            last_time: 0.0,
            input: TickInput::default(),
            pointer_scale,
        }));

        setup_input_handlers(&canvas, app.clone());
        setup_restart_button(app.clone());
        setup_auto_pause(app.clone());

        if let Some(hud) = document.get_element_by_id("hud") {
            let _ = hud.set_attribute("class", "");
        }

        request_animation_frame(app);

        log::info!("Chainfall running!");
    }

    fn setup_input_handlers(canvas: &HtmlElement, app: Rc<RefCell<App>>) {
        // Click - select the object under the pointer
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let mut a = app.borrow_mut();
                a.unlock_audio();
                let css = Vec2::new(event.offset_x() as f32, event.offset_y() as f32);
                a.input.select = Some(css * a.pointer_scale);
            });
            let _ = canvas
                .add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        let window = web_sys::window().expect("no window");

        // Key down
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let mut a = app.borrow_mut();
                a.unlock_audio();
                match event.key().as_str() {
                    "ArrowLeft" | "a" | "A" => a.input.move_left = true,
                    "ArrowRight" | "d" | "D" => a.input.move_right = true,
                    "ArrowUp" | "w" | "W" => a.input.jump = true,
                    " " => {
                        event.prevent_default();
                        a.input.action = true;
                    }
                    "Escape" | "p" | "P" => a.input.pause = true,
                    "c" | "C" => a.input.confirm_latest = true, // Debug: confirm newest object
                    "m" | "M" => {
                        let muted = !a.sink.is_muted();
                        a.sink.set_muted(muted);
                    }
                    "i" | "I" => {
                        a.input.idle_mode = !a.input.idle_mode;
                        log::info!("Idle mode: {}", a.input.idle_mode);
                    }
                    _ => {}
                }
            });
            let _ = window
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Key up
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let mut a = app.borrow_mut();
                match event.key().as_str() {
                    "ArrowLeft" | "a" | "A" => a.input.move_left = false,
                    "ArrowRight" | "d" | "D" => a.input.move_right = false,
                    _ => {}
                }
            });
            let _ = window
                .add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(app: Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(app, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(app: Rc<RefCell<App>>, time: f64) {
        {
            let mut a = app.borrow_mut();

            let dt = if a.last_time > 0.0 {
                time - a.last_time
            } else {
                SIM_DT_MS
            };
            a.last_time = time;

            a.update(dt);
            a.present(dt);
        }

        request_animation_frame(app);
    }

    fn setup_restart_button(app: Rc<RefCell<App>>) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };

        if let Some(btn) = document.get_element_by_id("restart-btn") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                let seed = js_sys::Date::now() as u64;
                app.borrow_mut().restart(seed);
            });
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_auto_pause(app: Rc<RefCell<App>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Some(document) = window.document() else {
            return;
        };

        // Visibility change (tab switch, minimize)
        {
            let app = app.clone();
            let document_clone = document.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                if document_clone.visibility_state() == web_sys::VisibilityState::Hidden {
                    let mut a = app.borrow_mut();
                    if a.game.state().phase == GamePhase::Playing {
                        a.input.pause = true;
                        log::info!("Auto-paused (tab hidden)");
                    }
                }
            });
            let _ = document.add_event_listener_with_callback(
                "visibilitychange",
                closure.as_ref().unchecked_ref(),
            );
            closure.forget();
        }

        // Window blur (click outside)
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::FocusEvent| {
                let mut a = app.borrow_mut();
                if a.game.state().phase == GamePhase::Playing {
                    a.input.pause = true;
                    log::info!("Auto-paused (window blur)");
                }
            });
            let _ = window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use chainfall::Tuning;
    use chainfall::audio::{MusicSystem, SilentSink};
    use chainfall::chain::ScriptedChainSource;
    use chainfall::chain::scripted::TrafficProfile;
    use chainfall::consts::SIM_DT_MS;
    use chainfall::hud::{HudBridge, Presentation};
    use chainfall::particles::ParticleField;
    use chainfall::physics::KinematicWorld;
    use chainfall::sim::{Game, NetworkStatus, PowerUpKind, TickInput};

    /// Presentation that writes to the log
    #[derive(Default)]
    struct LogHud {
        lives_lost: u32,
        power_ups: u32,
    }

    impl Presentation for LogHud {
        fn on_score_changed(&mut self, score: u64) {
            log::trace!("score {score}");
        }

        fn on_lives_changed(&mut self, lives: u8) {
            self.lives_lost += 1;
            log::info!("Lives left: {lives}");
        }

        fn on_network_status(&mut self, status: &NetworkStatus) {
            log::info!(
                "Network: {:.1} gwei, {} pending, congestion {:.2}",
                status.gas_price,
                status.pending_tx_count,
                status.congestion_level
            );
        }

        fn on_game_over(&mut self, final_score: u64) {
            log::info!("Game over - final score {final_score}");
        }

        fn on_power_up_effect(&mut self, kind: PowerUpKind, duration_ms: u64) {
            self.power_ups += 1;
            log::info!("{} for {duration_ms} ms", kind.as_str());
        }

        fn on_black_hole_ready(&mut self) {
            log::info!("Black hole ready");
        }
    }

    pub fn run(seed: u64, minutes: u64) {
        let tuning = Tuning::default();
        let world = KinematicWorld::new(tuning.gravity_base);
        let chain = ScriptedChainSource::simulated(seed, TrafficProfile::default());
        let mut game = Game::new(tuning, world, chain, seed);

        let mut hud = LogHud::default();
        let mut bridge = HudBridge::new();
        let mut music = MusicSystem::new();
        let mut sink = SilentSink;
        let mut particles = ParticleField::new(seed);
        music.initialize(&mut sink);

        let input = TickInput {
            idle_mode: true,
            ..TickInput::default()
        };
        let ticks = (minutes as f64 * 60_000.0 / SIM_DT_MS) as u64;
        let mut spawned_peak = 0;
        let mut particle_peak = 0;
        for _ in 0..ticks {
            game.tick(&input);
            let events = game.drain_events();
            bridge.dispatch(&events, &mut hud);
            music.handle_events(&mut sink, &events);
            music.apply_mix(&mut sink, &game.audio_mix());
            particles.absorb(&events);
            particles.update((SIM_DT_MS / 1000.0) as f32);
            particle_peak = particle_peak.max(particles.len());
            spawned_peak = spawned_peak.max(game.tracker().len());
            if game.state().is_over() {
                break;
            }
        }
        game.cleanup();
        music.stop(&mut sink);

        let state = game.state();
        println!("\nChainfall headless run (seed {seed})");
        println!("  simulated time : {:.1} s", state.time_ms as f64 / 1000.0);
        println!("  score          : {}", state.score);
        println!("  lives          : {}", state.lives);
        println!("  hits taken     : {}", hud.lives_lost);
        println!("  power-ups      : {}", hud.power_ups);
        println!("  peak on screen : {spawned_peak}");
        println!("  peak particles : {particle_peak}");
        println!("  congestion     : {:.2}", game.estimator().congestion());
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Chainfall (native) starting...");
    log::info!("Native mode runs a headless idle-mode demo - run with `trunk serve` for the web version");

    let mut args = std::env::args().skip(1);
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(42);
    let minutes = args.next().and_then(|s| s.parse().ok()).unwrap_or(2);
    headless::run(seed, minutes);
}
