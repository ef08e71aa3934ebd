//! Web Audio sink
//!
//! Procedurally generated music layers and sound effects - no external files
//! needed. Each music layer is a detuned oscillator drone behind its own gain
//! node; one-shots are short enveloped oscillators.

use web_sys::{AudioContext, GainNode, OscillatorNode, OscillatorType};

use crate::audio::{AudioSink, SoundEffect, TrackId};

/// A running music layer
struct Layer {
    osc: OscillatorNode,
    gain: GainNode,
    base_freq: f32,
}

/// Audio backend for the browser
pub struct WebAudioSink {
    ctx: Option<AudioContext>,
    layers: [Option<Layer>; 4],
    /// Last requested mix volume per layer
    volumes: [f32; 4],
    master_volume: f32,
    muted: bool,
}

impl Default for WebAudioSink {
    fn default() -> Self {
        Self::new()
    }
}

impl WebAudioSink {
    pub fn new() -> Self {
        // May fail outside a secure context
        let ctx = AudioContext::new().ok();
        if ctx.is_none() {
            log::warn!("Failed to create AudioContext - audio disabled");
        }
        Self {
            ctx,
            layers: [None, None, None, None],
            volumes: [0.0; 4],
            master_volume: 0.8,
            muted: false,
        }
    }

    /// Resume audio context (required after user gesture)
    pub fn resume(&self) {
        if let Some(ctx) = &self.ctx {
            let _ = ctx.resume();
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        for track in TrackId::ALL {
            if let Some(layer) = &self.layers[track.index()] {
                layer.gain.gain().set_value(self.layer_gain(self.volumes[track.index()]));
            }
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.master_volume }
    }

    /// Drones sit well under the one-shots
    fn layer_gain(&self, volume: f32) -> f32 {
        volume * self.effective_volume() * 0.2
    }

    fn create_osc(
        ctx: &AudioContext,
        freq: f32,
        osc_type: OscillatorType,
    ) -> Option<(OscillatorNode, GainNode)> {
        let osc = ctx.create_oscillator().ok()?;
        let gain = ctx.create_gain().ok()?;

        osc.set_type(osc_type);
        osc.frequency().set_value(freq);
        osc.connect_with_audio_node(&gain).ok()?;
        gain.connect_with_audio_node(&ctx.destination()).ok()?;

        Some((osc, gain))
    }

    /// Single enveloped tone, optionally sliding to `end_freq`
    fn blip(
        ctx: &AudioContext,
        vol: f32,
        osc_type: OscillatorType,
        start_freq: f32,
        end_freq: f32,
        duration: f64,
    ) {
        let Some((osc, gain)) = Self::create_osc(ctx, start_freq, osc_type) else {
            return;
        };
        let t = ctx.current_time();

        gain.gain().set_value_at_time(vol, t).ok();
        gain.gain()
            .exponential_ramp_to_value_at_time(0.01, t + duration)
            .ok();
        if (end_freq - start_freq).abs() > f32::EPSILON {
            osc.frequency().set_value_at_time(start_freq, t).ok();
            osc.frequency()
                .exponential_ramp_to_value_at_time(end_freq, t + duration)
                .ok();
        }

        osc.start().ok();
        osc.stop_with_when(t + duration + 0.05).ok();
    }

    /// Rising arpeggio
    fn arpeggio(ctx: &AudioContext, vol: f32, notes: &[f32], spacing: f64) {
        let t = ctx.current_time();
        for (i, &freq) in notes.iter().enumerate() {
            let Some((osc, gain)) = Self::create_osc(ctx, freq, OscillatorType::Sine) else {
                continue;
            };
            let start = t + i as f64 * spacing;
            gain.gain().set_value_at_time(0.0, t).ok();
            gain.gain().set_value_at_time(vol, start).ok();
            gain.gain()
                .exponential_ramp_to_value_at_time(0.01, start + spacing * 2.0)
                .ok();
            osc.start_with_when(start).ok();
            osc.stop_with_when(start + spacing * 2.5).ok();
        }
    }
}

/// Drone pitch and timbre per layer
fn layer_voice(track: TrackId) -> (f32, OscillatorType) {
    match track {
        TrackId::Base => (110.0, OscillatorType::Triangle),
        TrackId::Tension => (146.83, OscillatorType::Sawtooth),
        TrackId::Ambient => (55.0, OscillatorType::Sine),
        TrackId::Action => (220.0, OscillatorType::Square),
    }
}

impl AudioSink for WebAudioSink {
    fn play_loop(&mut self, track: TrackId, volume: f32) {
        let Some(ctx) = &self.ctx else { return };
        if self.layers[track.index()].is_some() {
            return;
        }
        let (freq, osc_type) = layer_voice(track);
        let Some((osc, gain)) = Self::create_osc(ctx, freq, osc_type) else {
            return;
        };
        gain.gain().set_value(self.layer_gain(volume));
        osc.start().ok();
        self.volumes[track.index()] = volume;
        self.layers[track.index()] = Some(Layer {
            osc,
            gain,
            base_freq: freq,
        });
    }

    fn set_volume(&mut self, track: TrackId, volume: f32) {
        self.volumes[track.index()] = volume;
        let vol = self.layer_gain(volume);
        let (Some(ctx), Some(layer)) = (&self.ctx, &self.layers[track.index()]) else {
            return;
        };
        layer
            .gain
            .gain()
            .linear_ramp_to_value_at_time(vol, ctx.current_time() + 0.1)
            .ok();
    }

    fn set_playback_rate(&mut self, track: TrackId, rate: f32) {
        if let Some(layer) = &self.layers[track.index()] {
            layer.osc.frequency().set_value(layer.base_freq * rate);
        }
    }

    fn play_one_shot(&mut self, sound: SoundEffect) {
        let vol = self.effective_volume();
        if vol <= 0.0 {
            return;
        }
        let Some(ctx) = &self.ctx else { return };

        if ctx.state() == web_sys::AudioContextState::Suspended {
            let _ = ctx.resume();
        }

        match sound {
            SoundEffect::Collision => {
                Self::blip(ctx, vol * 0.6, OscillatorType::Sawtooth, 120.0, 40.0, 0.3);
            }
            SoundEffect::Bump => {
                Self::blip(ctx, vol * 0.3, OscillatorType::Triangle, 300.0, 300.0, 0.06);
            }
            SoundEffect::PowerUp => {
                Self::arpeggio(ctx, vol * 0.3, &[523.0, 659.0, 784.0, 1047.0], 0.05);
            }
            SoundEffect::Confirm => {
                Self::blip(ctx, vol * 0.25, OscillatorType::Sine, 880.0, 1320.0, 0.12);
            }
            SoundEffect::Revert => {
                Self::blip(ctx, vol * 0.35, OscillatorType::Square, 400.0, 100.0, 0.25);
            }
            SoundEffect::Jump => {
                Self::blip(ctx, vol * 0.2, OscillatorType::Sine, 300.0, 600.0, 0.1);
            }
            SoundEffect::BlackHole => {
                Self::blip(ctx, vol * 0.5, OscillatorType::Sine, 400.0, 30.0, 0.8);
                Self::blip(ctx, vol * 0.2, OscillatorType::Sawtooth, 60.0, 20.0, 0.8);
            }
            SoundEffect::GameOver => {
                Self::arpeggio(ctx, vol * 0.35, &[392.0, 330.0, 262.0, 196.0], 0.2);
            }
        }
    }

    fn stop_all(&mut self) {
        for slot in &mut self.layers {
            if let Some(layer) = slot.take() {
                layer.osc.stop().ok();
            }
        }
    }
}
