//! Music mix and sound effects
//!
//! The sim never touches an audio backend. It emits [`GameEvent::Sound`]
//! events and exposes an [`AudioMix`]; [`MusicSystem`] forwards both to an
//! [`AudioSink`] (Web Audio in the browser, nothing natively).

use crate::sim::state::GameEvent;

/// Looping music layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackId {
    /// Calm groove, quieter as the network gets busy
    Base,
    /// Rises with congestion
    Tension,
    /// Background pad, quieter as the network gets busy
    Ambient,
    /// Rises with congestion
    Action,
}

impl TrackId {
    pub const ALL: [TrackId; 4] = [
        TrackId::Base,
        TrackId::Tension,
        TrackId::Ambient,
        TrackId::Action,
    ];

    pub fn index(self) -> usize {
        match self {
            TrackId::Base => 0,
            TrackId::Tension => 1,
            TrackId::Ambient => 2,
            TrackId::Action => 3,
        }
    }

    /// Volume range and starting volume
    pub fn bounds(self) -> VolumeBounds {
        match self {
            TrackId::Base => VolumeBounds::new(0.2, 0.5, 0.8),
            TrackId::Tension => VolumeBounds::new(0.0, 0.0, 0.7),
            TrackId::Ambient => VolumeBounds::new(0.1, 0.3, 0.5),
            TrackId::Action => VolumeBounds::new(0.0, 0.0, 0.6),
        }
    }

    /// Louder when congested (otherwise quieter)
    pub fn rises_with_congestion(self) -> bool {
        matches!(self, TrackId::Tension | TrackId::Action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeBounds {
    pub min: f32,
    pub initial: f32,
    pub max: f32,
}

impl VolumeBounds {
    const fn new(min: f32, initial: f32, max: f32) -> Self {
        Self { min, initial, max }
    }
}

/// One-shot sound effects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// Object struck the player from above
    Collision,
    /// Glancing contact, no damage
    Bump,
    /// Power-up collected
    PowerUp,
    /// Transaction reached the confirmation threshold
    Confirm,
    /// Transaction reverted
    Revert,
    Jump,
    /// Black hole swallowed nearby objects
    BlackHole,
    GameOver,
}

/// Target state of the music layers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioMix {
    /// Indexed by [`TrackId::index`]
    pub volumes: [f32; 4],
    pub playback_rate: f32,
}

impl AudioMix {
    pub fn volume(&self, track: TrackId) -> f32 {
        self.volumes[track.index()]
    }
}

impl Default for AudioMix {
    fn default() -> Self {
        Self {
            volumes: TrackId::ALL.map(|t| t.bounds().initial),
            playback_rate: 1.0,
        }
    }
}

/// Audio playback capability
pub trait AudioSink {
    fn play_loop(&mut self, track: TrackId, volume: f32);
    fn set_volume(&mut self, track: TrackId, volume: f32);
    fn set_playback_rate(&mut self, track: TrackId, rate: f32);
    fn play_one_shot(&mut self, sound: SoundEffect);
    fn stop_all(&mut self);
}

/// Sink that drops everything (native runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

impl AudioSink for SilentSink {
    fn play_loop(&mut self, _track: TrackId, _volume: f32) {}
    fn set_volume(&mut self, _track: TrackId, _volume: f32) {}
    fn set_playback_rate(&mut self, _track: TrackId, _rate: f32) {}
    fn play_one_shot(&mut self, _sound: SoundEffect) {}
    fn stop_all(&mut self) {}
}

/// Smallest change worth sending to the sink
const MIX_EPSILON: f32 = 1e-3;

/// Drives the loops from the difficulty mix and plays event sounds
#[derive(Debug, Default)]
pub struct MusicSystem {
    initialized: bool,
    applied: AudioMix,
}

impl MusicSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Start every loop at its initial volume. Idempotent.
    pub fn initialize<A: AudioSink>(&mut self, sink: &mut A) {
        if self.initialized {
            return;
        }
        self.applied = AudioMix::default();
        for track in TrackId::ALL {
            sink.play_loop(track, track.bounds().initial);
        }
        self.initialized = true;
        log::info!("Music started");
    }

    /// Push the mix to the sink, skipping values that did not move
    pub fn apply_mix<A: AudioSink>(&mut self, sink: &mut A, mix: &AudioMix) {
        if !self.initialized {
            return;
        }
        for track in TrackId::ALL {
            let i = track.index();
            if (mix.volumes[i] - self.applied.volumes[i]).abs() > MIX_EPSILON {
                sink.set_volume(track, mix.volumes[i]);
                self.applied.volumes[i] = mix.volumes[i];
            }
        }
        if (mix.playback_rate - self.applied.playback_rate).abs() > MIX_EPSILON {
            // Only the melodic layers follow the tempo
            sink.set_playback_rate(TrackId::Base, mix.playback_rate);
            sink.set_playback_rate(TrackId::Tension, mix.playback_rate);
            self.applied.playback_rate = mix.playback_rate;
        }
    }

    /// Play the one-shots carried by `events`
    pub fn handle_events<A: AudioSink>(&mut self, sink: &mut A, events: &[GameEvent]) {
        for event in events {
            if let GameEvent::Sound(sound) = event {
                sink.play_one_shot(*sound);
            }
        }
    }

    pub fn stop<A: AudioSink>(&mut self, sink: &mut A) {
        if self.initialized {
            sink.stop_all();
            self.initialized = false;
        }
    }
}
