//! Browser glue (wasm32 only)
//!
//! Adapters that plug browser APIs into the sim's capability traits:
//! - `physics`: matter.js bridge implementing [`PhysicsWorld`](crate::physics::PhysicsWorld)
//! - `audio`: Web Audio oscillators implementing [`AudioSink`](crate::audio::AudioSink)
//! - `hud`: DOM widgets implementing [`Presentation`](crate::hud::Presentation)
//! - `rpc`: fetch-based JSON-RPC transport implementing [`ChainSource`](crate::chain::ChainSource)

pub mod audio;
pub mod hud;
pub mod physics;
pub mod rpc;

pub use audio::WebAudioSink;
pub use hud::DomHud;
pub use physics::MatterWorld;
pub use rpc::RpcChainSource;
