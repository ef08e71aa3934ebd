//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must stay deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (spawn order, body handle order)
//! - No rendering or platform dependencies; physics and chain access go
//!   through the [`PhysicsWorld`](crate::physics::PhysicsWorld) and
//!   [`ChainSource`](crate::chain::ChainSource) traits

pub mod blackhole;
pub mod buffer;
pub mod collision;
pub mod congestion;
pub mod game;
pub mod mapper;
pub mod object;
pub mod powerup;
pub mod state;
pub mod tick;
pub mod tracker;

pub use buffer::TxBuffer;
pub use congestion::{CongestionEstimator, DifficultyController, NetworkStatus, congestion};
pub use game::Game;
pub use mapper::{Category, Hsl, ObjectDescriptor, ShapeKind, map_transaction};
pub use object::{FallingObject, LifecycleState, TransactionDetails};
pub use powerup::{PowerUpKind, PowerUpScheduler};
pub use state::{GameEvent, GamePhase, GameState};
pub use tick::TickInput;
pub use tracker::LifecycleTracker;
