//! RPS Game Core Library
//!
//! This crate provides the escrowed rock-paper-scissors engine: move
//! commitments, the game state machine, settlement arithmetic and the
//! randomness sources that back the automated opponent.

pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod games;
pub mod protocol;
pub mod randomness;

pub use config::{ConfigError, EngineConfig};
pub use crypto::{commit, verify, Commitment, Salt};
pub use engine::{Credit, GameEngine, GameRecord, GameState, RevealOutcome, TimeoutResolution};
pub use error::{GameError, Result};
pub use games::{resolve, settle, Move, Outcome, Payouts, Settlement};
pub use protocol::{GameEvent, GameId, GamePhase, OpponentMode, Side};
pub use randomness::{
    Delivery, ExternalRandomness, LocalRandomness, MockRandomness, RandomValue, RandomnessError,
    RandomnessRequest, RandomnessSource, RequestId, Scripted,
};
