//! Randomness source trait definition.

use crate::games::Move;
use crate::protocol::GameId;
use async_trait::async_trait;
use ledger_core::Identity;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Errors from randomness sources
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RandomnessError {
    #[error("Randomness unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Identifier of a pending randomness request
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One 256-bit random word
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RandomValue([u8; 32]);

impl RandomValue {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// A value that maps to `mv`, for forcing the automated move in tests
    pub fn for_move(mv: Move) -> Self {
        let index = Move::ALL.iter().position(|m| *m == mv).unwrap_or(0) as u8;
        let mut bytes = [0u8; 32];
        bytes[15] = index;
        Self(bytes)
    }

    /// Automated move: first 16 bytes as big-endian u128, modulo 3
    pub fn to_move(&self) -> Move {
        let mut high = [0u8; 16];
        high.copy_from_slice(&self.0[..16]);
        Move::from_index(u128::from_be_bytes(high))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for RandomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RandomValue({})", hex::encode(&self.0[..8]))
    }
}

impl Serialize for RandomValue {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.to_hex().serialize(s)
    }
}

impl<'de> Deserialize<'de> for RandomValue {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let hex_str = String::deserialize(d)?;
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(&hex_str);
        let bytes = hex::decode(hex_str).map_err(serde::de::Error::custom)?;
        if bytes.len() != 32 {
            return Err(serde::de::Error::custom("expected 32 bytes"));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

/// What the engine asks for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub game_id: GameId,
    pub initiator: Identity,
}

/// How a request was answered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Value available now, the engine settles within the reveal call
    Ready(RandomValue),
    /// Value arrives later through `GameEngine::fulfill_randomness`
    Pending(RequestId),
}

/// Source of the automated opponent's randomness.
///
/// Implementations can be:
/// - LocalRandomness, answering immediately from the thread RNG
/// - ExternalRandomness, for a VRF-style service that calls back later
/// - MockRandomness for testing
#[async_trait]
pub trait RandomnessSource: Send + Sync {
    async fn request(&self, request: RandomnessRequest) -> Result<Delivery, RandomnessError>;
}
