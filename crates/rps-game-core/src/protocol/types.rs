//! Protocol types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique game identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(Uuid);

impl GameId {
    /// Create a new random game ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for GameId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Debug for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameId({})", self.0)
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side of a game a party is on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Initiator,
    Opponent,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Initiator => write!(f, "initiator"),
            Side::Opponent => write!(f, "opponent"),
        }
    }
}

/// Who the initiator plays against
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpponentMode {
    /// The house, whose move comes from the randomness source
    Automated,
    PlayerVsPlayer,
}

impl OpponentMode {
    pub fn from_flag(vs_automated: bool) -> Self {
        if vs_automated {
            OpponentMode::Automated
        } else {
            OpponentMode::PlayerVsPlayer
        }
    }
}

/// Externally reported game phase.
///
/// Keeps the historical numbering clients index on. `PartiallyRevealed` is
/// final for automated games and intermediate for PvP games, so finality
/// must come from `GameRecord::is_terminal`, never from this value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GamePhase {
    Created = 0,
    Committed = 1,
    Joined = 2,
    PartiallyRevealed = 3,
    Resolved = 4,
    Aborted = 5,
}

impl GamePhase {
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }
}
