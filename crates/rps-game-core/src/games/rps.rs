//! Rock-Paper-Scissors moves and judging.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rock-Paper-Scissors move
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    /// Byte committed to (Rock=1, Paper=2, Scissors=3)
    pub fn to_byte(self) -> u8 {
        match self {
            Move::Rock => 1,
            Move::Paper => 2,
            Move::Scissors => 3,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Move> {
        match byte {
            1 => Some(Move::Rock),
            2 => Some(Move::Paper),
            3 => Some(Move::Scissors),
            _ => None,
        }
    }

    /// Move for a residue modulo 3 (0=Rock, 1=Paper, 2=Scissors)
    pub fn from_index(index: u128) -> Move {
        Move::ALL[(index % 3) as usize]
    }

    /// Check if this move beats the other
    pub fn beats(self, other: Move) -> bool {
        matches!(
            (self, other),
            (Move::Rock, Move::Scissors) | (Move::Scissors, Move::Paper) | (Move::Paper, Move::Rock)
        )
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Rock => write!(f, "Rock"),
            Move::Paper => write!(f, "Paper"),
            Move::Scissors => write!(f, "Scissors"),
        }
    }
}

/// Result of one game, from the initiator's (A's) point of view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    AWins,
    BWins,
    Tie,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::AWins => "A wins",
            Outcome::BWins => "B wins",
            Outcome::Tie => "Tie",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Judge two moves
pub fn resolve(move_a: Move, move_b: Move) -> Outcome {
    if move_a == move_b {
        Outcome::Tie
    } else if move_a.beats(move_b) {
        Outcome::AWins
    } else {
        Outcome::BWins
    }
}
