//! Commit-reveal primitives.
//!
//! A player binds to a move with `commit(move, salt)` and later proves it
//! with the same pair; `verify` recomputes the digest.

mod commitment;

pub use commitment::{commit, verify, Commitment, HexError, Salt};
