use crate::randomness::{RandomnessError, RequestId};
use chrono::{DateTime, Utc};
use ledger_core::{Amount, Identity, LedgerError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameError>;

/// Rejections of engine operations.
///
/// Every variant is returned before any state change: the record, its
/// commitments and the escrowed funds are exactly as they were.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Invalid wager {wager}: must be between {min} and {max}")]
    InvalidWager {
        wager: Amount,
        min: Amount,
        max: Amount,
    },

    #[error("{0} already has an open game")]
    DuplicateGame(Identity),

    #[error("Escrow failure: {0}")]
    EscrowFailure(#[from] LedgerError),

    #[error("Cannot {operation} while game is {state}")]
    IllegalState {
        operation: &'static str,
        state: String,
    },

    #[error("Commitment must not be empty")]
    EmptyCommitment,

    #[error("Wager mismatch: game requires {expected}, offered {offered}")]
    WagerMismatch { expected: Amount, offered: Amount },

    #[error("Revealed move and salt do not match the commitment")]
    CommitmentMismatch,

    #[error("Randomness failure: {0}")]
    RandomnessFailure(#[from] RandomnessError),

    #[error("Cannot join your own game")]
    SelfJoin,

    #[error("{0} is not entitled to do this in this game")]
    NotParticipant(Identity),

    #[error("Deadline not reached, try again after {0}")]
    DeadlineNotReached(DateTime<Utc>),

    #[error("Unknown randomness request: {0}")]
    UnknownRequest(RequestId),

    #[error("Payout failed: {0}")]
    PayoutFailed(LedgerError),

    #[error("Cannot advance the clock by {0} seconds")]
    InvalidTimeStep(i64),
}

impl GameError {
    /// Short machine-readable kind, stable across message changes
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::InvalidWager { .. } => "invalid_wager",
            GameError::DuplicateGame(_) => "duplicate_game",
            GameError::EscrowFailure(_) => "escrow_failure",
            GameError::IllegalState { .. } => "illegal_state",
            GameError::EmptyCommitment => "empty_commitment",
            GameError::WagerMismatch { .. } => "wager_mismatch",
            GameError::CommitmentMismatch => "commitment_mismatch",
            GameError::RandomnessFailure(_) => "randomness_failure",
            GameError::SelfJoin => "self_join",
            GameError::NotParticipant(_) => "not_participant",
            GameError::DeadlineNotReached(_) => "deadline_not_reached",
            GameError::UnknownRequest(_) => "unknown_request",
            GameError::PayoutFailed(_) => "payout_failed",
            GameError::InvalidTimeStep(_) => "invalid_time_step",
        }
    }
}
