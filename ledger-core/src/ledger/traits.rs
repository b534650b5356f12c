//! Ledger trait definition.

use crate::types::{Amount, Identity, TransferId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from ledger operations
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient balance for {identity}: need {need}, have {available}")]
    InsufficientBalance {
        identity: Identity,
        need: Amount,
        available: Amount,
    },

    #[error("Insufficient allowance for {identity}: need {need}, approved {approved}")]
    InsufficientAllowance {
        identity: Identity,
        need: Amount,
        approved: Amount,
    },

    #[error("Escrow pot holds {available}, cannot pay out {need}")]
    PotUnderflow { need: Amount, available: Amount },

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Ledger rejected the transfer: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Direction of a transfer between an account and the escrow pot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// Account -> pot
    Debit,
    /// Pot -> account
    Credit,
}

/// A completed transfer, as recorded by ledgers that keep a journal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub kind: TransferKind,
    pub identity: Identity,
    pub amount: Amount,
}

/// Token ledger operations needed by the wagering engine.
///
/// The engine never holds balances itself. Every escrow-in is a `debit` that
/// moves funds from an account into the escrow pot, every payout is a
/// `credit` from the pot back to an account. Both must be atomic: either the
/// whole amount moves or nothing does.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Move `amount` from `from` into the escrow pot (spends allowance)
    async fn debit(&self, from: &Identity, amount: Amount) -> Result<TransferId, LedgerError>;

    /// Move `amount` from the escrow pot to `to`
    async fn credit(&self, to: &Identity, amount: Amount) -> Result<TransferId, LedgerError>;

    /// Current spendable balance of an account
    async fn balance_of(&self, who: &Identity) -> Result<Amount, LedgerError>;
}
