//! Ledger Core Library
//!
//! Shared primitives for applications that escrow tokens:
//! - Account identities and amounts
//! - Ledger trait, MockLedger and RpcLedger

pub mod ledger;
pub mod types;

pub use ledger::{Ledger, LedgerError, MockLedger, RpcLedger, Transfer, TransferKind};
pub use types::{Amount, Identity, TransferId};
