//! Move rules and settlement.

mod rps;
pub mod settlement;

pub use rps::{resolve, Move, Outcome};
pub use settlement::{payouts, settle, Payouts, Settlement};
