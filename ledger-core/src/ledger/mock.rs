//! In-memory token ledger for testing and local demos.

use super::traits::{Ledger, LedgerError, Transfer, TransferKind};
use crate::types::{Amount, Identity, TransferId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
struct MockLedgerState {
    balances: HashMap<Identity, Amount>,
    /// Allowance granted to the escrow pot (approve-and-spend)
    allowances: HashMap<Identity, Amount>,
    /// Accounts that skip the allowance check
    unlimited: HashSet<Identity>,
    /// Accounts whose incoming credits are rejected
    frozen: HashSet<Identity>,
    pot: Amount,
    journal: Vec<Transfer>,
}

/// In-memory mock ledger.
///
/// Mirrors an ERC-20 style token: accounts are minted a balance, approve the
/// escrow pot for some allowance, and debits spend both.
#[derive(Clone, Default)]
pub struct MockLedger {
    state: Arc<Mutex<MockLedgerState>>,
}

impl MockLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` new tokens to `to`
    pub fn mint(&self, to: &Identity, amount: Amount) {
        let mut state = self.state.lock();
        let balance = state.balances.entry(to.clone()).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Set the allowance `owner` grants to the escrow pot
    pub fn approve(&self, owner: &Identity, amount: Amount) {
        self.state.lock().allowances.insert(owner.clone(), amount);
    }

    /// Let the escrow pot spend from `owner` without an allowance
    pub fn approve_unlimited(&self, owner: &Identity) {
        self.state.lock().unlimited.insert(owner.clone());
    }

    /// Reject (or stop rejecting) credits to `who`
    pub fn set_frozen(&self, who: &Identity, frozen: bool) {
        let mut state = self.state.lock();
        if frozen {
            state.frozen.insert(who.clone());
        } else {
            state.frozen.remove(who);
        }
    }

    /// Current balance (0 for unknown accounts)
    pub fn balance(&self, who: &Identity) -> Amount {
        self.state.lock().balances.get(who).copied().unwrap_or(0)
    }

    /// Remaining allowance granted to the pot
    pub fn allowance(&self, who: &Identity) -> Amount {
        self.state.lock().allowances.get(who).copied().unwrap_or(0)
    }

    /// Funds currently held in escrow
    pub fn pot(&self) -> Amount {
        self.state.lock().pot
    }

    /// Sum of every account balance plus the pot
    pub fn total_supply(&self) -> Amount {
        let state = self.state.lock();
        state.balances.values().sum::<Amount>() + state.pot
    }

    /// Every transfer executed so far, oldest first
    pub fn journal(&self) -> Vec<Transfer> {
        self.state.lock().journal.clone()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn debit(&self, from: &Identity, amount: Amount) -> Result<TransferId, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let mut state = self.state.lock();

        let available = state.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                identity: from.clone(),
                need: amount,
                available,
            });
        }

        let unlimited = state.unlimited.contains(from);
        let approved = state.allowances.get(from).copied().unwrap_or(0);
        if !unlimited && approved < amount {
            return Err(LedgerError::InsufficientAllowance {
                identity: from.clone(),
                need: amount,
                approved,
            });
        }

        // All checks passed, apply atomically
        if !unlimited {
            state.allowances.insert(from.clone(), approved - amount);
        }
        state.balances.insert(from.clone(), available - amount);
        state.pot += amount;

        let id = TransferId::new();
        state.journal.push(Transfer {
            id,
            kind: TransferKind::Debit,
            identity: from.clone(),
            amount,
        });
        Ok(id)
    }

    async fn credit(&self, to: &Identity, amount: Amount) -> Result<TransferId, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let mut state = self.state.lock();

        if state.frozen.contains(to) {
            return Err(LedgerError::Rejected(format!("account {} is frozen", to)));
        }
        if state.pot < amount {
            return Err(LedgerError::PotUnderflow {
                need: amount,
                available: state.pot,
            });
        }

        state.pot -= amount;
        let balance = state.balances.entry(to.clone()).or_default();
        *balance = balance.saturating_add(amount);

        let id = TransferId::new();
        state.journal.push(Transfer {
            id,
            kind: TransferKind::Credit,
            identity: to.clone(),
            amount,
        });
        Ok(id)
    }

    async fn balance_of(&self, who: &Identity) -> Result<Amount, LedgerError> {
        Ok(self.balance(who))
    }
}
