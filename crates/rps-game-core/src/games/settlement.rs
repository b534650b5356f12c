//! Payout calculation.

use super::rps::{resolve, Move, Outcome};
use ledger_core::Amount;
use serde::{Deserialize, Serialize};

/// Basis-point denominator for the tie fee
pub const MAX_BPS: u16 = 10_000;

/// How the escrowed pot is split once a game is decided
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payouts {
    pub initiator: Amount,
    pub opponent: Amount,
    /// Withheld from tie refunds, paid to the house
    pub fee: Amount,
}

impl Payouts {
    pub fn total(&self) -> Amount {
        self.initiator
            .saturating_add(self.opponent)
            .saturating_add(self.fee)
    }
}

/// Everything decided at settlement time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub move_initiator: Move,
    pub move_opponent: Move,
    pub outcome: Outcome,
    pub payouts: Payouts,
}

fn fee_on(wager: Amount, tie_fee_bps: u16) -> Amount {
    let bps = tie_fee_bps.min(MAX_BPS) as u128;
    (wager as u128 * bps / MAX_BPS as u128) as Amount
}

/// Split the pot for an outcome.
///
/// The winner takes `wager_a + wager_b`. On a tie each side gets its own
/// wager back, less `tie_fee_bps` of it, which goes to the house.
/// Sums saturate at `Amount::MAX`: both wagers sit in one ledger balance, so
/// an escrowed pot never reaches the cap.
pub fn payouts(outcome: Outcome, wager_a: Amount, wager_b: Amount, tie_fee_bps: u16) -> Payouts {
    let pot = wager_a.saturating_add(wager_b);
    match outcome {
        Outcome::AWins => Payouts {
            initiator: pot,
            opponent: 0,
            fee: 0,
        },
        Outcome::BWins => Payouts {
            initiator: 0,
            opponent: pot,
            fee: 0,
        },
        Outcome::Tie => {
            let fee_a = fee_on(wager_a, tie_fee_bps);
            let fee_b = fee_on(wager_b, tie_fee_bps);
            Payouts {
                initiator: wager_a - fee_a,
                opponent: wager_b - fee_b,
                fee: fee_a.saturating_add(fee_b),
            }
        }
    }
}

/// Judge two revealed moves and split the pot
pub fn settle(
    move_a: Move,
    move_b: Move,
    wager_a: Amount,
    wager_b: Amount,
    tie_fee_bps: u16,
) -> Settlement {
    let outcome = resolve(move_a, move_b);
    Settlement {
        move_initiator: move_a,
        move_opponent: move_b,
        outcome,
        payouts: payouts(outcome, wager_a, wager_b, tie_fee_bps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winner_takes_pot() {
        let p = payouts(Outcome::AWins, 100, 100, 0);
        assert_eq!((p.initiator, p.opponent, p.fee), (200, 0, 0));

        let p = payouts(Outcome::BWins, 100, 100, 0);
        assert_eq!((p.initiator, p.opponent, p.fee), (0, 200, 0));
    }

    #[test]
    fn test_tie_refunds_each_wager() {
        let p = payouts(Outcome::Tie, 100, 100, 0);
        assert_eq!((p.initiator, p.opponent, p.fee), (100, 100, 0));
    }

    #[test]
    fn test_tie_fee_goes_to_house() {
        // 2.5% of each refund
        let p = payouts(Outcome::Tie, 1_000, 1_000, 250);
        assert_eq!((p.initiator, p.opponent, p.fee), (975, 975, 50));
    }

    #[test]
    fn test_tie_fee_does_not_touch_wins() {
        let p = payouts(Outcome::AWins, 1_000, 1_000, 250);
        assert_eq!((p.initiator, p.fee), (2_000, 0));
    }

    #[test]
    fn test_fee_is_capped_at_full_refund() {
        let p = payouts(Outcome::Tie, 10, 10, u16::MAX);
        assert_eq!((p.initiator, p.opponent, p.fee), (0, 0, 20));
    }

    #[test]
    fn test_payouts_conserve_pot() {
        let wagers = [1, 7, 333, 1_000_000, u64::MAX / 2];
        for outcome in [Outcome::AWins, Outcome::BWins, Outcome::Tie] {
            for wager in wagers {
                for bps in [0, 1, 333, 10_000] {
                    let p = payouts(outcome, wager, wager, bps);
                    assert_eq!(p.total(), wager * 2, "{:?} {} {}", outcome, wager, bps);
                }
            }
        }
    }

    #[test]
    fn test_oversized_wagers_settle_without_panicking() {
        let big = Amount::MAX / 2 + 1;
        let s = settle(Move::Rock, Move::Scissors, big, big, 0);
        assert_eq!(s.outcome, Outcome::AWins);
        assert_eq!(s.payouts.initiator, Amount::MAX);

        let tie = settle(Move::Paper, Move::Paper, Amount::MAX, Amount::MAX, 10_000);
        assert_eq!(tie.payouts.fee, Amount::MAX);
        assert_eq!(tie.payouts.total(), Amount::MAX);
    }

    #[test]
    fn test_settle_all_combinations() {
        for a in Move::ALL {
            for b in Move::ALL {
                let s = settle(a, b, 50, 50, 0);
                assert_eq!(s.outcome, resolve(a, b));
                assert_eq!(s.payouts.total(), 100);
                match s.outcome {
                    Outcome::AWins => assert_eq!(s.payouts.initiator, 100),
                    Outcome::BWins => assert_eq!(s.payouts.opponent, 100),
                    Outcome::Tie => assert_eq!((s.payouts.initiator, s.payouts.opponent), (50, 50)),
                }
            }
        }
    }
}
