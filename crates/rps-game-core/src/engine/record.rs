//! Game records and their states.

use crate::crypto::Commitment;
use crate::games::{Move, Outcome, Payouts};
use crate::protocol::{GameId, GamePhase, OpponentMode, Side};
use crate::randomness::RequestId;
use chrono::{DateTime, Utc};
use ledger_core::{Amount, Identity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal game state.
///
/// `ResolvedVsAutomated` and `AwaitingSecondReveal` both report the
/// `PartiallyRevealed` phase; only the first is final.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GameState {
    Created,
    Committed,
    Joined,
    AwaitingRandomness { request_id: RequestId },
    AwaitingSecondReveal,
    ResolvedVsAutomated,
    Resolved,
    Forfeited { winner: Side },
    Aborted { reason: String },
}

impl GameState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GameState::ResolvedVsAutomated
                | GameState::Resolved
                | GameState::Forfeited { .. }
                | GameState::Aborted { .. }
        )
    }

    pub fn phase(&self) -> GamePhase {
        match self {
            GameState::Created => GamePhase::Created,
            GameState::Committed => GamePhase::Committed,
            GameState::Joined => GamePhase::Joined,
            GameState::AwaitingRandomness { .. }
            | GameState::AwaitingSecondReveal
            | GameState::ResolvedVsAutomated => GamePhase::PartiallyRevealed,
            GameState::Resolved | GameState::Forfeited { .. } => GamePhase::Resolved,
            GameState::Aborted { .. } => GamePhase::Aborted,
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameState::Created => write!(f, "created"),
            GameState::Committed => write!(f, "committed"),
            GameState::Joined => write!(f, "joined"),
            GameState::AwaitingRandomness { .. } => write!(f, "awaiting randomness"),
            GameState::AwaitingSecondReveal => write!(f, "awaiting second reveal"),
            GameState::ResolvedVsAutomated => write!(f, "resolved against the house"),
            GameState::Resolved => write!(f, "resolved"),
            GameState::Forfeited { winner } => write!(f, "forfeited to {}", winner),
            GameState::Aborted { .. } => write!(f, "aborted"),
        }
    }
}

/// A payout still owed after a failed ledger credit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub recipient: Identity,
    pub amount: Amount,
}

/// One game, keyed by its initiator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: GameId,
    pub initiator: Identity,
    pub mode: OpponentMode,
    pub wager_initiator: Amount,
    /// Zero until the opponent side is escrowed
    pub wager_opponent: Amount,
    /// The house for automated games, the joining player for PvP
    pub opponent: Option<Identity>,
    pub commitment_initiator: Option<Commitment>,
    pub commitment_opponent: Option<Commitment>,
    pub revealed_initiator: Option<Move>,
    pub revealed_opponent: Option<Move>,
    pub state: GameState,
    pub outcome: Option<Outcome>,
    pub payouts: Option<Payouts>,
    /// Credits the ledger refused during disbursement
    pub outstanding: Vec<Credit>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the waiting side may claim a timeout
    pub deadline: Option<DateTime<Utc>>,
}

impl GameRecord {
    pub fn new(
        initiator: Identity,
        mode: OpponentMode,
        wager: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            game_id: GameId::new(),
            initiator,
            mode,
            wager_initiator: wager,
            wager_opponent: 0,
            opponent: None,
            commitment_initiator: None,
            commitment_opponent: None,
            revealed_initiator: None,
            revealed_opponent: None,
            state: GameState::Created,
            outcome: None,
            payouts: None,
            outstanding: Vec::new(),
            created_at: now,
            updated_at: now,
            deadline: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Blocks a new game for the initiator: unfinished, or still owes credits
    pub fn is_open(&self) -> bool {
        !self.is_terminal() || !self.outstanding.is_empty()
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase()
    }

    /// Funds this game still holds in the pot
    pub fn escrowed(&self) -> Amount {
        if self.is_terminal() {
            self.outstanding
                .iter()
                .fold(0, |total: Amount, c| total.saturating_add(c.amount))
        } else {
            self.pot()
        }
    }

    /// Both wagers; saturates rather than wrapping on out-of-range wagers
    pub fn pot(&self) -> Amount {
        self.wager_initiator.saturating_add(self.wager_opponent)
    }

    pub fn party(&self, side: Side) -> Option<&Identity> {
        match side {
            Side::Initiator => Some(&self.initiator),
            Side::Opponent => self.opponent.as_ref(),
        }
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline.map_or(false, |deadline| now >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> GameRecord {
        GameRecord::new(
            Identity::from("alice"),
            OpponentMode::PlayerVsPlayer,
            100,
            Utc::now(),
        )
    }

    #[test]
    fn test_terminal_states() {
        assert!(!GameState::Created.is_terminal());
        assert!(!GameState::AwaitingSecondReveal.is_terminal());
        assert!(!GameState::AwaitingRandomness {
            request_id: RequestId::new()
        }
        .is_terminal());
        assert!(GameState::ResolvedVsAutomated.is_terminal());
        assert!(GameState::Resolved.is_terminal());
        assert!(GameState::Forfeited {
            winner: Side::Opponent
        }
        .is_terminal());
    }

    #[test]
    fn test_partially_revealed_is_shared() {
        assert_eq!(
            GameState::ResolvedVsAutomated.phase(),
            GameState::AwaitingSecondReveal.phase()
        );
        assert_eq!(
            GameState::ResolvedVsAutomated.phase(),
            GamePhase::PartiallyRevealed
        );
    }

    #[test]
    fn test_escrowed_tracks_state() {
        let mut game = record();
        assert_eq!(game.escrowed(), 100);

        game.wager_opponent = 100;
        assert_eq!(game.escrowed(), 200);

        game.state = GameState::Resolved;
        assert_eq!(game.escrowed(), 0);
        assert!(!game.is_open());

        game.outstanding.push(Credit {
            recipient: Identity::from("bob"),
            amount: 200,
        });
        assert_eq!(game.escrowed(), 200);
        assert!(game.is_open());
    }

    #[test]
    fn test_pot_saturates() {
        let mut game = record();
        game.wager_initiator = Amount::MAX;
        game.wager_opponent = Amount::MAX;
        assert_eq!(game.pot(), Amount::MAX);
        assert_eq!(game.escrowed(), Amount::MAX);
    }

    #[test]
    fn test_deadline() {
        let mut game = record();
        let now = Utc::now();
        assert!(!game.is_past_deadline(now));

        game.deadline = Some(now);
        assert!(game.is_past_deadline(now));
        assert!(!game.is_past_deadline(now - chrono::Duration::seconds(1)));
    }
}
