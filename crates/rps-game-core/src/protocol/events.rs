//! Events broadcast by the engine.

use crate::games::{Move, Settlement};
use crate::protocol::{GameId, OpponentMode, Side};
use crate::randomness::RequestId;
use ledger_core::{Amount, Identity};
use serde::{Deserialize, Serialize};

/// Something that happened to a game.
///
/// Every event carries the game id and the initiator, which keys the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    Created {
        game_id: GameId,
        initiator: Identity,
        mode: OpponentMode,
        wager: Amount,
    },
    Committed {
        game_id: GameId,
        initiator: Identity,
    },
    Joined {
        game_id: GameId,
        initiator: Identity,
        opponent: Identity,
    },
    Revealed {
        game_id: GameId,
        initiator: Identity,
        side: Side,
        mv: Move,
    },
    RandomnessRequested {
        game_id: GameId,
        initiator: Identity,
        request_id: RequestId,
    },
    Settled {
        game_id: GameId,
        initiator: Identity,
        settlement: Settlement,
    },
    Forfeited {
        game_id: GameId,
        initiator: Identity,
        winner: Side,
        amount: Amount,
    },
    Aborted {
        game_id: GameId,
        initiator: Identity,
        reason: String,
    },
    PayoutFailed {
        game_id: GameId,
        initiator: Identity,
        recipient: Identity,
        amount: Amount,
        error: String,
    },
}

impl GameEvent {
    pub fn game_id(&self) -> GameId {
        match self {
            GameEvent::Created { game_id, .. }
            | GameEvent::Committed { game_id, .. }
            | GameEvent::Joined { game_id, .. }
            | GameEvent::Revealed { game_id, .. }
            | GameEvent::RandomnessRequested { game_id, .. }
            | GameEvent::Settled { game_id, .. }
            | GameEvent::Forfeited { game_id, .. }
            | GameEvent::Aborted { game_id, .. }
            | GameEvent::PayoutFailed { game_id, .. } => *game_id,
        }
    }
}
