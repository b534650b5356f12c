//! The game state machine and settlement engine.
//!
//! One record slot per initiating identity. Operations lock only their own
//! slot (an async mutex held for the whole call, ledger and randomness
//! round-trips included), so conflicting calls on a game serialize and the
//! loser sees the new state, while different games never wait on each other.

mod record;

pub use record::{Credit, GameRecord, GameState};

use crate::config::{ConfigError, EngineConfig};
use crate::crypto::{Commitment, Salt};
use crate::error::{GameError, Result};
use crate::games::{settle, Move, Outcome, Payouts, Settlement};
use crate::protocol::{GameEvent, GameId, OpponentMode, Side};
use crate::randomness::{Delivery, RandomValue, RandomnessRequest, RandomnessSource, RequestId};
use chrono::{DateTime, Utc};
use ledger_core::{Amount, Identity, Ledger, LedgerError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

type Slot = Arc<tokio::sync::Mutex<Option<GameRecord>>>;

/// What a successful `reveal_move` led to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Automated game, settled within the call
    Settled(Settlement),
    /// Automated game, value will arrive through `fulfill_randomness`
    AwaitingRandomness(RequestId),
    /// PvP game, the opponent reveals next
    AwaitingOpponent,
}

/// What a successful `claim_timeout` did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimeoutResolution {
    /// The side that never revealed lost the pot
    Forfeited { winner: Side, amount: Amount },
    /// Randomness never arrived, both wagers went back
    Refunded,
}

fn illegal(operation: &'static str, record: Option<&GameRecord>) -> GameError {
    GameError::IllegalState {
        operation,
        state: record.map_or_else(|| "absent".to_string(), |r| r.state.to_string()),
    }
}

/// The record in `slot` if it is still in play
fn active<'a>(slot: &'a mut Option<GameRecord>, operation: &'static str) -> Result<&'a mut GameRecord> {
    if slot.as_ref().map_or(true, GameRecord::is_terminal) {
        return Err(illegal(operation, slot.as_ref()));
    }
    slot.as_mut().ok_or_else(|| illegal(operation, None))
}

/// Owns every game and drives them through their states
pub struct GameEngine {
    config: EngineConfig,
    ledger: Arc<dyn Ledger>,
    randomness: Arc<dyn RandomnessSource>,
    slots: RwLock<HashMap<Identity, Slot>>,
    /// Opponent -> initiator of the unfinished PvP game they joined
    opponents: Mutex<HashMap<Identity, Identity>>,
    /// Pending randomness request -> initiator
    pending: Mutex<HashMap<RequestId, Identity>>,
    events: broadcast::Sender<GameEvent>,
    /// Simulated current time (for timeout testing)
    current_time: Mutex<Option<DateTime<Utc>>>,
}

impl GameEngine {
    pub fn new(
        config: EngineConfig,
        ledger: Arc<dyn Ledger>,
        randomness: Arc<dyn RandomnessSource>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            config,
            ledger,
            randomness,
            slots: RwLock::new(HashMap::new()),
            opponents: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            events,
            current_time: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Get current time (real or simulated)
    pub fn now(&self) -> DateTime<Utc> {
        self.current_time.lock().unwrap_or_else(Utc::now)
    }

    /// Advance simulated time by seconds.
    ///
    /// Time only moves forward, and never so far that a deadline set at the
    /// new time would fall outside the calendar. A rejected step leaves the
    /// clock untouched.
    pub fn advance_time(&self, seconds: i64) -> Result<DateTime<Utc>> {
        let step = chrono::Duration::try_seconds(seconds)
            .filter(|_| seconds >= 0)
            .ok_or(GameError::InvalidTimeStep(seconds))?;
        let longest = self
            .config
            .reveal_timeout()
            .max(self.config.randomness_timeout());

        let mut current_time = self.current_time.lock();
        let current = current_time.unwrap_or_else(Utc::now);
        let next = current
            .checked_add_signed(step)
            .filter(|next| next.checked_add_signed(longest).is_some())
            .ok_or(GameError::InvalidTimeStep(seconds))?;
        *current_time = Some(next);
        Ok(next)
    }

    fn emit(&self, event: GameEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn slot(&self, initiator: &Identity) -> Slot {
        if let Some(slot) = self.slots.read().get(initiator) {
            return slot.clone();
        }
        self.slots
            .write()
            .entry(initiator.clone())
            .or_default()
            .clone()
    }

    fn existing_slot(&self, initiator: &Identity, operation: &'static str) -> Result<Slot> {
        self.slots
            .read()
            .get(initiator)
            .cloned()
            .ok_or_else(|| illegal(operation, None))
    }

    // Boundary operations

    /// Escrow `wager` and open a game keyed by `caller`.
    ///
    /// Automated games escrow the house's matching wager in the same call; if
    /// that fails the caller's debit is credited back.
    pub async fn create_game(
        &self,
        caller: &Identity,
        wager: Amount,
        vs_automated: bool,
    ) -> Result<GameId> {
        let config = &self.config;
        if wager == 0 || wager < config.min_wager || wager > config.max_wager {
            return Err(GameError::InvalidWager {
                wager,
                min: config.min_wager,
                max: config.max_wager,
            });
        }

        let mode = OpponentMode::from_flag(vs_automated);
        if mode == OpponentMode::Automated && *caller == config.house {
            return Err(GameError::SelfJoin);
        }

        let slot = self.slot(caller);
        let mut guard = slot.lock().await;
        if guard.as_ref().map_or(false, GameRecord::is_open) {
            return Err(GameError::DuplicateGame(caller.clone()));
        }

        self.ledger.debit(caller, wager).await?;

        let mut record = GameRecord::new(caller.clone(), mode, wager, self.now());
        if mode == OpponentMode::Automated {
            if let Err(e) = self.ledger.debit(&config.house, wager).await {
                warn!(initiator = %caller, error = %e, "house escrow failed, returning wager");
                if let Err(refund_error) = self.ledger.credit(caller, wager).await {
                    error!(
                        initiator = %caller,
                        wager,
                        error = %refund_error,
                        "could not return wager after failed house escrow"
                    );
                }
                return Err(GameError::EscrowFailure(e));
            }
            record.opponent = Some(config.house.clone());
            record.wager_opponent = wager;
        }

        let game_id = record.game_id;
        info!(%game_id, initiator = %caller, ?mode, wager, "game created");
        self.emit(GameEvent::Created {
            game_id,
            initiator: caller.clone(),
            mode,
            wager,
        });
        *guard = Some(record);
        Ok(game_id)
    }

    /// Store the initiator's commitment
    pub async fn commit_move(&self, caller: &Identity, commitment: Commitment) -> Result<()> {
        const OP: &str = "commit";
        let slot = self.existing_slot(caller, OP)?;
        let mut guard = slot.lock().await;
        let record = active(&mut guard, OP)?;

        if record.state != GameState::Created {
            return Err(illegal(OP, Some(&*record)));
        }
        if commitment.is_empty() {
            return Err(GameError::EmptyCommitment);
        }

        record.commitment_initiator = Some(commitment);
        record.state = GameState::Committed;
        record.updated_at = self.now();

        info!(game_id = %record.game_id, initiator = %caller, "move committed");
        self.emit(GameEvent::Committed {
            game_id: record.game_id,
            initiator: caller.clone(),
        });
        Ok(())
    }

    /// Escrow the opponent's matching wager and store their commitment
    pub async fn join_game(
        &self,
        caller: &Identity,
        initiator: &Identity,
        wager: Amount,
        commitment: Commitment,
    ) -> Result<()> {
        const OP: &str = "join";
        if caller == initiator {
            return Err(GameError::SelfJoin);
        }

        let slot = self.existing_slot(initiator, OP)?;
        let mut guard = slot.lock().await;
        let record = active(&mut guard, OP)?;

        if record.mode != OpponentMode::PlayerVsPlayer || record.state != GameState::Committed {
            return Err(illegal(OP, Some(&*record)));
        }
        if wager != record.wager_initiator {
            return Err(GameError::WagerMismatch {
                expected: record.wager_initiator,
                offered: wager,
            });
        }
        if commitment.is_empty() {
            return Err(GameError::EmptyCommitment);
        }

        // Reserve before escrow so a racing join by the same caller elsewhere fails
        {
            let mut opponents = self.opponents.lock();
            if opponents.contains_key(caller) {
                return Err(GameError::DuplicateGame(caller.clone()));
            }
            opponents.insert(caller.clone(), initiator.clone());
        }

        if let Err(e) = self.ledger.debit(caller, wager).await {
            self.opponents.lock().remove(caller);
            return Err(e.into());
        }

        let now = self.now();
        record.opponent = Some(caller.clone());
        record.wager_opponent = wager;
        record.commitment_opponent = Some(commitment);
        record.state = GameState::Joined;
        record.updated_at = now;
        record.deadline = Some(now + self.config.reveal_timeout());

        info!(game_id = %record.game_id, %initiator, opponent = %caller, "opponent joined");
        self.emit(GameEvent::Joined {
            game_id: record.game_id,
            initiator: initiator.clone(),
            opponent: caller.clone(),
        });
        Ok(())
    }

    /// Reveal the initiator's move.
    ///
    /// In a PvP game this waits for the opponent. In an automated game it asks
    /// the randomness source for the house move and settles as soon as the
    /// value is there.
    pub async fn reveal_move(&self, caller: &Identity, mv: Move, salt: &Salt) -> Result<RevealOutcome> {
        const OP: &str = "reveal";
        let slot = self.existing_slot(caller, OP)?;
        let mut guard = slot.lock().await;
        let record = active(&mut guard, OP)?;

        let ready = matches!(
            (record.mode, &record.state),
            (OpponentMode::Automated, GameState::Committed)
                | (OpponentMode::PlayerVsPlayer, GameState::Joined)
        );
        if !ready {
            return Err(illegal(OP, Some(&*record)));
        }

        let commitment = record
            .commitment_initiator
            .ok_or_else(|| illegal(OP, Some(&*record)))?;
        if !commitment.verify(mv, salt) {
            warn!(game_id = %record.game_id, initiator = %caller, "reveal does not match commitment");
            return Err(GameError::CommitmentMismatch);
        }

        match record.mode {
            OpponentMode::PlayerVsPlayer => {
                let now = self.now();
                record.revealed_initiator = Some(mv);
                record.state = GameState::AwaitingSecondReveal;
                record.updated_at = now;
                record.deadline = Some(now + self.config.reveal_timeout());

                info!(game_id = %record.game_id, initiator = %caller, "initiator revealed");
                self.emit_revealed(record, Side::Initiator, mv);
                Ok(RevealOutcome::AwaitingOpponent)
            }
            OpponentMode::Automated => {
                let request = RandomnessRequest {
                    game_id: record.game_id,
                    initiator: caller.clone(),
                };
                // A failed request leaves the game committed, the player may retry
                let delivery = self.randomness.request(request).await?;

                record.revealed_initiator = Some(mv);
                self.emit_revealed(record, Side::Initiator, mv);

                match delivery {
                    Delivery::Ready(value) => {
                        let settlement = self
                            .finish(record, mv, value.to_move(), GameState::ResolvedVsAutomated)
                            .await;
                        Ok(RevealOutcome::Settled(settlement))
                    }
                    Delivery::Pending(request_id) => {
                        let now = self.now();
                        record.state = GameState::AwaitingRandomness { request_id };
                        record.updated_at = now;
                        record.deadline = Some(now + self.config.randomness_timeout());
                        self.pending.lock().insert(request_id, caller.clone());

                        info!(game_id = %record.game_id, %request_id, "awaiting randomness");
                        self.emit(GameEvent::RandomnessRequested {
                            game_id: record.game_id,
                            initiator: caller.clone(),
                            request_id,
                        });
                        Ok(RevealOutcome::AwaitingRandomness(request_id))
                    }
                }
            }
        }
    }

    /// Reveal the opponent's move in the PvP game they joined, then settle
    pub async fn reveal_opponent_move(
        &self,
        caller: &Identity,
        mv: Move,
        salt: &Salt,
    ) -> Result<Settlement> {
        const OP: &str = "reveal opponent move";
        let initiator = self
            .opponents
            .lock()
            .get(caller)
            .cloned()
            .ok_or_else(|| illegal(OP, None))?;

        let slot = self.existing_slot(&initiator, OP)?;
        let mut guard = slot.lock().await;
        let record = active(&mut guard, OP)?;

        if record.opponent.as_ref() != Some(caller) {
            return Err(GameError::NotParticipant(caller.clone()));
        }
        if record.state != GameState::AwaitingSecondReveal {
            return Err(illegal(OP, Some(&*record)));
        }

        let commitment = record
            .commitment_opponent
            .ok_or_else(|| illegal(OP, Some(&*record)))?;
        if !commitment.verify(mv, salt) {
            warn!(game_id = %record.game_id, opponent = %caller, "reveal does not match commitment");
            return Err(GameError::CommitmentMismatch);
        }
        let move_initiator = record
            .revealed_initiator
            .ok_or_else(|| illegal(OP, Some(&*record)))?;

        self.emit_revealed(record, Side::Opponent, mv);
        Ok(self.finish(record, move_initiator, mv, GameState::Resolved).await)
    }

    /// Deliver the value for a pending randomness request and settle
    pub async fn fulfill_randomness(&self, request_id: RequestId, value: RandomValue) -> Result<Settlement> {
        let initiator = self.pending_initiator(request_id)?;
        let slot = self.existing_slot(&initiator, "fulfill randomness")?;
        let mut guard = slot.lock().await;

        let record = match guard.as_mut() {
            Some(r) if r.state == (GameState::AwaitingRandomness { request_id }) => r,
            _ => return Err(GameError::UnknownRequest(request_id)),
        };
        let move_initiator = record
            .revealed_initiator
            .ok_or(GameError::UnknownRequest(request_id))?;

        self.pending.lock().remove(&request_id);
        debug!(%request_id, "randomness delivered");
        Ok(self
            .finish(record, move_initiator, value.to_move(), GameState::ResolvedVsAutomated)
            .await)
    }

    /// The randomness source gave up on a request: refund both sides
    pub async fn fail_randomness(&self, request_id: RequestId, reason: &str) -> Result<()> {
        let initiator = self.pending_initiator(request_id)?;
        let slot = self.existing_slot(&initiator, "fail randomness")?;
        let mut guard = slot.lock().await;

        let record = match guard.as_mut() {
            Some(r) if r.state == (GameState::AwaitingRandomness { request_id }) => r,
            _ => return Err(GameError::UnknownRequest(request_id)),
        };

        self.pending.lock().remove(&request_id);
        self.abort(record, format!("randomness failed: {}", reason)).await;
        Ok(())
    }

    /// Initiator withdraws before anyone else is locked in
    pub async fn cancel_game(&self, caller: &Identity) -> Result<()> {
        const OP: &str = "cancel";
        let slot = self.existing_slot(caller, OP)?;
        let mut guard = slot.lock().await;
        let record = active(&mut guard, OP)?;

        if !matches!(record.state, GameState::Created | GameState::Committed) {
            return Err(illegal(OP, Some(&*record)));
        }

        self.abort(record, "cancelled by initiator".to_string()).await;
        Ok(())
    }

    /// Settle a game the other side stopped responding to.
    ///
    /// - joined, initiator never revealed: the opponent takes the pot
    /// - initiator revealed, opponent never did: the initiator takes the pot
    /// - randomness never arrived: both wagers are refunded
    pub async fn claim_timeout(&self, caller: &Identity, initiator: &Identity) -> Result<TimeoutResolution> {
        const OP: &str = "claim timeout";
        let slot = self.existing_slot(initiator, OP)?;
        let mut guard = slot.lock().await;
        let record = active(&mut guard, OP)?;

        let (claimant, forfeit_winner) = match record.state {
            GameState::Joined => (Side::Opponent, Some(Side::Opponent)),
            GameState::AwaitingSecondReveal => (Side::Initiator, Some(Side::Initiator)),
            GameState::AwaitingRandomness { .. } => (Side::Initiator, None),
            _ => return Err(illegal(OP, Some(&*record))),
        };
        if record.party(claimant) != Some(caller) {
            return Err(GameError::NotParticipant(caller.clone()));
        }

        let now = self.now();
        if !record.is_past_deadline(now) {
            return Err(GameError::DeadlineNotReached(record.deadline.unwrap_or(now)));
        }

        match forfeit_winner {
            Some(winner) => {
                let amount = self.forfeit(record, winner).await;
                Ok(TimeoutResolution::Forfeited { winner, amount })
            }
            None => {
                if let GameState::AwaitingRandomness { request_id } = record.state {
                    self.pending.lock().remove(&request_id);
                }
                self.abort(record, "randomness timed out".to_string()).await;
                Ok(TimeoutResolution::Refunded)
            }
        }
    }

    /// Re-issue credits the ledger refused at settlement time
    pub async fn retry_payouts(&self, initiator: &Identity) -> Result<()> {
        const OP: &str = "retry payouts";
        let slot = self.existing_slot(initiator, OP)?;
        let mut guard = slot.lock().await;

        let record = match guard.as_mut() {
            Some(r) if r.is_terminal() && !r.outstanding.is_empty() => r,
            other => return Err(illegal(OP, other.as_deref())),
        };

        let owed = std::mem::take(&mut record.outstanding);
        match self.disburse(record, owed).await {
            None => {
                info!(game_id = %record.game_id, %initiator, "outstanding payouts settled");
                Ok(())
            }
            Some(e) => Err(GameError::PayoutFailed(e)),
        }
    }

    // Queries

    /// Latest record for an initiator, finished or not
    pub async fn get_game(&self, initiator: &Identity) -> Option<GameRecord> {
        let slot = self.slots.read().get(initiator).cloned()?;
        let guard = slot.lock().await;
        guard.clone()
    }

    /// PvP games still waiting for an opponent
    pub fn open_games(&self) -> Vec<GameRecord> {
        let slots: Vec<Slot> = self.slots.read().values().cloned().collect();

        let mut games = Vec::new();
        for slot in slots {
            // A slot mid-operation is not joinable right now
            let Ok(guard) = slot.try_lock() else {
                continue;
            };
            if let Some(record) = guard.as_ref() {
                if record.mode == OpponentMode::PlayerVsPlayer && record.state == GameState::Committed {
                    games.push(record.clone());
                }
            }
        }
        games.sort_by_key(|g| g.created_at);
        games
    }

    // Internals

    fn pending_initiator(&self, request_id: RequestId) -> Result<Identity> {
        self.pending
            .lock()
            .get(&request_id)
            .cloned()
            .ok_or(GameError::UnknownRequest(request_id))
    }

    fn emit_revealed(&self, record: &GameRecord, side: Side, mv: Move) {
        self.emit(GameEvent::Revealed {
            game_id: record.game_id,
            initiator: record.initiator.clone(),
            side,
            mv,
        });
    }

    /// Credits for a payout split, zero amounts dropped
    fn credits_for(&self, record: &GameRecord, payouts: &Payouts) -> Vec<Credit> {
        let mut credits = vec![Credit {
            recipient: record.initiator.clone(),
            amount: payouts.initiator,
        }];
        if let Some(opponent) = &record.opponent {
            credits.push(Credit {
                recipient: opponent.clone(),
                amount: payouts.opponent,
            });
        }
        credits.push(Credit {
            recipient: self.config.house.clone(),
            amount: payouts.fee,
        });
        credits.retain(|c| c.amount > 0);
        credits
    }

    /// Issue credits; refused ones are parked in `outstanding`.
    /// Returns the last ledger error, if any.
    async fn disburse(&self, record: &mut GameRecord, credits: Vec<Credit>) -> Option<LedgerError> {
        let mut last_error = None;
        for credit in credits {
            match self.ledger.credit(&credit.recipient, credit.amount).await {
                Ok(transfer_id) => {
                    debug!(
                        game_id = %record.game_id,
                        recipient = %credit.recipient,
                        amount = credit.amount,
                        %transfer_id,
                        "payout credited"
                    );
                }
                Err(e) => {
                    error!(
                        game_id = %record.game_id,
                        recipient = %credit.recipient,
                        amount = credit.amount,
                        error = %e,
                        "payout failed, kept as outstanding"
                    );
                    self.emit(GameEvent::PayoutFailed {
                        game_id: record.game_id,
                        initiator: record.initiator.clone(),
                        recipient: credit.recipient.clone(),
                        amount: credit.amount,
                        error: e.to_string(),
                    });
                    record.outstanding.push(credit);
                    last_error = Some(e);
                }
            }
        }
        last_error
    }

    /// Drop index entries that point at a game that just ended
    fn release(&self, record: &GameRecord) {
        if record.mode != OpponentMode::PlayerVsPlayer {
            return;
        }
        if let Some(opponent) = &record.opponent {
            let mut opponents = self.opponents.lock();
            if opponents.get(opponent) == Some(&record.initiator) {
                opponents.remove(opponent);
            }
        }
    }

    /// Enter a terminal state: the single place a game's state is made final
    fn conclude(&self, record: &mut GameRecord, state: GameState) {
        record.state = state;
        record.deadline = None;
        record.updated_at = self.now();
        self.release(record);
    }

    /// Judge both moves, make the game final and pay out
    async fn finish(
        &self,
        record: &mut GameRecord,
        move_initiator: Move,
        move_opponent: Move,
        terminal: GameState,
    ) -> Settlement {
        let settlement = settle(
            move_initiator,
            move_opponent,
            record.wager_initiator,
            record.wager_opponent,
            self.config.tie_fee_bps,
        );

        record.revealed_initiator = Some(move_initiator);
        record.revealed_opponent = Some(move_opponent);
        record.outcome = Some(settlement.outcome);
        record.payouts = Some(settlement.payouts);
        self.conclude(record, terminal);

        info!(
            game_id = %record.game_id,
            initiator = %record.initiator,
            %move_initiator,
            %move_opponent,
            outcome = %settlement.outcome,
            "game settled"
        );

        let credits = self.credits_for(record, &settlement.payouts);
        self.disburse(record, credits).await;

        self.emit(GameEvent::Settled {
            game_id: record.game_id,
            initiator: record.initiator.clone(),
            settlement,
        });
        settlement
    }

    /// Award the whole pot to `winner`. Returns the amount
    async fn forfeit(&self, record: &mut GameRecord, winner: Side) -> Amount {
        let amount = record.pot();
        let payouts = match winner {
            Side::Initiator => Payouts {
                initiator: amount,
                ..Default::default()
            },
            Side::Opponent => Payouts {
                opponent: amount,
                ..Default::default()
            },
        };

        record.outcome = Some(match winner {
            Side::Initiator => Outcome::AWins,
            Side::Opponent => Outcome::BWins,
        });
        record.payouts = Some(payouts);
        self.conclude(record, GameState::Forfeited { winner });

        info!(game_id = %record.game_id, initiator = %record.initiator, %winner, amount, "game forfeited");

        let credits = self.credits_for(record, &payouts);
        self.disburse(record, credits).await;

        self.emit(GameEvent::Forfeited {
            game_id: record.game_id,
            initiator: record.initiator.clone(),
            winner,
            amount,
        });
        amount
    }

    /// Refund exactly what each side escrowed and end the game
    async fn abort(&self, record: &mut GameRecord, reason: String) {
        let payouts = Payouts {
            initiator: record.wager_initiator,
            opponent: record.wager_opponent,
            fee: 0,
        };
        record.payouts = Some(payouts);
        self.conclude(
            record,
            GameState::Aborted {
                reason: reason.clone(),
            },
        );

        info!(game_id = %record.game_id, initiator = %record.initiator, %reason, "game aborted");

        let credits = self.credits_for(record, &payouts);
        self.disburse(record, credits).await;

        self.emit(GameEvent::Aborted {
            game_id: record.game_id,
            initiator: record.initiator.clone(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::commit;
    use crate::randomness::{MockRandomness, Scripted};
    use ledger_core::MockLedger;

    const W: Amount = 100;

    struct Fixture {
        engine: GameEngine,
        ledger: MockLedger,
        randomness: MockRandomness,
        alice: Identity,
        bob: Identity,
    }

    fn fixture() -> Fixture {
        let ledger = MockLedger::new();
        let randomness = MockRandomness::new();
        let config = EngineConfig::default();

        let alice = Identity::from("alice");
        let bob = Identity::from("bob");
        for who in [&alice, &bob, &config.house] {
            ledger.mint(who, 1_000);
            ledger.approve_unlimited(who);
        }

        let engine = GameEngine::new(
            config,
            Arc::new(ledger.clone()),
            Arc::new(randomness.clone()),
        )
        .unwrap();
        Fixture {
            engine,
            ledger,
            randomness,
            alice,
            bob,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_zero_and_out_of_range_wagers() {
        let f = fixture();
        assert!(matches!(
            f.engine.create_game(&f.alice, 0, false).await,
            Err(GameError::InvalidWager { wager: 0, .. })
        ));
        assert!(matches!(
            f.engine.create_game(&f.alice, Amount::MAX, false).await,
            Err(GameError::InvalidWager { .. })
        ));
        assert!(f.engine.get_game(&f.alice).await.is_none());
        assert_eq!(f.ledger.pot(), 0);
    }

    #[tokio::test]
    async fn test_create_escrow_failure_leaves_no_record() {
        let f = fixture();
        let carol = Identity::from("carol");

        let result = f.engine.create_game(&carol, W, false).await;
        assert!(matches!(result, Err(GameError::EscrowFailure(_))));
        assert!(f.engine.get_game(&carol).await.is_none());
        assert_eq!(f.ledger.pot(), 0);
    }

    #[tokio::test]
    async fn test_automated_create_escrows_house() {
        let f = fixture();
        f.engine.create_game(&f.alice, W, true).await.unwrap();

        let game = f.engine.get_game(&f.alice).await.unwrap();
        assert_eq!(game.opponent.as_ref(), Some(&f.engine.config().house));
        assert_eq!(game.wager_opponent, W);
        assert_eq!(f.ledger.pot(), 2 * W);
    }

    #[tokio::test]
    async fn test_automated_create_returns_wager_when_house_is_broke() {
        let ledger = MockLedger::new();
        let alice = Identity::from("alice");
        ledger.mint(&alice, 1_000);
        ledger.approve_unlimited(&alice);
        let engine = GameEngine::new(
            EngineConfig::default(),
            Arc::new(ledger.clone()),
            Arc::new(MockRandomness::new()),
        )
        .unwrap();

        let result = engine.create_game(&alice, W, true).await;
        assert!(matches!(result, Err(GameError::EscrowFailure(_))));
        assert!(engine.get_game(&alice).await.is_none());
        assert_eq!(ledger.balance(&alice), 1_000);
        assert_eq!(ledger.pot(), 0);
    }

    #[tokio::test]
    async fn test_house_cannot_play_itself() {
        let f = fixture();
        let house = f.engine.config().house.clone();
        assert!(matches!(
            f.engine.create_game(&house, W, true).await,
            Err(GameError::SelfJoin)
        ));
    }

    #[tokio::test]
    async fn test_commit_requires_created_and_non_empty() {
        let f = fixture();
        let salt = Salt::random();

        assert!(matches!(
            f.engine.commit_move(&f.alice, commit(Move::Rock, &salt)).await,
            Err(GameError::IllegalState { .. })
        ));

        f.engine.create_game(&f.alice, W, false).await.unwrap();
        assert!(matches!(
            f.engine.commit_move(&f.alice, Commitment::EMPTY).await,
            Err(GameError::EmptyCommitment)
        ));

        let commitment = commit(Move::Rock, &salt);
        f.engine.commit_move(&f.alice, commitment).await.unwrap();

        // The commitment is immutable once set
        let again = f.engine.commit_move(&f.alice, commit(Move::Paper, &salt)).await;
        assert!(matches!(again, Err(GameError::IllegalState { .. })));
        let game = f.engine.get_game(&f.alice).await.unwrap();
        assert_eq!(game.commitment_initiator, Some(commitment));
        assert_eq!(game.state, GameState::Committed);
    }

    #[tokio::test]
    async fn test_join_checks() {
        let f = fixture();
        let salt = Salt::random();
        let digest = commit(Move::Paper, &salt);

        f.engine.create_game(&f.alice, W, false).await.unwrap();

        // Not committed yet
        assert!(matches!(
            f.engine.join_game(&f.bob, &f.alice, W, digest).await,
            Err(GameError::IllegalState { .. })
        ));

        f.engine
            .commit_move(&f.alice, commit(Move::Rock, &Salt::random()))
            .await
            .unwrap();

        assert!(matches!(
            f.engine.join_game(&f.alice, &f.alice, W, digest).await,
            Err(GameError::SelfJoin)
        ));
        assert!(matches!(
            f.engine.join_game(&f.bob, &f.alice, W + 1, digest).await,
            Err(GameError::WagerMismatch { expected: W, offered })
                if offered == W + 1
        ));
        assert!(matches!(
            f.engine.join_game(&f.bob, &f.alice, W, Commitment::EMPTY).await,
            Err(GameError::EmptyCommitment)
        ));

        f.engine.join_game(&f.bob, &f.alice, W, digest).await.unwrap();

        // Second join loses
        let carol = Identity::from("carol");
        f.ledger.mint(&carol, 1_000);
        f.ledger.approve_unlimited(&carol);
        assert!(matches!(
            f.engine.join_game(&carol, &f.alice, W, digest).await,
            Err(GameError::IllegalState { .. })
        ));
        assert_eq!(f.ledger.balance(&carol), 1_000);
    }

    #[tokio::test]
    async fn test_join_automated_game_is_illegal() {
        let f = fixture();
        f.engine.create_game(&f.alice, W, true).await.unwrap();
        f.engine
            .commit_move(&f.alice, commit(Move::Rock, &Salt::random()))
            .await
            .unwrap();

        let result = f
            .engine
            .join_game(&f.bob, &f.alice, W, commit(Move::Rock, &Salt::random()))
            .await;
        assert!(matches!(result, Err(GameError::IllegalState { .. })));
    }

    #[tokio::test]
    async fn test_failed_join_escrow_releases_reservation() {
        let f = fixture();
        let carol = Identity::from("carol");
        f.engine.create_game(&f.alice, W, false).await.unwrap();
        f.engine
            .commit_move(&f.alice, commit(Move::Rock, &Salt::random()))
            .await
            .unwrap();

        let digest = commit(Move::Paper, &Salt::random());
        assert!(matches!(
            f.engine.join_game(&carol, &f.alice, W, digest).await,
            Err(GameError::EscrowFailure(_))
        ));

        // Carol funds up and can try again
        f.ledger.mint(&carol, W);
        f.ledger.approve_unlimited(&carol);
        f.engine.join_game(&carol, &f.alice, W, digest).await.unwrap();
    }

    #[tokio::test]
    async fn test_randomness_failure_keeps_game_committed() {
        let f = fixture();
        let salt = Salt::random();
        f.engine.create_game(&f.alice, W, true).await.unwrap();
        f.engine
            .commit_move(&f.alice, commit(Move::Rock, &salt))
            .await
            .unwrap();

        f.randomness.push(Scripted::Fail);
        let result = f.engine.reveal_move(&f.alice, Move::Rock, &salt).await;
        assert!(matches!(result, Err(GameError::RandomnessFailure(_))));

        let game = f.engine.get_game(&f.alice).await.unwrap();
        assert_eq!(game.state, GameState::Committed);
        assert_eq!(game.revealed_initiator, None);
        assert_eq!(f.ledger.pot(), 2 * W);

        // Retry succeeds
        f.randomness.push_move(Move::Rock);
        let outcome = f.engine.reveal_move(&f.alice, Move::Rock, &salt).await.unwrap();
        assert!(matches!(outcome, RevealOutcome::Settled(s) if s.outcome == Outcome::Tie));
    }

    #[tokio::test]
    async fn test_cancel_refunds_escrow() {
        let f = fixture();
        f.engine.create_game(&f.alice, W, true).await.unwrap();
        f.engine.cancel_game(&f.alice).await.unwrap();

        let game = f.engine.get_game(&f.alice).await.unwrap();
        assert!(game.is_terminal());
        assert_eq!(game.phase(), crate::protocol::GamePhase::Aborted);
        assert_eq!(f.ledger.pot(), 0);
        assert_eq!(f.ledger.balance(&f.alice), 1_000);
        assert_eq!(f.ledger.balance(&f.engine.config().house), 1_000);

        // Slot is free again
        f.engine.create_game(&f.alice, W, false).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_after_join_is_illegal() {
        let f = fixture();
        f.engine.create_game(&f.alice, W, false).await.unwrap();
        f.engine
            .commit_move(&f.alice, commit(Move::Rock, &Salt::random()))
            .await
            .unwrap();
        f.engine
            .join_game(&f.bob, &f.alice, W, commit(Move::Rock, &Salt::random()))
            .await
            .unwrap();

        assert!(matches!(
            f.engine.cancel_game(&f.alice).await,
            Err(GameError::IllegalState { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_games_lists_joinable_pvp_only() {
        let f = fixture();
        f.engine.create_game(&f.alice, W, false).await.unwrap();
        f.engine.create_game(&f.bob, W, true).await.unwrap();
        assert!(f.engine.open_games().is_empty());

        f.engine
            .commit_move(&f.alice, commit(Move::Rock, &Salt::random()))
            .await
            .unwrap();
        f.engine
            .commit_move(&f.bob, commit(Move::Rock, &Salt::random()))
            .await
            .unwrap();

        let open = f.engine.open_games();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].initiator, f.alice);
    }

    #[tokio::test]
    async fn test_events_follow_transitions() {
        let f = fixture();
        let mut events = f.engine.subscribe();
        let salt = Salt::random();

        f.engine.create_game(&f.alice, W, true).await.unwrap();
        f.engine
            .commit_move(&f.alice, commit(Move::Paper, &salt))
            .await
            .unwrap();
        f.randomness.push_move(Move::Rock);
        f.engine.reveal_move(&f.alice, Move::Paper, &salt).await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), GameEvent::Created { .. }));
        assert!(matches!(events.recv().await.unwrap(), GameEvent::Committed { .. }));
        assert!(matches!(
            events.recv().await.unwrap(),
            GameEvent::Revealed { side: Side::Initiator, mv: Move::Paper, .. }
        ));
        match events.recv().await.unwrap() {
            GameEvent::Settled { settlement, .. } => {
                assert_eq!(settlement.outcome, Outcome::AWins);
                assert_eq!(settlement.payouts.initiator, 2 * W);
            }
            other => panic!("expected settlement, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_advance_time_moves_clock() {
        let f = fixture();
        let before = f.engine.now();
        let after = f.engine.advance_time(3_600).unwrap();
        assert_eq!(f.engine.now(), after);
        assert!(after >= before + chrono::Duration::seconds(3_600));
    }

    #[tokio::test]
    async fn test_advance_time_rejects_unrepresentable_steps() {
        let f = fixture();
        let frozen = f.engine.advance_time(0).unwrap();

        for seconds in [i64::MAX, i64::MIN, -1, 300_000 * 365 * 24 * 60 * 60] {
            assert!(matches!(
                f.engine.advance_time(seconds),
                Err(GameError::InvalidTimeStep(s)) if s == seconds
            ));
            assert_eq!(f.engine.now(), frozen);
        }
    }

    #[test]
    fn test_new_rejects_config_that_overflows_the_pot() {
        let config = EngineConfig {
            max_wager: Amount::MAX,
            ..EngineConfig::default()
        };
        let result = GameEngine::new(
            config,
            Arc::new(MockLedger::new()),
            Arc::new(MockRandomness::new()),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_open_games_skips_busy_slot() {
        let f = fixture();
        f.engine.create_game(&f.alice, W, false).await.unwrap();
        f.engine
            .commit_move(&f.alice, commit(Move::Rock, &Salt::random()))
            .await
            .unwrap();
        f.engine.create_game(&f.bob, W, false).await.unwrap();
        f.engine
            .commit_move(&f.bob, commit(Move::Paper, &Salt::random()))
            .await
            .unwrap();

        // Stand-in for an operation parked on a slow ledger call
        let slot = f.engine.slot(&f.alice);
        let held = slot.lock().await;
        let open = f.engine.open_games();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].initiator, f.bob);

        drop(held);
        assert_eq!(f.engine.open_games().len(), 2);
    }
}
