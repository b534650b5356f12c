//! HTTP API handlers.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use ledger_core::{Amount, Identity};
use rps_game_core::{
    Commitment, GameError, GameId, GamePhase, GameRecord, Move, RandomValue, RequestId,
    RevealOutcome, Salt, Settlement, TimeoutResolution,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

// ============ Request/Response types ============

#[derive(Deserialize)]
pub struct CreateGameRequest {
    pub wager: Amount,
    #[serde(default)]
    pub vs_automated: bool,
}

#[derive(Serialize)]
pub struct CreateGameResponse {
    pub game_id: GameId,
    pub initiator: Identity,
}

#[derive(Deserialize)]
pub struct CommitRequest {
    pub commitment: Commitment,
}

#[derive(Deserialize)]
pub struct JoinRequest {
    pub wager: Amount,
    pub commitment: Commitment,
}

#[derive(Deserialize)]
pub struct RevealRequest {
    #[serde(rename = "move")]
    pub mv: Move,
    pub salt: Salt,
}

#[derive(Serialize)]
pub struct RevealResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement: Option<Settlement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
}

impl From<RevealOutcome> for RevealResponse {
    fn from(outcome: RevealOutcome) -> Self {
        match outcome {
            RevealOutcome::Settled(settlement) => Self {
                status: "settled",
                settlement: Some(settlement),
                request_id: None,
            },
            RevealOutcome::AwaitingRandomness(request_id) => Self {
                status: "awaiting_randomness",
                settlement: None,
                request_id: Some(request_id),
            },
            RevealOutcome::AwaitingOpponent => Self {
                status: "awaiting_opponent",
                settlement: None,
                request_id: None,
            },
        }
    }
}

/// A record plus its externally visible phase
#[derive(Serialize)]
pub struct GameResponse {
    #[serde(flatten)]
    pub record: GameRecord,
    pub phase: GamePhase,
    pub phase_code: u8,
}

impl From<GameRecord> for GameResponse {
    fn from(record: GameRecord) -> Self {
        let phase = record.phase();
        Self {
            record,
            phase,
            phase_code: phase.ordinal(),
        }
    }
}

#[derive(Deserialize)]
pub struct FulfillRequest {
    pub value: RandomValue,
}

#[derive(Deserialize)]
pub struct FailRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct MintRequest {
    pub identity: Identity,
    pub amount: Amount,
}

#[derive(Deserialize)]
pub struct TickRequest {
    pub seconds: i64,
}

// ============ Helper to get player from header ============

pub const RANDOMNESS_TOKEN_HEADER: &str = "X-Randomness-Token";

fn player_from_header(headers: &HeaderMap) -> Result<Identity, AppError> {
    headers
        .get("X-Player-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Identity::from)
        .ok_or(AppError::MissingPlayer)
}

/// Randomness callbacks come from the adapter, never from players
fn randomness_caller(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let presented = headers
        .get(RANDOMNESS_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if state.randomness_token_matches(presented) {
        Ok(())
    } else {
        Err(AppError::BadRandomnessToken)
    }
}

/// Commit, reveal and cancel act on the caller's own game
fn own_game(headers: &HeaderMap, initiator: &Identity) -> Result<Identity, AppError> {
    let caller = player_from_header(headers)?;
    if caller != *initiator {
        return Err(GameError::NotParticipant(caller).into());
    }
    Ok(caller)
}

// ============ Game handlers ============

pub async fn create_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateGameRequest>,
) -> Result<Json<CreateGameResponse>, AppError> {
    let caller = player_from_header(&headers)?;
    let game_id = state
        .engine
        .create_game(&caller, req.wager, req.vs_automated)
        .await?;
    Ok(Json(CreateGameResponse {
        game_id,
        initiator: caller,
    }))
}

pub async fn list_open_games(State(state): State<AppState>) -> Json<Value> {
    let games: Vec<GameResponse> = state
        .engine
        .open_games()
        .into_iter()
        .map(Into::into)
        .collect();
    Json(json!({ "games": games }))
}

pub async fn get_game(
    State(state): State<AppState>,
    Path(initiator): Path<Identity>,
) -> Result<Json<GameResponse>, AppError> {
    state
        .engine
        .get_game(&initiator)
        .await
        .map(|record| Json(record.into()))
        .ok_or_else(|| AppError::NotFound(format!("Game of {}", initiator)))
}

pub async fn commit_move(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(initiator): Path<Identity>,
    Json(req): Json<CommitRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = own_game(&headers, &initiator)?;
    state.engine.commit_move(&caller, req.commitment).await?;
    Ok(Json(json!({ "status": "committed" })))
}

pub async fn join_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(initiator): Path<Identity>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = player_from_header(&headers)?;
    state
        .engine
        .join_game(&caller, &initiator, req.wager, req.commitment)
        .await?;
    Ok(Json(json!({ "status": "joined" })))
}

pub async fn reveal_move(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(initiator): Path<Identity>,
    Json(req): Json<RevealRequest>,
) -> Result<Json<RevealResponse>, AppError> {
    let caller = own_game(&headers, &initiator)?;
    let outcome = state.engine.reveal_move(&caller, req.mv, &req.salt).await?;
    Ok(Json(outcome.into()))
}

pub async fn reveal_opponent_move(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RevealRequest>,
) -> Result<Json<RevealResponse>, AppError> {
    let caller = player_from_header(&headers)?;
    let settlement = state
        .engine
        .reveal_opponent_move(&caller, req.mv, &req.salt)
        .await?;
    Ok(Json(RevealOutcome::Settled(settlement).into()))
}

pub async fn cancel_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(initiator): Path<Identity>,
) -> Result<Json<Value>, AppError> {
    let caller = own_game(&headers, &initiator)?;
    state.engine.cancel_game(&caller).await?;
    Ok(Json(json!({ "status": "aborted" })))
}

pub async fn claim_timeout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(initiator): Path<Identity>,
) -> Result<Json<Value>, AppError> {
    let caller = player_from_header(&headers)?;
    let body = match state.engine.claim_timeout(&caller, &initiator).await? {
        TimeoutResolution::Forfeited { winner, amount } => {
            json!({ "status": "forfeited", "winner": winner, "amount": amount })
        }
        TimeoutResolution::Refunded => json!({ "status": "refunded" }),
    };
    Ok(Json(body))
}

pub async fn retry_payouts(
    State(state): State<AppState>,
    Path(initiator): Path<Identity>,
) -> Result<Json<Value>, AppError> {
    state.engine.retry_payouts(&initiator).await?;
    Ok(Json(json!({ "status": "paid" })))
}

// ============ Randomness callbacks ============

pub async fn fulfill_randomness(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(request_id): Path<RequestId>,
    Json(req): Json<FulfillRequest>,
) -> Result<Json<RevealResponse>, AppError> {
    randomness_caller(&state, &headers)?;
    let settlement = state.engine.fulfill_randomness(request_id, req.value).await?;
    Ok(Json(RevealOutcome::Settled(settlement).into()))
}

pub async fn fail_randomness(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(request_id): Path<RequestId>,
    Json(req): Json<FailRequest>,
) -> Result<Json<Value>, AppError> {
    randomness_caller(&state, &headers)?;
    state.engine.fail_randomness(request_id, &req.reason).await?;
    Ok(Json(json!({ "status": "aborted" })))
}

// ============ Ledger handlers ============

pub async fn mint(
    State(state): State<AppState>,
    Json(req): Json<MintRequest>,
) -> Result<Json<Value>, AppError> {
    if !state.mint(&req.identity, req.amount) {
        return Err(AppError::Unsupported("Minting needs the in-process ledger"));
    }
    let balance = state.ledger.balance_of(&req.identity).await?;
    Ok(Json(json!({ "identity": req.identity, "balance": balance })))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(identity): Path<Identity>,
) -> Result<Json<Value>, AppError> {
    let balance = state.ledger.balance_of(&identity).await?;
    Ok(Json(json!({ "identity": identity, "balance": balance })))
}

// ============ System handlers ============

/// Advance simulated time; mounted only on the in-process ledger
pub async fn tick(
    State(state): State<AppState>,
    Json(req): Json<TickRequest>,
) -> Result<Json<Value>, AppError> {
    let now = state.engine.advance_time(req.seconds)?;
    Ok(Json(json!({ "now": now.to_rfc3339() })))
}

pub async fn health() -> &'static str {
    "ok"
}
