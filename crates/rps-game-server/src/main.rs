//! RPS Game Service
//!
//! HTTP front end for the escrowed rock-paper-scissors engine.

mod error;
mod handlers;
mod state;

use axum::{
    routing::{get, post},
    Router,
};
use rps_game_core::{EngineConfig, GameEvent};
use std::net::SocketAddr;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use handlers::*;
use state::{AppState, RandomnessMode};

/// House balance minted on the in-process ledger when none is configured
const DEFAULT_HOUSE_FUNDS: u64 = 1_000_000;

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clock control is for demos against the in-process ledger only
    let system = if state.mock_ledger.is_some() {
        Router::new().route("/api/system/tick", post(tick))
    } else {
        Router::new()
    };

    Router::new()
        // Games
        .route("/api/games", post(create_game))
        .route("/api/games/open", get(list_open_games))
        .route("/api/games/reveal-opponent", post(reveal_opponent_move))
        .route("/api/games/:initiator", get(get_game))
        .route("/api/games/:initiator/commit", post(commit_move))
        .route("/api/games/:initiator/join", post(join_game))
        .route("/api/games/:initiator/reveal", post(reveal_move))
        .route("/api/games/:initiator/cancel", post(cancel_game))
        .route("/api/games/:initiator/timeout", post(claim_timeout))
        .route("/api/games/:initiator/payouts/retry", post(retry_payouts))
        // Randomness callbacks
        .route("/api/randomness/:request_id/fulfill", post(fulfill_randomness))
        .route("/api/randomness/:request_id/fail", post(fail_randomness))
        // Ledger
        .route("/api/ledger/mint", post(mint))
        .route("/api/ledger/:identity", get(get_balance))
        // System
        .route("/api/health", get(health))
        .merge(system)
        .layer(cors)
        .with_state(state)
}

async fn log_events(mut events: broadcast::Receiver<GameEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => tracing::debug!(game_id = %event.game_id(), "event {}", json),
                Err(e) => tracing::warn!(error = %e, "unserializable event"),
            },
            Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "event log lagging"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env()?;

    let randomness = match std::env::var("RPS_RANDOMNESS") {
        Ok(value) => RandomnessMode::parse(&value)
            .ok_or_else(|| format!("RPS_RANDOMNESS: expected local or external, got {:?}", value))?,
        Err(_) => RandomnessMode::Local,
    };
    tracing::info!(?randomness, "Randomness source selected");

    let token = std::env::var("RPS_RANDOMNESS_TOKEN")
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if token.is_none() && randomness == RandomnessMode::External {
        return Err("RPS_RANDOMNESS_TOKEN must be set for external randomness".into());
    }

    let state = if let Ok(url) = std::env::var("LEDGER_RPC_URL") {
        AppState::with_rpc_ledger(config, randomness, url)?
    } else {
        tracing::info!("Ledger RPC not configured (set LEDGER_RPC_URL to enable)");
        let house_funds = match std::env::var("RPS_HOUSE_FUNDS") {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|_| format!("RPS_HOUSE_FUNDS: cannot parse {:?}", value))?,
            Err(_) => DEFAULT_HOUSE_FUNDS,
        };
        AppState::with_mock_ledger(config, randomness, house_funds)?
    };
    let state = match token {
        Some(token) => state.with_randomness_token(token),
        None => state,
    };

    tokio::spawn(log_events(state.engine.subscribe()));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("RPS game service starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
