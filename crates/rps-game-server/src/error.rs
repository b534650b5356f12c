//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ledger_core::LedgerError;
use rps_game_core::GameError;

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Game(GameError),
    Ledger(LedgerError),
    MissingPlayer,
    BadRandomnessToken,
    NotFound(String),
    Unsupported(&'static str),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Game(e) => match e {
                GameError::InvalidWager { .. }
                | GameError::EmptyCommitment
                | GameError::WagerMismatch { .. }
                | GameError::CommitmentMismatch
                | GameError::SelfJoin
                | GameError::InvalidTimeStep(_) => StatusCode::BAD_REQUEST,
                GameError::EscrowFailure(_) => StatusCode::PAYMENT_REQUIRED,
                GameError::NotParticipant(_) => StatusCode::FORBIDDEN,
                GameError::UnknownRequest(_) => StatusCode::NOT_FOUND,
                GameError::IllegalState { state, .. } if state == "absent" => StatusCode::NOT_FOUND,
                GameError::IllegalState { .. }
                | GameError::DuplicateGame(_)
                | GameError::DeadlineNotReached(_) => StatusCode::CONFLICT,
                GameError::RandomnessFailure(_) | GameError::PayoutFailed(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            },
            AppError::Ledger(_) => StatusCode::BAD_GATEWAY,
            AppError::MissingPlayer | AppError::BadRandomnessToken => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Game(e) => e.kind(),
            AppError::Ledger(_) => "ledger_error",
            AppError::MissingPlayer => "missing_player",
            AppError::BadRandomnessToken => "bad_randomness_token",
            AppError::NotFound(_) => "not_found",
            AppError::Unsupported(_) => "unsupported",
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Game(e) => e.to_string(),
            AppError::Ledger(e) => e.to_string(),
            AppError::MissingPlayer => "Missing X-Player-Id header".to_string(),
            AppError::BadRandomnessToken => {
                "Missing or wrong X-Randomness-Token header".to_string()
            }
            AppError::NotFound(what) => format!("{} not found", what),
            AppError::Unsupported(what) => what.to_string(),
        }
    }
}

impl From<GameError> for AppError {
    fn from(e: GameError) -> Self {
        AppError::Game(e)
    }
}

impl From<LedgerError> for AppError {
    fn from(e: LedgerError) -> Self {
        AppError::Ledger(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(kind = self.kind(), "{}", self.message());
        }
        let body = Json(serde_json::json!({
            "error": self.message(),
            "kind": self.kind(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::Identity;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Game(GameError::CommitmentMismatch), StatusCode::BAD_REQUEST),
            (
                AppError::Game(GameError::EscrowFailure(LedgerError::InvalidAmount)),
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                AppError::Game(GameError::NotParticipant(Identity::from("mallory"))),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::Game(GameError::DuplicateGame(Identity::from("alice"))),
                StatusCode::CONFLICT,
            ),
            (
                AppError::Game(GameError::IllegalState {
                    operation: "reveal",
                    state: "absent".to_string(),
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Game(GameError::IllegalState {
                    operation: "reveal",
                    state: "joined".to_string(),
                }),
                StatusCode::CONFLICT,
            ),
            (AppError::MissingPlayer, StatusCode::UNAUTHORIZED),
            (AppError::BadRandomnessToken, StatusCode::UNAUTHORIZED),
            (
                AppError::Game(GameError::InvalidTimeStep(i64::MAX)),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{:?}", error);
        }
    }
}
