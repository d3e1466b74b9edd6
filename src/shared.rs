use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use crate::game::{BoardError, GameService, SessionError};
use crate::matchmaking::MatchQueue;
use crate::player::PlayerRatingService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub game_service: Arc<GameService>,
    pub match_queue: Arc<MatchQueue>,
    pub ratings: Arc<dyn PlayerRatingService>,
}

impl AppState {
    pub fn new(
        game_service: Arc<GameService>,
        match_queue: Arc<MatchQueue>,
        ratings: Arc<dyn PlayerRatingService>,
    ) -> Self {
        Self {
            game_service,
            match_queue,
            ratings,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Game(#[from] SessionError),

    /// Another writer holds the session; safe to retry
    #[error("Game session is busy: {0}")]
    SessionBusy(String),

    #[error("Match request already matched: {0}")]
    AlreadyMatched(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Stable machine-readable error code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Game(SessionError::NotYourTurn { .. }) => "NOT_YOUR_TURN",
            AppError::Game(SessionError::GameNotActive { .. }) => "GAME_NOT_ACTIVE",
            AppError::Game(SessionError::InvalidSeat(_)) => "INVALID_SEAT",
            AppError::Game(SessionError::AlreadyConfirmed(_)) => "ALREADY_CONFIRMED",
            AppError::Game(SessionError::Board(board)) => match board {
                BoardError::OutOfBounds { .. } => "OUT_OF_BOUNDS",
                BoardError::Occupied { .. } => "OCCUPIED",
                BoardError::Suicide => "SUICIDE",
                BoardError::PositionRepeated => "POSITION_REPEATED",
                BoardError::UnsupportedSize(_) => "UNSUPPORTED_SIZE",
            },
            AppError::SessionBusy(_) => "SESSION_BUSY",
            AppError::AlreadyMatched(_) => "ALREADY_MATCHED",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Game(SessionError::Board(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Game(SessionError::InvalidSeat(_)) => StatusCode::BAD_REQUEST,
            AppError::Game(_) => StatusCode::CONFLICT,
            AppError::SessionBusy(_) | AppError::AlreadyMatched(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::DatabaseError(msg) => {
                // Store details stay in the logs
                error!(error = %msg, "Database error");
                "Database error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}
