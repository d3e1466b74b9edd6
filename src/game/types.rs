use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::core::{FinalScore, GameSession, GameState, MoveRecord, Ruleset, ScoringRule, Seat};

/// Request payload for creating a game directly, without matchmaking
#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    pub player_ids: Vec<String>,
    pub board_size: Option<u8>,
    #[serde(default)]
    pub auto_start: bool,
    pub scoring: Option<ScoringRule>,
    pub komi: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct SeatRequest {
    pub seat: usize,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub seat: usize,
    pub x: i32,
    pub y: i32,
}

/// Query string for GET /games
///
/// `state` and `ids` take comma separated lists.
#[derive(Debug, Default, Deserialize)]
pub struct ListGamesQuery {
    pub state: Option<String>,
    pub ids: Option<String>,
    pub player_id: Option<String>,
}

/// Full view of a game session
#[derive(Debug, Serialize, Deserialize)]
pub struct GameResponse {
    pub id: String,
    pub state: GameState,
    pub board_size: u8,
    pub seats: Vec<Seat>,
    pub current_turn: usize,
    pub consecutive_passes: u8,
    pub board: Vec<String>,
    pub history: Vec<MoveRecord>,
    pub ruleset: Ruleset,
    pub result: Option<FinalScore>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&GameSession> for GameResponse {
    fn from(session: &GameSession) -> Self {
        Self {
            id: session.id().to_string(),
            state: session.state(),
            board_size: session.board_size().into(),
            seats: session.seats().to_vec(),
            current_turn: session.current_turn(),
            consecutive_passes: session.consecutive_passes(),
            board: session.board().rows(),
            history: session.history().to_vec(),
            ruleset: session.ruleset(),
            result: session.result().copied(),
            version: session.version(),
            created_at: session.created_at(),
            updated_at: session.updated_at(),
        }
    }
}
