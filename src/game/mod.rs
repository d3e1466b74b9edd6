// Public API
pub use board::{Board, BoardError, BoardSize, CaptureSet, Chain, Color, Point, PointTotals};
pub use core::{
    FinalScore, GameOutcome, GameSession, GameState, MoveAction, MoveOutcome, MoveRecord,
    Ruleset, ScoringRule, Seat, SessionError,
};
pub use handlers::{confirm_seat, create_game, get_game, list_games, resign, submit_move, submit_pass};
pub use repository::{
    GameSessionRepository, InMemoryGameSessionRepository, PostgresGameSessionRepository,
};
pub use service::{GameFilter, GameService, NewGame};
pub use types::GameResponse;

// Internal modules
pub mod board;
pub mod core;
mod handlers;
pub mod repository;
mod service;
mod types;
