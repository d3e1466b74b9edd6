// Library crate for the tengen game server
// This file exposes the public API for the binary and integration tests

pub mod config;
pub mod game;
pub mod matchmaking;
pub mod player;
pub mod shared;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use game::{
    GameService, GameSessionRepository, InMemoryGameSessionRepository,
    PostgresGameSessionRepository,
};
use matchmaking::{
    InMemoryMatchRequestRepository, MatchQueue, MatchQueueConfig, MatchRequestRepository,
    PostgresMatchRequestRepository, RatingDeltaPolicy,
};
use player::InMemoryPlayerRatingService;

// Re-export commonly used types for easier access in tests
pub use config::AppConfig;
pub use game::{GameSession, GameState};
pub use matchmaking::{MatchRequest, MatchStatus};
pub use shared::{AppError, AppState};

/// Builds the HTTP router over the given state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/games", post(game::create_game).get(game::list_games))
        .route("/games/:id", get(game::get_game))
        .route("/games/:id/ready", post(game::confirm_seat))
        .route("/games/:id/moves", post(game::submit_move))
        .route("/games/:id/pass", post(game::submit_pass))
        .route("/games/:id/resign", post(game::resign))
        .route("/matchmaking", post(matchmaking::submit_match_request))
        .route(
            "/matchmaking/:id",
            get(matchmaking::get_match_request).delete(matchmaking::cancel_match_request),
        )
        .route(
            "/players/:id/rating",
            put(player::set_rating).get(player::get_rating),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wires services over PostgreSQL when `database_url` is set, otherwise over
/// in-memory stores
pub async fn build_state(config: &AppConfig) -> Result<AppState, sqlx::Error> {
    let game_repository: Arc<dyn GameSessionRepository + Send + Sync>;
    let request_repository: Arc<dyn MatchRequestRepository + Send + Sync>;

    match &config.database_url {
        Some(url) => {
            info!("Using PostgreSQL stores");
            let pool = sqlx::PgPool::connect(url).await?;
            game_repository = Arc::new(PostgresGameSessionRepository::new(pool.clone()));
            request_repository = Arc::new(PostgresMatchRequestRepository::new(pool));
        }
        None => {
            info!("DATABASE_URL not set, using in-memory stores");
            let sessions = Arc::new(InMemoryGameSessionRepository::new());
            game_repository = sessions.clone();
            request_repository = Arc::new(InMemoryMatchRequestRepository::new(sessions));
        }
    }

    let ratings = Arc::new(InMemoryPlayerRatingService::new());

    let game_service = Arc::new(GameService::new(
        game_repository,
        config.ruleset,
        config.session_lock_timeout,
    ));
    let match_queue = Arc::new(MatchQueue::new(
        request_repository,
        ratings.clone(),
        Arc::new(RatingDeltaPolicy::new(config.widen_per_minute)),
        MatchQueueConfig {
            request_ttl: config.request_ttl,
            default_rating: config.default_rating,
            ruleset: config.ruleset,
            ..Default::default()
        },
    ));

    Ok(AppState::new(game_service, match_queue, ratings))
}
