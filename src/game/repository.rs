use async_trait::async_trait;
use sqlx::{types::Json, PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::game::core::{GameSession, GameState};
use crate::shared::AppError;

/// Durable storage for game sessions
///
/// `save_session` is a compare-and-swap on the session version: the caller
/// bumps the version before saving, and the write only lands if the stored
/// copy is exactly one version behind. A lost race is reported as
/// `AppError::SessionBusy` and leaves the stored session untouched.
#[async_trait]
pub trait GameSessionRepository {
    async fn create_session(&self, session: &GameSession) -> Result<(), AppError>;
    async fn load_session(&self, session_id: &str) -> Result<Option<GameSession>, AppError>;
    async fn save_session(&self, session: &GameSession) -> Result<(), AppError>;
    async fn list_sessions_by_state(
        &self,
        states: &[GameState],
    ) -> Result<Vec<GameSession>, AppError>;
    async fn get_sessions_by_ids(&self, ids: &[String]) -> Result<Vec<GameSession>, AppError>;
    async fn list_sessions_for_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<GameSession>, AppError>;
}

/// In-memory implementation of GameSessionRepository for development and testing
#[derive(Default)]
pub struct InMemoryGameSessionRepository {
    sessions: Arc<RwLock<HashMap<String, GameSession>>>,
}

impl InMemoryGameSessionRepository {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Inserts a new session. Used directly by the in-memory matchmaking
    /// store so pairing and session creation happen under one lock.
    pub(crate) async fn insert_new(&self, session: &GameSession) -> Result<(), AppError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session.id()) {
            warn!(session_id = %session.id(), "Game session already exists in memory");
            return Err(AppError::DatabaseError(
                "Game session already exists".to_string(),
            ));
        }
        sessions.insert(session.id().to_string(), session.clone());
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn sorted(mut sessions: Vec<GameSession>) -> Vec<GameSession> {
        sessions.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        sessions
    }
}

#[async_trait]
impl GameSessionRepository for InMemoryGameSessionRepository {
    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    async fn create_session(&self, session: &GameSession) -> Result<(), AppError> {
        debug!("Creating game session in memory");
        self.insert_new(session).await
    }

    #[instrument(skip(self))]
    async fn load_session(&self, session_id: &str) -> Result<Option<GameSession>, AppError> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(session_id).cloned();

        match &session {
            Some(s) => debug!(state = %s.state(), version = s.version(), "Game session found in memory"),
            None => debug!("Game session not found in memory"),
        }

        Ok(session)
    }

    #[instrument(skip(self, session), fields(session_id = %session.id(), version = session.version()))]
    async fn save_session(&self, session: &GameSession) -> Result<(), AppError> {
        let mut sessions = self.sessions.write().await;

        let stored = sessions
            .get(session.id())
            .ok_or_else(|| AppError::NotFound(format!("Game not found: {}", session.id())))?;

        if stored.version() != session.version() - 1 {
            warn!(
                stored_version = stored.version(),
                "Stale game session write rejected"
            );
            return Err(AppError::SessionBusy(session.id().to_string()));
        }

        sessions.insert(session.id().to_string(), session.clone());
        debug!("Game session saved in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_sessions_by_state(
        &self,
        states: &[GameState],
    ) -> Result<Vec<GameSession>, AppError> {
        let sessions = self.sessions.read().await;
        let matching = sessions
            .values()
            .filter(|s| states.contains(&s.state()))
            .cloned()
            .collect();
        Ok(Self::sorted(matching))
    }

    #[instrument(skip(self))]
    async fn get_sessions_by_ids(&self, ids: &[String]) -> Result<Vec<GameSession>, AppError> {
        let sessions = self.sessions.read().await;
        let matching = ids
            .iter()
            .filter_map(|id| sessions.get(id).cloned())
            .collect();
        Ok(Self::sorted(matching))
    }

    #[instrument(skip(self))]
    async fn list_sessions_for_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<GameSession>, AppError> {
        let sessions = self.sessions.read().await;
        let matching = sessions
            .values()
            .filter(|s| s.seat_for_player(player_id).is_some())
            .cloned()
            .collect();
        Ok(Self::sorted(matching))
    }
}

/// PostgreSQL implementation of the game session repository
///
/// Expects `games (id TEXT PRIMARY KEY, state TEXT, board_size SMALLINT,
/// version BIGINT, document JSONB, created_at TIMESTAMPTZ, updated_at
/// TIMESTAMPTZ)` and `game_players (game_id TEXT, player_id TEXT, seat
/// SMALLINT, color TEXT)`.
pub struct PostgresGameSessionRepository {
    pool: PgPool,
}

impl PostgresGameSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the game row and its seats inside an existing transaction
    pub(crate) async fn insert_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session: &GameSession,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO games (id, state, board_size, version, document, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(session.id())
        .bind(session.state().to_string())
        .bind(u8::from(session.board_size()) as i16)
        .bind(session.version())
        .bind(Json(session))
        .bind(session.created_at())
        .bind(session.updated_at())
        .execute(&mut **tx)
        .await?;

        for (index, seat) in session.seats().iter().enumerate() {
            sqlx::query(
                "INSERT INTO game_players (game_id, player_id, seat, color) VALUES ($1, $2, $3, $4)",
            )
            .bind(session.id())
            .bind(&seat.player_id)
            .bind(index as i16)
            .bind(seat.color.to_string())
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    fn decode_rows(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<GameSession>, AppError> {
        rows.into_iter()
            .map(|row| {
                row.try_get::<Json<GameSession>, _>("document")
                    .map(|json| json.0)
                    .map_err(|e| AppError::DatabaseError(e.to_string()))
            })
            .collect()
    }
}

fn db_error(e: sqlx::Error) -> AppError {
    warn!(error = %e, "Game session query failed");
    AppError::DatabaseError(e.to_string())
}

#[async_trait]
impl GameSessionRepository for PostgresGameSessionRepository {
    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    async fn create_session(&self, session: &GameSession) -> Result<(), AppError> {
        debug!("Creating game session in database");

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        Self::insert_in_tx(&mut tx, session).await.map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_session(&self, session_id: &str) -> Result<Option<GameSession>, AppError> {
        let row = sqlx::query("SELECT document FROM games WHERE id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        match row {
            Some(row) => Ok(Self::decode_rows(vec![row])?.pop()),
            None => {
                debug!("Game session not found in database");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, session), fields(session_id = %session.id(), version = session.version()))]
    async fn save_session(&self, session: &GameSession) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE games SET state = $2, version = $3, document = $4, updated_at = $5 WHERE id = $1 AND version = $6",
        )
        .bind(session.id())
        .bind(session.state().to_string())
        .bind(session.version())
        .bind(Json(session))
        .bind(session.updated_at())
        .bind(session.version() - 1)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM games WHERE id = $1")
                .bind(session.id())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?
                .is_some();

            if !exists {
                return Err(AppError::NotFound(format!("Game not found: {}", session.id())));
            }
            warn!("Stale game session write rejected");
            return Err(AppError::SessionBusy(session.id().to_string()));
        }

        debug!("Game session saved in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_sessions_by_state(
        &self,
        states: &[GameState],
    ) -> Result<Vec<GameSession>, AppError> {
        let states: Vec<String> = states.iter().map(ToString::to_string).collect();
        let rows = sqlx::query(
            "SELECT document FROM games WHERE state = ANY($1) ORDER BY created_at, id",
        )
        .bind(&states)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Self::decode_rows(rows)
    }

    #[instrument(skip(self))]
    async fn get_sessions_by_ids(&self, ids: &[String]) -> Result<Vec<GameSession>, AppError> {
        let rows =
            sqlx::query("SELECT document FROM games WHERE id = ANY($1) ORDER BY created_at, id")
                .bind(ids)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;

        Self::decode_rows(rows)
    }

    #[instrument(skip(self))]
    async fn list_sessions_for_player(
        &self,
        player_id: &str,
    ) -> Result<Vec<GameSession>, AppError> {
        let rows = sqlx::query(
            "SELECT g.document FROM games g JOIN game_players gp ON gp.game_id = g.id WHERE gp.player_id = $1 ORDER BY g.created_at, g.id",
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Self::decode_rows(rows)
    }
}
