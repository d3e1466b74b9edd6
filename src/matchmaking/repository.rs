use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::models::{MatchRequest, MatchStatus};
use crate::game::core::GameSession;
use crate::game::repository::{InMemoryGameSessionRepository, PostgresGameSessionRepository};
use crate::shared::AppError;

/// Result of attempting to cancel a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelResult {
    /// The request was pending and is now cancelled
    Cancelled(MatchRequest),
    /// The request had already been cancelled; nothing changed
    AlreadyCancelled(MatchRequest),
    /// The request was consumed by a pairing first
    AlreadyMatched(MatchRequest),
    NotFound,
}

/// Result of attempting to record a pairing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingResult {
    /// Both requests are now MATCHED and the session exists
    Paired,
    /// At least one request was no longer pending; nothing was written
    Stale,
}

/// Trait for matchmaking request storage
#[async_trait]
pub trait MatchRequestRepository {
    async fn create_request(&self, request: &MatchRequest) -> Result<(), AppError>;
    async fn get_request(&self, request_id: &str) -> Result<Option<MatchRequest>, AppError>;

    /// Pending requests, oldest first, ties broken by id
    async fn load_pending_requests(&self) -> Result<Vec<MatchRequest>, AppError>;

    /// Atomically cancels a pending request
    async fn cancel_request(&self, request_id: &str) -> Result<CancelResult, AppError>;

    /// Atomically re-checks that both requests are still pending, creates the
    /// session and marks both requests MATCHED against it. Seats are taken
    /// from the session's seat for each request's player.
    async fn save_request_match(
        &self,
        first_id: &str,
        second_id: &str,
        session: &GameSession,
    ) -> Result<PairingResult, AppError>;

    /// Cancels every pending request created before `older_than`.
    /// Returns the number of requests cancelled.
    async fn expire_requests(&self, older_than: DateTime<Utc>) -> Result<u64, AppError>;
}

/// In-memory implementation of MatchRequestRepository
///
/// Pairings write the new session into the shared in-memory session store
/// while the request map is locked.
pub struct InMemoryMatchRequestRepository {
    requests: Mutex<HashMap<String, MatchRequest>>,
    sessions: Arc<InMemoryGameSessionRepository>,
}

impl InMemoryMatchRequestRepository {
    pub fn new(sessions: Arc<InMemoryGameSessionRepository>) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            sessions,
        }
    }
}

#[async_trait]
impl MatchRequestRepository for InMemoryMatchRequestRepository {
    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn create_request(&self, request: &MatchRequest) -> Result<(), AppError> {
        let mut requests = self.requests.lock().await;
        if requests.contains_key(&request.id) {
            warn!("Match request already exists in memory");
            return Err(AppError::DatabaseError(
                "Match request already exists".to_string(),
            ));
        }
        requests.insert(request.id.clone(), request.clone());
        debug!(player_id = %request.player_id, "Match request stored in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_request(&self, request_id: &str) -> Result<Option<MatchRequest>, AppError> {
        Ok(self.requests.lock().await.get(request_id).cloned())
    }

    #[instrument(skip(self))]
    async fn load_pending_requests(&self) -> Result<Vec<MatchRequest>, AppError> {
        let requests = self.requests.lock().await;
        let mut pending: Vec<MatchRequest> = requests
            .values()
            .filter(|r| r.is_pending())
            .cloned()
            .collect();
        pending.sort_by(MatchRequest::queue_order);
        Ok(pending)
    }

    #[instrument(skip(self))]
    async fn cancel_request(&self, request_id: &str) -> Result<CancelResult, AppError> {
        let mut requests = self.requests.lock().await;

        let Some(request) = requests.get_mut(request_id) else {
            debug!("Match request not found for cancellation");
            return Ok(CancelResult::NotFound);
        };

        let result = match request.status {
            MatchStatus::Pending => {
                request.mark_cancelled();
                CancelResult::Cancelled(request.clone())
            }
            MatchStatus::Cancelled => CancelResult::AlreadyCancelled(request.clone()),
            MatchStatus::Matched => CancelResult::AlreadyMatched(request.clone()),
        };
        Ok(result)
    }

    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    async fn save_request_match(
        &self,
        first_id: &str,
        second_id: &str,
        session: &GameSession,
    ) -> Result<PairingResult, AppError> {
        let mut requests = self.requests.lock().await;

        let mut seats = Vec::with_capacity(2);
        for id in [first_id, second_id] {
            let seat = requests
                .get(id)
                .filter(|r| r.is_pending())
                .and_then(|r| session.seat_for_player(&r.player_id));
            match seat {
                Some(seat) => seats.push((id, seat)),
                None => {
                    debug!(request_id = %id, "Request no longer pending, pairing is stale");
                    return Ok(PairingResult::Stale);
                }
            }
        }

        self.sessions.insert_new(session).await?;

        for (id, seat) in seats {
            if let Some(request) = requests.get_mut(id) {
                request.mark_matched(session.id(), seat);
            }
        }

        Ok(PairingResult::Paired)
    }

    #[instrument(skip(self))]
    async fn expire_requests(&self, older_than: DateTime<Utc>) -> Result<u64, AppError> {
        let mut requests = self.requests.lock().await;
        let mut expired = 0;

        for request in requests.values_mut() {
            if request.is_pending() && request.created_at < older_than {
                request.mark_cancelled();
                expired += 1;
                debug!(request_id = %request.id, player_id = %request.player_id, "Match request expired");
            }
        }

        Ok(expired)
    }
}

/// PostgreSQL implementation of MatchRequestRepository
///
/// Expects `matchmaking_requests (id TEXT PRIMARY KEY, player_id TEXT, delta
/// INTEGER, rating INTEGER, status TEXT, game_id TEXT NULL, seat SMALLINT NULL,
/// created_at TIMESTAMPTZ)`.
pub struct PostgresMatchRequestRepository {
    pool: PgPool,
}

impl PostgresMatchRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn request_from_row(row: &PgRow) -> Result<MatchRequest, AppError> {
        let status: String = row.try_get("status").map_err(db_error)?;
        let status = MatchStatus::from_str(&status)
            .map_err(|_| AppError::DatabaseError(format!("Unknown request status: {}", status)))?;
        let seat: Option<i16> = row.try_get("seat").map_err(db_error)?;

        Ok(MatchRequest {
            id: row.try_get("id").map_err(db_error)?,
            player_id: row.try_get("player_id").map_err(db_error)?,
            delta: row.try_get("delta").map_err(db_error)?,
            rating: row.try_get("rating").map_err(db_error)?,
            status,
            game_id: row.try_get("game_id").map_err(db_error)?,
            seat: seat.map(|s| s as usize),
            created_at: row.try_get("created_at").map_err(db_error)?,
        })
    }
}

const REQUEST_COLUMNS: &str = "id, player_id, delta, rating, status, game_id, seat, created_at";

fn db_error(e: sqlx::Error) -> AppError {
    warn!(error = %e, "Match request query failed");
    AppError::DatabaseError(e.to_string())
}

#[async_trait]
impl MatchRequestRepository for PostgresMatchRequestRepository {
    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn create_request(&self, request: &MatchRequest) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO matchmaking_requests (id, player_id, delta, rating, status, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&request.id)
        .bind(&request.player_id)
        .bind(request.delta)
        .bind(request.rating)
        .bind(request.status.to_string())
        .bind(request.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        debug!(player_id = %request.player_id, "Match request stored in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_request(&self, request_id: &str) -> Result<Option<MatchRequest>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM matchmaking_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(Self::request_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn load_pending_requests(&self) -> Result<Vec<MatchRequest>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM matchmaking_requests WHERE status = $1 ORDER BY created_at, id",
            REQUEST_COLUMNS
        ))
        .bind(MatchStatus::Pending.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(Self::request_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn cancel_request(&self, request_id: &str) -> Result<CancelResult, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM matchmaking_requests WHERE id = $1 FOR UPDATE",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(CancelResult::NotFound);
        };
        let mut request = Self::request_from_row(&row)?;

        let result = match request.status {
            MatchStatus::Pending => {
                sqlx::query("UPDATE matchmaking_requests SET status = $2 WHERE id = $1")
                    .bind(request_id)
                    .bind(MatchStatus::Cancelled.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error)?;
                request.mark_cancelled();
                CancelResult::Cancelled(request)
            }
            MatchStatus::Cancelled => CancelResult::AlreadyCancelled(request),
            MatchStatus::Matched => CancelResult::AlreadyMatched(request),
        };

        tx.commit().await.map_err(db_error)?;
        Ok(result)
    }

    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    async fn save_request_match(
        &self,
        first_id: &str,
        second_id: &str,
        session: &GameSession,
    ) -> Result<PairingResult, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let ids = vec![first_id.to_string(), second_id.to_string()];
        let rows = sqlx::query(&format!(
            "SELECT {} FROM matchmaking_requests WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            REQUEST_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error)?;

        let requests = rows
            .iter()
            .map(Self::request_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let mut seats = Vec::with_capacity(2);
        for request in &requests {
            match session.seat_for_player(&request.player_id) {
                Some(seat) if request.is_pending() => seats.push((request.id.clone(), seat)),
                _ => {
                    debug!(request_id = %request.id, "Request no longer pending, pairing is stale");
                    return Ok(PairingResult::Stale);
                }
            }
        }
        if seats.len() != 2 {
            return Ok(PairingResult::Stale);
        }

        PostgresGameSessionRepository::insert_in_tx(&mut tx, session)
            .await
            .map_err(db_error)?;

        for (id, seat) in seats {
            sqlx::query(
                "UPDATE matchmaking_requests SET status = $2, game_id = $3, seat = $4 WHERE id = $1",
            )
            .bind(&id)
            .bind(MatchStatus::Matched.to_string())
            .bind(session.id())
            .bind(seat as i16)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(PairingResult::Paired)
    }

    #[instrument(skip(self))]
    async fn expire_requests(&self, older_than: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE matchmaking_requests SET status = $1 WHERE status = $2 AND created_at < $3",
        )
        .bind(MatchStatus::Cancelled.to_string())
        .bind(MatchStatus::Pending.to_string())
        .bind(older_than)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        let expired = result.rows_affected();
        if expired > 0 {
            info!(expired, "Expired stale match requests");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::BoardSize;
    use crate::game::core::Ruleset;
    use crate::game::repository::GameSessionRepository;
    use chrono::Duration;

    fn create_repo() -> (InMemoryMatchRequestRepository, Arc<InMemoryGameSessionRepository>) {
        let sessions = Arc::new(InMemoryGameSessionRepository::new());
        (InMemoryMatchRequestRepository::new(Arc::clone(&sessions)), sessions)
    }

    fn session_for(black: &str, white: &str) -> GameSession {
        GameSession::new(
            BoardSize::Nineteen,
            [black.to_string(), white.to_string()],
            Ruleset::default(),
        )
    }

    #[tokio::test]
    async fn test_pending_requests_are_oldest_first() {
        let (repo, _) = create_repo();
        let now = Utc::now();

        let mut newer = MatchRequest::new("bob".to_string(), 100, 1500);
        newer.created_at = now;
        let mut older = MatchRequest::new("alice".to_string(), 100, 1500);
        older.created_at = now - Duration::seconds(30);

        repo.create_request(&newer).await.unwrap();
        repo.create_request(&older).await.unwrap();

        let pending = repo.load_pending_requests().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, older.id);
        assert_eq!(pending[1].id, newer.id);
    }

    #[tokio::test]
    async fn test_cancel_request_results() {
        let (repo, _) = create_repo();
        let request = MatchRequest::new("alice".to_string(), 100, 1500);
        repo.create_request(&request).await.unwrap();

        assert!(matches!(
            repo.cancel_request(&request.id).await.unwrap(),
            CancelResult::Cancelled(_)
        ));
        assert!(matches!(
            repo.cancel_request(&request.id).await.unwrap(),
            CancelResult::AlreadyCancelled(_)
        ));
        assert_eq!(
            repo.cancel_request("missing").await.unwrap(),
            CancelResult::NotFound
        );
        assert!(repo.load_pending_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_request_match_marks_both() {
        let (repo, sessions) = create_repo();
        let alice = MatchRequest::new("alice".to_string(), 100, 1500);
        let bob = MatchRequest::new("bob".to_string(), 100, 1500);
        repo.create_request(&alice).await.unwrap();
        repo.create_request(&bob).await.unwrap();

        let session = session_for("bob", "alice");
        let result = repo
            .save_request_match(&alice.id, &bob.id, &session)
            .await
            .unwrap();
        assert_eq!(result, PairingResult::Paired);

        let alice = repo.get_request(&alice.id).await.unwrap().unwrap();
        let bob = repo.get_request(&bob.id).await.unwrap().unwrap();
        assert_eq!(alice.status, MatchStatus::Matched);
        assert_eq!(alice.game_id.as_deref(), Some(session.id()));
        assert_eq!(alice.seat, Some(1));
        assert_eq!(bob.seat, Some(0));

        assert!(sessions.load_session(session.id()).await.unwrap().is_some());
        assert!(matches!(
            repo.cancel_request(&alice.id).await.unwrap(),
            CancelResult::AlreadyMatched(_)
        ));
    }

    #[tokio::test]
    async fn test_save_request_match_is_stale_after_cancel() {
        let (repo, sessions) = create_repo();
        let alice = MatchRequest::new("alice".to_string(), 100, 1500);
        let bob = MatchRequest::new("bob".to_string(), 100, 1500);
        repo.create_request(&alice).await.unwrap();
        repo.create_request(&bob).await.unwrap();
        repo.cancel_request(&bob.id).await.unwrap();

        let session = session_for("alice", "bob");
        let result = repo
            .save_request_match(&alice.id, &bob.id, &session)
            .await
            .unwrap();

        assert_eq!(result, PairingResult::Stale);
        assert_eq!(sessions.session_count().await, 0);
        let alice = repo.get_request(&alice.id).await.unwrap().unwrap();
        assert!(alice.is_pending());
    }

    #[tokio::test]
    async fn test_expire_requests() {
        let (repo, _) = create_repo();
        let now = Utc::now();

        let mut stale = MatchRequest::new("alice".to_string(), 100, 1500);
        stale.created_at = now - Duration::minutes(10);
        let fresh = MatchRequest::new("bob".to_string(), 100, 1500);
        repo.create_request(&stale).await.unwrap();
        repo.create_request(&fresh).await.unwrap();

        let expired = repo
            .expire_requests(now - Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(expired, 1);

        let stale = repo.get_request(&stale.id).await.unwrap().unwrap();
        assert_eq!(stale.status, MatchStatus::Cancelled);
        let pending = repo.load_pending_requests().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, fresh.id);
    }
}
