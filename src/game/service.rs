use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::{
    game::{
        board::{BoardSize, Point},
        core::{GameSession, GameState, MoveOutcome, Ruleset, SessionError},
        repository::GameSessionRepository,
    },
    shared::AppError,
};

/// Parameters for an explicitly created game
#[derive(Debug, Clone, Default)]
pub struct NewGame {
    pub player_ids: Vec<String>,
    pub board_size: Option<u8>,
    /// Start immediately instead of waiting for both seats to confirm
    pub auto_start: bool,
    pub ruleset: Option<Ruleset>,
}

/// Which sessions `list_games` should return. At most one filter may be set.
#[derive(Debug, Clone, Default)]
pub struct GameFilter {
    pub states: Option<Vec<GameState>>,
    pub ids: Option<Vec<String>>,
    pub player_id: Option<String>,
}

/// Service for game sessions
///
/// Every mutation follows the same path: take the per-session lock, load the
/// session, apply the operation to the loaded copy, bump its version and save
/// it. If the save fails the copy is dropped and the stored session is what it
/// was before the call.
pub struct GameService {
    repository: Arc<dyn GameSessionRepository + Send + Sync>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    lock_timeout: Duration,
    default_ruleset: Ruleset,
}

impl GameService {
    pub fn new(
        repository: Arc<dyn GameSessionRepository + Send + Sync>,
        default_ruleset: Ruleset,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            locks: Mutex::new(HashMap::new()),
            lock_timeout,
            default_ruleset,
        }
    }

    pub fn default_ruleset(&self) -> Ruleset {
        self.default_ruleset
    }

    /// Creates a new game between two players
    #[instrument(skip(self))]
    pub async fn create_game(&self, request: NewGame) -> Result<GameSession, AppError> {
        if request.player_ids.len() != 2 {
            return Err(AppError::BadRequest(
                "A game requires exactly 2 players".to_string(),
            ));
        }

        let mut unique_players = HashSet::new();
        for player in &request.player_ids {
            if player.trim().is_empty() {
                return Err(AppError::BadRequest(
                    "Player IDs cannot be empty".to_string(),
                ));
            }
            if !unique_players.insert(player.trim()) {
                return Err(AppError::BadRequest(
                    "Both player IDs must be different".to_string(),
                ));
            }
        }

        let board_size = match request.board_size {
            Some(size) => BoardSize::try_from(size)
                .map_err(|e| AppError::BadRequest(e.to_string()))?,
            None => BoardSize::default(),
        };

        let player_ids = [
            request.player_ids[0].trim().to_string(),
            request.player_ids[1].trim().to_string(),
        ];
        let ruleset = request.ruleset.unwrap_or(self.default_ruleset);
        if !ruleset.komi_fits(board_size) {
            return Err(AppError::BadRequest(format!(
                "Komi {} does not fit a {} board",
                ruleset.komi, board_size
            )));
        }

        let mut session = GameSession::new(board_size, player_ids, ruleset);
        if request.auto_start {
            session.start()?;
        }

        self.repository.create_session(&session).await?;

        info!(
            session_id = %session.id(),
            board_size = %board_size,
            state = %session.state(),
            "Game created"
        );

        Ok(session)
    }

    #[instrument(skip(self))]
    pub async fn get_game(&self, session_id: &str) -> Result<GameSession, AppError> {
        self.repository
            .load_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Game not found: {}", session_id)))
    }

    #[instrument(skip(self))]
    pub async fn list_games(&self, filter: GameFilter) -> Result<Vec<GameSession>, AppError> {
        let GameFilter {
            states,
            ids,
            player_id,
        } = filter;

        let games = match (states, ids, player_id) {
            (None, None, None) => {
                self.repository
                    .list_sessions_by_state(&[
                        GameState::Invitation,
                        GameState::InProgress,
                        GameState::Complete,
                    ])
                    .await?
            }
            (Some(states), None, None) => self.repository.list_sessions_by_state(&states).await?,
            (None, Some(ids), None) => self.repository.get_sessions_by_ids(&ids).await?,
            (None, None, Some(player_id)) => {
                self.repository.list_sessions_for_player(&player_id).await?
            }
            _ => {
                return Err(AppError::BadRequest(
                    "state, ids and player_id filters are mutually exclusive".to_string(),
                ))
            }
        };

        debug!(game_count = games.len(), "Games listed");
        Ok(games)
    }

    #[instrument(skip(self))]
    pub async fn confirm_seat(
        &self,
        session_id: &str,
        seat: usize,
    ) -> Result<GameSession, AppError> {
        let (state, session) = self
            .mutate(session_id, |session| session.confirm_seat(seat))
            .await?;

        info!(session_id = %session_id, seat, state = %state, "Seat confirmed");
        Ok(session)
    }

    #[instrument(skip(self))]
    pub async fn submit_move(
        &self,
        session_id: &str,
        seat: usize,
        x: i32,
        y: i32,
    ) -> Result<MoveOutcome, AppError> {
        let (outcome, _) = self
            .mutate(session_id, |session| {
                session.apply_move(seat, Point::new(x, y))
            })
            .await?;

        debug!(
            session_id = %session_id,
            move_number = outcome.move_number,
            captured = outcome.captures.len(),
            "Move applied"
        );
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn submit_pass(&self, session_id: &str, seat: usize) -> Result<MoveOutcome, AppError> {
        let (outcome, _) = self
            .mutate(session_id, |session| session.apply_pass(seat))
            .await?;

        if outcome.state == GameState::Complete {
            info!(session_id = %session_id, result = ?outcome.result, "Game completed by passes");
        }
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn resign(&self, session_id: &str, seat: usize) -> Result<MoveOutcome, AppError> {
        let (outcome, _) = self
            .mutate(session_id, |session| session.resign(seat))
            .await?;

        info!(session_id = %session_id, seat, "Seat resigned");
        Ok(outcome)
    }

    /// Runs `op` against the stored session under the session's lock and
    /// persists the result. Nothing is saved when `op` fails.
    async fn mutate<T, F>(&self, session_id: &str, op: F) -> Result<(T, GameSession), AppError>
    where
        F: FnOnce(&mut GameSession) -> Result<T, SessionError>,
    {
        let lock = self.session_lock(session_id).await;
        let result = self.mutate_locked(session_id, &lock, op).await;
        self.release_lock(session_id, lock).await;
        result
    }

    async fn mutate_locked<T, F>(
        &self,
        session_id: &str,
        lock: &Mutex<()>,
        op: F,
    ) -> Result<(T, GameSession), AppError>
    where
        F: FnOnce(&mut GameSession) -> Result<T, SessionError>,
    {
        let _guard = tokio::time::timeout(self.lock_timeout, lock.lock())
            .await
            .map_err(|_| {
                warn!(session_id = %session_id, "Timed out waiting for game session lock");
                AppError::SessionBusy(session_id.to_string())
            })?;

        let mut session = self.get_game(session_id).await?;
        let value = op(&mut session)?;

        session.mark_updated();
        self.repository.save_session(&session).await?;

        Ok((value, session))
    }

    async fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the map entry once no other caller holds or waits on the lock
    async fn release_lock(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        let unused = locks
            .get(session_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(&lock) == 2);
        if unused {
            locks.remove(session_id);
        }
        // Must go before the map guard so the next releaser sees the count drop
        drop(lock);
    }
}
