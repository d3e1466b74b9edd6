use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{
    models::MatchRequest,
    repository::{CancelResult, MatchRequestRepository, PairingResult},
    tolerance::TolerancePolicy,
};
use crate::{
    game::{board::BoardSize, core::GameSession, core::Ruleset},
    player::PlayerRatingService,
    shared::AppError,
};

/// Settings for the matchmaking queue
#[derive(Debug, Clone)]
pub struct MatchQueueConfig {
    /// Pending requests older than this are cancelled during a sweep
    pub request_ttl: Option<Duration>,
    /// Rating used for players with no stored rating
    pub default_rating: i32,
    pub board_size: BoardSize,
    pub ruleset: Ruleset,
}

impl Default for MatchQueueConfig {
    fn default() -> Self {
        Self {
            request_ttl: None,
            default_rating: 1500,
            board_size: BoardSize::Nineteen,
            ruleset: Ruleset::default(),
        }
    }
}

/// What a single sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Ids of the game sessions created
    pub games_created: Vec<String>,
    /// Pairings abandoned because a request changed underneath the sweep
    pub stale_pairings: usize,
    pub expired: u64,
}

/// Pending match requests and the pairing sweep over them
///
/// Sweeps on one queue never overlap. The store re-checks that both requests
/// are still pending when a pairing is saved, which also covers queues in
/// other processes sharing the same database.
pub struct MatchQueue {
    requests: Arc<dyn MatchRequestRepository + Send + Sync>,
    ratings: Arc<dyn PlayerRatingService>,
    policy: Arc<dyn TolerancePolicy>,
    config: MatchQueueConfig,
    sweep_lock: Mutex<()>,
}

impl MatchQueue {
    pub fn new(
        requests: Arc<dyn MatchRequestRepository + Send + Sync>,
        ratings: Arc<dyn PlayerRatingService>,
        policy: Arc<dyn TolerancePolicy>,
        config: MatchQueueConfig,
    ) -> Self {
        Self {
            requests,
            ratings,
            policy,
            config,
            sweep_lock: Mutex::new(()),
        }
    }

    /// Queues a request for `player_id` and immediately runs a sweep.
    ///
    /// The returned request reflects the sweep: it is already MATCHED when a
    /// compatible opponent was waiting. Once the request is stored, sweep
    /// errors are logged and the request is returned as PENDING.
    #[instrument(skip(self))]
    pub async fn submit_match_request(
        &self,
        player_id: &str,
        delta: i32,
    ) -> Result<MatchRequest, AppError> {
        let player_id = player_id.trim();
        if player_id.is_empty() {
            return Err(AppError::BadRequest(
                "Player ID cannot be empty".to_string(),
            ));
        }
        if delta < 0 {
            return Err(AppError::BadRequest(
                "Delta must not be negative".to_string(),
            ));
        }

        let rating = self
            .ratings
            .get_rating(player_id)
            .await
            .unwrap_or(self.config.default_rating);

        let request = MatchRequest::new(player_id.to_string(), delta, rating);
        self.requests.create_request(&request).await?;

        info!(
            request_id = %request.id,
            player_id = %player_id,
            delta,
            rating,
            "Match request queued"
        );

        // The request is stored; a failed sweep leaves it pending for the next one
        if let Err(e) = self.run_sweep().await {
            warn!(request_id = %request.id, error = %e, "Sweep after submission failed");
            return Ok(request);
        }

        match self.requests.get_request(&request.id).await {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => Ok(request),
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "Could not reload match request");
                Ok(request)
            }
        }
    }

    /// Cancels a pending request. Cancelling twice is not an error.
    #[instrument(skip(self))]
    pub async fn cancel_match_request(&self, request_id: &str) -> Result<MatchRequest, AppError> {
        match self.requests.cancel_request(request_id).await? {
            CancelResult::Cancelled(request) => {
                info!(request_id = %request_id, "Match request cancelled");
                Ok(request)
            }
            CancelResult::AlreadyCancelled(request) => {
                debug!(request_id = %request_id, "Match request was already cancelled");
                Ok(request)
            }
            CancelResult::AlreadyMatched(request) => {
                warn!(
                    request_id = %request_id,
                    game_id = ?request.game_id,
                    "Cannot cancel a matched request"
                );
                Err(AppError::AlreadyMatched(request_id.to_string()))
            }
            CancelResult::NotFound => Err(AppError::NotFound(format!(
                "Match request not found: {}",
                request_id
            ))),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_match_request(&self, request_id: &str) -> Result<MatchRequest, AppError> {
        self.requests
            .get_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Match request not found: {}", request_id)))
    }

    /// Expires stale requests, then pairs what is left, oldest first
    #[instrument(skip(self))]
    pub async fn run_sweep(&self) -> Result<SweepReport, AppError> {
        let _sweep = self.sweep_lock.lock().await;
        let now = Utc::now();
        let mut report = SweepReport::default();

        if let Some(cutoff) = self.expiry_cutoff(now) {
            report.expired = self.requests.expire_requests(cutoff).await?;
        }

        let pending = self.requests.load_pending_requests().await?;
        let pairs = find_pairs(&pending, self.policy.as_ref(), now);
        debug!(
            pending = pending.len(),
            candidate_pairs = pairs.len(),
            "Pairing sweep"
        );

        for (first, second) in pairs {
            let (first, second) = (&pending[first], &pending[second]);

            let mut players = [first.player_id.clone(), second.player_id.clone()];
            players.shuffle(&mut rand::rng());
            let session = GameSession::new(self.config.board_size, players, self.config.ruleset);

            match self
                .requests
                .save_request_match(&first.id, &second.id, &session)
                .await?
            {
                PairingResult::Paired => {
                    info!(
                        session_id = %session.id(),
                        black = %session.seats()[0].player_id,
                        white = %session.seats()[1].player_id,
                        "Players paired"
                    );
                    report.games_created.push(session.id().to_string());
                }
                PairingResult::Stale => {
                    debug!(
                        first = %first.id,
                        second = %second.id,
                        "Pairing skipped, request no longer pending"
                    );
                    report.stale_pairings += 1;
                }
            }
        }

        Ok(report)
    }

    fn expiry_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(self.config.request_ttl?).ok()?;
        now.checked_sub_signed(ttl)
    }
}

/// Greedy pairing over requests sorted oldest first.
///
/// Each unmatched request takes the first later request from a different
/// player that the policy accepts. Returns index pairs into `pending`.
pub fn find_pairs(
    pending: &[MatchRequest],
    policy: &dyn TolerancePolicy,
    now: DateTime<Utc>,
) -> Vec<(usize, usize)> {
    let mut taken = vec![false; pending.len()];
    let mut pairs = Vec::new();

    for i in 0..pending.len() {
        if taken[i] {
            continue;
        }
        let candidate = (i + 1..pending.len()).find(|&j| {
            !taken[j]
                && pending[j].player_id != pending[i].player_id
                && policy.compatible(&pending[i], &pending[j], now)
        });
        if let Some(j) = candidate {
            taken[i] = true;
            taken[j] = true;
            pairs.push((i, j));
        }
    }

    pairs
}
