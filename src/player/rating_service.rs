use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Highest rating accepted by `set_rating`
pub const MAX_RATING: i32 = 10_000;

/// Service for player ratings consulted by matchmaking
///
/// Players without a stored rating are treated as having the configured
/// default rating; that fallback lives in the caller, not here.
#[async_trait]
pub trait PlayerRatingService: Send + Sync {
    /// Store or replace a player's rating
    async fn set_rating(&self, player_id: &str, rating: i32) -> Result<(), RatingError>;

    async fn get_rating(&self, player_id: &str) -> Option<i32>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RatingError {
    #[error("Player ID cannot be empty")]
    EmptyPlayerId,

    #[error("Rating {rating} is out of range")]
    OutOfRange { rating: i32 },
}

/// In-memory implementation of PlayerRatingService
pub struct InMemoryPlayerRatingService {
    ratings: Arc<RwLock<HashMap<String, i32>>>,
}

impl InMemoryPlayerRatingService {
    pub fn new() -> Self {
        Self {
            ratings: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryPlayerRatingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlayerRatingService for InMemoryPlayerRatingService {
    async fn set_rating(&self, player_id: &str, rating: i32) -> Result<(), RatingError> {
        if player_id.trim().is_empty() {
            return Err(RatingError::EmptyPlayerId);
        }
        if !(0..=MAX_RATING).contains(&rating) {
            return Err(RatingError::OutOfRange { rating });
        }

        let previous = self
            .ratings
            .write()
            .await
            .insert(player_id.to_string(), rating);

        info!(
            player_id = %player_id,
            rating,
            previous = ?previous,
            "Player rating stored"
        );

        Ok(())
    }

    async fn get_rating(&self, player_id: &str) -> Option<i32> {
        let result = self.ratings.read().await.get(player_id).copied();
        debug!(player_id = %player_id, rating = ?result, "Rating lookup");
        result
    }
}
