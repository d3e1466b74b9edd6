use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Pending,
    Matched,
    Cancelled,
}

/// A player's request to be paired with an opponent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub id: String,
    pub player_id: String,
    /// Largest rating difference the player accepts
    pub delta: i32,
    /// Player rating when the request was submitted
    pub rating: i32,
    pub status: MatchStatus,
    pub game_id: Option<String>,
    pub seat: Option<usize>,
    pub created_at: DateTime<Utc>,
}

impl MatchRequest {
    pub fn new(player_id: String, delta: i32, rating: i32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            player_id,
            delta,
            rating,
            status: MatchStatus::Pending,
            game_id: None,
            seat: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MatchStatus::Pending
    }

    /// Binds the request to a game. Only valid from PENDING.
    pub fn mark_matched(&mut self, game_id: &str, seat: usize) {
        assert!(
            self.is_pending(),
            "request {} matched from status {}",
            self.id,
            self.status
        );
        self.status = MatchStatus::Matched;
        self.game_id = Some(game_id.to_string());
        self.seat = Some(seat);
    }

    /// Only valid from PENDING.
    pub fn mark_cancelled(&mut self) {
        assert!(
            self.is_pending(),
            "request {} cancelled from status {}",
            self.id,
            self.status
        );
        self.status = MatchStatus::Cancelled;
    }

    /// Orders requests oldest first, ties broken by id
    pub fn queue_order(&self, other: &Self) -> std::cmp::Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}
