use serde::Deserialize;

/// Request payload for joining the matchmaking queue
#[derive(Debug, Deserialize)]
pub struct MatchRequestBody {
    pub player_id: String,
    /// Largest acceptable rating difference
    #[serde(default)]
    pub delta: i32,
}
