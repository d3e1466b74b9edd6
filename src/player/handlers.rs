use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::shared::{AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RatingResponse {
    pub player_id: String,
    pub rating: i32,
}

/// PUT /players/:id/rating
#[instrument(name = "set_rating", skip(state))]
pub async fn set_rating(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Json(request): Json<RatingRequest>,
) -> Result<Json<RatingResponse>, AppError> {
    state
        .ratings
        .set_rating(&player_id, request.rating)
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    info!(player_id = %player_id, rating = request.rating, "Rating updated");

    Ok(Json(RatingResponse {
        player_id,
        rating: request.rating,
    }))
}

/// GET /players/:id/rating
#[instrument(name = "get_rating", skip(state))]
pub async fn get_rating(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<RatingResponse>, AppError> {
    let rating = state
        .ratings
        .get_rating(&player_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No rating for player: {}", player_id)))?;

    Ok(Json(RatingResponse { player_id, rating }))
}
