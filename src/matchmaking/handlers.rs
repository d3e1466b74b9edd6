use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use super::{models::MatchRequest, types::MatchRequestBody};
use crate::shared::{AppError, AppState};

/// HTTP handler for joining the matchmaking queue
///
/// POST /matchmaking
/// Returns the request, already MATCHED if an opponent was waiting
#[instrument(name = "submit_match_request", skip(state))]
pub async fn submit_match_request(
    State(state): State<AppState>,
    Json(body): Json<MatchRequestBody>,
) -> Result<(StatusCode, Json<MatchRequest>), AppError> {
    let request = state
        .match_queue
        .submit_match_request(&body.player_id, body.delta)
        .await?;

    info!(
        request_id = %request.id,
        status = %request.status,
        "Match request submitted"
    );

    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /matchmaking/:id
#[instrument(name = "get_match_request", skip(state))]
pub async fn get_match_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<MatchRequest>, AppError> {
    let request = state.match_queue.get_match_request(&request_id).await?;
    Ok(Json(request))
}

/// DELETE /matchmaking/:id
#[instrument(name = "cancel_match_request", skip(state))]
pub async fn cancel_match_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<MatchRequest>, AppError> {
    let request = state.match_queue.cancel_match_request(&request_id).await?;
    Ok(Json(request))
}
