use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::str::FromStr;
use tracing::{info, instrument};

use super::{
    core::{GameState, MoveOutcome, Ruleset},
    service::{GameFilter, NewGame},
    types::{CreateGameRequest, GameResponse, ListGamesQuery, MoveRequest, SeatRequest},
};
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a game between two known players
///
/// POST /games
#[instrument(name = "create_game", skip(state))]
pub async fn create_game(
    State(state): State<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<GameResponse>), AppError> {
    let defaults = state.game_service.default_ruleset();
    let ruleset = Ruleset {
        scoring: request.scoring.unwrap_or(defaults.scoring),
        komi: request.komi.unwrap_or(defaults.komi),
    };

    let game = state
        .game_service
        .create_game(NewGame {
            player_ids: request.player_ids,
            board_size: request.board_size,
            auto_start: request.auto_start,
            ruleset: Some(ruleset),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(GameResponse::from(&game))))
}

/// GET /games
#[instrument(name = "list_games", skip(state))]
pub async fn list_games(
    State(state): State<AppState>,
    Query(query): Query<ListGamesQuery>,
) -> Result<Json<Vec<GameResponse>>, AppError> {
    let states = query
        .state
        .as_deref()
        .map(|raw| {
            split_list(raw)
                .map(|s| {
                    GameState::from_str(s)
                        .map_err(|_| AppError::BadRequest(format!("Unknown game state: {}", s)))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;
    let ids = query
        .ids
        .as_deref()
        .map(|raw| split_list(raw).map(String::from).collect());

    let games = state
        .game_service
        .list_games(GameFilter {
            states,
            ids,
            player_id: query.player_id,
        })
        .await?;

    Ok(Json(games.iter().map(GameResponse::from).collect()))
}

/// GET /games/:id
#[instrument(name = "get_game", skip(state))]
pub async fn get_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Json<GameResponse>, AppError> {
    let game = state.game_service.get_game(&game_id).await?;
    Ok(Json(GameResponse::from(&game)))
}

/// POST /games/:id/ready
#[instrument(name = "confirm_seat", skip(state))]
pub async fn confirm_seat(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(request): Json<SeatRequest>,
) -> Result<Json<GameResponse>, AppError> {
    let game = state
        .game_service
        .confirm_seat(&game_id, request.seat)
        .await?;
    Ok(Json(GameResponse::from(&game)))
}

/// POST /games/:id/moves
#[instrument(name = "submit_move", skip(state))]
pub async fn submit_move(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<MoveOutcome>, AppError> {
    let outcome = state
        .game_service
        .submit_move(&game_id, request.seat, request.x, request.y)
        .await?;
    Ok(Json(outcome))
}

/// POST /games/:id/pass
#[instrument(name = "submit_pass", skip(state))]
pub async fn submit_pass(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(request): Json<SeatRequest>,
) -> Result<Json<MoveOutcome>, AppError> {
    let outcome = state
        .game_service
        .submit_pass(&game_id, request.seat)
        .await?;
    Ok(Json(outcome))
}

/// POST /games/:id/resign
#[instrument(name = "resign", skip(state))]
pub async fn resign(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Json(request): Json<SeatRequest>,
) -> Result<Json<MoveOutcome>, AppError> {
    let outcome = state.game_service.resign(&game_id, request.seat).await?;
    info!(game_id = %game_id, seat = request.seat, "Resignation accepted");
    Ok(Json(outcome))
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::AppStateBuilder;
    use axum::{
        body::Body,
        http::Request,
        routing::{get, post},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt; // for `oneshot`

    fn create_app(state: AppState) -> Router {
        Router::new()
            .route("/games", post(create_game).get(list_games))
            .route("/games/:id", get(get_game))
            .route("/games/:id/ready", post(confirm_seat))
            .route("/games/:id/moves", post(submit_move))
            .route("/games/:id/pass", post(submit_pass))
            .route("/games/:id/resign", post(resign))
            .with_state(state)
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn create_started_game(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/games",
                r#"{"player_ids": ["alice", "bob"], "board_size": 9, "auto_start": true}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_create_game_handler() {
        let app = create_app(AppStateBuilder::new().build());

        let response = app
            .oneshot(json_request(
                "POST",
                "/games",
                r#"{"player_ids": ["alice", "bob"], "board_size": 13, "komi": 6}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let game: GameResponse = serde_json::from_slice(
            &axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(game.state, GameState::Invitation);
        assert_eq!(game.board_size, 13);
        assert_eq!(game.board.len(), 13);
        assert_eq!(game.ruleset.komi, 6);
        assert_eq!(game.seats[0].player_id, "alice");
    }

    #[tokio::test]
    async fn test_create_game_handler_rejects_single_player() {
        let app = create_app(AppStateBuilder::new().build());

        let response = app
            .oneshot(json_request("POST", "/games", r#"{"player_ids": ["alice"]}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_move_handlers_map_errors() {
        let app = create_app(AppStateBuilder::new().build());
        let game_id = create_started_game(&app).await;
        let moves_uri = format!("/games/{}/moves", game_id);

        let response = app
            .clone()
            .oneshot(json_request("POST", &moves_uri, r#"{"seat": 0, "x": 4, "y": 4}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let outcome = body_json(response).await;
        assert_eq!(outcome["move_number"], 1);
        assert_eq!(outcome["current_turn"], 1);

        // Same point again by the right seat
        let response = app
            .clone()
            .oneshot(json_request("POST", &moves_uri, r#"{"seat": 1, "x": 4, "y": 4}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["code"], "OCCUPIED");

        // Wrong seat
        let response = app
            .clone()
            .oneshot(json_request("POST", &moves_uri, r#"{"seat": 0, "x": 1, "y": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], "NOT_YOUR_TURN");

        let response = app
            .clone()
            .oneshot(json_request("POST", &moves_uri, r#"{"seat": 1, "x": 40, "y": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["code"], "OUT_OF_BOUNDS");
    }

    #[tokio::test]
    async fn test_pass_and_resign_handlers() {
        let app = create_app(AppStateBuilder::new().build());
        let game_id = create_started_game(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/games/{}/pass", game_id),
                r#"{"seat": 0}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["consecutive_passes"], 1);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/games/{}/resign", game_id),
                r#"{"seat": 0}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let outcome = body_json(response).await;
        assert_eq!(outcome["state"], "COMPLETE");
        assert_eq!(outcome["result"]["outcome"]["seat"], 1);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/games/{}", game_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let game = body_json(response).await;
        assert_eq!(game["state"], "COMPLETE");
        assert_eq!(game["history"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_confirm_seat_handler() {
        let app = create_app(AppStateBuilder::new().build());
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/games",
                r#"{"player_ids": ["alice", "bob"], "board_size": 9}"#,
            ))
            .await
            .unwrap();
        let game_id = body_json(response).await["id"]
            .as_str()
            .unwrap()
            .to_string();
        let ready_uri = format!("/games/{}/ready", game_id);

        for seat in [0, 1] {
            let response = app
                .clone()
                .oneshot(json_request("POST", &ready_uri, &format!(r#"{{"seat": {}}}"#, seat)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(json_request("POST", &ready_uri, r#"{"seat": 0}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["code"], "GAME_NOT_ACTIVE");
    }

    #[tokio::test]
    async fn test_list_games_handler() {
        let app = create_app(AppStateBuilder::new().build());
        create_started_game(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/games?state=IN_PROGRESS")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/games?state=SLEEPING")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/games?state=IN_PROGRESS&player_id=alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_unknown_game() {
        let app = create_app(AppStateBuilder::new().build());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/games/does-not-exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    }
}
