#![allow(dead_code)] // Not every test file uses every action

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use super::setup::TestSetup;

// ============================================================================
// Action Helpers
// ============================================================================

impl TestSetup {
    /// Send a request through the router and decode the JSON response
    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    // ============================================================================
    // Game Actions
    // ============================================================================

    /// Create a 9x9 game that is already in progress, returns its id
    pub async fn start_game(&self, black: &str, white: &str) -> String {
        let (status, game) = self
            .send(
                "POST",
                "/games",
                Some(json!({
                    "player_ids": [black, white],
                    "board_size": 9,
                    "auto_start": true,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create game failed: {}", game);
        game["id"].as_str().unwrap().to_string()
    }

    pub async fn get_game(&self, game_id: &str) -> Value {
        let (status, game) = self.send("GET", &format!("/games/{}", game_id), None).await;
        assert_eq!(status, StatusCode::OK);
        game
    }

    pub async fn play(&self, game_id: &str, seat: usize, x: i32, y: i32) -> (StatusCode, Value) {
        self.send(
            "POST",
            &format!("/games/{}/moves", game_id),
            Some(json!({ "seat": seat, "x": x, "y": y })),
        )
        .await
    }

    /// Play a sequence of points, alternating seats from seat 0, asserting
    /// every move is accepted
    pub async fn play_all(&self, game_id: &str, points: &[(i32, i32)]) {
        for (i, (x, y)) in points.iter().enumerate() {
            let (status, body) = self.play(game_id, i % 2, *x, *y).await;
            assert_eq!(status, StatusCode::OK, "move {} at ({}, {}): {}", i + 1, x, y, body);
        }
    }

    pub async fn pass(&self, game_id: &str, seat: usize) -> (StatusCode, Value) {
        self.send(
            "POST",
            &format!("/games/{}/pass", game_id),
            Some(json!({ "seat": seat })),
        )
        .await
    }

    pub async fn resign(&self, game_id: &str, seat: usize) -> (StatusCode, Value) {
        self.send(
            "POST",
            &format!("/games/{}/resign", game_id),
            Some(json!({ "seat": seat })),
        )
        .await
    }

    pub async fn ready(&self, game_id: &str, seat: usize) -> (StatusCode, Value) {
        self.send(
            "POST",
            &format!("/games/{}/ready", game_id),
            Some(json!({ "seat": seat })),
        )
        .await
    }

    // ============================================================================
    // Matchmaking Actions
    // ============================================================================

    pub async fn queue(&self, player_id: &str, delta: i32) -> Value {
        let (status, request) = self
            .send(
                "POST",
                "/matchmaking",
                Some(json!({ "player_id": player_id, "delta": delta })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "queue failed: {}", request);
        request
    }

    pub async fn get_request(&self, request_id: &str) -> Value {
        let (status, request) = self
            .send("GET", &format!("/matchmaking/{}", request_id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        request
    }

    pub async fn cancel(&self, request_id: &str) -> (StatusCode, Value) {
        self.send("DELETE", &format!("/matchmaking/{}", request_id), None)
            .await
    }
}
