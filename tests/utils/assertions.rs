//! Test assertion helpers
#![allow(dead_code)] // Test utilities may not all be used in every test

use axum::http::StatusCode;
use serde_json::Value;

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert a response failed with the given status and error code
pub fn assert_error(response: &(StatusCode, Value), status: StatusCode, code: &str) {
    assert_eq!(
        response.0, status,
        "expected {} {}, got body {}",
        status, code, response.1
    );
    assert_eq!(response.1["code"], code, "wrong error code in {}", response.1);
}

/// Assert the game's board matches a diagram of `.`, `B` and `W` rows.
/// Only the rows given are compared.
pub fn assert_board(game: &Value, rows: &[&str]) {
    let board = game["board"].as_array().expect("game has no board");
    for (y, expected) in rows.iter().enumerate() {
        assert_eq!(
            board[y].as_str().unwrap(),
            *expected,
            "row {} differs",
            y
        );
    }
}

/// Assert the game is waiting for `seat` to move
pub fn assert_turn(game: &Value, seat: usize) {
    assert_eq!(game["state"], "IN_PROGRESS");
    assert_eq!(game["current_turn"], seat, "wrong seat to move");
}
