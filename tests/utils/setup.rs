use axum::Router;
use std::time::Duration;

use tengen::{build_state, create_router, AppConfig, AppState};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub app: Router,
    pub state: AppState,
}

pub struct TestSetupBuilder {
    config: AppConfig,
    ratings: Vec<(String, i32)>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig {
                session_lock_timeout: Duration::from_millis(500),
                ..AppConfig::default()
            },
            ratings: vec![],
        }
    }

    #[allow(dead_code)]
    pub fn with_rating(mut self, player_id: &str, rating: i32) -> Self {
        self.ratings.push((player_id.to_string(), rating));
        self
    }

    #[allow(dead_code)]
    pub fn with_request_ttl(mut self, ttl: Duration) -> Self {
        self.config.request_ttl = Some(ttl);
        self
    }

    #[allow(dead_code)]
    pub fn with_komi(mut self, komi: i32) -> Self {
        self.config.ruleset.komi = komi;
        self
    }

    pub async fn build(self) -> TestSetup {
        // Always in-memory, whatever the environment says
        let config = AppConfig {
            database_url: None,
            ..self.config
        };
        let state = build_state(&config).await.unwrap();

        for (player_id, rating) in &self.ratings {
            state.ratings.set_rating(player_id, *rating).await.unwrap();
        }

        TestSetup {
            app: create_router(state.clone()),
            state,
        }
    }
}
