use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument};

use super::service::MatchQueue;

/// Configuration for the background sweep
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// How often to run a pairing sweep
    pub sweep_interval: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(5),
        }
    }
}

/// Starts the background task that periodically pairs waiting requests.
///
/// Submissions already trigger a sweep; this loop picks up pairings that only
/// become possible later, such as widened tolerances, and expires stale
/// requests.
#[instrument(skip(queue))]
pub async fn start_sweep_task(queue: Arc<MatchQueue>, config: SweepConfig) {
    info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "Starting matchmaking sweep background task"
    );

    let mut sweep_interval = interval(config.sweep_interval);

    loop {
        sweep_interval.tick().await;
        run_once(&queue).await;
    }
}

async fn run_once(queue: &MatchQueue) {
    match queue.run_sweep().await {
        Ok(report) => {
            if !report.games_created.is_empty() || report.expired > 0 {
                info!(
                    games_created = report.games_created.len(),
                    expired = report.expired,
                    stale_pairings = report.stale_pairings,
                    "Matchmaking sweep completed"
                );
            }
        }
        Err(e) => {
            error!(error = %e, "Matchmaking sweep failed");
        }
    }
}
