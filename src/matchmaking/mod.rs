// Public API
pub use handlers::{cancel_match_request, get_match_request, submit_match_request};
pub use models::{MatchRequest, MatchStatus};
pub use repository::{
    CancelResult, InMemoryMatchRequestRepository, MatchRequestRepository, PairingResult,
    PostgresMatchRequestRepository,
};
pub use service::{find_pairs, MatchQueue, MatchQueueConfig, SweepReport};
pub use sweep_task::{start_sweep_task, SweepConfig};
pub use tolerance::{RatingDeltaPolicy, TolerancePolicy};

// Internal modules
mod handlers;
pub mod models;
pub mod repository;
mod service;
mod sweep_task;
pub mod tolerance;
mod types;
