use chrono::{DateTime, Utc};

use super::models::MatchRequest;

/// Decides whether two pending requests may be paired
///
/// Implementations must be symmetric: `compatible(a, b, now)` and
/// `compatible(b, a, now)` always agree.
pub trait TolerancePolicy: Send + Sync {
    fn compatible(&self, a: &MatchRequest, b: &MatchRequest, now: DateTime<Utc>) -> bool;
}

/// Rating difference must fit inside both players' deltas.
///
/// With `widen_per_minute > 0` each request's delta grows by that amount for
/// every full minute it has been waiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct RatingDeltaPolicy {
    pub widen_per_minute: i32,
}

impl RatingDeltaPolicy {
    pub fn new(widen_per_minute: i32) -> Self {
        Self { widen_per_minute }
    }

    pub fn effective_delta(&self, request: &MatchRequest, now: DateTime<Utc>) -> i64 {
        let waited_minutes = (now - request.created_at).num_minutes().max(0);
        i64::from(request.delta) + i64::from(self.widen_per_minute) * waited_minutes
    }
}

impl TolerancePolicy for RatingDeltaPolicy {
    fn compatible(&self, a: &MatchRequest, b: &MatchRequest, now: DateTime<Utc>) -> bool {
        let difference = (i64::from(a.rating) - i64::from(b.rating)).abs();
        let allowed = self
            .effective_delta(a, now)
            .min(self.effective_delta(b, now));
        difference <= allowed
    }
}
