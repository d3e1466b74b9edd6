use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::game::{board::BoardSize, core::Ruleset};

/// Server configuration, read from the environment with defaults
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// PostgreSQL connection string. In-memory stores are used when unset.
    pub database_url: Option<String>,
    pub sweep_interval: Duration,
    pub request_ttl: Option<Duration>,
    pub widen_per_minute: i32,
    pub session_lock_timeout: Duration,
    pub default_rating: i32,
    pub ruleset: Ruleset,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_url: None,
            sweep_interval: Duration::from_secs(5),
            request_ttl: None,
            widen_per_minute: 0,
            session_lock_timeout: Duration::from_millis(2000),
            default_rating: 1500,
            ruleset: Ruleset::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset, unparsable or out of
    /// range values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let ruleset = Ruleset {
            scoring: parse_var(&lookup, "SCORING_RULE").unwrap_or(defaults.ruleset.scoring),
            komi: parse_var(&lookup, "KOMI").unwrap_or(defaults.ruleset.komi),
        };
        // The default ruleset applies to every board size
        let ruleset = if ruleset.komi_fits(BoardSize::Nine) {
            ruleset
        } else {
            warn!(komi = ruleset.komi, "Ignoring KOMI larger than the smallest board");
            Ruleset {
                komi: defaults.ruleset.komi,
                ..ruleset
            }
        };

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            sweep_interval: parse_var(&lookup, "MATCH_SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            request_ttl: parse_var(&lookup, "MATCH_REQUEST_TTL_SECS").map(Duration::from_secs),
            widen_per_minute: parse_var(&lookup, "MATCH_WIDEN_PER_MINUTE")
                .unwrap_or(defaults.widen_per_minute),
            session_lock_timeout: parse_var(&lookup, "SESSION_LOCK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.session_lock_timeout),
            default_rating: parse_var(&lookup, "DEFAULT_RATING")
                .unwrap_or(defaults.default_rating),
            ruleset,
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}
