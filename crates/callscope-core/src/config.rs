//! Analysis configuration.
//!
//! Values come from the `[analysis]` table of `.callscope/config.toml` and can
//! be overridden by environment variables. Every field has a default, so an
//! absent file yields a usable configuration.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::query::{RetryPolicy, MAX_PATH_HOPS};

/// Default depth cap for tree traversal.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Tunables for one analysis run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Depth cap for call tree traversal.
    pub max_depth: usize,
    /// Hop bound for shortest call path queries.
    pub max_path_hops: usize,
    /// Attempts per structural query (including the first).
    pub query_attempts: u32,
    /// Per-attempt query timeout in milliseconds.
    pub query_timeout_ms: u64,
    /// Backoff before the second attempt, doubled afterwards.
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Deadline for scoring a whole run, in seconds.
    pub run_deadline_secs: u64,
    /// Reject the whole facts document on the first dangling reference.
    pub strict_ingest: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_path_hops: MAX_PATH_HOPS,
            query_attempts: 3,
            query_timeout_ms: 5_000,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
            run_deadline_secs: 300,
            strict_ingest: false,
        }
    }
}

impl AnalysisConfig {
    /// Parse the `[analysis]` table out of a TOML document.
    pub fn from_toml(raw: &str) -> CoreResult<Self> {
        #[derive(Deserialize, Default)]
        struct Root {
            #[serde(default)]
            analysis: AnalysisConfig,
        }

        let root: Root = toml::from_str(raw).map_err(|e| CoreError::Config(e.to_string()))?;
        Ok(root.analysis)
    }

    /// Apply `CALLSCOPE_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(depth) = env_parse::<usize>("CALLSCOPE_MAX_DEPTH") {
            self.max_depth = depth;
        }
        if let Some(hops) = env_parse::<usize>("CALLSCOPE_MAX_PATH_HOPS") {
            self.max_path_hops = hops;
        }
        if let Some(attempts) = env_parse::<u32>("CALLSCOPE_QUERY_ATTEMPTS") {
            self.query_attempts = attempts;
        }
        if let Some(timeout) = env_parse::<u64>("CALLSCOPE_QUERY_TIMEOUT_MS") {
            self.query_timeout_ms = timeout;
        }
        self
    }

    /// Retry policy for structural queries.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.query_attempts.max(1),
            timeout: Duration::from_millis(self.query_timeout_ms),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
