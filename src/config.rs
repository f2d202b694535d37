//! Engine configuration.
//!
//! Defaults can be overridden from environment variables (a `.env` file is
//! loaded by the binary) and then from command-line flags.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_STEP_BUDGET: usize = 25;
pub const DEFAULT_OUTPUT_DIR: &str = "outputs/datasets";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of intents executed before forced finalization.
    pub step_budget: usize,
    /// Element resolution attempts per intent.
    pub locate_attempts: u32,
    /// Retries of an interaction after a transient failure.
    pub action_retries: u32,
    /// Linear backoff step between attempts.
    pub backoff_ms: u64,
    /// Upper bound for a single backoff sleep.
    pub backoff_cap_ms: u64,
    /// Consecutive failed intents before the run is aborted.
    pub abort_after_failures: u32,
    /// Sleep applied by `wait` intents.
    pub wait_ms: u64,
    /// Settle delay after navigation and interactions.
    pub settle_ms: u64,
    pub headless: bool,
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
            locate_attempts: 3,
            action_retries: 2,
            backoff_ms: 500,
            backoff_cap_ms: 2_000,
            abort_after_failures: 3,
            wait_ms: 1_000,
            settle_ms: 1_000,
            headless: false,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Config {
    /// Defaults overridden by `CAPTURE_*` environment variables. Values that
    /// fail to parse keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(v) = number("CAPTURE_STEP_BUDGET").and_then(|v| usize::try_from(v).ok()) {
            config.step_budget = v;
        }
        if let Some(v) = number("CAPTURE_LOCATE_ATTEMPTS").and_then(|v| u32::try_from(v).ok()) {
            config.locate_attempts = v;
        }
        if let Some(v) = number("CAPTURE_ACTION_RETRIES").and_then(|v| u32::try_from(v).ok()) {
            config.action_retries = v;
        }
        if let Some(v) = number("CAPTURE_BACKOFF_MS") {
            config.backoff_ms = v;
        }
        if let Some(v) = number("CAPTURE_BACKOFF_CAP_MS") {
            config.backoff_cap_ms = v;
        }
        if let Some(v) = number("CAPTURE_ABORT_AFTER_FAILURES").and_then(|v| u32::try_from(v).ok()) {
            config.abort_after_failures = v;
        }
        if let Some(v) = number("CAPTURE_WAIT_MS") {
            config.wait_ms = v;
        }
        if let Some(v) = number("CAPTURE_SETTLE_MS") {
            config.settle_ms = v;
        }
        if let Some(v) = lookup("HEADLESS") {
            config.headless = v.trim().eq_ignore_ascii_case("true");
        }
        if let Some(v) = lookup("CAPTURE_OUTPUT_DIR").filter(|v| !v.trim().is_empty()) {
            config.output_dir = PathBuf::from(v);
        }
        config
    }

    /// Backoff before attempt `attempt` (1-based): grows linearly, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ms = self
            .backoff_ms
            .saturating_mul(u64::from(attempt))
            .min(self.backoff_cap_ms);
        Duration::from_millis(ms)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// No sleeps at all. Used by tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            backoff_ms: 0,
            backoff_cap_ms: 0,
            wait_ms: 0,
            settle_ms: 0,
            ..Self::default()
        }
    }
}
