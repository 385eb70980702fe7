use serde::{Deserialize, Serialize};
use std::time::Duration;

use verdict_rewards::{DUST_ADDRESS, MAX_SCORE};

/// Settings for evaluating rounds. Every field has a default, so a partial
/// (or empty) config file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Committees smaller than this are not evaluated for consensus.
    #[serde(default = "default_required_committee_size")]
    pub required_committee_size: usize,

    #[serde(default)]
    pub fraud_detection: FraudDetection,

    /// Score budget split across participants each round.
    #[serde(default = "default_max_score")]
    pub max_score: u64,

    /// Receives whatever integer division leaves over.
    #[serde(default = "default_dust_address")]
    pub dust_address: String,

    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Whether measurements go through allocation, arbitration and consensus
/// before being rewarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FraudDetection {
    #[default]
    Full,
    /// Every measurement is accepted. Meant for trial deployments.
    Disabled,
}

impl std::fmt::Display for FraudDetection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FraudDetection::Full => f.write_str("full"),
            FraudDetection::Disabled => f.write_str("disabled"),
        }
    }
}

/// Bounded retries with exponential backoff for collaborator calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_required_committee_size() -> usize {
    30
}

fn default_max_score() -> u64 {
    MAX_SCORE
}

fn default_dust_address() -> String {
    DUST_ADDRESS.to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            required_committee_size: default_required_committee_size(),
            fraud_detection: FraudDetection::default(),
            max_score: default_max_score(),
            dust_address: default_dust_address(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once and never sleeps.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before the retry following failed attempt number `attempt`
    /// (0-based), doubling each time up to `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.pow(attempt.min(10));
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}
