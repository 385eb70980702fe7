use async_trait::async_trait;

use verdict_stats::{PublicStats, StatsPoint};
use verdict_types::{Randomness, Result, RoundDetails};

/// Reads round details from the round contract.
#[async_trait]
pub trait RoundDetailsSource: Send + Sync {
    async fn fetch_round_details(&self, contract_address: &str, round_index: u64) -> Result<RoundDetails>;
}

/// Beacon output for a chain epoch. Must return the same value for the same
/// epoch once it is available.
#[async_trait]
pub trait RandomnessSource: Send + Sync {
    async fn fetch_randomness(&self, start_epoch: u64) -> Result<Randomness>;
}

/// Publishes a round's scores. `participants` and `scores` are aligned.
#[async_trait]
pub trait ScoreSubmitter: Send + Sync {
    async fn submit_scores(&self, round_index: u64, participants: &[String], scores: &[u64]) -> Result<()>;
}

#[async_trait]
pub trait TelemetryRecorder: Send + Sync {
    async fn record(&self, point: StatsPoint) -> Result<()>;
}

/// Stores the public daily aggregates. Merging with what is already stored
/// for the day is the store's concern.
#[async_trait]
pub trait PublicStatsStore: Send + Sync {
    async fn update(&self, round_index: u64, stats: &PublicStats) -> Result<()>;
}
