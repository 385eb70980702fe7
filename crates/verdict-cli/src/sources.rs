use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use verdict_evaluator::{RandomnessSource, RoundDetailsSource, ScoreSubmitter, TelemetryRecorder};
use verdict_stats::StatsPoint;
use verdict_types::{Randomness, RoundDetails, VerdictError};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RoundDetailsFile {
    Single(RoundDetails),
    /// Keyed by the decimal round index.
    PerRound(BTreeMap<String, RoundDetails>),
}

/// Round details read from a JSON file. A file holding a single object
/// answers for every round.
#[derive(Debug, Clone)]
pub struct FileRoundDetails {
    file: RoundDetailsFile,
}

impl FileRoundDetails {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read round details: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse round details: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(Self {
            file: serde_json::from_str(content)?,
        })
    }

    pub fn lookup(&self, round_index: u64) -> Option<&RoundDetails> {
        match &self.file {
            RoundDetailsFile::Single(details) => Some(details),
            RoundDetailsFile::PerRound(by_round) => by_round.get(&round_index.to_string()),
        }
    }
}

#[async_trait]
impl RoundDetailsSource for FileRoundDetails {
    async fn fetch_round_details(
        &self,
        contract_address: &str,
        round_index: u64,
    ) -> verdict_types::Result<RoundDetails> {
        debug!(contract_address, round_index, "Looking up round details");
        self.lookup(round_index)
            .cloned()
            .ok_or_else(|| VerdictError::RoundDetailsUnavailable {
                round_index,
                reason: "not present in the round details file".into(),
            })
    }
}

/// Randomness given on the command line, used for every epoch.
pub struct FixedRandomness(pub Option<Randomness>);

#[async_trait]
impl RandomnessSource for FixedRandomness {
    async fn fetch_randomness(&self, start_epoch: u64) -> verdict_types::Result<Randomness> {
        self.0.clone().ok_or_else(|| VerdictError::RandomnessUnavailable {
            start_epoch,
            reason: "no randomness given".into(),
        })
    }
}

/// Logs scores instead of submitting them.
pub struct DryRunSubmitter;

#[async_trait]
impl ScoreSubmitter for DryRunSubmitter {
    async fn submit_scores(
        &self,
        round_index: u64,
        participants: &[String],
        _scores: &[u64],
    ) -> verdict_types::Result<()> {
        info!(round_index, participants = participants.len(), "Dry run, scores not submitted");
        Ok(())
    }
}

/// Logs round statistics in line protocol at debug level.
pub struct LogTelemetry;

#[async_trait]
impl TelemetryRecorder for LogTelemetry {
    async fn record(&self, point: StatsPoint) -> verdict_types::Result<()> {
        debug!(round_index = point.round_index, line = %point.to_line(), "Round statistics");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAILS: &str = r#"{
        "roundId": 18024,
        "startEpoch": 4158303,
        "maxTasksPerNode": 15,
        "retrievalTasks": [{"cid": "bafk1", "minerId": "f02228866"}]
    }"#;

    #[tokio::test]
    async fn test_single_object_answers_every_round() {
        let source = FileRoundDetails::parse(DETAILS).unwrap();
        let details = source.fetch_round_details("0xc0ffee", 99).await.unwrap();
        assert_eq!(details.round_id, 18024);
        assert_eq!(details.retrieval_tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_per_round_map() {
        let source = FileRoundDetails::parse(&format!(r#"{{"7": {DETAILS}}}"#)).unwrap();
        assert!(source.fetch_round_details("", 7).await.is_ok());

        let err = source.fetch_round_details("", 8).await.unwrap_err();
        assert!(matches!(err, VerdictError::RoundDetailsUnavailable { round_index: 8, .. }));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(FileRoundDetails::parse("[1, 2]").is_err());
    }

    #[tokio::test]
    async fn test_missing_randomness() {
        let err = FixedRandomness(None).fetch_randomness(5).await.unwrap_err();
        assert!(matches!(err, VerdictError::RandomnessUnavailable { start_epoch: 5, .. }));
    }
}
