use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use verdict_ledger::{AuditEntryKind, AuditLedger};
use verdict_rewards::{RewardAllocation, RewardAllocator};
use verdict_stats::{StatsPoint, build_public_stats, build_retrieval_stats, record_committee_sizes};
use verdict_types::{
    Measurement, Randomness, Result, RoundDetails, RoundRecord, TaskingEvaluation, VerdictError,
};

use crate::config::{EvaluatorConfig, FraudDetection};
use crate::pipeline::{
    FraudDetectionReport, rewarded_measurements, run_fraud_detection, run_without_fraud_detection,
};
use crate::retry::with_retry;
use crate::traits::{
    PublicStatsStore, RandomnessSource, RoundDetailsSource, ScoreSubmitter, TelemetryRecorder,
};

/// Everything submitted for one round.
#[derive(Debug, Clone)]
pub struct RoundInput {
    pub contract_address: String,
    pub round_index: u64,
    pub measurements: Vec<Measurement>,
}

/// Result of evaluating one round.
///
/// `ignored_errors` holds failures of the reporting steps that ran after
/// scores were computed. They never invalidate the scores.
#[derive(Debug)]
pub struct RoundEvaluation {
    pub round_index: u64,
    pub details: RoundDetails,
    /// Input measurements with their tasking and consensus annotations.
    pub measurements: Vec<Measurement>,
    pub report: FraudDetectionReport,
    pub rewards: RewardAllocation,
    pub stats_points: Vec<StatsPoint>,
    pub ignored_errors: Vec<VerdictError>,
}

impl RoundEvaluation {
    /// The replayable record of this round, as kept in the audit ledger.
    pub fn record(&self) -> RoundRecord {
        RoundRecord {
            round_index: self.round_index,
            details: self.details.clone(),
            measurements: self.measurements.clone(),
            scores: self.rewards.scores.clone(),
        }
    }
}

/// Evaluates rounds against injected collaborators.
pub struct Evaluator {
    config: EvaluatorConfig,
    round_details: Arc<dyn RoundDetailsSource>,
    randomness: Arc<dyn RandomnessSource>,
    submitter: Arc<dyn ScoreSubmitter>,
    telemetry: Arc<dyn TelemetryRecorder>,
    public_stats: Option<Arc<dyn PublicStatsStore>>,
    ledger: Option<Arc<dyn AuditLedger>>,
}

impl Evaluator {
    pub fn new(
        config: EvaluatorConfig,
        round_details: Arc<dyn RoundDetailsSource>,
        randomness: Arc<dyn RandomnessSource>,
        submitter: Arc<dyn ScoreSubmitter>,
        telemetry: Arc<dyn TelemetryRecorder>,
    ) -> Self {
        Self {
            config,
            round_details,
            randomness,
            submitter,
            telemetry,
            public_stats: None,
            ledger: None,
        }
    }

    pub fn with_public_stats(mut self, store: Arc<dyn PublicStatsStore>) -> Self {
        self.public_stats = Some(store);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn AuditLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate one round and hand the results to the collaborators.
    ///
    /// Fails without side effects when round details or randomness cannot be
    /// obtained, or a measurement lacks a required field. Once scores are
    /// computed, every later failure is logged and collected instead.
    pub async fn evaluate_round(&self, input: RoundInput) -> Result<RoundEvaluation> {
        let RoundInput {
            contract_address,
            round_index,
            mut measurements,
        } = input;
        info!(
            round_index,
            measurements = measurements.len(),
            fraud_detection = %self.config.fraud_detection,
            "Evaluating round"
        );

        let details = self.fetch_round_details(&contract_address, round_index).await?;

        let started = Instant::now();
        let report = match self.config.fraud_detection {
            FraudDetection::Full => {
                let randomness = self.fetch_randomness(details.start_epoch).await?;
                run_fraud_detection(
                    round_index,
                    &mut measurements,
                    &details,
                    &randomness,
                    self.config.required_committee_size,
                )?
            }
            FraudDetection::Disabled => run_without_fraud_detection(
                round_index,
                &mut measurements,
                self.config.required_committee_size,
            )?,
        };
        let fraud_detection_duration = started.elapsed();

        let allocator = RewardAllocator::new(self.config.max_score, self.config.dust_address.as_str());
        let rewards = allocator.allocate(rewarded_measurements(&measurements, self.config.fraud_detection))?;
        info!(
            round_index,
            participants = rewards.scores.len(),
            rewarded_measurements = rewards.rewarded_measurements,
            dust = rewards.dust,
            "Computed scores"
        );

        let mut ignored_errors = Vec::new();

        let started = Instant::now();
        if let Err(e) = self.submit_scores(round_index, &rewards).await {
            ignored_errors.push(e);
        }
        let set_scores_duration = started.elapsed();

        let stats_points = vec![
            evaluate_point(
                round_index,
                &measurements,
                &report,
                &rewards,
                fraud_detection_duration,
                set_scores_duration,
            ),
            retrieval_point(
                "retrieval_stats_honest",
                round_index,
                measurements.iter().filter(|m| m.is_tasking_ok()),
            ),
            retrieval_point("retrieval_stats_all", round_index, measurements.iter()),
            committees_point(round_index, &report, &measurements),
        ];
        for point in &stats_points {
            if let Err(e) = self.telemetry.record(point.clone()).await {
                warn!(round_index, point = %point.name, error = %e, "Cannot record round statistics");
                ignored_errors.push(as_statistics_error(e));
            }
        }

        if let Some(store) = &self.public_stats {
            let public = build_public_stats(&report.committees, &measurements, &details);
            if let Err(e) = store.update(round_index, &public).await {
                warn!(round_index, error = %e, "Cannot update public statistics");
                ignored_errors.push(as_statistics_error(e));
            }
        }

        let mut evaluation = RoundEvaluation {
            round_index,
            details,
            measurements,
            report,
            rewards,
            stats_points,
            ignored_errors,
        };

        let payload = serde_json::to_value(evaluation.record()).map_err(VerdictError::from);
        if let Err(e) = self
            .audit(AuditEntryKind::RoundEvaluated, round_index, payload)
            .await
        {
            warn!(round_index, error = %e, "Cannot record round in audit ledger");
            evaluation.ignored_errors.push(e);
        }

        info!(
            round_index,
            ignored_errors = evaluation.ignored_errors.len(),
            "Round evaluated"
        );
        Ok(evaluation)
    }

    async fn fetch_round_details(&self, contract_address: &str, round_index: u64) -> Result<RoundDetails> {
        let source = &self.round_details;
        with_retry(&self.config.retry, "fetch_round_details", move || {
            source.fetch_round_details(contract_address, round_index)
        })
        .await
        .map_err(|e| match e {
            VerdictError::RoundDetailsUnavailable { .. } => e,
            other => VerdictError::RoundDetailsUnavailable {
                round_index,
                reason: other.to_string(),
            },
        })
    }

    async fn fetch_randomness(&self, start_epoch: u64) -> Result<Randomness> {
        let source = &self.randomness;
        with_retry(&self.config.retry, "fetch_randomness", move || {
            source.fetch_randomness(start_epoch)
        })
        .await
        .map_err(|e| match e {
            VerdictError::RandomnessUnavailable { .. } | VerdictError::MalformedRandomness(_) => e,
            other => VerdictError::RandomnessUnavailable {
                start_epoch,
                reason: other.to_string(),
            },
        })
    }

    async fn submit_scores(&self, round_index: u64, rewards: &RewardAllocation) -> Result<()> {
        let (participants, scores) = rewards.scores.to_submission();
        let submitter = &self.submitter;
        let (addresses, values) = (&participants, &scores);
        let submitted = with_retry(&self.config.retry, "submit_scores", move || {
            submitter.submit_scores(round_index, addresses, values)
        })
        .await;

        match submitted {
            Ok(()) => {
                info!(round_index, participants = participants.len(), "Submitted scores");
                let payload = serde_json::json!({
                    "participants": participants.len(),
                    "rewardedMeasurements": rewards.rewarded_measurements,
                    "dust": rewards.dust,
                });
                if let Err(e) = self
                    .audit(AuditEntryKind::ScoresSubmitted, round_index, Ok(payload))
                    .await
                {
                    warn!(round_index, error = %e, "Cannot record score submission in audit ledger");
                }
                Ok(())
            }
            Err(e) => {
                error!(round_index, error = %e, "Cannot submit scores");
                let payload = serde_json::json!({ "error": e.to_string() });
                if let Err(ledger_err) = self
                    .audit(AuditEntryKind::ScoreSubmissionFailed, round_index, Ok(payload))
                    .await
                {
                    warn!(round_index, error = %ledger_err, "Cannot record failed submission in audit ledger");
                }
                Err(match e {
                    VerdictError::ScoreSubmission(_) => e,
                    other => VerdictError::ScoreSubmission(other.to_string()),
                })
            }
        }
    }

    async fn audit(
        &self,
        kind: AuditEntryKind,
        round_index: u64,
        payload: Result<serde_json::Value>,
    ) -> Result<()> {
        let Some(ledger) = &self.ledger else {
            return Ok(());
        };
        ledger.record(kind, round_index, payload?).await?;
        Ok(())
    }
}

fn as_statistics_error(e: VerdictError) -> VerdictError {
    match e {
        VerdictError::Statistics(_) => e,
        other => VerdictError::Statistics(other.to_string()),
    }
}

/// Headline counters and timings of a round.
pub fn evaluate_point(
    round_index: u64,
    measurements: &[Measurement],
    report: &FraudDetectionReport,
    rewards: &RewardAllocation,
    fraud_detection_duration: Duration,
    set_scores_duration: Duration,
) -> StatsPoint {
    let nodes: HashSet<String> = measurements.iter().map(|m| m.node_key()).collect();

    let mut point = StatsPoint::new("evaluate", round_index);
    point
        .count_field("total_participants", rewards.scores.len())
        .count_field("total_measurements", measurements.len())
        .count_field("total_nodes", nodes.len())
        .count_field("honest_measurements", rewards.rewarded_measurements)
        .int_field("set_scores_duration_ms", millis(set_scores_duration))
        .int_field("fraud_detection_duration_ms", millis(fraud_detection_duration));
    for (stage, duration) in report.timings.stages() {
        point.int_field(format!("fraud_detection_timings_{stage}_ms"), millis(duration));
    }
    for outcome in TaskingEvaluation::ALL {
        point.count_field(format!("measurements_{outcome}"), report.tasking.count(outcome));
    }
    point
}

fn retrieval_point<'a>(
    name: &str,
    round_index: u64,
    measurements: impl IntoIterator<Item = &'a Measurement>,
) -> StatsPoint {
    let mut point = StatsPoint::new(name, round_index);
    build_retrieval_stats(measurements, &mut point);
    point
}

fn committees_point(round_index: u64, report: &FraudDetectionReport, measurements: &[Measurement]) -> StatsPoint {
    let mut point = StatsPoint::new("committees", round_index);
    record_committee_sizes(&report.committees, measurements, &mut point);
    point
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
