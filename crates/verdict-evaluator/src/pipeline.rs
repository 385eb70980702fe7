use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use verdict_committee::{Committee, evaluate_committees, group_into_committees};
use verdict_tasking::{TaskingSummary, allocate_tasks, evaluate_inet_groups, evaluate_tasking};
use verdict_types::{
    Measurement, Randomness, Result, RoundDetails, TaskingEvaluation, check_required_fields,
};

use crate::config::FraudDetection;

/// Wall-clock time spent in each fraud-detection stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FraudDetectionTimings {
    pub task_building: Duration,
    pub tasking_evaluation: Duration,
    pub inet_groups_evaluation: Duration,
    pub majority_evaluation: Duration,
}

impl FraudDetectionTimings {
    /// Stage names paired with their durations, in pipeline order.
    pub fn stages(&self) -> [(&'static str, Duration); 4] {
        [
            ("task_building", self.task_building),
            ("tasking_evaluation", self.tasking_evaluation),
            ("inet_groups_evaluation", self.inet_groups_evaluation),
            ("majority_evaluation", self.majority_evaluation),
        ]
    }

    pub fn total(&self) -> Duration {
        self.stages().iter().map(|(_, d)| *d).sum()
    }
}

/// What a fraud-detection run leaves behind besides the annotations it
/// writes onto the measurements.
#[derive(Debug, Clone)]
pub struct FraudDetectionReport {
    pub committees: Vec<Committee>,
    pub timings: FraudDetectionTimings,
    pub tasking: TaskingSummary,
}

/// Run allocation, tasking validation, inet-group arbitration and committee
/// consensus over one round's measurements, annotating each of them.
pub fn run_fraud_detection(
    round_index: u64,
    measurements: &mut [Measurement],
    details: &RoundDetails,
    randomness: &Randomness,
    required_committee_size: usize,
) -> Result<FraudDetectionReport> {
    check_required_fields(measurements)?;
    let mut timings = FraudDetectionTimings::default();

    let started = Instant::now();
    let stations: BTreeSet<&str> = measurements.iter().map(|m| m.station_id.as_str()).collect();
    let allocations = allocate_tasks(details, randomness, stations);
    timings.task_building = started.elapsed();

    let started = Instant::now();
    evaluate_tasking(measurements, details, &allocations)?;
    timings.tasking_evaluation = started.elapsed();

    let started = Instant::now();
    evaluate_inet_groups(measurements, details.max_tasks_per_node)?;
    timings.inet_groups_evaluation = started.elapsed();

    let started = Instant::now();
    let mut committees = group_into_committees(measurements);
    evaluate_committees(&mut committees, measurements, required_committee_size);
    timings.majority_evaluation = started.elapsed();

    let tasking = TaskingSummary::from_measurements(measurements);
    debug!(
        round_index,
        committees = committees.len(),
        accepted = tasking.count(TaskingEvaluation::Ok),
        "Fraud detection finished"
    );

    Ok(FraudDetectionReport {
        committees,
        timings,
        tasking,
    })
}

/// Accept every measurement at the tasking stage and still form and
/// evaluate committees, so round statistics stay comparable.
pub fn run_without_fraud_detection(
    round_index: u64,
    measurements: &mut [Measurement],
    required_committee_size: usize,
) -> Result<FraudDetectionReport> {
    check_required_fields(measurements)?;
    let mut timings = FraudDetectionTimings::default();

    for m in measurements.iter_mut() {
        m.tasking_evaluation = Some(TaskingEvaluation::Ok);
    }

    let started = Instant::now();
    let mut committees = group_into_committees(measurements);
    evaluate_committees(&mut committees, measurements, required_committee_size);
    timings.majority_evaluation = started.elapsed();

    let tasking = TaskingSummary::from_measurements(measurements);
    debug!(round_index, committees = committees.len(), "Fraud detection skipped");

    Ok(FraudDetectionReport {
        committees,
        timings,
        tasking,
    })
}

/// Measurements that earn a reward under `mode`.
pub fn rewarded_measurements(
    measurements: &[Measurement],
    mode: FraudDetection,
) -> impl Iterator<Item = &Measurement> {
    measurements.iter().filter(move |m| match mode {
        FraudDetection::Full => m.is_tasking_ok() && m.is_majority_result(),
        FraudDetection::Disabled => m.is_tasking_ok(),
    })
}
