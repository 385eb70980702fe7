use std::collections::BTreeMap;

use serde::Serialize;

use verdict_types::{Measurement, TaskingEvaluation};

/// Number of measurements per tasking outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskingSummary {
    pub counts: BTreeMap<TaskingEvaluation, usize>,
    /// Measurements that never received a tasking outcome.
    pub unevaluated: usize,
}

impl TaskingSummary {
    pub fn from_measurements(measurements: &[Measurement]) -> Self {
        let mut summary = Self::default();
        for outcome in TaskingEvaluation::ALL {
            summary.counts.insert(outcome, 0);
        }
        for m in measurements {
            match m.tasking_evaluation {
                Some(outcome) => *summary.counts.entry(outcome).or_insert(0) += 1,
                None => summary.unevaluated += 1,
            }
        }
        summary
    }

    pub fn count(&self, outcome: TaskingEvaluation) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum::<usize>() + self.unevaluated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_types::TaskId;

    #[test]
    fn test_counts_every_outcome() {
        let task = TaskId::new("bafy", "f01");
        let mut ms: Vec<Measurement> = (0..4).map(|_| Measurement::new("s", "0x", &task)).collect();
        ms[0].tasking_evaluation = Some(TaskingEvaluation::Ok);
        ms[1].tasking_evaluation = Some(TaskingEvaluation::Ok);
        ms[2].tasking_evaluation = Some(TaskingEvaluation::DupInetGroup);

        let summary = TaskingSummary::from_measurements(&ms);
        assert_eq!(summary.count(TaskingEvaluation::Ok), 2);
        assert_eq!(summary.count(TaskingEvaluation::DupInetGroup), 1);
        assert_eq!(summary.count(TaskingEvaluation::TooManyTasks), 0);
        assert_eq!(summary.unevaluated, 1);
        assert_eq!(summary.total(), 4);
        assert_eq!(summary.counts.len(), TaskingEvaluation::ALL.len());
    }
}
