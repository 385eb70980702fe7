use std::collections::BTreeMap;

use serde::Serialize;

use verdict_types::{ConsensusEvaluation, Measurement, TaskId};

use crate::majority::{find_majority, Axis, Majority};

/// Lifecycle of a committee. Only `Pending` can move, and only once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitteeState {
    Pending,
    TooSmall,
    NoMajority,
    Accepted,
}

/// Outcome of evaluating a committee.
///
/// `retrieval_result` and `indexer_result` carry the agreed value when the
/// committee is accepted, or `COMMITTEE_TOO_SMALL` / `MAJORITY_NOT_FOUND`
/// otherwise. `indexer_result` is `None` when no member reported one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitteeDecision {
    pub state: CommitteeState,
    pub retrieval_result: String,
    pub indexer_result: Option<String>,
    pub provider_id: Option<String>,
    pub retrieval_majority_found: bool,
    pub index_majority_found: bool,
    pub provider_id_majority_found: bool,
}

impl CommitteeDecision {
    fn terminal(state: CommitteeState, outcome: ConsensusEvaluation) -> Self {
        Self {
            state,
            retrieval_result: outcome.as_str().to_string(),
            indexer_result: Some(outcome.as_str().to_string()),
            provider_id: None,
            retrieval_majority_found: false,
            index_majority_found: false,
            provider_id_majority_found: false,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.state == CommitteeState::Accepted
    }
}

/// A decision together with the per-member classification it implies,
/// aligned with the committee's member order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub decision: CommitteeDecision,
    pub outcomes: Vec<ConsensusEvaluation>,
}

/// All tasking-accepted measurements of one task.
///
/// Members are indices into the round's measurement list so the committee
/// can annotate them in place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Committee {
    task: TaskId,
    members: Vec<usize>,
    decision: Option<CommitteeDecision>,
}

impl Committee {
    pub fn new(task: TaskId, members: Vec<usize>) -> Self {
        Self {
            task,
            members,
            decision: None,
        }
    }

    pub fn task(&self) -> &TaskId {
        &self.task
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn state(&self) -> CommitteeState {
        self.decision
            .as_ref()
            .map(|d| d.state)
            .unwrap_or(CommitteeState::Pending)
    }

    pub fn decision(&self) -> Option<&CommitteeDecision> {
        self.decision.as_ref()
    }

    /// The committee's measurements, resolved against the round's list.
    pub fn measurements<'a>(&self, all: &'a [Measurement]) -> impl Iterator<Item = &'a Measurement> {
        self.members.iter().map(move |i| &all[*i])
    }

    /// Compute the verdict without touching anything.
    pub fn decide(&self, all: &[Measurement], required_committee_size: usize) -> Verdict {
        let members: Vec<&Measurement> = self.measurements(all).collect();
        decide(&members, required_committee_size)
    }

    /// Evaluate the committee and annotate its members.
    ///
    /// The first call settles the decision; later calls return it without
    /// rewriting any annotation.
    pub fn evaluate(
        &mut self,
        all: &mut [Measurement],
        required_committee_size: usize,
    ) -> &CommitteeDecision {
        let task = &self.task;
        let members = &self.members;
        self.decision.get_or_insert_with(|| {
            let refs: Vec<&Measurement> = members.iter().map(|i| &all[*i]).collect();
            let Verdict { decision, outcomes } = decide(&refs, required_committee_size);
            for (index, outcome) in members.iter().zip(outcomes) {
                all[*index].consensus_evaluation = Some(outcome);
            }
            tracing::trace!(
                task = %task,
                size = members.len(),
                state = ?decision.state,
                retrieval_result = %decision.retrieval_result,
                "Evaluated committee"
            );
            decision
        })
    }
}

fn decide(members: &[&Measurement], required_committee_size: usize) -> Verdict {
    let size = members.len();

    if size == 0 || size < required_committee_size {
        return Verdict {
            decision: CommitteeDecision::terminal(
                CommitteeState::TooSmall,
                ConsensusEvaluation::CommitteeTooSmall,
            ),
            outcomes: vec![ConsensusEvaluation::CommitteeTooSmall; size],
        };
    }

    let provider = find_majority(Axis::ProviderId, members);
    let indexer = find_majority(Axis::IndexerResult, members);
    let retrieval = find_majority(Axis::RetrievalResult, members);

    let axes = [
        (Axis::ProviderId, &provider),
        (Axis::IndexerResult, &indexer),
        (Axis::RetrievalResult, &retrieval),
    ];

    // A failed committee has no majority on any axis, including those that
    // agreed on their own.
    if axes.iter().any(|(_, m)| **m == Majority::NotFound) {
        return Verdict {
            decision: CommitteeDecision::terminal(
                CommitteeState::NoMajority,
                ConsensusEvaluation::MajorityNotFound,
            ),
            outcomes: vec![ConsensusEvaluation::MajorityNotFound; size],
        };
    }

    let outcomes = members
        .iter()
        .map(|m| {
            let agrees = axes.iter().all(|(axis, majority)| match majority {
                Majority::Found(value) => axis.value(m) == *value,
                _ => true,
            });
            if agrees {
                ConsensusEvaluation::MajorityResult
            } else {
                ConsensusEvaluation::MinorityResult
            }
        })
        .collect();

    let found_value = |m: &Majority<'_>| match m {
        Majority::Found(v) => v.map(str::to_string),
        _ => None,
    };

    let decision = CommitteeDecision {
        state: CommitteeState::Accepted,
        retrieval_result: found_value(&retrieval).unwrap_or_default(),
        indexer_result: found_value(&indexer),
        provider_id: found_value(&provider),
        retrieval_majority_found: retrieval.is_found(),
        index_majority_found: indexer.is_found(),
        provider_id_majority_found: provider.is_found(),
    };

    Verdict { decision, outcomes }
}

/// Group tasking-accepted measurements into one committee per task, in
/// task order.
pub fn group_into_committees(measurements: &[Measurement]) -> Vec<Committee> {
    let mut by_task: BTreeMap<TaskId, Vec<usize>> = BTreeMap::new();
    for (index, m) in measurements.iter().enumerate() {
        if m.is_tasking_ok() {
            by_task.entry(m.task_id()).or_default().push(index);
        }
    }
    by_task
        .into_iter()
        .map(|(task, members)| Committee::new(task, members))
        .collect()
}

/// Evaluate every committee against the round's measurements.
pub fn evaluate_committees(
    committees: &mut [Committee],
    measurements: &mut [Measurement],
    required_committee_size: usize,
) {
    for committee in committees.iter_mut() {
        committee.evaluate(measurements, required_committee_size);
    }
}
