use serde::{Deserialize, Serialize};

/// Outcome of tasking validation and inet-group arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskingEvaluation {
    Ok,
    TaskNotInRound,
    TaskWrongNode,
    DupInetGroup,
    TooManyTasks,
}

impl TaskingEvaluation {
    pub const ALL: [TaskingEvaluation; 5] = [
        TaskingEvaluation::Ok,
        TaskingEvaluation::TaskNotInRound,
        TaskingEvaluation::TaskWrongNode,
        TaskingEvaluation::DupInetGroup,
        TaskingEvaluation::TooManyTasks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskingEvaluation::Ok => "OK",
            TaskingEvaluation::TaskNotInRound => "TASK_NOT_IN_ROUND",
            TaskingEvaluation::TaskWrongNode => "TASK_WRONG_NODE",
            TaskingEvaluation::DupInetGroup => "DUP_INET_GROUP",
            TaskingEvaluation::TooManyTasks => "TOO_MANY_TASKS",
        }
    }
}

impl std::fmt::Display for TaskingEvaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of committee consensus for a single measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusEvaluation {
    MajorityResult,
    MinorityResult,
    CommitteeTooSmall,
    MajorityNotFound,
}

impl ConsensusEvaluation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusEvaluation::MajorityResult => "MAJORITY_RESULT",
            ConsensusEvaluation::MinorityResult => "MINORITY_RESULT",
            ConsensusEvaluation::CommitteeTooSmall => "COMMITTEE_TOO_SMALL",
            ConsensusEvaluation::MajorityNotFound => "MAJORITY_NOT_FOUND",
        }
    }
}

impl std::fmt::Display for ConsensusEvaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
