use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerdictError {
    #[error("Measurement #{index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("Malformed randomness: {0}")]
    MalformedRandomness(String),

    #[error("Round details unavailable for round {round_index}: {reason}")]
    RoundDetailsUnavailable { round_index: u64, reason: String },

    #[error("Randomness unavailable for epoch {start_epoch}: {reason}")]
    RandomnessUnavailable { start_epoch: u64, reason: String },

    #[error("No task allocation computed for station '{0}'")]
    StationNotAllocated(String),

    #[error("Score submission failed: {0}")]
    ScoreSubmission(String),

    #[error("Statistics error: {0}")]
    Statistics(String),

    #[error("Ledger error: {0}")]
    LedgerError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VerdictError {
    /// Whether this error aborts evaluation of the whole round.
    ///
    /// Non-fatal errors come from secondary reporting steps and are collected
    /// alongside a successful evaluation instead.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VerdictError::MissingField { .. }
                | VerdictError::MalformedRandomness(_)
                | VerdictError::RoundDetailsUnavailable { .. }
                | VerdictError::RandomnessUnavailable { .. }
                | VerdictError::StationNotAllocated(_)
                | VerdictError::Arithmetic(_)
                | VerdictError::Internal(_)
        )
    }

    /// Whether repeating the failed call could succeed.
    ///
    /// Bad input and sources that report data as unavailable fail the same
    /// way every time. Collaborator and internal failures may be transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            VerdictError::MissingField { .. }
                | VerdictError::MalformedRandomness(_)
                | VerdictError::RoundDetailsUnavailable { .. }
                | VerdictError::RandomnessUnavailable { .. }
                | VerdictError::StationNotAllocated(_)
                | VerdictError::Serialization(_)
                | VerdictError::Arithmetic(_)
        )
    }
}

impl From<serde_json::Error> for VerdictError {
    fn from(e: serde_json::Error) -> Self {
        VerdictError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VerdictError>;
