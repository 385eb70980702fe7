use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::codes;
use crate::error::{Result, VerdictError};
use crate::evaluation::{ConsensusEvaluation, TaskingEvaluation};
use crate::round::TaskId;

/// One station's report for one retrieval task.
///
/// Field names on the wire follow the format stations submit, so recorded
/// rounds can be replayed without conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub station_id: String,
    #[serde(rename = "inet_group", default)]
    pub inet_group: Option<String>,
    pub participant_address: String,
    pub cid: String,
    pub miner_id: String,
    #[serde(default)]
    pub protocol: Option<String>,
    pub retrieval_result: String,
    #[serde(default)]
    pub indexer_result: Option<String>,
    /// Provider identity the station observed while retrieving.
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(
        rename = "finished_at",
        default,
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "start_at",
        default,
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "first_byte_at",
        default,
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub first_byte_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "end_at",
        default,
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(rename = "byte_length", default)]
    pub byte_length: Option<u64>,
    /// HTTP status of the retrieval response, when the protocol has one.
    #[serde(rename = "status_code", default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub tasking_evaluation: Option<TaskingEvaluation>,
    #[serde(default)]
    pub consensus_evaluation: Option<ConsensusEvaluation>,
}

impl Measurement {
    pub fn new(
        station_id: impl Into<String>,
        participant_address: impl Into<String>,
        task: &TaskId,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            inet_group: None,
            participant_address: participant_address.into(),
            cid: task.cid.clone(),
            miner_id: task.miner_id.clone(),
            protocol: None,
            retrieval_result: codes::OK.to_string(),
            indexer_result: None,
            provider_id: None,
            finished_at: None,
            start_at: None,
            first_byte_at: None,
            end_at: None,
            byte_length: None,
            status_code: None,
            tasking_evaluation: None,
            consensus_evaluation: None,
        }
    }

    pub fn with_inet_group(mut self, inet_group: impl Into<String>) -> Self {
        self.inet_group = Some(inet_group.into());
        self
    }

    pub fn with_finished_at(mut self, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = Some(finished_at);
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_retrieval_result(mut self, result: impl Into<String>) -> Self {
        self.retrieval_result = result.into();
        self
    }

    pub fn with_indexer_result(mut self, result: impl Into<String>) -> Self {
        self.indexer_result = Some(result.into());
        self
    }

    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn with_timings(
        mut self,
        start_at: DateTime<Utc>,
        first_byte_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Self {
        self.start_at = Some(start_at);
        self.first_byte_at = Some(first_byte_at);
        self.end_at = Some(end_at);
        self
    }

    pub fn with_byte_length(mut self, byte_length: u64) -> Self {
        self.byte_length = Some(byte_length);
        self
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn task_id(&self) -> TaskId {
        TaskId::new(&self.cid, &self.miner_id)
    }

    pub fn matches_task(&self, task: &TaskId) -> bool {
        self.cid == task.cid && self.miner_id == task.miner_id
    }

    /// Key identifying a node: the same participant behind the same subnet.
    pub fn node_key(&self) -> String {
        format!(
            "{}::{}",
            self.inet_group.as_deref().unwrap_or_default(),
            self.participant_address
        )
    }

    /// Completion timestamp rendered the way the inet-group fairness key
    /// expects it: ISO-8601 with millisecond precision and a `Z` suffix.
    pub fn finished_at_iso(&self) -> Option<String> {
        self.finished_at
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn is_tasking_ok(&self) -> bool {
        self.tasking_evaluation == Some(TaskingEvaluation::Ok)
    }

    pub fn is_majority_result(&self) -> bool {
        self.consensus_evaluation == Some(ConsensusEvaluation::MajorityResult)
    }

    pub fn is_retrieval_ok(&self) -> bool {
        self.retrieval_result == codes::OK
    }

    pub fn is_http(&self) -> bool {
        self.protocol.as_deref() == Some(codes::PROTOCOL_HTTP)
    }

    /// Whether the response status allows trusting timing and size fields.
    /// Measurements without a status code are trusted.
    pub fn has_success_status(&self) -> bool {
        self.status_code.is_none_or(|code| (200..300).contains(&code))
    }
}

/// Reject the round if any measurement lacks a field the pipeline keys on.
pub fn check_required_fields(measurements: &[Measurement]) -> Result<()> {
    for (index, m) in measurements.iter().enumerate() {
        if m.inet_group.is_none() {
            return Err(VerdictError::MissingField {
                index,
                field: "inet_group",
            });
        }
        if m.finished_at.is_none() {
            return Err(VerdictError::MissingField {
                index,
                field: "finished_at",
            });
        }
    }
    Ok(())
}
