use serde::{Deserialize, Serialize};

use crate::error::{Result, VerdictError};
use crate::measurement::Measurement;
use crate::score::ParticipantScores;

/// Identity of a retrieval task: content identifier plus storage provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskId {
    pub cid: String,
    pub miner_id: String,
}

impl TaskId {
    pub fn new(cid: impl Into<String>, miner_id: impl Into<String>) -> Self {
        Self {
            cid: cid.into(),
            miner_id: miner_id.into(),
        }
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.cid, self.miner_id)
    }
}

/// One unit of work for a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalTask {
    pub cid: String,
    pub miner_id: String,
    /// Deal clients of this (cid, provider) pair. Only used for statistics.
    #[serde(default)]
    pub clients: Option<Vec<String>>,
    /// Allocators of this (cid, provider) pair. Only used for statistics.
    #[serde(default)]
    pub allocators: Option<Vec<String>>,
}

impl RetrievalTask {
    pub fn new(cid: impl Into<String>, miner_id: impl Into<String>) -> Self {
        Self {
            cid: cid.into(),
            miner_id: miner_id.into(),
            clients: None,
            allocators: None,
        }
    }

    pub fn with_clients(mut self, clients: Vec<String>) -> Self {
        self.clients = Some(clients);
        self
    }

    pub fn with_allocators(mut self, allocators: Vec<String>) -> Self {
        self.allocators = Some(allocators);
        self
    }

    pub fn task_id(&self) -> TaskId {
        TaskId::new(&self.cid, &self.miner_id)
    }
}

/// Per-round configuration published by the round contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundDetails {
    pub round_id: u64,
    /// Chain epoch the round started at; selects the randomness beacon round.
    pub start_epoch: u64,
    pub retrieval_tasks: Vec<RetrievalTask>,
    pub max_tasks_per_node: u32,
}

impl RoundDetails {
    pub fn find_task(&self, task: &TaskId) -> Option<&RetrievalTask> {
        self.retrieval_tasks
            .iter()
            .find(|t| t.cid == task.cid && t.miner_id == task.miner_id)
    }
}

/// Beacon output tied to a round's start epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Randomness(Vec<u8>);

impl Randomness {
    /// Minimum accepted beacon output length in bytes.
    pub const MIN_LEN: usize = 32;

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < Self::MIN_LEN {
            return Err(VerdictError::MalformedRandomness(format!(
                "expected at least {} bytes, got {}",
                Self::MIN_LEN,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim().trim_start_matches("0x"))
            .map_err(|e| VerdictError::MalformedRandomness(e.to_string()))?;
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// Everything needed to replay and audit one evaluated round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    pub round_index: u64,
    pub details: RoundDetails,
    pub measurements: Vec<Measurement>,
    pub scores: ParticipantScores,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId::new("bafy", "f01").to_string(), "bafy::f01");
    }

    #[test]
    fn test_round_details_wire_format() {
        let json = r#"{
            "roundId": 18024,
            "startEpoch": 4158303,
            "maxTasksPerNode": 15,
            "retrievalTasks": [
                {"cid": "bafk1", "minerId": "f02228866", "clients": ["f01990536"], "allocators": null},
                {"cid": "bafk2", "minerId": "f02982293"}
            ]
        }"#;
        let details: RoundDetails = serde_json::from_str(json).unwrap();
        assert_eq!(details.max_tasks_per_node, 15);
        assert_eq!(details.retrieval_tasks.len(), 2);
        assert_eq!(
            details.retrieval_tasks[0].clients.as_deref(),
            Some(&["f01990536".to_string()][..])
        );
        assert!(details.retrieval_tasks[1].allocators.is_none());
        assert!(details.find_task(&TaskId::new("bafk2", "f02982293")).is_some());
        assert!(details.find_task(&TaskId::new("bafk2", "f01")).is_none());
    }

    #[test]
    fn test_randomness_rejects_short_input() {
        assert!(Randomness::from_bytes(vec![0u8; 31]).is_err());
        assert!(Randomness::from_bytes(vec![0u8; 32]).is_ok());
        assert!(Randomness::from_hex("zz").is_err());

        let hex_str = "ab".repeat(32);
        let r = Randomness::from_hex(&format!("0x{hex_str}")).unwrap();
        assert_eq!(r.to_hex(), hex_str);
    }
}
