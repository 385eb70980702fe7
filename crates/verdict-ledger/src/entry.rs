use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use verdict_types::{Result, RoundRecord, VerdictError};

/// Types of audit entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuditEntryKind {
    /// Payload is the full [`RoundRecord`].
    RoundEvaluated,
    ScoresSubmitted,
    ScoreSubmissionFailed,
}

/// An immutable audit entry, chained to its predecessor by hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub kind: AuditEntryKind,
    pub timestamp: DateTime<Utc>,
    pub round_index: u64,
    pub payload: serde_json::Value,
    pub previous_hash: Option<String>,
    pub hash: String,
}

impl AuditEntry {
    pub fn new(
        kind: AuditEntryKind,
        round_index: u64,
        payload: serde_json::Value,
        previous_hash: Option<String>,
    ) -> Self {
        let mut entry = Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            round_index,
            payload,
            previous_hash,
            hash: String::new(),
        };
        entry.hash = entry.compute_hash();
        entry
    }

    /// Entry holding everything needed to replay a round's evaluation.
    pub fn round_evaluated(record: &RoundRecord, previous_hash: Option<String>) -> Result<Self> {
        let payload = serde_json::to_value(record)?;
        Ok(Self::new(
            AuditEntryKind::RoundEvaluated,
            record.round_index,
            payload,
            previous_hash,
        ))
    }

    /// Decode the payload of a `RoundEvaluated` entry.
    pub fn round_record(&self) -> Result<RoundRecord> {
        if self.kind != AuditEntryKind::RoundEvaluated {
            return Err(VerdictError::LedgerError(format!(
                "entry {} is {:?}, not RoundEvaluated",
                self.id, self.kind
            )));
        }
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// SHA-256 over the entry's content and its link to the previous entry.
    pub fn compute_hash(&self) -> String {
        let hash_input = format!(
            "{}:{}:{:?}:{}:{}:{}",
            self.id,
            self.timestamp.timestamp_nanos_opt().unwrap_or(0),
            self.kind,
            self.round_index,
            self.payload,
            self.previous_hash.as_deref().unwrap_or("genesis"),
        );
        hex::encode(Sha256::digest(hash_input.as_bytes()))
    }

    /// Whether the stored hash still matches the content.
    pub fn is_intact(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

/// Check that `entries` form one unbroken chain starting at genesis.
pub fn verify_chain(entries: &[AuditEntry]) -> bool {
    let mut expected_previous: Option<&str> = None;
    for entry in entries {
        if entry.previous_hash.as_deref() != expected_previous || !entry.is_intact() {
            return false;
        }
        expected_previous = Some(entry.hash.as_str());
    }
    true
}

/// Reject an entry whose link does not point at the current head.
pub(crate) fn check_link(entry: &AuditEntry, head: Option<&AuditEntry>) -> Result<()> {
    let head_hash = head.map(|e| e.hash.as_str());
    if entry.previous_hash.as_deref() != head_hash {
        return Err(VerdictError::LedgerError(format!(
            "entry {} links to {:?} but the ledger head is {:?}",
            entry.id, entry.previous_hash, head_hash
        )));
    }
    if !entry.is_intact() {
        return Err(VerdictError::LedgerError(format!(
            "entry {} hash does not match its content",
            entry.id
        )));
    }
    Ok(())
}
