use async_trait::async_trait;
use uuid::Uuid;

use crate::entry::{AuditEntry, AuditEntryKind};
use verdict_types::Result;

/// Audit ledger. Implementations keep entries in append order.
#[async_trait]
pub trait AuditLedger: Send + Sync {
    /// Append a pre-built entry. It must link to the current head.
    async fn append(&self, entry: AuditEntry) -> Result<()>;

    /// Build an entry linked to the current head and append it atomically.
    async fn record(
        &self,
        kind: AuditEntryKind,
        round_index: u64,
        payload: serde_json::Value,
    ) -> Result<AuditEntry>;

    async fn get(&self, id: Uuid) -> Result<Option<AuditEntry>>;

    /// Hash of the most recent entry, for chaining.
    async fn latest_hash(&self) -> Result<Option<String>>;

    async fn query_by_round(&self, round_index: u64) -> Result<Vec<AuditEntry>>;

    async fn query_by_kind(&self, kind: AuditEntryKind) -> Result<Vec<AuditEntry>>;

    async fn all_entries(&self) -> Result<Vec<AuditEntry>>;

    /// Check every entry's hash and link.
    async fn verify_integrity(&self) -> Result<bool>;
}
