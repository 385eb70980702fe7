use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entry::{check_link, verify_chain, AuditEntry, AuditEntryKind};
use crate::traits::AuditLedger;
use verdict_types::Result;

/// In-memory audit ledger (default).
#[derive(Debug, Clone)]
pub struct InMemoryAuditLedger {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
    index_by_id: Arc<DashMap<Uuid, usize>>,
    index_by_round: Arc<DashMap<u64, Vec<usize>>>,
}

impl InMemoryAuditLedger {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            index_by_id: Arc::new(DashMap::new()),
            index_by_round: Arc::new(DashMap::new()),
        }
    }

    fn push(&self, entries: &mut Vec<AuditEntry>, entry: AuditEntry) {
        let idx = entries.len();
        self.index_by_id.insert(entry.id, idx);
        self.index_by_round
            .entry(entry.round_index)
            .or_default()
            .push(idx);
        entries.push(entry);
    }
}

impl Default for InMemoryAuditLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditLedger for InMemoryAuditLedger {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        check_link(&entry, entries.last())?;
        self.push(&mut entries, entry);
        Ok(())
    }

    async fn record(
        &self,
        kind: AuditEntryKind,
        round_index: u64,
        payload: serde_json::Value,
    ) -> Result<AuditEntry> {
        let mut entries = self.entries.write().await;
        let previous = entries.last().map(|e| e.hash.clone());
        let entry = AuditEntry::new(kind, round_index, payload, previous);
        self.push(&mut entries, entry.clone());
        tracing::debug!(kind = ?kind, round_index, hash = %entry.hash, "Recorded audit entry");
        Ok(entry)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AuditEntry>> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_id
            .get(&id)
            .and_then(|idx| entries.get(*idx).cloned()))
    }

    async fn latest_hash(&self) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.last().map(|e| e.hash.clone()))
    }

    async fn query_by_round(&self, round_index: u64) -> Result<Vec<AuditEntry>> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_round
            .get(&round_index)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|i| entries.get(*i).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query_by_kind(&self, kind: AuditEntryKind) -> Result<Vec<AuditEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| e.kind == kind).cloned().collect())
    }

    async fn all_entries(&self) -> Result<Vec<AuditEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.clone())
    }

    async fn verify_integrity(&self) -> Result<bool> {
        let entries = self.entries.read().await;
        Ok(verify_chain(&entries))
    }
}
