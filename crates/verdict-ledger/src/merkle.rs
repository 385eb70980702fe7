use async_trait::async_trait;
use rs_merkle::{Hasher, MerkleTree, algorithms::Sha256};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entry::{check_link, verify_chain, AuditEntry, AuditEntryKind};
use crate::traits::AuditLedger;
use verdict_types::Result;

/// Audit ledger that also commits every entry into a Merkle tree, so a
/// single root hash vouches for the whole history and individual rounds can
/// be proven against it.
#[derive(Clone)]
pub struct MerkleAuditLedger {
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    entries: Vec<AuditEntry>,
    tree: MerkleTree<Sha256>,
}

impl Inner {
    fn push(&mut self, entry: AuditEntry) {
        self.tree.insert(entry_to_leaf(&entry));
        self.tree.commit();
        self.entries.push(entry);
    }
}

impl MerkleAuditLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: Vec::new(),
                tree: MerkleTree::<Sha256>::new(),
            })),
        }
    }

    pub async fn root_hex(&self) -> Option<String> {
        self.inner.read().await.tree.root_hex()
    }

    /// Serialized inclusion proof for the entry at `index`.
    pub async fn proof(&self, index: usize) -> Option<Vec<u8>> {
        let inner = self.inner.read().await;
        if index >= inner.entries.len() {
            return None;
        }
        Some(inner.tree.proof(&[index]).to_bytes())
    }
}

impl Default for MerkleAuditLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_to_leaf(entry: &AuditEntry) -> [u8; 32] {
    let data = format!("{}:{}", entry.id, entry.hash);
    Sha256::hash(data.as_bytes())
}

#[async_trait]
impl AuditLedger for MerkleAuditLedger {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        let mut inner = self.inner.write().await;
        check_link(&entry, inner.entries.last())?;
        inner.push(entry);
        Ok(())
    }

    async fn record(
        &self,
        kind: AuditEntryKind,
        round_index: u64,
        payload: serde_json::Value,
    ) -> Result<AuditEntry> {
        let mut inner = self.inner.write().await;
        let previous = inner.entries.last().map(|e| e.hash.clone());
        let entry = AuditEntry::new(kind, round_index, payload, previous);
        inner.push(entry.clone());
        tracing::debug!(kind = ?kind, round_index, hash = %entry.hash, "Recorded audit entry");
        Ok(entry)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AuditEntry>> {
        let inner = self.inner.read().await;
        Ok(inner.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn latest_hash(&self) -> Result<Option<String>> {
        let inner = self.inner.read().await;
        Ok(inner.entries.last().map(|e| e.hash.clone()))
    }

    async fn query_by_round(&self, round_index: u64) -> Result<Vec<AuditEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.round_index == round_index)
            .cloned()
            .collect())
    }

    async fn query_by_kind(&self, kind: AuditEntryKind) -> Result<Vec<AuditEntry>> {
        let inner = self.inner.read().await;
        Ok(inner.entries.iter().filter(|e| e.kind == kind).cloned().collect())
    }

    async fn all_entries(&self) -> Result<Vec<AuditEntry>> {
        let inner = self.inner.read().await;
        Ok(inner.entries.clone())
    }

    async fn verify_integrity(&self) -> Result<bool> {
        let inner = self.inner.read().await;
        if inner.entries.is_empty() {
            return Ok(true);
        }
        if !verify_chain(&inner.entries) {
            return Ok(false);
        }

        let leaves: Vec<[u8; 32]> = inner.entries.iter().map(entry_to_leaf).collect();
        let indices: Vec<usize> = (0..leaves.len()).collect();
        Ok(match inner.tree.root() {
            Some(root) => inner
                .tree
                .proof(&indices)
                .verify(root, &indices, &leaves, leaves.len()),
            None => false,
        })
    }
}
