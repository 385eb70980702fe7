use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Score per participant address for one round.
///
/// Ordered by address so submission arrays and serialized records are
/// byte-for-byte reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantScores {
    scores: BTreeMap<String, u64>,
}

impl ParticipantScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<u64> {
        self.scores.get(address).copied()
    }

    pub fn insert(&mut self, address: impl Into<String>, score: u64) {
        self.scores.insert(address.into(), score);
    }

    /// Add to an address's score, creating the entry when absent.
    pub fn credit(&mut self, address: &str, amount: u64) {
        *self.scores.entry(address.to_string()).or_insert(0) += amount;
    }

    pub fn total(&self) -> u128 {
        self.scores.values().map(|v| u128::from(*v)).sum()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.scores.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Split into index-aligned address and score arrays for submission.
    pub fn to_submission(&self) -> (Vec<String>, Vec<u64>) {
        self.scores
            .iter()
            .map(|(address, score)| (address.clone(), *score))
            .unzip()
    }
}
