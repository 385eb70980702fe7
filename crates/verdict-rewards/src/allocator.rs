use std::collections::BTreeMap;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use verdict_types::{Measurement, ParticipantScores, Result, VerdictError};

/// Total score distributed every round.
pub const MAX_SCORE: u64 = 1_000_000_000_000_000;

/// Burn address receiving the rounding remainder.
pub const DUST_ADDRESS: &str = "0x000000000000000000000000000000000000dEaD";

/// Scores for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardAllocation {
    pub scores: ParticipantScores,
    /// Remainder credited to the dust address.
    pub dust: u64,
    pub rewarded_measurements: usize,
}

/// Splits a fixed budget across participants in proportion to their
/// accepted-measurement counts.
#[derive(Debug, Clone)]
pub struct RewardAllocator {
    budget: u64,
    dust_address: String,
}

impl Default for RewardAllocator {
    fn default() -> Self {
        Self::new(MAX_SCORE, DUST_ADDRESS)
    }
}

impl RewardAllocator {
    pub fn new(budget: u64, dust_address: impl Into<String>) -> Self {
        Self {
            budget,
            dust_address: dust_address.into(),
        }
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Score each participant `floor(count * budget / total)` and credit what
    /// is left to the dust address. Every measurement given counts as one
    /// accepted report.
    pub fn allocate<'a>(
        &self,
        accepted: impl IntoIterator<Item = &'a Measurement>,
    ) -> Result<RewardAllocation> {
        let mut weights: BTreeMap<&str, u64> = BTreeMap::new();
        let mut total: u64 = 0;
        for m in accepted {
            *weights.entry(m.participant_address.as_str()).or_insert(0) += 1;
            total += 1;
        }

        let mut scores = ParticipantScores::new();
        let mut sum: u64 = 0;
        if total > 0 {
            let budget = BigUint::from(self.budget);
            let total_big = BigUint::from(total);
            for (address, weight) in &weights {
                let share = BigUint::from(*weight) * &budget / &total_big;
                let share = u64::try_from(share).map_err(|e| {
                    VerdictError::Arithmetic(format!("score for {address} overflows u64: {e}"))
                })?;
                scores.insert(*address, share);
                sum += share;
            }
        }

        let dust = self.budget.checked_sub(sum).ok_or_else(|| {
            VerdictError::Arithmetic(format!("scores sum {sum} exceeds budget {}", self.budget))
        })?;
        if dust > 0 {
            scores.credit(&self.dust_address, dust);
            tracing::debug!(dust, "Added rounding remainder to dust address");
        }

        Ok(RewardAllocation {
            scores,
            dust,
            rewarded_measurements: total as usize,
        })
    }
}
