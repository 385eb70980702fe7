use std::collections::BTreeMap;

use verdict_types::Measurement;

const TIMESTAMP_WIDTH: usize = 24;
const CID_WIDTH: usize = 70;
const PROTOCOL_WIDTH: usize = 10;

/// Header line of the human-readable evaluation table. The tasking column
/// is only shown when rejected measurements are kept.
pub fn format_header(keep_rejected: bool) -> String {
    let mut fields = vec![
        format!("{:<TIMESTAMP_WIDTH$}", "Timestamp"),
        format!("{:<CID_WIDTH$}", "CID"),
        format!("{:<PROTOCOL_WIDTH$}", "Protocol"),
    ];
    if keep_rejected {
        fields.push("Tasking".to_string());
    }
    fields.push("Consensus".to_string());
    fields.push("RetrievalResult".to_string());
    fields.join(" ")
}

pub fn format_measurement(m: &Measurement, keep_rejected: bool) -> String {
    let mut fields = vec![
        format!("{:<TIMESTAMP_WIDTH$}", m.finished_at_iso().unwrap_or_default()),
        format!("{:<CID_WIDTH$}", m.cid),
        format!("{:<PROTOCOL_WIDTH$}", m.protocol.as_deref().unwrap_or_default()),
    ];
    if keep_rejected {
        fields.push(format!("{:<7}", mark(m.is_tasking_ok())));
    }
    fields.push(format!("{:<9}", mark(m.is_majority_result())));
    fields.push(m.retrieval_result.clone());
    fields.join(" ")
}

fn mark(ok: bool) -> &'static str {
    if ok { "✓" } else { "✗" }
}

/// Accepted measurements counted by consensus outcome, or by retrieval
/// result for those in the majority.
#[derive(Debug, Default)]
pub struct ResultCounts {
    total: usize,
    by_status: BTreeMap<String, usize>,
}

impl ResultCounts {
    /// Count `m` if it passed the tasking stage.
    pub fn record(&mut self, m: &Measurement) {
        if !m.is_tasking_ok() {
            return;
        }
        self.total += 1;
        let status = match m.consensus_evaluation {
            Some(c) if !m.is_majority_result() => c.as_str().to_string(),
            Some(_) => m.retrieval_result.clone(),
            None => "UNEVALUATED".to_string(),
        };
        *self.by_status.entry(status).or_insert(0) += 1;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// One line per status with its share, truncated to two decimals.
    pub fn lines(&self) -> Vec<String> {
        self.by_status
            .iter()
            .map(|(status, count)| {
                let share = (*count as f64 / self.total as f64 * 10_000.0).floor() / 100.0;
                format!("  {status:<40} {count:<10} ({share}%)")
            })
            .collect()
    }
}
