use std::collections::BTreeMap;

use verdict_types::Measurement;

/// A measurement field committee members must agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    ProviderId,
    IndexerResult,
    RetrievalResult,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::ProviderId, Axis::IndexerResult, Axis::RetrievalResult];

    pub fn value<'a>(&self, m: &'a Measurement) -> Option<&'a str> {
        match self {
            Axis::ProviderId => m.provider_id.as_deref(),
            Axis::IndexerResult => m.indexer_result.as_deref(),
            Axis::RetrievalResult => Some(m.retrieval_result.as_str()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Axis::ProviderId => "providerId",
            Axis::IndexerResult => "indexerResult",
            Axis::RetrievalResult => "retrievalResult",
        }
    }
}

/// Result of tallying one axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Majority<'a> {
    /// Nobody reported a value on this axis, so it is not voted on.
    NotEvaluated,
    /// Some value (possibly "absent") holds an absolute majority.
    Found(Option<&'a str>),
    NotFound,
}

impl Majority<'_> {
    pub fn is_found(&self) -> bool {
        matches!(self, Majority::Found(_))
    }
}

/// Tally `axis` across `members` and look for an absolute majority.
///
/// Members that left the field empty vote for "absent" as a value of its
/// own, so a committee where most members omit a field others set has no
/// majority for the populated value.
pub fn find_majority<'a>(axis: Axis, members: &[&'a Measurement]) -> Majority<'a> {
    let mut tally: BTreeMap<Option<&'a str>, usize> = BTreeMap::new();
    for m in members {
        *tally.entry(axis.value(m)).or_insert(0) += 1;
    }

    if tally.keys().all(Option::is_none) {
        return Majority::NotEvaluated;
    }

    let size = members.len();
    tally
        .into_iter()
        .find(|(_, count)| count * 2 > size)
        .map(|(value, _)| Majority::Found(value))
        .unwrap_or(Majority::NotFound)
}
