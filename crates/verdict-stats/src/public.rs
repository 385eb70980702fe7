use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use verdict_committee::Committee;
use verdict_types::{codes, Measurement, RetrievalTask, RoundDetails, TaskId};

use crate::percentile::percentile;

/// Retrieval outcomes, ignoring reports of indexer outages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResultStats {
    pub total: u64,
    pub successful: u64,
    pub successful_http: u64,
}

impl RetrievalResultStats {
    pub fn record(&mut self, m: &Measurement) {
        if codes::is_ipni_server_error(&m.retrieval_result) {
            return;
        }
        self.total += 1;
        if m.is_retrieval_ok() {
            self.successful += 1;
            if m.is_http() {
                self.successful_http += 1;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerQueryStats {
    pub deals_tested: u64,
    pub deals_advertising_http: u64,
}

/// Outcome counters for the deals between one provider and one client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealStats {
    pub tested: u64,
    pub index_majority_found: u64,
    pub indexed: u64,
    pub indexed_http: u64,
    pub retrieval_majority_found: u64,
    pub retrievable: u64,
}

/// Aggregates published once per round. Stores are expected to add these
/// onto the day's existing rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStats {
    /// Per storage provider.
    pub retrieval_stats: BTreeMap<String, RetrievalResultStats>,
    pub indexer_queries: IndexerQueryStats,
    /// Provider -> client -> counters.
    pub daily_deals: BTreeMap<String, BTreeMap<String, DealStats>>,
    /// Provider -> median time-to-first-byte of each retrievable committee, in ms.
    pub retrieval_timings: BTreeMap<String, Vec<u64>>,
    pub client_retrieval_stats: BTreeMap<String, RetrievalResultStats>,
    pub allocator_retrieval_stats: BTreeMap<String, RetrievalResultStats>,
    /// Provider -> payload CIDs tested this round.
    pub deals_checked: BTreeMap<String, BTreeSet<String>>,
}

/// Build the public aggregates from evaluated committees.
///
/// Deal clients and allocators are looked up in the round's task list.
/// Committees whose task has none are left out of the per-deal, per-client
/// and per-allocator figures.
pub fn build_public_stats(
    committees: &[Committee],
    measurements: &[Measurement],
    details: &RoundDetails,
) -> PublicStats {
    let tasks: HashMap<TaskId, &RetrievalTask> = details
        .retrieval_tasks
        .iter()
        .map(|t| (t.task_id(), t))
        .collect();
    let parties = |c: &Committee, pick: fn(&RetrievalTask) -> Option<&Vec<String>>| {
        tasks
            .get(c.task())
            .and_then(|t| pick(t))
            .filter(|p| !p.is_empty())
            .cloned()
    };

    let mut stats = PublicStats::default();

    for c in committees {
        let task = c.task();
        let members: Vec<&Measurement> = c.measurements(measurements).collect();

        let provider = stats.retrieval_stats.entry(task.miner_id.clone()).or_default();
        for m in &members {
            provider.record(m);
        }

        stats
            .deals_checked
            .entry(task.miner_id.clone())
            .or_default()
            .insert(task.cid.clone());

        if let Some(decision) = c.decision() {
            if let Some(indexer_result) = decision.indexer_result.as_deref() {
                stats.indexer_queries.deals_tested += 1;
                if indexer_result == codes::OK {
                    stats.indexer_queries.deals_advertising_http += 1;
                }
            }
        }

        match parties(c, |t| t.clients.as_ref()) {
            Some(clients) => {
                let per_client = stats.daily_deals.entry(task.miner_id.clone()).or_default();
                for client in &clients {
                    let deal = per_client.entry(client.clone()).or_default();
                    record_deal(deal, c);
                }
                for client in clients.iter().filter(|id| !id.is_empty()) {
                    let entry = stats.client_retrieval_stats.entry(client.clone()).or_default();
                    for m in &members {
                        entry.record(m);
                    }
                }
            }
            None => tracing::warn!(
                miner_id = %task.miner_id,
                cid = %task.cid,
                "Invalid retrieval task: no deal clients found, excluding it from per-deal and per-client stats"
            ),
        }

        match parties(c, |t| t.allocators.as_ref()) {
            Some(allocators) => {
                for allocator in allocators.iter().filter(|id| !id.is_empty()) {
                    let entry = stats
                        .allocator_retrieval_stats
                        .entry(allocator.clone())
                        .or_default();
                    for m in &members {
                        entry.record(m);
                    }
                }
            }
            None => tracing::warn!(
                miner_id = %task.miner_id,
                cid = %task.cid,
                "Invalid retrieval task: no deal allocators found, excluding it from per-allocator stats"
            ),
        }

        if let Some(ttfb) = committee_ttfb_p50(c, &members) {
            stats
                .retrieval_timings
                .entry(task.miner_id.clone())
                .or_default()
                .push(ttfb);
        }
    }

    tracing::debug!(
        providers = stats.retrieval_stats.len(),
        deals_tested = stats.indexer_queries.deals_tested,
        deals_advertising_http = stats.indexer_queries.deals_advertising_http,
        "Built public stats"
    );

    stats
}

fn record_deal(deal: &mut DealStats, c: &Committee) {
    deal.tested += 1;
    let Some(decision) = c.decision() else {
        return;
    };
    if decision.index_majority_found {
        deal.index_majority_found += 1;
    }
    match decision.indexer_result.as_deref() {
        Some(codes::OK) => {
            deal.indexed += 1;
            deal.indexed_http += 1;
        }
        Some(codes::HTTP_NOT_ADVERTISED) => deal.indexed += 1,
        _ => {}
    }
    if decision.retrieval_majority_found {
        deal.retrieval_majority_found += 1;
    }
    if decision.retrieval_result == codes::OK {
        deal.retrievable += 1;
    }
}

/// Median time-to-first-byte of the accepted successful retrievals in a
/// committee that agreed the content is retrievable, rounded up.
fn committee_ttfb_p50(c: &Committee, members: &[&Measurement]) -> Option<u64> {
    let decision = c.decision()?;
    if !decision.retrieval_majority_found || decision.retrieval_result != codes::OK {
        return None;
    }
    let ttfb: Vec<f64> = members
        .iter()
        .filter(|m| m.is_retrieval_ok() && m.is_tasking_ok() && m.is_majority_result())
        .filter_map(|m| {
            let start = m.start_at?.timestamp_millis();
            let first_byte = m.first_byte_at?.timestamp_millis();
            Some((first_byte - start) as f64)
        })
        .collect();
    percentile(&ttfb, 0.5).map(|v| v.max(0.0).ceil() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use verdict_committee::{evaluate_committees, group_into_committees};
    use verdict_types::TaskingEvaluation;

    fn valid(miner: &str, cid: &str) -> Measurement {
        let mut m = Measurement::new("station", "0xparticipant", &TaskId::new(cid, miner))
            .with_inet_group("ig")
            .with_indexer_result(codes::OK)
            .with_protocol("graphsync");
        m.tasking_evaluation = Some(TaskingEvaluation::Ok);
        m
    }

    fn with_ttfb(mut m: Measurement, ttfb_ms: i64) -> Measurement {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        m.start_at = Some(start);
        m.first_byte_at = Some(start + Duration::milliseconds(ttfb_ms));
        m
    }

    fn details_for(ms: &[Measurement], clients: Option<Vec<&str>>) -> RoundDetails {
        let tasks: BTreeSet<TaskId> = ms.iter().map(|m| m.task_id()).collect();
        RoundDetails {
            round_id: 1,
            start_epoch: 1,
            retrieval_tasks: tasks
                .into_iter()
                .map(|t| {
                    let task = RetrievalTask::new(t.cid, t.miner_id);
                    match &clients {
                        Some(c) => task
                            .with_clients(c.iter().map(|s| s.to_string()).collect())
                            .with_allocators(vec!["f0allocator".to_string()]),
                        None => task,
                    }
                })
                .collect(),
            max_tasks_per_node: 15,
        }
    }

    fn build(mut ms: Vec<Measurement>, clients: Option<Vec<&str>>, required: usize) -> PublicStats {
        let details = details_for(&ms, clients);
        let mut committees = group_into_committees(&ms);
        evaluate_committees(&mut committees, &mut ms, required);
        build_public_stats(&committees, &ms, &details)
    }

    #[test]
    fn test_retrieval_stats_per_provider() {
        let ms = vec![
            valid("f1first", "cidone"),
            valid("f1first", "cidtwo").with_retrieval_result(codes::TIMEOUT),
            valid("f1second", "cidone").with_protocol("http"),
        ];
        let stats = build(ms, Some(vec!["f0client"]), 1);

        assert_eq!(
            stats.retrieval_stats["f1first"],
            RetrievalResultStats { total: 2, successful: 1, successful_http: 0 }
        );
        assert_eq!(
            stats.retrieval_stats["f1second"],
            RetrievalResultStats { total: 1, successful: 1, successful_http: 1 }
        );
    }

    #[test]
    fn test_minority_results_count_and_ipni_outages_do_not() {
        let ms = vec![
            valid("f1", "bafy"),
            valid("f1", "bafy"),
            valid("f1", "bafy").with_retrieval_result(codes::TIMEOUT),
            valid("f1", "bafy").with_retrieval_result("IPNI_ERROR_504"),
        ];
        let stats = build(ms, Some(vec!["f0client"]), 1);
        assert_eq!(
            stats.retrieval_stats["f1"],
            RetrievalResultStats { total: 3, successful: 2, successful_http: 0 }
        );
        assert_eq!(stats.client_retrieval_stats["f0client"].total, 3);
        assert_eq!(stats.allocator_retrieval_stats["f0allocator"].successful, 2);
    }

    #[test]
    fn test_indexer_queries_and_daily_deals() {
        let ms = vec![
            // advertised over http, retrievable
            valid("f1", "bafy1"),
            valid("f1", "bafy1"),
            // indexed without http, not retrievable
            valid("f1", "bafy2")
                .with_indexer_result(codes::HTTP_NOT_ADVERTISED)
                .with_retrieval_result("HTTP_502"),
            valid("f1", "bafy2")
                .with_indexer_result(codes::HTTP_NOT_ADVERTISED)
                .with_retrieval_result("HTTP_502"),
            // no indexer agreement
            valid("f1", "bafy3").with_indexer_result("ERROR_404"),
            valid("f1", "bafy3").with_indexer_result(codes::HTTP_NOT_ADVERTISED),
        ];
        let stats = build(ms, Some(vec!["f0client", "f0other"]), 2);

        // every evaluated committee carries an indexer decision
        assert_eq!(stats.indexer_queries.deals_tested, 3);
        assert_eq!(stats.indexer_queries.deals_advertising_http, 1);

        let deal = stats.daily_deals["f1"]["f0client"];
        assert_eq!(
            deal,
            DealStats {
                tested: 3,
                index_majority_found: 2,
                indexed: 2,
                indexed_http: 1,
                retrieval_majority_found: 2,
                retrievable: 1,
            }
        );
        assert_eq!(stats.daily_deals["f1"]["f0other"], deal);
        assert_eq!(stats.deals_checked["f1"].len(), 3);
    }

    #[test]
    fn test_task_without_clients_is_skipped() {
        let stats = build(vec![valid("f1", "bafy")], None, 1);
        assert!(stats.daily_deals.is_empty());
        assert!(stats.client_retrieval_stats.is_empty());
        assert!(stats.allocator_retrieval_stats.is_empty());
        // provider-level figures still count it
        assert_eq!(stats.retrieval_stats["f1"].total, 1);
        assert!(stats.deals_checked["f1"].contains("bafy"));
    }

    #[test]
    fn test_retrieval_timings() {
        let ms = vec![
            with_ttfb(valid("f1first", "bafy1"), 1000),
            with_ttfb(valid("f1first", "bafy1"), 3001),
            with_ttfb(valid("f1first", "bafy2"), 3000),
            with_ttfb(valid("f1second", "bafy1"), 1500),
            // not retrievable by majority
            with_ttfb(valid("f1third", "bafy1").with_retrieval_result(codes::TIMEOUT), 10),
        ];
        let stats = build(ms, Some(vec!["f0client"]), 1);

        assert_eq!(stats.retrieval_timings["f1first"], vec![2001, 3000]);
        assert_eq!(stats.retrieval_timings["f1second"], vec![1500]);
        assert!(!stats.retrieval_timings.contains_key("f1third"));
    }
}
