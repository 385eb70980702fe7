use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use verdict_types::{codes, Measurement, TaskId};

use crate::percentile::{mean, percentile};
use crate::point::StatsPoint;

/// Add retrieval statistics of `measurements` to `point`.
///
/// Rates are shares of all measurements, except the success rates which
/// leave out `IPNI_ERROR_5xx` reports. Any rate with nothing to divide by is
/// recorded as 0. Distribution fields are only written when at least one
/// measurement contributes a value.
pub fn build_retrieval_stats<'a>(
    measurements: impl IntoIterator<Item = &'a Measurement>,
    point: &mut StatsPoint,
) {
    let measurements: Vec<&Measurement> = measurements.into_iter().collect();
    let total = measurements.len();

    let unique_tasks: HashSet<TaskId> = measurements.iter().map(|m| m.task_id()).collect();
    point.count_field("measurements", total);
    point.count_field("unique_tasks", unique_tasks.len());

    if total == 0 {
        return;
    }

    let for_success_rates: Vec<&&Measurement> = measurements
        .iter()
        .filter(|m| !codes::is_ipni_server_error(&m.retrieval_result))
        .collect();
    let successful = for_success_rates.iter().filter(|m| m.is_retrieval_ok()).count();
    let successful_http = for_success_rates
        .iter()
        .filter(|m| m.is_retrieval_ok() && m.is_http())
        .count();
    point.count_field("total_for_success_rates", for_success_rates.len());
    point.float_field("success_rate", ratio(successful, for_success_rates.len()));
    point.float_field("success_rate_http", ratio(successful_http, for_success_rates.len()));

    let participants: HashSet<&str> = measurements
        .iter()
        .map(|m| m.participant_address.as_str())
        .collect();
    let inet_groups: HashSet<Option<&str>> =
        measurements.iter().map(|m| m.inet_group.as_deref()).collect();
    point.count_field("participants", participants.len());
    point.count_field("inet_groups", inet_groups.len());

    let mut result_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut indexer_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for m in &measurements {
        *result_counts.entry(m.retrieval_result.as_str()).or_insert(0) += 1;
        *indexer_counts
            .entry(m.indexer_result.as_deref().unwrap_or("UNDEFINED"))
            .or_insert(0) += 1;
    }
    for (code, count) in result_counts {
        point.float_field(format!("result_rate_{code}"), ratio(count, total));
    }
    for (code, count) in indexer_counts {
        point.float_field(format!("indexer_rate_{code}"), ratio(count, total));
    }

    let mut ttfb = Vec::new();
    let mut durations = Vec::new();
    let mut car_sizes = Vec::new();
    let mut download_bandwidth: u64 = 0;
    for m in &measurements {
        if m.has_success_status() {
            if let Some(v) = elapsed_ms(m.start_at, m.first_byte_at) {
                ttfb.push(v);
            }
            if let Some(len) = m.byte_length {
                car_sizes.push(len as f64);
                download_bandwidth = download_bandwidth.saturating_add(len);
            }
        }
        if let Some(v) = elapsed_ms(m.start_at, m.end_at) {
            durations.push(v);
        }
    }
    point.int_field(
        "download_bandwidth",
        i64::try_from(download_bandwidth).unwrap_or(i64::MAX),
    );

    add_distribution(point, "ttfb", &ttfb, &[Stat::Min, Stat::Mean, Stat::P(90), Stat::Max]);
    add_distribution(point, "duration", &durations, &[Stat::P(10), Stat::Mean, Stat::P(90)]);
    add_distribution(
        point,
        "car_size",
        &car_sizes,
        &[Stat::P(10), Stat::Mean, Stat::P(90), Stat::Max],
    );

    let mut tasks_per_node: HashMap<String, usize> = HashMap::new();
    for m in &measurements {
        *tasks_per_node.entry(m.node_key()).or_insert(0) += 1;
    }
    let tasks_per_node: Vec<f64> = tasks_per_node.values().map(|v| *v as f64).collect();
    add_distribution(
        point,
        "tasks_per_node",
        &tasks_per_node,
        &[Stat::P(5), Stat::P(50), Stat::P(95)],
    );

    let mut deals_with_indexer_result: HashSet<TaskId> = HashSet::new();
    let mut deals_advertising_http: HashSet<TaskId> = HashSet::new();
    for m in &measurements {
        match m.indexer_result.as_deref() {
            Some(codes::OK) => {
                deals_with_indexer_result.insert(m.task_id());
                deals_advertising_http.insert(m.task_id());
            }
            Some(_) => {
                deals_with_indexer_result.insert(m.task_id());
            }
            None => {}
        }
    }
    point.float_field(
        "rate_of_deals_advertising_http",
        ratio(deals_advertising_http.len(), deals_with_indexer_result.len()),
    );

    record_score_per_inet_group(&measurements, point);
}

/// Share of rewarded measurements each inet group collected, in units of
/// 10^-9.
fn record_score_per_inet_group(measurements: &[&Measurement], point: &mut StatsPoint) {
    let mut per_group: HashMap<Option<&str>, usize> = HashMap::new();
    let mut rewarded = 0usize;
    for m in measurements {
        if m.is_tasking_ok() && m.is_majority_result() {
            *per_group.entry(m.inet_group.as_deref()).or_insert(0) += 1;
            rewarded += 1;
        }
    }
    if rewarded == 0 {
        return;
    }

    let nano_scores: Vec<f64> = per_group
        .values()
        .map(|count| (*count as f64 * 1_000_000_000.0 / rewarded as f64).round())
        .collect();
    add_distribution(
        point,
        "nano_score_per_inet_group",
        &nano_scores,
        &[Stat::Min, Stat::P(50), Stat::Max],
    );
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Stat {
    Min,
    Mean,
    Max,
    /// Percentile in whole percent.
    P(u8),
}

/// Write `{prefix}_{stat}` integer fields for a distribution, truncating
/// toward zero. Writes nothing for an empty distribution.
pub(crate) fn add_distribution(point: &mut StatsPoint, prefix: &str, values: &[f64], stats: &[Stat]) {
    if values.is_empty() {
        return;
    }
    for stat in stats {
        let (suffix, value) = match stat {
            Stat::Min => ("min".to_string(), values.iter().copied().reduce(f64::min)),
            Stat::Max => ("max".to_string(), values.iter().copied().reduce(f64::max)),
            Stat::Mean => ("mean".to_string(), mean(values)),
            Stat::P(p) => (format!("p{p}"), percentile(values, f64::from(*p) / 100.0)),
        };
        if let Some(value) = value {
            point.int_field(format!("{prefix}_{suffix}"), value.trunc() as i64);
        }
    }
}

fn elapsed_ms(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Option<f64> {
    let from = from?.timestamp_millis();
    let to = to?.timestamp_millis();
    // stations report the unix epoch for "never happened"
    if from <= 0 || to <= 0 || to < from {
        return None;
    }
    Some((to - from) as f64)
}

pub(crate) fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
