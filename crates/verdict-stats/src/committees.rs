use std::collections::HashSet;

use verdict_committee::{Committee, CommitteeState};
use verdict_types::Measurement;

use crate::point::StatsPoint;
use crate::retrieval::{add_distribution, Stat};

const SIZE_STATS: [Stat; 4] = [Stat::Min, Stat::Mean, Stat::P(50), Stat::Max];

/// Add committee counts and size distributions to `point`.
///
/// Sizes are measured several ways per committee: distinct subnets,
/// participants, nodes, raw measurements, and the percentage of members
/// that agreed with the majority.
pub fn record_committee_sizes(committees: &[Committee], measurements: &[Measurement], point: &mut StatsPoint) {
    point.count_field("committees_all", committees.len());
    point.count_field(
        "committees_too_small",
        committees
            .iter()
            .filter(|c| c.state() == CommitteeState::TooSmall)
            .count(),
    );

    let mut subnets = Vec::with_capacity(committees.len());
    let mut participants = Vec::with_capacity(committees.len());
    let mut nodes = Vec::with_capacity(committees.len());
    let mut sizes = Vec::with_capacity(committees.len());
    let mut majority_ratios = Vec::with_capacity(committees.len());

    for c in committees {
        let members: Vec<&Measurement> = c.measurements(measurements).collect();
        if members.is_empty() {
            continue;
        }

        let unique_subnets: HashSet<Option<&str>> =
            members.iter().map(|m| m.inet_group.as_deref()).collect();
        let unique_participants: HashSet<&str> = members
            .iter()
            .map(|m| m.participant_address.as_str())
            .collect();
        let unique_nodes: HashSet<String> = members.iter().map(|m| m.node_key()).collect();
        let majority = members.iter().filter(|m| m.is_majority_result()).count();

        subnets.push(unique_subnets.len() as f64);
        participants.push(unique_participants.len() as f64);
        nodes.push(unique_nodes.len() as f64);
        sizes.push(members.len() as f64);
        majority_ratios.push(((majority * 100) / members.len()) as f64);
    }

    add_distribution(point, "subnets", &subnets, &SIZE_STATS);
    add_distribution(point, "participants", &participants, &SIZE_STATS);
    add_distribution(point, "nodes", &nodes, &SIZE_STATS);
    add_distribution(point, "measurements", &sizes, &SIZE_STATS);
    add_distribution(point, "majority_ratios_percents", &majority_ratios, &SIZE_STATS);
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_committee::{evaluate_committees, group_into_committees};
    use verdict_types::{ConsensusEvaluation, TaskId, TaskingEvaluation};

    fn valid() -> Measurement {
        let mut m = Measurement::new("station", "0xparticipant", &TaskId::new("bafyvalid", "f1test"))
            .with_inet_group("ig0");
        m.tasking_evaluation = Some(TaskingEvaluation::Ok);
        m
    }

    fn another_task() -> Measurement {
        let mut m = valid();
        m.cid = "bafyanother".to_string();
        m
    }

    fn record(ms: &[Measurement]) -> StatsPoint {
        let committees = group_into_committees(ms);
        let mut point = StatsPoint::new("committees", 1);
        record_committee_sizes(&committees, ms, &mut point);
        point
    }

    fn assert_distribution(point: &StatsPoint, prefix: &str, expected: [i64; 4]) {
        for (suffix, value) in ["min", "mean", "p50", "max"].iter().zip(expected) {
            assert_eq!(point.int(&format!("{prefix}_{suffix}")), Some(value), "{prefix}_{suffix}");
        }
    }

    #[test]
    fn test_unique_subnets() {
        let mut second = valid().with_inet_group("ig1");
        second.participant_address = "0xanother".to_string();
        let ms = vec![
            valid().with_inet_group("ig1"),
            second,
            valid().with_inet_group("ig2"),
            valid().with_inet_group("ig3"),
            another_task(),
        ];
        // (3 + 1) / 2
        assert_distribution(&record(&ms), "subnets", [1, 2, 2, 3]);
    }

    #[test]
    fn test_unique_participants() {
        let with_address = |a: &str| {
            let mut m = valid();
            m.participant_address = a.to_string();
            m
        };
        let ms = vec![
            with_address("0xone"),
            with_address("0xone").with_inet_group("ig1"),
            with_address("0xtwo"),
            with_address("0xthree"),
            another_task(),
        ];
        assert_distribution(&record(&ms), "participants", [1, 2, 2, 3]);
    }

    #[test]
    fn test_unique_nodes() {
        let node = |group: &str, address: &str| {
            let mut m = valid().with_inet_group(group);
            m.participant_address = address.to_string();
            m
        };
        let ms = vec![
            node("ig1", "0xone"),
            node("ig1", "0xone"),
            node("ig2", "0xone"),
            valid(),
            another_task(),
        ];
        assert_distribution(&record(&ms), "nodes", [1, 2, 2, 3]);
    }

    #[test]
    fn test_measurement_counts_and_majority_ratio() {
        let mut ms = vec![valid(), valid(), valid(), another_task()];
        for m in ms.iter_mut() {
            m.consensus_evaluation = Some(ConsensusEvaluation::MajorityResult);
        }
        ms[0].consensus_evaluation = Some(ConsensusEvaluation::MinorityResult);

        let point = record(&ms);
        assert_eq!(point.int("committees_all"), Some(2));
        assert_distribution(&point, "measurements", [1, 2, 2, 3]);
        // 2/3 rounded down
        assert_eq!(point.int("majority_ratios_percents_min"), Some(66));
        assert_eq!(point.int("majority_ratios_percents_max"), Some(100));
    }

    #[test]
    fn test_counts_too_small_committees() {
        let mut ms = vec![valid(), valid(), another_task()];
        let mut committees = group_into_committees(&ms);
        evaluate_committees(&mut committees, &mut ms, 2);

        let mut point = StatsPoint::new("committees", 1);
        record_committee_sizes(&committees, &ms, &mut point);
        assert_eq!(point.int("committees_all"), Some(2));
        assert_eq!(point.int("committees_too_small"), Some(1));
    }

    #[test]
    fn test_no_committees() {
        let point = record(&[]);
        assert_eq!(point.int("committees_all"), Some(0));
        assert_eq!(point.int("subnets_min"), None);
    }
}
