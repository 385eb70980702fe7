use std::collections::{BTreeMap, HashSet};

use sha2::{Digest, Sha256};

use verdict_types::{Measurement, Result, TaskId, TaskingEvaluation, VerdictError};

/// Public tie-break key for a measurement inside its inet group: the hex
/// SHA-256 digest of its ISO-8601 completion timestamp.
pub fn fairness_key(index: usize, measurement: &Measurement) -> Result<String> {
    let iso = measurement.finished_at_iso().ok_or(VerdictError::MissingField {
        index,
        field: "finished_at",
    })?;
    Ok(hex::encode(Sha256::digest(iso.as_bytes())))
}

/// Limit rewarded measurements per inet group.
///
/// Only measurements currently tagged `OK` take part. Within each group they
/// are walked in ascending fairness-key order; the first report of a task
/// stays `OK`, repeats of that task become `DUP_INET_GROUP`, and once the
/// group holds `max_tasks_per_node` winners the rest become `TOO_MANY_TASKS`.
/// Equal keys keep their input order.
pub fn evaluate_inet_groups(measurements: &mut [Measurement], max_tasks_per_node: u32) -> Result<()> {
    let mut groups: BTreeMap<String, Vec<(String, usize)>> = BTreeMap::new();

    for (index, m) in measurements.iter().enumerate() {
        if !m.is_tasking_ok() {
            continue;
        }
        let group = m.inet_group.clone().ok_or(VerdictError::MissingField {
            index,
            field: "inet_group",
        })?;
        let key = fairness_key(index, m)?;
        groups.entry(group).or_default().push((key, index));
    }

    let cap = max_tasks_per_node as usize;
    for (group, mut members) in groups {
        members.sort();

        let mut rewarded: HashSet<TaskId> = HashSet::new();
        let mut dropped = 0usize;
        for (_, index) in members {
            let m = &mut measurements[index];
            let task = m.task_id();
            let outcome = if rewarded.contains(&task) {
                TaskingEvaluation::DupInetGroup
            } else if rewarded.len() >= cap {
                TaskingEvaluation::TooManyTasks
            } else {
                rewarded.insert(task);
                TaskingEvaluation::Ok
            };
            if outcome != TaskingEvaluation::Ok {
                dropped += 1;
            }
            m.tasking_evaluation = Some(outcome);
        }

        if dropped > 0 {
            tracing::trace!(inet_group = %group, winners = rewarded.len(), dropped, "Arbitrated inet group");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn ok_measurement(group: &str, task: &TaskId, offset_ms: i64) -> Measurement {
        let mut m = Measurement::new("station", "0xp", task)
            .with_inet_group(group)
            .with_finished_at(base_time() + Duration::milliseconds(offset_ms));
        m.tasking_evaluation = Some(TaskingEvaluation::Ok);
        m
    }

    fn count(ms: &[Measurement], outcome: TaskingEvaluation) -> usize {
        ms.iter()
            .filter(|m| m.tasking_evaluation == Some(outcome))
            .count()
    }

    #[test]
    fn test_fairness_key_is_sha256_of_iso_timestamp() {
        let m = ok_measurement("g", &TaskId::new("c", "f01"), 0);
        let expected = hex::encode(Sha256::digest(b"2024-03-01T12:00:00.000Z"));
        assert_eq!(fairness_key(0, &m).unwrap(), expected);
    }

    #[test]
    fn test_duplicate_task_in_group_has_single_winner() {
        let task = TaskId::new("bafy", "f01");
        let mut ms: Vec<Measurement> = (0..4).map(|i| ok_measurement("g1", &task, i * 17)).collect();

        evaluate_inet_groups(&mut ms, 10).unwrap();
        assert_eq!(count(&ms, TaskingEvaluation::Ok), 1);
        assert_eq!(count(&ms, TaskingEvaluation::DupInetGroup), 3);
    }

    #[test]
    fn test_group_cap() {
        let mut ms: Vec<Measurement> = (0..6)
            .map(|i| ok_measurement("g1", &TaskId::new(format!("bafy{i}"), "f01"), i * 31))
            .collect();

        evaluate_inet_groups(&mut ms, 4).unwrap();
        assert_eq!(count(&ms, TaskingEvaluation::Ok), 4);
        assert_eq!(count(&ms, TaskingEvaluation::TooManyTasks), 2);
    }

    #[test]
    fn test_groups_are_independent() {
        let task = TaskId::new("bafy", "f01");
        let mut ms = vec![
            ok_measurement("g1", &task, 0),
            ok_measurement("g2", &task, 0),
            ok_measurement("g3", &task, 5),
        ];

        evaluate_inet_groups(&mut ms, 1).unwrap();
        assert_eq!(count(&ms, TaskingEvaluation::Ok), 3);
    }

    #[test]
    fn test_non_ok_measurements_are_left_alone() {
        let task = TaskId::new("bafy", "f01");
        let mut wrong_node = ok_measurement("g1", &task, 0);
        wrong_node.tasking_evaluation = Some(TaskingEvaluation::TaskWrongNode);
        let mut ms = vec![wrong_node, ok_measurement("g1", &task, 1)];

        evaluate_inet_groups(&mut ms, 5).unwrap();
        assert_eq!(ms[0].tasking_evaluation, Some(TaskingEvaluation::TaskWrongNode));
        assert_eq!(ms[1].tasking_evaluation, Some(TaskingEvaluation::Ok));
    }

    #[test]
    fn test_winner_does_not_depend_on_input_order() {
        let task = TaskId::new("bafy", "f01");
        let forward: Vec<Measurement> = (0..5).map(|i| ok_measurement("g1", &task, i * 1000)).collect();
        let mut reversed = forward.clone();
        reversed.reverse();

        let mut a = forward.clone();
        let mut b = reversed;
        evaluate_inet_groups(&mut a, 3).unwrap();
        evaluate_inet_groups(&mut b, 3).unwrap();

        let winner_a = a.iter().find(|m| m.is_tasking_ok()).unwrap().finished_at;
        let winner_b = b.iter().find(|m| m.is_tasking_ok()).unwrap().finished_at;
        assert_eq!(winner_a, winner_b);
    }

    #[test]
    fn test_missing_timestamp_fails() {
        let mut m = ok_measurement("g1", &TaskId::new("bafy", "f01"), 0);
        m.finished_at = None;
        let err = evaluate_inet_groups(&mut [m], 3).unwrap_err();
        assert!(matches!(err, VerdictError::MissingField { field: "finished_at", .. }));
    }

    proptest! {
        #[test]
        fn prop_group_caps_hold(
            entries in prop::collection::vec((0u8..4, 0u8..8, 0i64..100_000), 0..80),
            cap in 0u32..6,
        ) {
            let mut ms: Vec<Measurement> = entries
                .iter()
                .map(|(g, t, off)| {
                    ok_measurement(&format!("g{g}"), &TaskId::new(format!("bafy{t}"), "f01"), *off)
                })
                .collect();

            evaluate_inet_groups(&mut ms, cap).unwrap();

            let mut per_group: HashMap<String, usize> = HashMap::new();
            let mut per_pair: HashMap<(String, TaskId), usize> = HashMap::new();
            for m in ms.iter().filter(|m| m.is_tasking_ok()) {
                let group = m.inet_group.clone().unwrap();
                *per_group.entry(group.clone()).or_default() += 1;
                *per_pair.entry((group, m.task_id())).or_default() += 1;
            }
            prop_assert!(per_group.values().all(|n| *n <= cap as usize));
            prop_assert!(per_pair.values().all(|n| *n == 1));
        }
    }
}
