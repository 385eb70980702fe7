use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use verdict_types::{Randomness, Result, RoundDetails, TaskId, VerdictError};

/// Tasks each station may be rewarded for in one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationAllocations {
    by_station: BTreeMap<String, Vec<TaskId>>,
}

impl StationAllocations {
    pub fn tasks_for(&self, station_id: &str) -> Option<&[TaskId]> {
        self.by_station.get(station_id).map(Vec::as_slice)
    }

    /// Whether `task` was allocated to `station_id`.
    ///
    /// Asking about a station that was never allocated is a caller bug: every
    /// reporting station gets an entry, even when it is empty.
    pub fn is_allowed(&self, station_id: &str, task: &TaskId) -> Result<bool> {
        let tasks = self
            .by_station
            .get(station_id)
            .ok_or_else(|| VerdictError::StationNotAllocated(station_id.to_string()))?;
        Ok(tasks.contains(task))
    }

    pub fn station_count(&self) -> usize {
        self.by_station.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[TaskId])> {
        self.by_station
            .iter()
            .map(|(station, tasks)| (station.as_str(), tasks.as_slice()))
    }
}

/// Deterministic task allocator keyed by the round's beacon randomness.
///
/// Every task gets a key `sha256("{cid}::{minerId}::{randomness_hex}")` and
/// every station a key `sha256(station_id)`. A station is allocated the
/// `max_tasks_per_node` tasks whose key is closest to its own by XOR
/// distance, ties broken by position in the round's task list. Stations
/// cannot steer this before the randomness is published, and anyone holding
/// the round details and the beacon output can recompute it.
pub struct TaskAllocator<'a> {
    details: &'a RoundDetails,
    task_keys: Vec<[u8; 32]>,
}

impl<'a> TaskAllocator<'a> {
    pub fn new(details: &'a RoundDetails, randomness: &Randomness) -> Self {
        let randomness_hex = randomness.to_hex();
        let task_keys = details
            .retrieval_tasks
            .iter()
            .map(|t| sha256(format!("{}::{}::{}", t.cid, t.miner_id, randomness_hex).as_bytes()))
            .collect();
        Self { details, task_keys }
    }

    /// Tasks allowed for one station, closest first.
    pub fn tasks_for_station(&self, station_id: &str) -> Vec<TaskId> {
        let station_key = sha256(station_id.as_bytes());

        let mut ranked: Vec<([u8; 32], usize)> = self
            .task_keys
            .iter()
            .enumerate()
            .map(|(idx, task_key)| (xor_distance(task_key, &station_key), idx))
            .collect();
        ranked.sort();

        ranked
            .into_iter()
            .take(self.details.max_tasks_per_node as usize)
            .map(|(_, idx)| self.details.retrieval_tasks[idx].task_id())
            .collect()
    }

    /// Allocate tasks for every given station.
    pub fn allocate<'s>(&self, station_ids: impl IntoIterator<Item = &'s str>) -> StationAllocations {
        let mut by_station = BTreeMap::new();
        for station_id in station_ids {
            if by_station.contains_key(station_id) {
                continue;
            }
            by_station.insert(station_id.to_string(), self.tasks_for_station(station_id));
        }
        StationAllocations { by_station }
    }
}

/// Allocate tasks for the given stations.
pub fn allocate_tasks<'s>(
    details: &RoundDetails,
    randomness: &Randomness,
    station_ids: impl IntoIterator<Item = &'s str>,
) -> StationAllocations {
    let allocations = TaskAllocator::new(details, randomness).allocate(station_ids);
    tracing::debug!(
        tasks = details.retrieval_tasks.len(),
        max_tasks_per_node = details.max_tasks_per_node,
        stations = allocations.station_count(),
        "Built per-station task lists"
    );
    allocations
}

fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

fn xor_distance(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
        *o = x ^ y;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use verdict_types::RetrievalTask;

    fn details(task_count: usize, max_tasks_per_node: u32) -> RoundDetails {
        RoundDetails {
            round_id: 1,
            start_epoch: 4158303,
            retrieval_tasks: (0..task_count)
                .map(|i| RetrievalTask::new(format!("bafy{i}"), format!("f0{}", i % 7)))
                .collect(),
            max_tasks_per_node,
        }
    }

    fn randomness(seed: u8) -> Randomness {
        Randomness::from_bytes(vec![seed; 32]).unwrap()
    }

    #[test]
    fn test_allocation_is_deterministic() {
        let d = details(100, 10);
        let r = randomness(7);
        let first = allocate_tasks(&d, &r, ["s1", "s2", "s3"]);
        let second = allocate_tasks(&d, &r, ["s3", "s2", "s1"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_allocation_respects_cap() {
        let d = details(100, 10);
        let allocations = allocate_tasks(&d, &randomness(1), ["s1", "s2"]);
        for (_, tasks) in allocations.iter() {
            assert_eq!(tasks.len(), 10);
        }
    }

    #[test]
    fn test_small_round_allocates_every_task() {
        let d = details(3, 10);
        let allocations = allocate_tasks(&d, &randomness(1), ["s1"]);
        assert_eq!(allocations.tasks_for("s1").unwrap().len(), 3);
    }

    #[test]
    fn test_randomness_changes_allocation() {
        let d = details(200, 5);
        let a = allocate_tasks(&d, &randomness(1), ["s1"]);
        let b = allocate_tasks(&d, &randomness(2), ["s1"]);
        assert_ne!(a.tasks_for("s1"), b.tasks_for("s1"));
    }

    #[test]
    fn test_stations_get_different_tasks() {
        let d = details(200, 5);
        let allocations = allocate_tasks(&d, &randomness(3), ["s1", "s2"]);
        assert_ne!(allocations.tasks_for("s1"), allocations.tasks_for("s2"));
    }

    #[test]
    fn test_unknown_station_is_an_error() {
        let d = details(10, 2);
        let allocations = allocate_tasks(&d, &randomness(1), ["s1"]);
        let task = d.retrieval_tasks[0].task_id();
        assert!(matches!(
            allocations.is_allowed("ghost", &task),
            Err(VerdictError::StationNotAllocated(_))
        ));
    }

    #[test]
    fn test_duplicate_station_ids_are_allocated_once() {
        let d = details(10, 2);
        let allocations = allocate_tasks(&d, &randomness(1), ["s1", "s1", "s1"]);
        assert_eq!(allocations.station_count(), 1);
    }

    proptest! {
        #[test]
        fn prop_allocation_is_bounded_subset(
            task_count in 0usize..60,
            cap in 0u32..20,
            seed in any::<u8>(),
            station in "[a-z0-9]{1,12}",
        ) {
            let d = details(task_count, cap);
            let allocator = TaskAllocator::new(&d, &randomness(seed));
            let tasks = allocator.tasks_for_station(&station);

            prop_assert!(tasks.len() <= cap as usize);
            prop_assert_eq!(tasks.len(), task_count.min(cap as usize));

            let round_tasks: HashSet<TaskId> =
                d.retrieval_tasks.iter().map(RetrievalTask::task_id).collect();
            let unique: HashSet<&TaskId> = tasks.iter().collect();
            prop_assert_eq!(unique.len(), tasks.len());
            for t in &tasks {
                prop_assert!(round_tasks.contains(t));
            }
        }
    }
}
