use anyhow::{Context, Result, anyhow};
use std::io::Write;

use verdict_tasking::{StationAllocations, allocate_tasks};
use verdict_types::Randomness;

use crate::cli::AllocateArgs;
use crate::sources::FileRoundDetails;

pub async fn handle(args: AllocateArgs) -> Result<()> {
    let details = FileRoundDetails::load(&args.round_details)?;
    let details = details
        .lookup(args.round)
        .ok_or_else(|| anyhow!("No round details for round {}", args.round))?;
    let randomness = Randomness::from_hex(&args.randomness).context("Invalid --randomness")?;

    let allocations = allocate_tasks(details, &randomness, args.stations.iter().map(String::as_str));
    print_allocations(&mut std::io::stdout().lock(), &allocations)?;
    Ok(())
}

fn print_allocations(out: &mut impl Write, allocations: &StationAllocations) -> Result<()> {
    for (station, tasks) in allocations.iter() {
        writeln!(out, "{station} ({} tasks)", tasks.len())?;
        for task in tasks {
            writeln!(out, "  {:<70} {}", task.cid, task.miner_id)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_types::{RetrievalTask, RoundDetails};

    #[test]
    fn test_prints_every_station() {
        let details = RoundDetails {
            round_id: 1,
            start_epoch: 10,
            retrieval_tasks: vec![RetrievalTask::new("bafy1", "f01"), RetrievalTask::new("bafy2", "f02")],
            max_tasks_per_node: 1,
        };
        let randomness = Randomness::from_bytes(vec![1u8; 32]).unwrap();
        let allocations = allocate_tasks(&details, &randomness, ["alpha", "beta"]);

        let mut out = Vec::new();
        print_allocations(&mut out, &allocations).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "alpha (1 tasks)");
        assert_eq!(lines[2], "beta (1 tasks)");
        assert!(lines[1].starts_with("  bafy"));
    }
}
