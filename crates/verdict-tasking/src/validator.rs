use std::collections::HashSet;

use verdict_types::{
    check_required_fields, Measurement, Result, RoundDetails, TaskId, TaskingEvaluation,
};

use crate::allocator::StationAllocations;

/// Tag every measurement with its tasking outcome.
///
/// A task outside the round is `TASK_NOT_IN_ROUND`; a round task the station
/// was not allocated is `TASK_WRONG_NODE`; everything else is `OK` and goes on
/// to inet-group arbitration. Fails when a measurement is missing a required
/// field or its station has no allocation.
pub fn evaluate_tasking(
    measurements: &mut [Measurement],
    details: &RoundDetails,
    allocations: &StationAllocations,
) -> Result<()> {
    check_required_fields(measurements)?;

    let round_tasks: HashSet<TaskId> = details
        .retrieval_tasks
        .iter()
        .map(|t| t.task_id())
        .collect();

    for m in measurements.iter_mut() {
        let task = m.task_id();
        let outcome = if !round_tasks.contains(&task) {
            TaskingEvaluation::TaskNotInRound
        } else if !allocations.is_allowed(&m.station_id, &task)? {
            TaskingEvaluation::TaskWrongNode
        } else {
            TaskingEvaluation::Ok
        };
        m.tasking_evaluation = Some(outcome);
    }

    Ok(())
}
