/*!
 * Schedule Metrics
 * Turns a timeline plus per-job waiting times into a report
 */

use super::types::{Algorithm, ProcessMetrics, Schedule, ScheduleReport, WorkloadDescriptor};
use crate::core::types::{Pid, Tick};
use ahash::RandomState;
use std::collections::HashMap;
use tracing::debug;

/// Build a report; `waiting[i]` belongs to `workload[i]`
///
/// Turnaround is always measured from arrival to the finish of the job's
/// last slice. Waiting is supplied by the algorithm because round-robin
/// accounts it differently from the non-preemptive algorithms.
pub(super) fn build_report(
    algorithm: Algorithm,
    workload: &[WorkloadDescriptor],
    entries: Schedule,
    waiting: &[Tick],
) -> ScheduleReport {
    debug_assert_eq!(workload.len(), waiting.len());

    let mut finish: HashMap<Pid, Tick, RandomState> =
        HashMap::with_capacity_and_hasher(workload.len(), RandomState::new());
    for entry in &entries {
        let last = finish.entry(entry.id).or_insert(entry.finish);
        *last = (*last).max(entry.finish);
    }

    let processes: Vec<ProcessMetrics> = workload
        .iter()
        .zip(waiting)
        .map(|(job, &waiting)| {
            let finish = finish.get(&job.id).copied().unwrap_or(job.arrival);
            ProcessMetrics {
                id: job.id,
                arrival: job.arrival,
                service: job.service,
                finish,
                waiting,
                turnaround: finish - job.arrival,
            }
        })
        .collect();

    // Summed as f64: per-job times fit in a tick, their totals may not
    let count = processes.len().max(1) as f64;
    let mean_wait = processes.iter().map(|m| m.waiting as f64).sum::<f64>() / count;
    let mean_turnaround = processes.iter().map(|m| m.turnaround as f64).sum::<f64>() / count;

    debug!(
        algorithm = %algorithm,
        slices = entries.len(),
        mean_wait,
        mean_turnaround,
        "Schedule computed"
    );

    ScheduleReport {
        algorithm,
        entries,
        processes,
        mean_wait,
        mean_turnaround,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::types::ScheduleEntry;

    #[test]
    fn test_turnaround_uses_last_slice() {
        let workload = [WorkloadDescriptor::new(1, 1, 3, 0)];
        let entries = vec![ScheduleEntry::new(1, 1, 3), ScheduleEntry::new(1, 5, 6)];
        let report = build_report(Algorithm::RoundRobin, &workload, entries, &[2]);

        let m = report.metrics_for(1).unwrap();
        assert_eq!(m.finish, 6);
        assert_eq!(m.turnaround, 5);
        assert_eq!(m.waiting, 2);
        assert_eq!(report.mean_turnaround, 5.0);
    }
}
