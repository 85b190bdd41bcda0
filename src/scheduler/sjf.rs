/*!
 * Shortest-Job-First
 * Non-preemptive: at each decision point the shortest arrived job runs
 */

use super::metrics::build_report;
use super::traits::SchedulingAlgorithm;
use super::types::{Algorithm, ScheduleEntry, ScheduleReport, SchedulerResult, WorkloadDescriptor};
use super::workload::validate;
use crate::core::types::Tick;

/// SJF scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sjf;

impl SchedulingAlgorithm for Sjf {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Sjf
    }

    fn schedule(&self, workload: &[WorkloadDescriptor]) -> SchedulerResult<ScheduleReport> {
        sjf(workload)
    }
}

/// Run SJF over `workload`
///
/// Ties on service time go to the earlier arrival, then the smaller id.
pub fn sjf(workload: &[WorkloadDescriptor]) -> SchedulerResult<ScheduleReport> {
    validate(workload)?;

    let mut clock: Tick = 0;
    let mut done = vec![false; workload.len()];
    let mut entries = Vec::with_capacity(workload.len());
    let mut waiting = vec![0; workload.len()];

    let mut remaining = workload.len();
    while remaining > 0 {
        let next = (0..workload.len())
            .filter(|&i| !done[i] && workload[i].arrival <= clock)
            .min_by_key(|&i| (workload[i].service, workload[i].arrival, workload[i].id));

        let Some(i) = next else {
            // CPU idle: nothing changes until the next arrival
            match (0..workload.len())
                .filter(|&i| !done[i])
                .map(|i| workload[i].arrival)
                .min()
            {
                Some(arrival) => clock = arrival,
                None => break,
            }
            continue;
        };

        let job = &workload[i];
        let start = clock;
        let finish = start + job.service;

        waiting[i] = start - job.arrival;
        entries.push(ScheduleEntry::new(job.id, start, finish));
        done[i] = true;
        remaining -= 1;
        clock = finish;
    }

    Ok(build_report(Algorithm::Sjf, workload, entries, &waiting))
}
