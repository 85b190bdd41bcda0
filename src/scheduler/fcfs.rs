/*!
 * First-Come-First-Served
 * Non-preemptive scheduling in arrival order
 */

use super::metrics::build_report;
use super::traits::SchedulingAlgorithm;
use super::types::{Algorithm, ScheduleEntry, ScheduleReport, SchedulerResult, WorkloadDescriptor};
use super::workload::{arrival_order, validate};
use crate::core::types::Tick;

/// FCFS scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fcfs;

impl SchedulingAlgorithm for Fcfs {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Fcfs
    }

    fn schedule(&self, workload: &[WorkloadDescriptor]) -> SchedulerResult<ScheduleReport> {
        fcfs(workload)
    }
}

/// Run FCFS over `workload`
pub fn fcfs(workload: &[WorkloadDescriptor]) -> SchedulerResult<ScheduleReport> {
    validate(workload)?;

    let mut clock: Tick = 0;
    let mut entries = Vec::with_capacity(workload.len());
    let mut waiting = vec![0; workload.len()];

    for i in arrival_order(workload) {
        let job = &workload[i];
        let start = clock.max(job.arrival);
        let finish = start + job.service;

        waiting[i] = start - job.arrival;
        entries.push(ScheduleEntry::new(job.id, start, finish));
        clock = finish;
    }

    Ok(build_report(Algorithm::Fcfs, workload, entries, &waiting))
}
