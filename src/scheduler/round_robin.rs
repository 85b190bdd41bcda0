/*!
 * Round-Robin
 * Preemptive scheduling with a fixed time quantum and circular requeueing
 *
 * # Ordering
 *
 * After a slice ends, jobs that arrived up to the new clock are enqueued
 * first and the preempted job goes behind them.
 *
 * # Waiting time
 *
 * A job accrues waiting time only for slices that complete while it sits
 * in the ready queue. A job that arrives in the middle of a slice is
 * enqueued when the slice ends and accrues nothing for that slice.
 */

use super::metrics::build_report;
use super::traits::SchedulingAlgorithm;
use super::types::{Algorithm, ScheduleEntry, ScheduleReport, SchedulerResult, WorkloadDescriptor};
use super::workload::{arrival_order, validate};
use crate::core::limits::DEFAULT_RR_QUANTUM;
use crate::core::types::Tick;
use std::collections::VecDeque;
use std::num::NonZeroU64;

/// Round-robin scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobin {
    quantum: NonZeroU64,
}

impl RoundRobin {
    pub const fn new(quantum: NonZeroU64) -> Self {
        Self { quantum }
    }

    #[inline]
    pub const fn quantum(&self) -> Tick {
        self.quantum.get()
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new(NonZeroU64::new(DEFAULT_RR_QUANTUM).unwrap_or(NonZeroU64::MIN))
    }
}

impl SchedulingAlgorithm for RoundRobin {
    fn algorithm(&self) -> Algorithm {
        Algorithm::RoundRobin
    }

    fn schedule(&self, workload: &[WorkloadDescriptor]) -> SchedulerResult<ScheduleReport> {
        round_robin_with_quantum(workload, self.quantum)
    }
}

/// Run round-robin with the default quantum of 2
pub fn round_robin(workload: &[WorkloadDescriptor]) -> SchedulerResult<ScheduleReport> {
    RoundRobin::default().schedule(workload)
}

/// Run round-robin with an explicit quantum
pub fn round_robin_with_quantum(
    workload: &[WorkloadDescriptor],
    quantum: NonZeroU64,
) -> SchedulerResult<ScheduleReport> {
    validate(workload)?;

    let mut pending = Admission::new(workload);
    let mut remaining: Vec<Tick> = workload.iter().map(|job| job.service).collect();
    let mut waiting: Vec<Tick> = vec![0; workload.len()];
    let mut entries = Vec::new();
    let mut queue: VecDeque<usize> = VecDeque::with_capacity(workload.len());
    let mut finished = 0;
    let mut clock: Tick = 0;

    pending.admit(clock, &mut queue);

    while finished < workload.len() {
        let Some(current) = queue.pop_front() else {
            // CPU idle: jump to the next arrival
            match pending.next_arrival() {
                Some(arrival) => {
                    clock = clock.max(arrival);
                    pending.admit(clock, &mut queue);
                    continue;
                }
                None => break,
            }
        };

        let run = quantum.get().min(remaining[current]);
        let start = clock;
        clock += run;
        remaining[current] -= run;
        entries.push(ScheduleEntry::new(workload[current].id, start, clock));

        // Only jobs already queued during the slice waited through it
        for &waiter in &queue {
            waiting[waiter] += run;
        }

        // New arrivals go ahead of the preempted job
        pending.admit(clock, &mut queue);

        if remaining[current] > 0 {
            queue.push_back(current);
        } else {
            finished += 1;
        }
    }

    Ok(build_report(
        Algorithm::RoundRobin,
        workload,
        entries,
        &waiting,
    ))
}

/// Jobs not yet admitted to the ready queue, in arrival order
struct Admission<'a> {
    workload: &'a [WorkloadDescriptor],
    order: Vec<usize>,
    next: usize,
}

impl<'a> Admission<'a> {
    fn new(workload: &'a [WorkloadDescriptor]) -> Self {
        Self {
            workload,
            order: arrival_order(workload),
            next: 0,
        }
    }

    /// Enqueue every job that has arrived by `clock`
    fn admit(&mut self, clock: Tick, queue: &mut VecDeque<usize>) {
        while let Some(&i) = self.order.get(self.next) {
            if self.workload[i].arrival > clock {
                break;
            }
            queue.push_back(i);
            self.next += 1;
        }
    }

    fn next_arrival(&self) -> Option<Tick> {
        self.order.get(self.next).map(|&i| self.workload[i].arrival)
    }
}
