/*!
 * Scheduler Module
 * Pure CPU-scheduling algorithms over static workloads
 */

mod fcfs;
mod metrics;
mod round_robin;
mod sjf;
pub mod traits;
pub mod types;
pub mod workload;

// Re-export public API
pub use fcfs::{fcfs, Fcfs};
pub use round_robin::{round_robin, round_robin_with_quantum, RoundRobin};
pub use sjf::{sjf, Sjf};
pub use traits::SchedulingAlgorithm;
pub use types::{
    Algorithm, ProcessMetrics, Schedule, ScheduleEntry, ScheduleReport, SchedulerError,
    SchedulerResult, WorkloadDescriptor,
};
pub use workload::{demo_workload, validate};

impl Algorithm {
    /// Boxed scheduler for this algorithm (round-robin uses the default quantum)
    pub fn scheduler(self) -> Box<dyn SchedulingAlgorithm> {
        match self {
            Algorithm::Fcfs => Box::new(Fcfs),
            Algorithm::Sjf => Box::new(Sjf),
            Algorithm::RoundRobin => Box::new(RoundRobin::default()),
        }
    }

    /// Run this algorithm over `workload`
    pub fn run(self, workload: &[WorkloadDescriptor]) -> SchedulerResult<ScheduleReport> {
        self.scheduler().schedule(workload)
    }
}
