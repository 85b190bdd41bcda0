/*!
 * Scheduler Traits
 * Common interface of the interchangeable scheduling algorithms
 */

use super::types::{Algorithm, ScheduleReport, SchedulerResult, WorkloadDescriptor};

/// A deterministic, side-effect-free scheduling algorithm
///
/// Implementations never mutate the workload and reject an empty one
/// with `SchedulerError::EmptyWorkload`.
pub trait SchedulingAlgorithm: Send + Sync {
    /// Which algorithm this is
    fn algorithm(&self) -> Algorithm;

    /// Compute the timeline and metrics for `workload`
    fn schedule(&self, workload: &[WorkloadDescriptor]) -> SchedulerResult<ScheduleReport>;
}
