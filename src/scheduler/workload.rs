/*!
 * Workload Helpers
 * Validation, arrival ordering and the preset demo workload
 */

use super::types::{SchedulerError, SchedulerResult, WorkloadDescriptor};
use crate::core::types::Tick;
use ahash::RandomState;
use std::collections::HashSet;

/// Reject workloads the algorithms cannot schedule
pub fn validate(workload: &[WorkloadDescriptor]) -> SchedulerResult<()> {
    if workload.is_empty() {
        return Err(SchedulerError::EmptyWorkload);
    }

    let mut ids: HashSet<_, RandomState> = HashSet::with_hasher(RandomState::new());
    let mut latest_arrival: Tick = 0;
    let mut total_service: Tick = 0;
    for job in workload {
        if job.service == 0 {
            return Err(SchedulerError::ZeroServiceTime(job.id));
        }
        if !ids.insert(job.id) {
            return Err(SchedulerError::DuplicateId(job.id));
        }
        latest_arrival = latest_arrival.max(job.arrival);
        total_service = total_service
            .checked_add(job.service)
            .ok_or(SchedulerError::TimeOverflow)?;
    }

    // Bounds every finish time the algorithms can produce
    latest_arrival
        .checked_add(total_service)
        .ok_or(SchedulerError::TimeOverflow)?;

    Ok(())
}

/// Indices of `workload` by arrival time, ties kept in input order
pub(super) fn arrival_order(workload: &[WorkloadDescriptor]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..workload.len()).collect();
    // sort_by_key is stable
    order.sort_by_key(|&i| workload[i].arrival);
    order
}

/// Four-job workload used by the host demo
pub fn demo_workload() -> Vec<WorkloadDescriptor> {
    vec![
        WorkloadDescriptor::new(1, 0, 5, 3),
        WorkloadDescriptor::new(2, 1, 3, 1),
        WorkloadDescriptor::new(3, 2, 2, 2),
        WorkloadDescriptor::new(4, 4, 4, 4),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert_eq!(validate(&[]), Err(SchedulerError::EmptyWorkload));
        assert_eq!(
            validate(&[WorkloadDescriptor::new(9, 0, 0, 0)]),
            Err(SchedulerError::ZeroServiceTime(9))
        );
        assert_eq!(
            validate(&[
                WorkloadDescriptor::new(1, 0, 1, 0),
                WorkloadDescriptor::new(1, 2, 1, 0)
            ]),
            Err(SchedulerError::DuplicateId(1))
        );
        assert_eq!(validate(&demo_workload()), Ok(()));
    }

    #[test]
    fn test_validate_time_overflow() {
        assert_eq!(
            validate(&[WorkloadDescriptor::new(1, Tick::MAX - 1, 5, 0)]),
            Err(SchedulerError::TimeOverflow)
        );
        assert_eq!(
            validate(&[
                WorkloadDescriptor::new(1, 0, Tick::MAX / 2 + 1, 0),
                WorkloadDescriptor::new(2, 0, Tick::MAX / 2 + 1, 0),
            ]),
            Err(SchedulerError::TimeOverflow)
        );
        // Exactly at the limit still fits
        assert_eq!(
            validate(&[
                WorkloadDescriptor::new(1, 0, 1, 0),
                WorkloadDescriptor::new(2, Tick::MAX - 2, 1, 0),
            ]),
            Ok(())
        );
    }

    #[test]
    fn test_arrival_order_is_stable() {
        let workload = [
            WorkloadDescriptor::new(1, 3, 1, 0),
            WorkloadDescriptor::new(2, 0, 1, 0),
            WorkloadDescriptor::new(3, 3, 1, 0),
            WorkloadDescriptor::new(4, 0, 1, 0),
        ];
        assert_eq!(arrival_order(&workload), vec![1, 3, 0, 2]);
    }
}
