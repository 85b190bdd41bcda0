/*!
 * Queue Partition Validation
 * Checks that every pid lives in exactly one queue and matches its state
 */

use super::types::ProcessState;
use crate::core::types::Pid;
use ahash::RandomState;
use std::collections::{HashMap, HashSet, VecDeque};

/// Borrowed view of the registry's queues
pub(super) struct Queues<'a> {
    pub ready: &'a VecDeque<Pid>,
    pub running: Option<Pid>,
    pub blocked: &'a VecDeque<Pid>,
    pub terminated: &'a [Pid],
    pub states: &'a HashMap<Pid, ProcessState, RandomState>,
}

/// Every known pid appears in exactly one queue, and that queue agrees
/// with its recorded state
pub(super) fn is_partition(queues: &Queues<'_>) -> bool {
    let placed = queues
        .ready
        .iter()
        .map(|&pid| (pid, ProcessState::Ready))
        .chain(queues.running.map(|pid| (pid, ProcessState::Running)))
        .chain(queues.blocked.iter().map(|&pid| (pid, ProcessState::Blocked)))
        .chain(queues.terminated.iter().map(|&pid| (pid, ProcessState::Terminated)));

    let mut seen: HashSet<Pid, RandomState> = HashSet::with_hasher(RandomState::new());
    for (pid, state) in placed {
        if !seen.insert(pid) {
            return false;
        }
        if queues.states.get(&pid) != Some(&state) {
            return false;
        }
    }

    seen.len() == queues.states.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(pairs: &[(Pid, ProcessState)]) -> HashMap<Pid, ProcessState, RandomState> {
        let mut map = HashMap::with_hasher(RandomState::new());
        map.extend(pairs.iter().copied());
        map
    }

    #[test]
    fn test_valid_partition() {
        let ready = VecDeque::from(vec![2, 3]);
        let blocked = VecDeque::new();
        let states = states(&[
            (1, ProcessState::Running),
            (2, ProcessState::Ready),
            (3, ProcessState::Ready),
        ]);
        assert!(is_partition(&Queues {
            ready: &ready,
            running: Some(1),
            blocked: &blocked,
            terminated: &[],
            states: &states,
        }));
    }

    #[test]
    fn test_duplicate_pid_detected() {
        let ready = VecDeque::from(vec![1]);
        let blocked = VecDeque::from(vec![1]);
        let states = states(&[(1, ProcessState::Ready)]);
        assert!(!is_partition(&Queues {
            ready: &ready,
            running: None,
            blocked: &blocked,
            terminated: &[],
            states: &states,
        }));
    }

    #[test]
    fn test_state_mismatch_detected() {
        let ready = VecDeque::from(vec![1]);
        let blocked = VecDeque::new();
        let states = states(&[(1, ProcessState::Blocked)]);
        assert!(!is_partition(&Queues {
            ready: &ready,
            running: None,
            blocked: &blocked,
            terminated: &[],
            states: &states,
        }));
    }

    #[test]
    fn test_missing_pid_detected() {
        let ready = VecDeque::new();
        let blocked = VecDeque::new();
        let states = states(&[(1, ProcessState::Ready)]);
        assert!(!is_partition(&Queues {
            ready: &ready,
            running: None,
            blocked: &blocked,
            terminated: &[],
            states: &states,
        }));
    }
}
