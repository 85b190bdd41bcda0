/*!
 * Process Types
 * States, transition events and queue views for the process registry
 */

use crate::core::types::Pid;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use crate::core::errors::{ProcessError, ProcessResult};

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Process is in the ready queue
    Ready,
    /// Process occupies the single running slot
    Running,
    /// Process is in the blocked queue
    Blocked,
    /// Process has terminated; immutable from here on
    Terminated,
}

impl ProcessState {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Blocked => "blocked",
            Self::Terminated => "terminated",
        }
    }

    /// Whether `self -> to` is an edge of the lifecycle graph
    pub const fn can_transition_to(&self, to: ProcessState) -> bool {
        matches!(
            (self, to),
            (Self::Ready, Self::Running)
                | (Self::Running, Self::Blocked)
                | (Self::Running, Self::Terminated)
                | (Self::Blocked, Self::Ready)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One successful state change, as seen by a presentation layer
///
/// `from` is `None` for the creation of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransitionEvent {
    pub pid: Pid,
    pub from: Option<ProcessState>,
    pub to: ProcessState,
}

impl TransitionEvent {
    pub const fn created(pid: Pid) -> Self {
        Self {
            pid,
            from: None,
            to: ProcessState::Ready,
        }
    }

    pub const fn moved(pid: Pid, from: ProcessState, to: ProcessState) -> Self {
        Self {
            pid,
            from: Some(from),
            to,
        }
    }
}

impl fmt::Display for TransitionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.from {
            Some(from) => write!(f, "process {}: {} -> {}", self.pid, from, self.to),
            None => write!(f, "process {}: created -> {}", self.pid, self.to),
        }
    }
}

/// Contents of every queue at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueueSnapshot {
    pub ready: Vec<Pid>,
    pub running: Option<Pid>,
    pub blocked: Vec<Pid>,
    pub terminated: Vec<Pid>,
}

impl QueueSnapshot {
    /// Total processes across all queues
    pub fn len(&self) -> usize {
        self.ready.len() + usize::from(self.running.is_some()) + self.blocked.len() + self.terminated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_edges() {
        use ProcessState::*;
        assert!(Ready.can_transition_to(Running));
        assert!(Running.can_transition_to(Blocked));
        assert!(Running.can_transition_to(Terminated));
        assert!(Blocked.can_transition_to(Ready));

        assert!(!Ready.can_transition_to(Blocked));
        assert!(!Blocked.can_transition_to(Running));
        assert!(!Terminated.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Terminated));
    }

    #[test]
    fn test_event_display() {
        assert_eq!(TransitionEvent::created(4).to_string(), "process 4: created -> ready");
        assert_eq!(
            TransitionEvent::moved(4, ProcessState::Ready, ProcessState::Running).to_string(),
            "process 4: ready -> running"
        );
    }
}
