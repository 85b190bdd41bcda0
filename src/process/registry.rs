/*!
 * Process Registry
 * Owns process identity and the four-queue lifecycle state machine
 *
 * Single-writer: mutations take `&mut self`, so concurrent
 * callers must share a registry behind their own lock.
 */

use super::types::{ProcessError, ProcessResult, ProcessState, QueueSnapshot, TransitionEvent};
use super::validation::{is_partition, Queues};
use crate::core::limits::{DEFAULT_BATCH_SIZE, FIRST_PID};
use crate::core::types::Pid;
use crate::monitoring::{EventStream, Subscriber};
use ahash::RandomState;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// Process registry
///
/// A pid is in exactly one of: ready queue, running slot, blocked queue,
/// terminated list. The running slot holds at most one pid.
pub struct ProcessRegistry {
    next_pid: Pid,
    batch_size: usize,

    ready: VecDeque<Pid>,
    running: Option<Pid>,
    blocked: VecDeque<Pid>,
    terminated: Vec<Pid>,

    // State index for O(1) lookup
    states: HashMap<Pid, ProcessState, RandomState>,

    events: EventStream<TransitionEvent>,
}

impl ProcessRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_BATCH_SIZE)
    }

    /// Create an empty registry whose `create_batch` makes `batch_size` processes
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            next_pid: FIRST_PID,
            batch_size,
            ready: VecDeque::new(),
            running: None,
            blocked: VecDeque::new(),
            terminated: Vec::new(),
            states: HashMap::with_hasher(RandomState::new()),
            events: EventStream::new(),
        }
    }

    /// Subscribe to transition events
    pub fn subscribe(&self) -> Subscriber<TransitionEvent> {
        self.events.subscribe()
    }

    /// Allocate `n` fresh pids and append them to the ready queue
    pub fn create(&mut self, n: usize) -> Vec<Pid> {
        let pids: Vec<Pid> = (0..n)
            .map(|_| {
                let pid = self.next_pid;
                self.next_pid += 1;
                pid
            })
            .collect();

        for &pid in &pids {
            self.ready.push_back(pid);
            self.states.insert(pid, ProcessState::Ready);
            self.emit(TransitionEvent::created(pid));
        }

        info!(count = n, pids = ?pids, "Processes created");
        self.check();
        pids
    }

    /// Create the configured batch of processes
    pub fn create_batch(&mut self) -> Vec<Pid> {
        self.create(self.batch_size)
    }

    /// Move the head of the ready queue into the running slot
    pub fn schedule_next(&mut self) -> ProcessResult<Pid> {
        if let Some(current) = self.running {
            return Err(ProcessError::AlreadyRunning(current));
        }
        let pid = self.ready.pop_front().ok_or(ProcessError::EmptyReadyQueue)?;

        self.running = Some(pid);
        self.transition(pid, ProcessState::Ready, ProcessState::Running);
        Ok(pid)
    }

    /// Move the running process to the tail of the blocked queue
    pub fn block_running(&mut self) -> ProcessResult<Pid> {
        let pid = self.running.take().ok_or(ProcessError::NoRunningProcess)?;

        self.blocked.push_back(pid);
        self.transition(pid, ProcessState::Running, ProcessState::Blocked);
        Ok(pid)
    }

    /// Move the head of the blocked queue to the tail of the ready queue
    pub fn wake_first_blocked(&mut self) -> ProcessResult<Pid> {
        let pid = self
            .blocked
            .pop_front()
            .ok_or(ProcessError::EmptyBlockedQueue)?;

        self.ready.push_back(pid);
        self.transition(pid, ProcessState::Blocked, ProcessState::Ready);
        Ok(pid)
    }

    /// Terminate the running process
    pub fn finish_running(&mut self) -> ProcessResult<Pid> {
        let pid = self.running.take().ok_or(ProcessError::NoRunningProcess)?;

        self.terminated.push(pid);
        self.transition(pid, ProcessState::Running, ProcessState::Terminated);
        Ok(pid)
    }

    fn transition(&mut self, pid: Pid, from: ProcessState, to: ProcessState) {
        debug_assert!(from.can_transition_to(to));
        self.states.insert(pid, to);

        debug!(pid, from = %from, to = %to, "Process state changed");
        self.emit(TransitionEvent::moved(pid, from, to));
        self.check();
    }

    #[inline]
    fn emit(&self, event: TransitionEvent) {
        self.events.publish(event);
    }

    #[inline]
    fn check(&self) {
        debug_assert!(self.is_consistent(), "process queues no longer partition the pids");
    }

    /// State of `pid`, if it was ever created
    pub fn state_of(&self, pid: Pid) -> Option<ProcessState> {
        self.states.get(&pid).copied()
    }

    /// Pid in the running slot
    pub fn running(&self) -> Option<Pid> {
        self.running
    }

    /// Ready queue, head first
    pub fn ready(&self) -> impl Iterator<Item = Pid> + '_ {
        self.ready.iter().copied()
    }

    /// Blocked queue, head first
    pub fn blocked(&self) -> impl Iterator<Item = Pid> + '_ {
        self.blocked.iter().copied()
    }

    /// Terminated pids in termination order
    pub fn terminated(&self) -> &[Pid] {
        &self.terminated
    }

    /// Copy of every queue
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            ready: self.ready.iter().copied().collect(),
            running: self.running,
            blocked: self.blocked.iter().copied().collect(),
            terminated: self.terminated.clone(),
        }
    }

    /// Number of processes ever created
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Whether every pid is in exactly one queue matching its state
    pub fn is_consistent(&self) -> bool {
        is_partition(&Queues {
            ready: &self.ready,
            running: self.running,
            blocked: &self.blocked,
            terminated: &self.terminated,
            states: &self.states,
        })
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("ready", &self.ready)
            .field("running", &self.running)
            .field("blocked", &self.blocked)
            .field("terminated", &self.terminated)
            .finish()
    }
}
