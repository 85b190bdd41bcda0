/*!
 * Scheduler Types
 * Workload descriptors, timelines and metrics for the scheduling library
 */

use crate::core::types::{Pid, Priority, Tick};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use crate::core::errors::{SchedulerError, SchedulerResult};

/// Static description of one job to schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkloadDescriptor {
    pub id: Pid,
    pub arrival: Tick,
    pub service: Tick,
    /// Carried through; none of the built-in algorithms look at it
    pub priority: Priority,
}

impl WorkloadDescriptor {
    pub const fn new(id: Pid, arrival: Tick, service: Tick, priority: Priority) -> Self {
        Self {
            id,
            arrival,
            service,
            priority,
        }
    }
}

impl From<(Pid, Tick, Tick, Priority)> for WorkloadDescriptor {
    fn from((id, arrival, service, priority): (Pid, Tick, Tick, Priority)) -> Self {
        Self::new(id, arrival, service, priority)
    }
}

/// One contiguous slice of CPU time given to a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScheduleEntry {
    pub id: Pid,
    pub start: Tick,
    pub finish: Tick,
}

impl ScheduleEntry {
    pub const fn new(id: Pid, start: Tick, finish: Tick) -> Self {
        Self { id, start, finish }
    }

    /// Time units covered by this slice
    #[inline]
    pub const fn len(&self) -> Tick {
        self.finish - self.start
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.finish == self.start
    }
}

impl From<(Pid, Tick, Tick)> for ScheduleEntry {
    fn from((id, start, finish): (Pid, Tick, Tick)) -> Self {
        Self::new(id, start, finish)
    }
}

/// Timeline in non-decreasing start order
pub type Schedule = Vec<ScheduleEntry>;

/// Timing results for one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessMetrics {
    pub id: Pid,
    pub arrival: Tick,
    pub service: Tick,
    /// Finish time of the job's last slice
    pub finish: Tick,
    pub waiting: Tick,
    pub turnaround: Tick,
}

/// Result of one scheduling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScheduleReport {
    pub algorithm: Algorithm,
    pub entries: Schedule,
    /// Per-job metrics in workload input order
    pub processes: Vec<ProcessMetrics>,
    pub mean_wait: f64,
    pub mean_turnaround: f64,
}

impl ScheduleReport {
    /// Time the last job finishes
    pub fn makespan(&self) -> Tick {
        self.entries.iter().map(|e| e.finish).max().unwrap_or(0)
    }

    /// Slices given to `id`, in order
    pub fn entries_for(&self, id: Pid) -> impl Iterator<Item = &ScheduleEntry> + '_ {
        self.entries.iter().filter(move |e| e.id == id)
    }

    pub fn metrics_for(&self, id: Pid) -> Option<&ProcessMetrics> {
        self.processes.iter().find(|m| m.id == id)
    }

    /// Order in which jobs first got the CPU
    pub fn dispatch_order(&self) -> Vec<Pid> {
        let mut order = Vec::with_capacity(self.processes.len());
        for entry in &self.entries {
            if !order.contains(&entry.id) {
                order.push(entry.id);
            }
        }
        order
    }
}

/// Built-in scheduling algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// First-come-first-served
    Fcfs,
    /// Non-preemptive shortest-job-first
    Sjf,
    /// Fixed-quantum round-robin
    RoundRobin,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Self::Fcfs, Self::RoundRobin, Self::Sjf];

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fcfs => "fcfs",
            Self::Sjf => "sjf",
            Self::RoundRobin => "round_robin",
        }
    }

    /// Human-readable name
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Fcfs => "First-Come-First-Served",
            Self::Sjf => "Shortest-Job-First",
            Self::RoundRobin => "Round-Robin",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fcfs" | "fifo" => Ok(Self::Fcfs),
            "sjf" | "spn" => Ok(Self::Sjf),
            "round_robin" | "roundrobin" | "rr" => Ok(Self::RoundRobin),
            _ => Err(format!("Invalid algorithm '{}'. Valid: fcfs, sjf, rr", s)),
        }
    }
}
