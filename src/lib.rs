/*!
 * OS Simulation Library
 * Process lifecycle, CPU scheduling and bounded-buffer synchronization
 */

pub mod core;
pub mod ipc;
pub mod monitoring;
pub mod process;
pub mod scheduler;

// Re-exports
pub use crate::core::config::SimConfig;
pub use crate::core::errors::*;
pub use crate::core::types::{Pid, Priority, Tick};
pub use ipc::{
    BoundedBuffer, Pipe, PipeStats, RoleConfig, SessionReport, SyncEvent, SyncSession, SyncSnapshot,
};
pub use monitoring::{init_tracing_with, EventStream, Subscriber};
pub use process::{ProcessRegistry, ProcessState, TransitionEvent};
pub use scheduler::{
    demo_workload, fcfs, round_robin, sjf, Algorithm, ScheduleEntry, ScheduleReport,
    SchedulingAlgorithm, WorkloadDescriptor,
};
