/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 *
 * Every variant is a local precondition violation reported to the caller.
 * None of them is fatal and none is retried by the engine.
 */

use crate::core::types::Pid;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process registry result
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Scheduling library result
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Configuration result
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Process state machine errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ProcessError {
    #[error("Process {0} is already running")]
    #[diagnostic(
        code(process::already_running),
        help("Block or finish the running process before scheduling another one.")
    )]
    AlreadyRunning(Pid),

    #[error("Ready queue is empty")]
    #[diagnostic(
        code(process::empty_ready_queue),
        help("Create processes or wake a blocked process first.")
    )]
    EmptyReadyQueue,

    #[error("No process is running")]
    #[diagnostic(
        code(process::no_running_process),
        help("Schedule a ready process first.")
    )]
    NoRunningProcess,

    #[error("Blocked queue is empty")]
    #[diagnostic(
        code(process::empty_blocked_queue),
        help("Only a blocked process can be woken.")
    )]
    EmptyBlockedQueue,
}

/// Scheduling library errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SchedulerError {
    #[error("Workload is empty")]
    #[diagnostic(
        code(scheduler::empty_workload),
        help("Supply at least one workload descriptor.")
    )]
    EmptyWorkload,

    #[error("Process {0} has zero service time")]
    #[diagnostic(
        code(scheduler::zero_service_time),
        help("Service time must be at least one time unit.")
    )]
    ZeroServiceTime(Pid),

    #[error("Process {0} appears more than once in the workload")]
    #[diagnostic(
        code(scheduler::duplicate_id),
        help("Workload ids identify processes and must be unique.")
    )]
    DuplicateId(Pid),

    #[error("Workload runs past the end of the time range")]
    #[diagnostic(
        code(scheduler::time_overflow),
        help("The latest arrival plus the total service time must fit in a u64 tick.")
    )]
    TimeOverflow,
}

/// Configuration errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    #[diagnostic(
        code(config::invalid_value),
        help("Check the environment variable or configuration document.")
    )]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {0}")]
    #[diagnostic(code(config::parse), help("The configuration must be a JSON object."))]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
