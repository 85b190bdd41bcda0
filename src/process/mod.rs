/*!
 * Process Module
 * Process identity and lifecycle state transitions
 */

pub mod registry;
pub mod types;
mod validation;

pub use registry::ProcessRegistry;
pub use types::{
    ProcessError, ProcessResult, ProcessState, QueueSnapshot, TransitionEvent,
};
