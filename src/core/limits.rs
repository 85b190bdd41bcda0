/*!
 * Simulation Limits and Constants
 *
 * Centralized location for the engine's defaults and magic numbers,
 * grouped by subsystem.
 */

use crate::core::types::{Pid, Tick};
use std::time::Duration;

// =============================================================================
// PROCESS REGISTRY
// =============================================================================

/// First pid handed out by a fresh registry
pub const FIRST_PID: Pid = 1;

/// Processes created by one `create_batch` call
pub const DEFAULT_BATCH_SIZE: usize = 5;

// =============================================================================
// SCHEDULING
// =============================================================================

/// Round-robin time quantum
pub const DEFAULT_RR_QUANTUM: Tick = 2;

// =============================================================================
// BOUNDED BUFFER
// =============================================================================

/// Circular buffer capacity (slots)
pub const DEFAULT_BUFFER_CAPACITY: usize = 5;

/// Items each role handles per session when no limit is configured
pub const DEFAULT_ITEMS_PER_ROLE: u64 = 10;

/// Pause between item cycles
pub const DEFAULT_CYCLE_DELAY: Duration = Duration::ZERO;

/// Binary semaphore initial permit count
pub const MUTEX_PERMITS: usize = 1;

// =============================================================================
// MESSAGE PIPE
// =============================================================================

/// Messages a pipe holds in flight before the writer blocks
pub const DEFAULT_PIPE_CAPACITY: usize = 16;

/// Elapsed time below which a transfer rate reads as zero
pub const MIN_RATE_WINDOW: Duration = Duration::from_micros(1);
