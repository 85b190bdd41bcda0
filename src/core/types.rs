/*!
 * Core Types
 * Common types used across the simulation engine
 */

/// Process ID type (monotonically increasing, never reused)
pub type Pid = u32;

/// Simulated time in whole time units
pub type Tick = u64;

/// Priority level carried through workloads (not used by the built-in algorithms)
pub type Priority = u8;
