/*!
 * Core Module
 * Fundamental types, errors, limits, configuration and sync primitives
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod sync;
pub mod types;

// Re-export for convenience
pub use config::SimConfig;
pub use errors::*;
pub use types::*;
