/*!
 * IPC Module
 * Producer/consumer synchronization over a bounded circular buffer, and a
 * message pipe between a writer and a reader thread
 */

mod bounded;
pub mod buffer;
pub mod pipe;
mod session;
pub mod types;

// Re-export for convenience
pub use bounded::BoundedBuffer;
pub use buffer::CircularBuffer;
pub use pipe::{data_label, Pipe, PipeEvent, PipeSession, PipeStats};
pub use session::{RoleHandle, SyncSession};
pub use types::{
    item_label, Action, ItemEvent, Role, RoleConfig, RoleEvent, RolePhase, RoleReport,
    SemaphoreOp, SessionReport, SyncEvent, SyncSnapshot,
};
