/*!
 * Observability
 *
 * Structured logging setup and the event streams that carry transition
 * events and semaphore snapshots to a presentation layer.
 */

pub mod streaming;
pub mod tracer;

pub use streaming::{EventStream, StreamStats, Subscriber};
pub use tracer::init_tracing_with;
