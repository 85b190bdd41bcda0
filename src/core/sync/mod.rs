/*!
 * Synchronization Primitives
 *
 * Counting semaphores whose observable counts are the real wait state,
 * not a hand-maintained mirror of it.
 */

mod semaphore;

pub use semaphore::{SemaphoreCounts, SemaphoreKind, SemaphoreTriple};
