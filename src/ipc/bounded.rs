/*!
 * Bounded Buffer
 *
 * Producer/consumer synchronization over a fixed-size circular buffer using
 * the classic three-semaphore protocol:
 *
 * - produce: P(empty), P(mutex), write, V(mutex), V(full)
 * - consume: P(full), P(mutex), read, V(mutex), V(empty)
 *
 * Every P and V publishes a [`SyncSnapshot`] taken under the semaphore lock,
 * so subscribers see each operation in order and never a torn state.
 * Slot access is only possible inside a critical section guard, which holds
 * the `mutex` permit for its lifetime.
 */

use super::buffer::CircularBuffer;
use super::types::{Action, ItemEvent, Role, SemaphoreOp, SyncEvent, SyncSnapshot};
use crate::core::sync::{SemaphoreCounts, SemaphoreKind, SemaphoreTriple};
use crate::monitoring::{EventStream, Subscriber};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// State guarded by the semaphore lock
struct Slots<T> {
    buffer: CircularBuffer<T>,
    seq: u64,
}

struct Inner<T> {
    sems: SemaphoreTriple<Slots<T>>,
    events: EventStream<SyncEvent<T>>,
    active_roles: AtomicUsize,
}

/// Result of one stoppable produce or consume cycle
pub(super) enum Cycle<T> {
    Completed(T),
    Stopped,
}

/// Shared bounded buffer; clones refer to the same buffer
pub struct BoundedBuffer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for BoundedBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> BoundedBuffer<T> {
    /// Buffer with `capacity` slots: `empty = capacity`, `full = 0`, `mutex = 1`
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Arc::new(Inner {
                sems: SemaphoreTriple::new(
                    capacity,
                    Slots {
                        buffer: CircularBuffer::new(capacity),
                        seq: 0,
                    },
                ),
                events: EventStream::new(),
                active_roles: AtomicUsize::new(0),
            }),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.sems.capacity()
    }

    /// Current semaphore counts
    pub fn counts(&self) -> SemaphoreCounts {
        self.inner.sems.counts()
    }

    /// Copy of every slot
    pub fn contents(&self) -> Vec<Option<T>> {
        self.inner.sems.with_payload(|slots, _| slots.buffer.contents())
    }

    /// Counts and contents read under one lock, with no operation attached
    pub fn snapshot(&self) -> SyncSnapshot<T> {
        self.inner.sems.with_payload(|slots, counts| SyncSnapshot {
            seq: slots.seq,
            op: None,
            empty: counts.empty,
            full: counts.full,
            mutex: counts.mutex,
            buffer: slots.buffer.contents(),
        })
    }

    /// Events published from now on
    pub fn subscribe(&self) -> Subscriber<SyncEvent<T>> {
        self.inner.events.subscribe()
    }

    /// Roles currently running against this buffer
    ///
    /// Counts session threads and callers inside [`produce`](Self::produce)
    /// or [`consume`](Self::consume).
    pub fn active_roles(&self) -> usize {
        self.inner.active_roles.load(Ordering::Acquire)
    }

    /// Insert `item`, blocking while the buffer is full
    pub fn produce(&self, item: T) {
        let _caller = Caller::enter(self);
        self.acquire(Role::Producer, SemaphoreKind::Empty);
        self.finish_produce(item);
    }

    /// Remove the oldest item, blocking while the buffer is empty
    ///
    /// `None` means the slot under the read cursor held nothing, which cannot
    /// happen while every write goes through [`produce`](Self::produce).
    pub fn consume(&self) -> Option<T> {
        let _caller = Caller::enter(self);
        self.acquire(Role::Consumer, SemaphoreKind::Full);
        self.finish_consume()
    }

    /// Produce unless `stop` is raised while waiting for a free slot
    pub(super) fn produce_unless(&self, item: T, stop: &AtomicBool) -> Cycle<()> {
        if !self.acquire_unless(Role::Producer, SemaphoreKind::Empty, stop) {
            return Cycle::Stopped;
        }
        self.finish_produce(item);
        Cycle::Completed(())
    }

    /// Consume unless `stop` is raised while waiting for an item
    pub(super) fn consume_unless(&self, stop: &AtomicBool) -> Cycle<Option<T>> {
        if !self.acquire_unless(Role::Consumer, SemaphoreKind::Full, stop) {
            return Cycle::Stopped;
        }
        Cycle::Completed(self.finish_consume())
    }

    /// Steps 2-5 of produce; the caller already holds an `empty` permit
    fn finish_produce(&self, item: T) {
        {
            let section = CriticalSection::enter(self, Role::Producer);
            section.write(item);
        }
        self.release(Role::Producer, SemaphoreKind::Full);
    }

    /// Steps 2-5 of consume; the caller already holds a `full` permit
    fn finish_consume(&self) -> Option<T> {
        let item = {
            let section = CriticalSection::enter(self, Role::Consumer);
            section.read()
        };
        self.release(Role::Consumer, SemaphoreKind::Empty);
        item
    }

    /// Restore initial counts and clear every slot
    ///
    /// Refused (returns `false`) while any role is running. The check runs
    /// under the semaphore lock, so no role can be mid-cycle when it passes.
    pub fn reset(&self) -> bool {
        let events = &self.inner.events;
        let reset = self.inner.sems.reset_unless(
            || self.active_roles() > 0,
            |slots| {
                slots.buffer.clear();
                slots.seq += 1;
                let counts = SemaphoreCounts::initial(slots.buffer.capacity());
                events.publish(SyncEvent::Snapshot(SyncSnapshot {
                    seq: slots.seq,
                    op: None,
                    empty: counts.empty,
                    full: counts.full,
                    mutex: counts.mutex,
                    buffer: slots.buffer.contents(),
                }));
            },
        );

        if reset.is_none() {
            warn!(
                active = self.active_roles(),
                "reset refused while roles are running"
            );
            return false;
        }
        debug!(capacity = self.capacity(), "bounded buffer reset");
        true
    }

    /// Raise the active-role count from zero to `roles`
    ///
    /// Fails while anything else runs against the buffer. Each claimed role
    /// is handed back with [`role_stopped`](Self::role_stopped).
    pub(super) fn claim_roles(&self, roles: usize) -> bool {
        self.inner
            .active_roles
            .compare_exchange(0, roles, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(super) fn role_stopped(&self) {
        self.inner.active_roles.fetch_sub(1, Ordering::AcqRel);
    }

    /// Wake parked roles so they re-check their stop flags
    pub(super) fn interrupt(&self) {
        self.inner.sems.interrupt();
    }

    pub(super) fn publish(&self, event: SyncEvent<T>) {
        self.inner.events.publish(event);
    }

    fn acquire(&self, role: Role, kind: SemaphoreKind) {
        let op = SemaphoreOp::new(role, kind, Action::Acquire);
        self.inner
            .sems
            .acquire(kind, |counts, slots| self.record(op, counts, slots));
    }

    fn acquire_unless(&self, role: Role, kind: SemaphoreKind, stop: &AtomicBool) -> bool {
        let op = SemaphoreOp::new(role, kind, Action::Acquire);
        self.inner
            .sems
            .acquire_unless(kind, stop, |counts, slots| self.record(op, counts, slots))
            .is_some()
    }

    fn release(&self, role: Role, kind: SemaphoreKind) {
        let op = SemaphoreOp::new(role, kind, Action::Release);
        self.inner
            .sems
            .release(kind, |counts, slots| self.record(op, counts, slots));
    }

    /// Runs under the semaphore lock right after `op`
    fn record(&self, op: SemaphoreOp, counts: SemaphoreCounts, slots: &mut Slots<T>) {
        slots.seq += 1;
        debug!(
            seq = slots.seq,
            op = %op,
            empty = counts.empty,
            full = counts.full,
            mutex = counts.mutex,
            "semaphore operation"
        );

        if self.inner.events.has_subscribers() {
            self.inner.events.publish(SyncEvent::Snapshot(SyncSnapshot {
                seq: slots.seq,
                op: Some(op),
                empty: counts.empty,
                full: counts.full,
                mutex: counts.mutex,
                buffer: slots.buffer.contents(),
            }));
        }
    }
}

impl<T> fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBuffer")
            .field("sems", &self.inner.sems)
            .field("active_roles", &self.inner.active_roles.load(Ordering::Relaxed))
            .finish()
    }
}

/// Counts a direct `produce`/`consume` caller as an active role
struct Caller<'a, T: Clone + Send + 'static>(&'a BoundedBuffer<T>);

impl<'a, T: Clone + Send + 'static> Caller<'a, T> {
    fn enter(owner: &'a BoundedBuffer<T>) -> Self {
        owner.inner.active_roles.fetch_add(1, Ordering::AcqRel);
        Self(owner)
    }
}

impl<T: Clone + Send + 'static> Drop for Caller<'_, T> {
    fn drop(&mut self) {
        self.0.role_stopped();
    }
}

/// Exclusive access to the slots; holds the `mutex` permit until dropped
struct CriticalSection<'a, T: Clone + Send + 'static> {
    owner: &'a BoundedBuffer<T>,
    role: Role,
}

impl<'a, T: Clone + Send + 'static> CriticalSection<'a, T> {
    /// P(mutex)
    fn enter(owner: &'a BoundedBuffer<T>, role: Role) -> Self {
        owner.acquire(role, SemaphoreKind::Mutex);
        Self { owner, role }
    }

    /// Put `item` at the write cursor
    fn write(&self, item: T) {
        let slot = self
            .owner
            .inner
            .sems
            .with_payload(|slots, _| slots.buffer.put(item.clone()));

        debug!(role = %self.role, slot, "item written");
        self.owner.publish(SyncEvent::Item(ItemEvent {
            role: self.role,
            slot,
            item,
        }));
    }

    /// Take the item at the read cursor
    fn read(&self) -> Option<T> {
        let (slot, item) = self
            .owner
            .inner
            .sems
            .with_payload(|slots, _| slots.buffer.take());

        match &item {
            Some(taken) => {
                debug!(role = %self.role, slot, "item read");
                self.owner.publish(SyncEvent::Item(ItemEvent {
                    role: self.role,
                    slot,
                    item: taken.clone(),
                }));
            }
            None => warn!(slot, "read from an empty slot"),
        }
        item
    }
}

impl<T: Clone + Send + 'static> Drop for CriticalSection<'_, T> {
    /// V(mutex)
    fn drop(&mut self) {
        self.owner.release(self.role, SemaphoreKind::Mutex);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(capacity: usize) -> BoundedBuffer<u32> {
        BoundedBuffer::new(NonZeroUsize::new(capacity).unwrap())
    }

    fn snapshots(events: Vec<SyncEvent<u32>>) -> Vec<SyncSnapshot<u32>> {
        events
            .into_iter()
            .filter_map(|event| match event {
                SyncEvent::Snapshot(snap) => Some(snap),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_initial_state() {
        let buf = buffer(5);
        assert_eq!(buf.counts(), SemaphoreCounts::initial(5));
        assert_eq!(buf.contents(), vec![None; 5]);
    }

    #[test]
    fn test_produce_consume_counts() {
        let buf = buffer(3);
        buf.produce(1);
        buf.produce(2);

        let counts = buf.counts();
        assert_eq!((counts.empty, counts.full, counts.mutex), (1, 2, 1));
        assert_eq!(buf.contents(), vec![Some(1), Some(2), None]);

        assert_eq!(buf.consume(), Some(1));
        assert_eq!(buf.consume(), Some(2));
        assert_eq!(buf.counts(), SemaphoreCounts::initial(3));
    }

    #[test]
    fn test_produce_snapshot_sequence() {
        let buf = buffer(2);
        let mut sub = buf.subscribe();
        buf.produce(9);

        let snaps = snapshots(sub.drain());
        let ops: Vec<String> = snaps
            .iter()
            .map(|s| s.op.map(|op| op.to_string()).unwrap_or_default())
            .collect();
        assert_eq!(
            ops,
            vec![
                "producer P(empty)",
                "producer P(mutex)",
                "producer V(mutex)",
                "producer V(full)"
            ]
        );

        let seqs: Vec<u64> = snaps.iter().map(|s| s.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4]);

        // Mutex held while the item lands, released before V(full)
        assert_eq!(snaps[1].mutex, 0);
        assert_eq!(snaps[2].buffer, vec![Some(9), None]);
        assert_eq!(snaps[3].full, 1);
    }

    #[test]
    fn test_item_events() {
        let buf = buffer(2);
        let mut sub = buf.subscribe();
        buf.produce(4);
        buf.consume();

        let items: Vec<ItemEvent<u32>> = sub
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                SyncEvent::Item(item) => Some(item),
                _ => None,
            })
            .collect();
        assert_eq!(
            items,
            vec![
                ItemEvent {
                    role: Role::Producer,
                    slot: 0,
                    item: 4
                },
                ItemEvent {
                    role: Role::Consumer,
                    slot: 0,
                    item: 4
                },
            ]
        );
    }

    #[test]
    fn test_stop_while_waiting_for_item() {
        let buf = buffer(1);
        let stop = AtomicBool::new(true);
        assert!(matches!(buf.consume_unless(&stop), Cycle::Stopped));
        assert_eq!(buf.counts(), SemaphoreCounts::initial(1));
    }

    #[test]
    fn test_reset_clears_buffer() {
        let buf = buffer(2);
        buf.produce(1);
        assert!(buf.reset());
        assert_eq!(buf.counts(), SemaphoreCounts::initial(2));
        assert_eq!(buf.contents(), vec![None, None]);
    }

    #[test]
    fn test_reset_refused_with_active_role() {
        let buf = buffer(2);
        assert!(buf.claim_roles(1));
        assert!(!buf.reset());
        buf.role_stopped();
        assert!(buf.reset());
    }

    #[test]
    fn test_claim_only_from_idle() {
        let buf = buffer(2);
        assert!(buf.claim_roles(2));
        assert!(!buf.claim_roles(2));
        assert_eq!(buf.active_roles(), 2);

        buf.role_stopped();
        buf.role_stopped();
        assert!(buf.claim_roles(2));
    }

    #[test]
    fn test_parked_consumer_blocks_reset() {
        let buf = buffer(1);
        let waiter = {
            let buf = buf.clone();
            std::thread::spawn(move || buf.consume())
        };

        while buf.active_roles() == 0 {
            std::thread::yield_now();
        }
        assert!(!buf.reset());

        buf.produce(5);
        assert_eq!(waiter.join().unwrap(), Some(5));
        assert_eq!(buf.active_roles(), 0);
        assert!(buf.reset());
    }

    #[test]
    fn test_snapshot_without_op() {
        let buf = buffer(2);
        buf.produce(3);
        let snap = buf.snapshot();
        assert_eq!(snap.op, None);
        assert_eq!(snap.full, 1);
        assert_eq!(snap.occupied(), 1);
    }
}
