/*!
 * Semaphore Triple
 *
 * The `empty` / `full` / `mutex` counting semaphores of the bounded-buffer
 * problem, owned by a single lock together with the state they guard.
 *
 * # Design
 *
 * Counts are never mirrored by hand: the count a waiter parks on and the
 * count an observer sees are the same integer, read under the same lock.
 * Every operation hands the post-operation counts and the payload to an
 * `observe` closure that runs before the lock is released, so a snapshot
 * can never be torn across two semaphores.
 *
 * Blocked acquires park on a `parking_lot::Condvar` (one per semaphore)
 * and are woken by the matching release. Nothing spins.
 */

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

use crate::core::limits::MUTEX_PERMITS;

/// Which of the three semaphores an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemaphoreKind {
    /// Free slots, starts at capacity
    Empty,
    /// Occupied slots, starts at zero
    Full,
    /// Binary lock over buffer access, starts at one
    Mutex,
}

impl SemaphoreKind {
    pub const ALL: [SemaphoreKind; 3] = [Self::Empty, Self::Full, Self::Mutex];

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Full => "full",
            Self::Mutex => "mutex",
        }
    }
}

impl fmt::Display for SemaphoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permit counts of all three semaphores at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SemaphoreCounts {
    pub empty: usize,
    pub full: usize,
    pub mutex: usize,
}

impl SemaphoreCounts {
    /// Initial counts for a buffer of `capacity` slots
    pub const fn initial(capacity: usize) -> Self {
        Self {
            empty: capacity,
            full: 0,
            mutex: MUTEX_PERMITS,
        }
    }

    #[inline]
    pub const fn get(&self, kind: SemaphoreKind) -> usize {
        match kind {
            SemaphoreKind::Empty => self.empty,
            SemaphoreKind::Full => self.full,
            SemaphoreKind::Mutex => self.mutex,
        }
    }

    #[inline]
    fn get_mut(&mut self, kind: SemaphoreKind) -> &mut usize {
        match kind {
            SemaphoreKind::Empty => &mut self.empty,
            SemaphoreKind::Full => &mut self.full,
            SemaphoreKind::Mutex => &mut self.mutex,
        }
    }
}

struct State<S> {
    counts: SemaphoreCounts,
    payload: S,
}

/// Three counting semaphores sharing one lock with a guarded payload
///
/// `S` is whatever the semaphores protect (a circular buffer in the
/// synchronizer, `()` when used on its own).
pub struct SemaphoreTriple<S = ()> {
    state: Mutex<State<S>>,
    empty_waiters: Condvar,
    full_waiters: Condvar,
    mutex_waiters: Condvar,
    capacity: usize,
}

impl<S> SemaphoreTriple<S> {
    /// Create semaphores for `capacity` slots guarding `payload`
    pub fn new(capacity: NonZeroUsize, payload: S) -> Self {
        let capacity = capacity.get();
        Self {
            state: Mutex::new(State {
                counts: SemaphoreCounts::initial(capacity),
                payload,
            }),
            empty_waiters: Condvar::new(),
            full_waiters: Condvar::new(),
            mutex_waiters: Condvar::new(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current counts
    pub fn counts(&self) -> SemaphoreCounts {
        self.state.lock().counts
    }

    #[inline]
    fn waiters(&self, kind: SemaphoreKind) -> &Condvar {
        match kind {
            SemaphoreKind::Empty => &self.empty_waiters,
            SemaphoreKind::Full => &self.full_waiters,
            SemaphoreKind::Mutex => &self.mutex_waiters,
        }
    }

    #[inline]
    fn limit(&self, kind: SemaphoreKind) -> usize {
        match kind {
            SemaphoreKind::Mutex => MUTEX_PERMITS,
            _ => self.capacity,
        }
    }

    /// P operation: take one permit, parking until one is available
    pub fn acquire<R>(
        &self,
        kind: SemaphoreKind,
        observe: impl FnOnce(SemaphoreCounts, &mut S) -> R,
    ) -> R {
        let mut state = self.state.lock();
        while state.counts.get(kind) == 0 {
            trace!(semaphore = %kind, "parking on semaphore");
            self.waiters(kind).wait(&mut state);
        }
        *state.counts.get_mut(kind) -= 1;

        let counts = state.counts;
        observe(counts, &mut state.payload)
    }

    /// P operation that gives up if `stop` is raised while parked
    ///
    /// Returns `None` without taking a permit when the stop flag is seen.
    /// Raisers of the flag must call [`interrupt`](Self::interrupt)
    /// afterwards so that parked waiters re-check it.
    pub fn acquire_unless<R>(
        &self,
        kind: SemaphoreKind,
        stop: &AtomicBool,
        observe: impl FnOnce(SemaphoreCounts, &mut S) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        loop {
            if stop.load(Ordering::Acquire) {
                // A wake meant for a permit goes to the next waiter instead
                if state.counts.get(kind) > 0 {
                    self.waiters(kind).notify_one();
                }
                return None;
            }
            if state.counts.get(kind) > 0 {
                break;
            }
            self.waiters(kind).wait(&mut state);
        }
        *state.counts.get_mut(kind) -= 1;

        let counts = state.counts;
        Some(observe(counts, &mut state.payload))
    }

    /// P operation without parking
    pub fn try_acquire<R>(
        &self,
        kind: SemaphoreKind,
        observe: impl FnOnce(SemaphoreCounts, &mut S) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        if state.counts.get(kind) == 0 {
            return None;
        }
        *state.counts.get_mut(kind) -= 1;

        let counts = state.counts;
        Some(observe(counts, &mut state.payload))
    }

    /// V operation: return one permit and wake one parked waiter
    pub fn release<R>(
        &self,
        kind: SemaphoreKind,
        observe: impl FnOnce(SemaphoreCounts, &mut S) -> R,
    ) -> R {
        let mut state = self.state.lock();
        debug_assert!(
            state.counts.get(kind) < self.limit(kind),
            "release of {} would exceed its bound {}",
            kind,
            self.limit(kind)
        );
        *state.counts.get_mut(kind) += 1;
        self.waiters(kind).notify_one();

        let counts = state.counts;
        observe(counts, &mut state.payload)
    }

    /// Blocking P returning the counts afterwards
    pub fn wait(&self, kind: SemaphoreKind) -> SemaphoreCounts {
        self.acquire(kind, |counts, _| counts)
    }

    /// V returning the counts afterwards
    pub fn signal(&self, kind: SemaphoreKind) -> SemaphoreCounts {
        self.release(kind, |counts, _| counts)
    }

    /// Wake every parked waiter so it re-checks its stop flag
    pub fn interrupt(&self) {
        // Held so a waiter between its flag check and `wait` cannot miss the wake
        let _state = self.state.lock();
        for kind in SemaphoreKind::ALL {
            self.waiters(kind).notify_all();
        }
    }

    /// Run `f` on the payload under the internal lock
    pub fn with_payload<R>(&self, f: impl FnOnce(&mut S, SemaphoreCounts) -> R) -> R {
        let mut state = self.state.lock();
        let counts = state.counts;
        f(&mut state.payload, counts)
    }

    /// Restore initial counts and let `f` reset the payload
    ///
    /// Only meaningful while nobody holds or waits for a permit.
    pub fn reset(&self, f: impl FnOnce(&mut S)) -> SemaphoreCounts {
        let mut state = self.state.lock();
        self.reset_locked(&mut state, f)
    }

    /// [`reset`](Self::reset) unless `busy` holds, checked under the same lock
    pub fn reset_unless(
        &self,
        busy: impl FnOnce() -> bool,
        f: impl FnOnce(&mut S),
    ) -> Option<SemaphoreCounts> {
        let mut state = self.state.lock();
        if busy() {
            return None;
        }
        Some(self.reset_locked(&mut state, f))
    }

    fn reset_locked(&self, state: &mut State<S>, f: impl FnOnce(&mut S)) -> SemaphoreCounts {
        state.counts = SemaphoreCounts::initial(self.capacity);
        f(&mut state.payload);
        for kind in SemaphoreKind::ALL {
            self.waiters(kind).notify_all();
        }
        state.counts
    }
}

impl<S> fmt::Debug for SemaphoreTriple<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemaphoreTriple")
            .field("capacity", &self.capacity)
            .field("counts", &self.counts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn triple(capacity: usize) -> SemaphoreTriple {
        SemaphoreTriple::new(NonZeroUsize::new(capacity).unwrap(), ())
    }

    #[test]
    fn test_initial_counts() {
        let sems = triple(5);
        assert_eq!(
            sems.counts(),
            SemaphoreCounts {
                empty: 5,
                full: 0,
                mutex: 1
            }
        );
    }

    #[test]
    fn test_acquire_release_counts() {
        let sems = triple(3);

        let after = sems.wait(SemaphoreKind::Empty);
        assert_eq!(after.empty, 2);

        let after = sems.signal(SemaphoreKind::Full);
        assert_eq!(after.full, 1);
        assert_eq!(after.empty, 2);
    }

    #[test]
    fn test_try_acquire_at_zero() {
        let sems = triple(2);
        assert!(sems.try_acquire(SemaphoreKind::Full, |c, _| c).is_none());
        assert_eq!(sems.counts().full, 0);

        assert!(sems.try_acquire(SemaphoreKind::Mutex, |c, _| c).is_some());
        assert!(sems.try_acquire(SemaphoreKind::Mutex, |c, _| c).is_none());
    }

    #[test]
    fn test_blocked_acquire_wakes_on_release() {
        let sems = Arc::new(triple(1));
        let sems_clone = sems.clone();

        let handle = thread::spawn(move || sems_clone.wait(SemaphoreKind::Full));

        // Give thread time to park
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        sems.signal(SemaphoreKind::Full);
        let counts = handle.join().unwrap();
        assert_eq!(counts.full, 0);
    }

    #[test]
    fn test_acquire_unless_stops() {
        let sems = Arc::new(triple(1));
        let stop = Arc::new(AtomicBool::new(false));

        let (sems_clone, stop_clone) = (sems.clone(), stop.clone());
        let handle = thread::spawn(move || {
            sems_clone.acquire_unless(SemaphoreKind::Full, &stop_clone, |c, _| c)
        });

        thread::sleep(Duration::from_millis(50));
        stop.store(true, Ordering::Release);
        sems.interrupt();

        assert_eq!(handle.join().unwrap(), None);
        assert_eq!(sems.counts(), SemaphoreCounts::initial(1));
    }

    #[test]
    fn test_observe_sees_payload() {
        let sems = SemaphoreTriple::new(NonZeroUsize::new(2).unwrap(), 0u32);
        let seen = sems.acquire(SemaphoreKind::Mutex, |counts, payload| {
            *payload += 1;
            (counts.mutex, *payload)
        });
        assert_eq!(seen, (0, 1));
        sems.signal(SemaphoreKind::Mutex);
        assert_eq!(sems.with_payload(|p, _| *p), 1);
    }

    #[test]
    fn test_reset() {
        let sems = triple(4);
        sems.wait(SemaphoreKind::Empty);
        sems.signal(SemaphoreKind::Full);

        let counts = sems.reset(|_| {});
        assert_eq!(counts, SemaphoreCounts::initial(4));
    }

    #[test]
    fn test_reset_unless_busy() {
        let sems = triple(2);
        sems.wait(SemaphoreKind::Empty);

        assert_eq!(sems.reset_unless(|| true, |_| {}), None);
        assert_eq!(sems.counts().empty, 1);

        assert_eq!(
            sems.reset_unless(|| false, |_| {}),
            Some(SemaphoreCounts::initial(2))
        );
    }

    #[test]
    fn test_stopped_waiter_passes_wake_on() {
        let sems = Arc::new(triple(1));
        let stopping = Arc::new(AtomicBool::new(false));
        let never = Arc::new(AtomicBool::new(false));

        let quitter = {
            let (sems, stop) = (sems.clone(), stopping.clone());
            thread::spawn(move || sems.acquire_unless(SemaphoreKind::Full, &stop, |c, _| c))
        };
        let taker = {
            let (sems, stop) = (sems.clone(), never.clone());
            thread::spawn(move || sems.acquire_unless(SemaphoreKind::Full, &stop, |c, _| c))
        };

        thread::sleep(Duration::from_millis(20));
        // Flag raised without an interrupt; the single wake may land on either waiter
        stopping.store(true, Ordering::Release);
        sems.signal(SemaphoreKind::Full);

        assert_eq!(taker.join().unwrap().map(|c| c.full), Some(0));
        sems.interrupt();
        assert_eq!(quitter.join().unwrap(), None);
    }
}
