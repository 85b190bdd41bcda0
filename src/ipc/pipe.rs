/*!
 * Message Pipe
 *
 * A writer thread streams numbered messages through a bounded flume channel
 * to a reader thread, with running transfer statistics. The writer stops on
 * request or after its item limit; the reader drains whatever is still in
 * the pipe and exits once the writer hangs up.
 */

use super::types::{Role, RoleConfig};
use crate::core::limits::{DEFAULT_PIPE_CAPACITY, MIN_RATE_WINDOW};
use crate::monitoring::{EventStream, Subscriber};
use flume::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::io;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Label of the `n`th pipe message (1-based)
pub fn data_label(n: u64) -> String {
    format!("Data-{}", n)
}

/// Transfer statistics for one pipe session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipeStats {
    pub session: Uuid,
    /// Messages the writer put into the pipe
    pub sent: u64,
    /// Messages the reader took out of the pipe
    pub transferred: u64,
    pub elapsed: Duration,
}

impl PipeStats {
    /// Messages transferred per second; zero until time has measurably passed
    pub fn rate(&self) -> f64 {
        if self.elapsed <= MIN_RATE_WINDOW {
            return 0.0;
        }
        self.transferred as f64 / self.elapsed.as_secs_f64()
    }

    /// Messages still in flight
    #[inline]
    pub fn in_flight(&self) -> u64 {
        self.sent.saturating_sub(self.transferred)
    }
}

/// Events published by a pipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipeEvent<T> {
    Sent { seq: u64, message: T },
    Received { seq: u64, message: T },
    Stats(PipeStats),
}

struct PipeInner<T> {
    capacity: NonZeroUsize,
    events: EventStream<PipeEvent<T>>,
    active: AtomicUsize,
}

/// Reusable pipe host; clones refer to the same pipe
pub struct Pipe<T> {
    inner: Arc<PipeInner<T>>,
}

impl<T> Clone for Pipe<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Pipe<T> {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_PIPE_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}

impl<T: Clone + Send + 'static> Pipe<T> {
    /// Pipe holding at most `capacity` messages in flight
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Arc::new(PipeInner {
                capacity,
                events: EventStream::new(),
                active: AtomicUsize::new(0),
            }),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity.get()
    }

    pub fn subscribe(&self) -> Subscriber<PipeEvent<T>> {
        self.inner.events.subscribe()
    }

    /// Whether a writer or reader thread is still running
    pub fn is_running(&self) -> bool {
        self.inner.active.load(Ordering::Acquire) > 0
    }

    /// Start a writer and a reader
    ///
    /// `make_message(n)` builds the `n`th message; `sink` receives each
    /// message the reader takes. `config` limits and paces the writer.
    /// Fails with [`io::ErrorKind::AlreadyExists`] while a session is running.
    pub fn start<P, C>(
        &self,
        config: RoleConfig,
        make_message: P,
        sink: C,
    ) -> io::Result<PipeSession>
    where
        P: FnMut(u64) -> T + Send + 'static,
        C: FnMut(T) + Send + 'static,
    {
        if self
            .inner
            .active
            .compare_exchange(0, 2, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("pipe already running");
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "pipe session already running",
            ));
        }
        let writer_end = Endpoint(self.clone());
        let reader_end = Endpoint(self.clone());

        let id = Uuid::new_v4();
        let counters = Arc::new(Counters::default());
        let started = Instant::now();
        let (tx, rx) = flume::bounded(self.capacity());
        let (stop_tx, stop_rx) = flume::bounded(1);
        info!(session = %id, capacity = self.capacity(), "starting pipe session");

        let writer = {
            let counters = Arc::clone(&counters);
            spawn_endpoint(writer_end, id, Role::Producer, move |pipe| {
                run_writer(pipe, tx, stop_rx, config, &counters, make_message)
            })?
        };

        let reader = {
            let counters = Arc::clone(&counters);
            spawn_endpoint(reader_end, id, Role::Consumer, move |pipe| {
                run_reader(pipe, id, rx, started, &counters, sink)
            })
        };
        // A failed reader spawn drops the receiver, so the writer hangs up on its next send
        let reader = reader?;

        Ok(PipeSession {
            id,
            started,
            counters,
            stop: stop_tx,
            writer: Some(writer),
            reader: Some(reader),
        })
    }

    fn publish(&self, event: PipeEvent<T>) {
        self.inner.events.publish(event);
    }
}

impl<T> std::fmt::Debug for Pipe<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("capacity", &self.inner.capacity)
            .field("active", &self.inner.active.load(Ordering::Relaxed))
            .finish()
    }
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    transferred: AtomicU64,
}

/// A running writer/reader pair
///
/// Dropping the session stops the writer without waiting; the reader then
/// drains the pipe and exits.
pub struct PipeSession {
    id: Uuid,
    started: Instant,
    counters: Arc<Counters>,
    stop: Sender<()>,
    writer: Option<JoinHandle<u64>>,
    reader: Option<JoinHandle<u64>>,
}

impl PipeSession {
    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Live statistics
    pub fn stats(&self) -> PipeStats {
        PipeStats {
            session: self.id,
            sent: self.counters.sent.load(Ordering::Acquire),
            transferred: self.counters.transferred.load(Ordering::Acquire),
            elapsed: self.started.elapsed(),
        }
    }

    /// Ask the writer to stop after its current message
    pub fn stop(&self) {
        info!(session = %self.id, "pipe stop requested");
        // Full means a stop is already pending
        let _ = self.stop.try_send(());
    }

    pub fn is_finished(&self) -> bool {
        [&self.writer, &self.reader]
            .into_iter()
            .all(|handle| handle.as_ref().map_or(true, JoinHandle::is_finished))
    }

    /// Wait for both threads and return the final statistics
    ///
    /// Blocks until the writer reaches its limit or [`stop`](Self::stop) is
    /// called. A thread that panicked re-raises its panic here.
    pub fn join(mut self) -> PipeStats {
        for handle in [self.writer.take(), self.reader.take()].into_iter().flatten() {
            if let Err(payload) = handle.join() {
                std::panic::resume_unwind(payload);
            }
        }

        let stats = self.stats();
        info!(
            session = %self.id,
            sent = stats.sent,
            transferred = stats.transferred,
            rate = stats.rate(),
            "pipe stopped"
        );
        stats
    }
}

impl std::fmt::Debug for PipeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeSession")
            .field("id", &self.id)
            .field("stats", &self.stats())
            .finish()
    }
}

/// One claimed pipe endpoint, given back when dropped
struct Endpoint<T>(Pipe<T>);

impl<T> Drop for Endpoint<T> {
    fn drop(&mut self) {
        self.0.inner.active.fetch_sub(1, Ordering::AcqRel);
    }
}

fn spawn_endpoint<T, F>(
    end: Endpoint<T>,
    session: Uuid,
    role: Role,
    body: F,
) -> io::Result<JoinHandle<u64>>
where
    T: Clone + Send + 'static,
    F: FnOnce(&Pipe<T>) -> u64 + Send + 'static,
{
    thread::Builder::new()
        .name(format!("pipe-{}-{}", role, &session.simple().to_string()[..8]))
        .spawn(move || {
            let span = info_span!("pipe_role", session = %session, role = %role);
            let _enter = span.enter();

            let count = body(&end.0);
            info!(count, "pipe {} finished", role);
            count
        })
}

/// Whether a stop was requested, waiting up to `delay` for one
fn stop_requested(stop: &Receiver<()>, delay: Duration) -> bool {
    if delay.is_zero() {
        return !matches!(stop.try_recv(), Err(TryRecvError::Empty));
    }
    !matches!(stop.recv_timeout(delay), Err(RecvTimeoutError::Timeout))
}

fn run_writer<T, P>(
    pipe: &Pipe<T>,
    tx: Sender<T>,
    stop: Receiver<()>,
    config: RoleConfig,
    counters: &Counters,
    mut make_message: P,
) -> u64
where
    T: Clone + Send + 'static,
    P: FnMut(u64) -> T,
{
    let mut sent = 0;
    while config.allows(sent) && !stop_requested(&stop, Duration::ZERO) {
        let seq = sent + 1;
        let message = make_message(seq);
        pipe.publish(PipeEvent::Sent {
            seq,
            message: message.clone(),
        });

        if tx.send(message).is_err() {
            warn!(seq, "reader hung up");
            break;
        }
        sent = seq;
        counters.sent.fetch_add(1, Ordering::AcqRel);
        debug!(seq, "message written");

        if config.allows(sent) && stop_requested(&stop, config.cycle_delay) {
            break;
        }
    }
    sent
}

fn run_reader<T, C>(
    pipe: &Pipe<T>,
    session: Uuid,
    rx: Receiver<T>,
    started: Instant,
    counters: &Counters,
    mut sink: C,
) -> u64
where
    T: Clone + Send + 'static,
    C: FnMut(T),
{
    let mut received = 0;
    // Ends once the writer has hung up and the pipe is drained
    for message in rx.iter() {
        received += 1;
        let sent = counters.sent.load(Ordering::Acquire);
        counters.transferred.fetch_add(1, Ordering::AcqRel);
        debug!(seq = received, "message read");

        pipe.publish(PipeEvent::Received {
            seq: received,
            message: message.clone(),
        });
        pipe.publish(PipeEvent::Stats(PipeStats {
            session,
            sent: sent.max(received),
            transferred: received,
            elapsed: started.elapsed(),
        }));
        sink(message);
    }
    received
}
