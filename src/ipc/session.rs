/*!
 * Synchronization Session
 * One producer thread and one consumer thread running against a bounded buffer
 *
 * Each role loops over its cycle until it reaches its item limit or is asked
 * to stop. A stop request is honoured between cycles and while a role is
 * parked waiting for a slot (producer) or an item (consumer); a cycle that
 * has passed its first step always runs to completion, so counts stay
 * balanced.
 */

use super::bounded::{BoundedBuffer, Cycle};
use super::types::{Role, RoleConfig, RoleEvent, RolePhase, RoleReport, SessionReport, SyncEvent};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, info_span, warn};
use uuid::Uuid;

impl<T: Clone + Send + 'static> BoundedBuffer<T> {
    /// Start one producer and one consumer with the same settings
    ///
    /// `make_item(n)` builds the producer's `n`th item (1-based); `sink`
    /// receives each item the consumer takes.
    pub fn start<P, C>(&self, config: RoleConfig, make_item: P, sink: C) -> io::Result<SyncSession<T>>
    where
        P: FnMut(u64) -> T + Send + 'static,
        C: FnMut(T) + Send + 'static,
    {
        self.start_with(config, config, make_item, sink)
    }

    /// Start one producer and one consumer with separate settings
    ///
    /// Fails with [`io::ErrorKind::AlreadyExists`] while another session or
    /// a direct caller is still running against this buffer.
    pub fn start_with<P, C>(
        &self,
        producer_config: RoleConfig,
        consumer_config: RoleConfig,
        make_item: P,
        sink: C,
    ) -> io::Result<SyncSession<T>>
    where
        P: FnMut(u64) -> T + Send + 'static,
        C: FnMut(T) + Send + 'static,
    {
        if !self.claim_roles(2) {
            warn!(active = self.active_roles(), "session already running on this buffer");
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "bounded buffer session already running",
            ));
        }
        // Each guard hands one claimed role back when its thread exits
        let producer_role = ActiveRole(self.clone());
        let consumer_role = ActiveRole(self.clone());

        let id = Uuid::new_v4();
        info!(session = %id, capacity = self.capacity(), "starting bounded buffer session");

        let producer = RoleHandle::spawn(producer_role, id, Role::Producer, move |buffer, stop| {
            run_producer(buffer, producer_config, stop, make_item)
        })?;

        let consumer = RoleHandle::spawn(consumer_role, id, Role::Consumer, move |buffer, stop| {
            run_consumer(buffer, consumer_config, stop, sink)
        });
        let consumer = match consumer {
            Ok(handle) => handle,
            Err(e) => {
                // Producer is already running; dropping its handle stops it
                drop(producer);
                return Err(e);
            }
        };

        Ok(SyncSession {
            id,
            buffer: self.clone(),
            producer,
            consumer,
        })
    }
}

/// A running producer/consumer pair
///
/// Dropping the session requests a stop without waiting for the threads.
pub struct SyncSession<T: Clone + Send + 'static> {
    id: Uuid,
    buffer: BoundedBuffer<T>,
    producer: RoleHandle<T>,
    consumer: RoleHandle<T>,
}

impl<T: Clone + Send + 'static> SyncSession<T> {
    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn buffer(&self) -> &BoundedBuffer<T> {
        &self.buffer
    }

    pub fn producer(&self) -> &RoleHandle<T> {
        &self.producer
    }

    pub fn consumer(&self) -> &RoleHandle<T> {
        &self.consumer
    }

    /// Ask both roles to stop
    pub fn stop(&self) {
        info!(session = %self.id, "stop requested");
        self.producer.stop();
        self.consumer.stop();
    }

    /// Whether both role threads have exited
    pub fn is_finished(&self) -> bool {
        self.producer.is_finished() && self.consumer.is_finished()
    }

    /// Wait for both roles to exit
    ///
    /// Blocks until the roles reach their item limits or [`stop`](Self::stop)
    /// is called. A role thread that panicked re-raises its panic here.
    pub fn join(mut self) -> SessionReport {
        let producer = self.producer.wait();
        let consumer = self.consumer.wait();
        let snapshot = self.buffer.snapshot();

        let report = SessionReport {
            session: self.id,
            producer,
            consumer,
            counts: snapshot.counts(),
            occupied: snapshot.occupied(),
        };
        info!(
            session = %self.id,
            produced = report.producer.items,
            consumed = report.consumer.items,
            occupied = report.occupied,
            "session finished"
        );
        report
    }
}

impl<T: Clone + Send + 'static> std::fmt::Debug for SyncSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("id", &self.id)
            .field("producer", &self.producer)
            .field("consumer", &self.consumer)
            .finish()
    }
}

/// Handle to one role thread
pub struct RoleHandle<T: Clone + Send + 'static> {
    role: Role,
    stop: Arc<AtomicBool>,
    buffer: BoundedBuffer<T>,
    thread: Option<JoinHandle<RoleReport>>,
}

impl<T: Clone + Send + 'static> RoleHandle<T> {
    fn spawn<F>(active: ActiveRole<T>, session: Uuid, role: Role, body: F) -> io::Result<Self>
    where
        F: FnOnce(&BoundedBuffer<T>, &AtomicBool) -> RoleReport + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let buffer = active.buffer().clone();

        let thread = thread::Builder::new()
            .name(format!("{}-{}", role, &session.simple().to_string()[..8]))
            .spawn(move || {
                let span = info_span!("sync_role", session = %session, role = %role);
                let _enter = span.enter();

                let buffer = active.buffer();
                announce(buffer, session, role, RolePhase::Started, 0);
                let report = body(buffer, &thread_stop);
                announce(buffer, session, role, RolePhase::Stopped, report.items);
                report
            })?;

        Ok(Self {
            role,
            stop,
            buffer,
            thread: Some(thread),
        })
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Ask the role to stop and wake it if it is parked
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.buffer.interrupt();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    fn wait(&mut self) -> RoleReport {
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(report)) => report,
            Some(Err(payload)) => std::panic::resume_unwind(payload),
            None => RoleReport {
                role: self.role,
                items: 0,
                stopped: true,
            },
        }
    }
}

impl<T: Clone + Send + 'static> Drop for RoleHandle<T> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
        }
    }
}

impl<T: Clone + Send + 'static> std::fmt::Debug for RoleHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleHandle")
            .field("role", &self.role)
            .field("stop_requested", &self.is_stop_requested())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// One role claimed on the buffer, given back when dropped
struct ActiveRole<T: Clone + Send + 'static>(BoundedBuffer<T>);

impl<T: Clone + Send + 'static> ActiveRole<T> {
    fn buffer(&self) -> &BoundedBuffer<T> {
        &self.0
    }
}

impl<T: Clone + Send + 'static> Drop for ActiveRole<T> {
    fn drop(&mut self) {
        self.0.role_stopped();
    }
}

fn announce<T: Clone + Send + 'static>(
    buffer: &BoundedBuffer<T>,
    session: Uuid,
    role: Role,
    phase: RolePhase,
    items: u64,
) {
    info!(items, "role {:?}", phase);
    buffer.publish(SyncEvent::Role(RoleEvent {
        session,
        role,
        phase,
        items,
    }));
}

fn pace(config: &RoleConfig, done: u64, stop: &AtomicBool) {
    if !config.cycle_delay.is_zero() && config.allows(done) && !stop.load(Ordering::Acquire) {
        thread::sleep(config.cycle_delay);
    }
}

fn run_producer<T, P>(
    buffer: &BoundedBuffer<T>,
    config: RoleConfig,
    stop: &AtomicBool,
    mut make_item: P,
) -> RoleReport
where
    T: Clone + Send + 'static,
    P: FnMut(u64) -> T,
{
    let mut produced = 0;
    while config.allows(produced) && !stop.load(Ordering::Acquire) {
        let item = make_item(produced + 1);
        match buffer.produce_unless(item, stop) {
            Cycle::Completed(()) => produced += 1,
            Cycle::Stopped => break,
        }
        pace(&config, produced, stop);
    }

    RoleReport {
        role: Role::Producer,
        items: produced,
        stopped: config.allows(produced),
    }
}

fn run_consumer<T, C>(
    buffer: &BoundedBuffer<T>,
    config: RoleConfig,
    stop: &AtomicBool,
    mut sink: C,
) -> RoleReport
where
    T: Clone + Send + 'static,
    C: FnMut(T),
{
    let mut consumed = 0;
    while config.allows(consumed) && !stop.load(Ordering::Acquire) {
        match buffer.consume_unless(stop) {
            Cycle::Completed(Some(item)) => {
                consumed += 1;
                sink(item);
            }
            Cycle::Completed(None) => warn!("consume cycle found no item"),
            Cycle::Stopped => break,
        }
        pace(&config, consumed, stop);
    }

    RoleReport {
        role: Role::Consumer,
        items: consumed,
        stopped: config.allows(consumed),
    }
}
