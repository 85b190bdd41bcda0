/*!
 * Bounded Buffer Integration Tests
 * Producer/consumer sessions, snapshot invariants and async subscribers
 */

use os_sim::core::sync::SemaphoreCounts;
use os_sim::ipc::{
    data_label, item_label, Action, BoundedBuffer, Pipe, PipeEvent, Role, RoleConfig, RolePhase,
    SyncEvent, SyncSnapshot,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn buffer(capacity: usize) -> BoundedBuffer<String> {
    BoundedBuffer::new(NonZeroUsize::new(capacity).unwrap())
}

/// Poll `ready` for up to two seconds
fn wait_until(mut ready: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if ready() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    ready()
}

fn snapshots(events: Vec<SyncEvent<String>>) -> Vec<SyncSnapshot<String>> {
    events
        .into_iter()
        .filter_map(|event| match event {
            SyncEvent::Snapshot(snap) => Some(snap),
            _ => None,
        })
        .collect()
}

fn assert_snapshot_bounds(snap: &SyncSnapshot<String>, capacity: usize) {
    assert!(snap.empty <= capacity, "empty out of range: {:?}", snap);
    assert!(snap.full <= capacity, "full out of range: {:?}", snap);
    assert!(snap.mutex <= 1, "mutex out of range: {:?}", snap);

    // Each role holds at most one empty/full permit between its steps
    let sum = snap.empty + snap.full;
    assert!(sum <= capacity && sum + 2 >= capacity, "empty+full drifted: {:?}", snap);

    let occupied = snap.occupied();
    assert!(snap.full <= occupied, "full exceeds occupied slots: {:?}", snap);
    assert!(occupied <= capacity - snap.empty, "occupied exceeds reserved slots: {:?}", snap);
}

#[test]
fn test_ten_items_through_five_slots() {
    let buf = buffer(5);
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);

    let report = buf
        .start(RoleConfig::items(10), item_label, move |item| sink.lock().push(item))
        .unwrap()
        .join();

    let expected: Vec<String> = (1..=10).map(item_label).collect();
    assert_eq!(*received.lock(), expected);
    assert_eq!(report.producer.items, 10);
    assert_eq!(report.consumer.items, 10);
    assert_eq!(report.counts, SemaphoreCounts::initial(5));
    assert_eq!(buf.contents(), vec![None; 5]);
}

#[test]
fn test_every_snapshot_within_bounds() {
    let capacity = 3;
    let buf = buffer(capacity);
    let mut sub = buf.subscribe();

    buf.start(RoleConfig::items(50), item_label, |_| {})
        .unwrap()
        .join();

    let snaps = snapshots(sub.drain());
    // 4 semaphore operations per item per role
    assert_eq!(snaps.len(), 50 * 4 * 2);

    for (i, snap) in snaps.iter().enumerate() {
        assert_eq!(snap.seq, i as u64 + 1);
        assert_snapshot_bounds(snap, capacity);
    }

    let last = snaps.last().unwrap();
    assert_eq!(last.counts(), SemaphoreCounts::initial(capacity));
}

#[test]
fn test_mutex_alternates_acquire_release() {
    let buf = buffer(2);
    let mut sub = buf.subscribe();

    buf.start(RoleConfig::items(20), item_label, |_| {})
        .unwrap()
        .join();

    let mutex_ops: Vec<(Role, Action)> = snapshots(sub.drain())
        .into_iter()
        .filter_map(|snap| snap.op)
        .filter(|op| op.semaphore == os_sim::core::sync::SemaphoreKind::Mutex)
        .map(|op| (op.role, op.action))
        .collect();

    assert_eq!(mutex_ops.len(), 80);
    for pair in mutex_ops.chunks(2) {
        // The role that took the mutex is the one that gives it back
        assert_eq!(pair[0].0, pair[1].0);
        assert_eq!(pair[0].1, Action::Acquire);
        assert_eq!(pair[1].1, Action::Release);
    }
}

#[test]
fn test_slow_consumer_fills_buffer() {
    let capacity = 2;
    let buf = buffer(capacity);
    let mut sub = buf.subscribe();

    let report = buf
        .start_with(
            RoleConfig::items(6),
            RoleConfig::items(6).with_delay(Duration::from_millis(5)),
            item_label,
            |_| {},
        )
        .unwrap()
        .join();
    assert_eq!(report.consumer.items, 6);

    let peak = snapshots(sub.drain())
        .iter()
        .map(SyncSnapshot::occupied)
        .max()
        .unwrap();
    assert_eq!(peak, capacity);
}

#[test]
fn test_stop_running_session() {
    let buf = buffer(4);
    let session = buf
        .start(
            RoleConfig::unbounded().with_delay(Duration::from_millis(2)),
            item_label,
            |_| {},
        )
        .unwrap();

    // The first four semaphore operations always belong to the producer
    assert!(wait_until(|| buf.snapshot().seq >= 4));
    session.stop();
    let report = session.join();

    assert!(report.producer.items > 0);
    assert_eq!(
        report.producer.items - report.consumer.items,
        report.occupied as u64
    );
    assert_eq!(report.counts.empty + report.counts.full, 4);
    assert_eq!(report.counts.full, report.occupied);
    assert_eq!(report.counts.mutex, 1);
}

#[test]
fn test_stop_before_any_progress() {
    let buf = buffer(1);
    // Consumer only: parks on full immediately
    let session = buf
        .start_with(RoleConfig::items(0), RoleConfig::unbounded(), item_label, |_| {})
        .unwrap();

    assert!(wait_until(|| session.producer().is_finished()));
    session.stop();
    let report = session.join();

    assert_eq!(report.producer.items, 0);
    assert_eq!(report.consumer.items, 0);
    assert_eq!(report.counts, SemaphoreCounts::initial(1));
}

#[test]
fn test_dropped_session_stops_roles() {
    let buf = buffer(2);
    let session = buf
        .start(RoleConfig::unbounded(), item_label, |_| {})
        .unwrap();
    drop(session);

    for _ in 0..100 {
        if buf.active_roles() == 0 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(buf.active_roles(), 0);
    assert!(buf.reset());
}

#[test]
fn test_one_session_per_buffer() {
    let buf = buffer(3);
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let first = buf
        .start(
            RoleConfig::unbounded().with_delay(Duration::from_millis(1)),
            item_label,
            move |item| sink.lock().push(item),
        )
        .unwrap();

    let second = buf.start(RoleConfig::unbounded(), item_label, |_| {});
    assert_eq!(
        second.map(|_| ()).map_err(|e| e.kind()),
        Err(std::io::ErrorKind::AlreadyExists)
    );
    assert!(buf.active_roles() <= 2);

    first.stop();
    let report = first.join();

    // Every consumed item came from the one producer, in order
    let expected: Vec<String> = (1..=report.consumer.items).map(item_label).collect();
    assert_eq!(*received.lock(), expected);
}

#[test]
fn test_second_session_after_reset() {
    let buf = buffer(3);
    buf.start_with(RoleConfig::items(2), RoleConfig::items(0), item_label, |_| {})
        .unwrap()
        .join();
    assert!(buf.reset());

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    buf.start(RoleConfig::items(3), item_label, move |item| sink.lock().push(item))
        .unwrap()
        .join();

    assert_eq!(*received.lock(), vec!["Item-1", "Item-2", "Item-3"]);
}

#[tokio::test]
async fn test_async_subscriber_sees_role_lifecycle() {
    let buf = buffer(2);
    let events = buf.subscribe();
    let session = buf.start(RoleConfig::items(4), item_label, |_| {}).unwrap();
    drop(buf);

    let report = tokio::task::spawn_blocking(move || session.join())
        .await
        .unwrap();
    assert_eq!(report.consumer.items, 4);

    // Every publisher is gone, so the stream ends after the backlog
    let mut phases = Vec::new();
    let mut items = 0;
    while let Some(event) = events.recv_async().await {
        match event {
            SyncEvent::Role(role) => phases.push((role.role, role.phase)),
            SyncEvent::Item(_) => items += 1,
            SyncEvent::Snapshot(_) => {}
        }
    }

    assert_eq!(items, 8);
    assert_eq!(phases.len(), 4);
    assert!(phases.contains(&(Role::Producer, RolePhase::Stopped)));
    assert!(phases.contains(&(Role::Consumer, RolePhase::Stopped)));
}

#[test]
fn test_pipe_reports_total_after_stop() {
    let pipe: Pipe<String> = Pipe::new(NonZeroUsize::new(2).unwrap());
    let mut events = pipe.subscribe();
    let session = pipe
        .start(
            RoleConfig::unbounded().with_delay(Duration::from_millis(1)),
            data_label,
            |_| {},
        )
        .unwrap();

    assert!(wait_until(|| session.stats().transferred >= 3));
    session.stop();
    let stats = session.join();

    assert!(stats.transferred >= 3);
    assert_eq!(stats.in_flight(), 0);
    assert!(stats.rate() > 0.0);
    assert!(!pipe.is_running());

    // Receipts arrive in send order with no gaps
    let received: Vec<u64> = events
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            PipeEvent::Received { seq, message } => {
                assert_eq!(message, data_label(seq));
                Some(seq)
            }
            _ => None,
        })
        .collect();
    assert_eq!(received, (1..=stats.transferred).collect::<Vec<u64>>());
}
