/*!
 * Event Streaming
 * Fan-out of component events to any number of subscribers
 *
 * Design: each subscriber owns an unbounded flume channel, so a slow
 * presentation layer never blocks the component that publishes. A
 * subscriber that is dropped is pruned on the next publish.
 */

use flume::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Event statistics for monitoring the stream itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub events_published: u64,
    pub events_delivered: u64,
    pub active_subscribers: usize,
}

/// Event stream - multi-subscriber broadcast
pub struct EventStream<E> {
    subscribers: Arc<Mutex<Vec<Sender<E>>>>,
    published: Arc<AtomicU64>,
    delivered: Arc<AtomicU64>,
}

impl<E: Clone> EventStream<E> {
    /// Create a new event stream
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            published: Arc::new(AtomicU64::new(0)),
            delivered: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event to every live subscriber, returning how many got it
    pub fn publish(&self, event: E) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());

        let delivered = subscribers.len();
        self.delivered.fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> Subscriber<E> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.lock().push(tx);
        Subscriber { rx }
    }

    /// Whether anyone is listening
    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.lock().is_empty()
    }

    /// Get stream statistics
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            events_published: self.published.load(Ordering::Relaxed),
            events_delivered: self.delivered.load(Ordering::Relaxed),
            active_subscribers: self.subscribers.lock().len(),
        }
    }
}

impl<E> Clone for EventStream<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
            published: Arc::clone(&self.published),
            delivered: Arc::clone(&self.delivered),
        }
    }
}

impl<E: Clone> Default for EventStream<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventStream<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("subscribers", &self.subscribers.lock().len())
            .field("published", &self.published.load(Ordering::Relaxed))
            .finish()
    }
}

/// Event stream subscriber handle
pub struct Subscriber<E> {
    rx: Receiver<E>,
}

impl<E> Subscriber<E> {
    /// Consume next event if one is queued
    #[inline]
    pub fn next(&mut self) -> Option<E> {
        self.rx.try_recv().ok()
    }

    /// Block for at most `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Option<E> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Await the next event; `None` once every publisher is gone
    pub async fn recv_async(&self) -> Option<E> {
        self.rx.recv_async().await.ok()
    }

    /// Take everything currently queued
    pub fn drain(&mut self) -> Vec<E> {
        self.rx.drain().collect()
    }

    /// Number of queued events
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out() {
        let stream = EventStream::<u32>::new();
        let mut a = stream.subscribe();
        let mut b = stream.subscribe();

        assert_eq!(stream.publish(7), 2);
        assert_eq!(a.next(), Some(7));
        assert_eq!(b.next(), Some(7));
        assert_eq!(a.next(), None);
    }

    #[test]
    fn test_dropped_subscriber_pruned() {
        let stream = EventStream::<u32>::new();
        let sub = stream.subscribe();
        drop(sub);

        assert_eq!(stream.publish(1), 0);
        assert!(!stream.has_subscribers());
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let stream = EventStream::<u32>::new();
        stream.publish(1);
        let mut sub = stream.subscribe();
        stream.publish(2);
        assert_eq!(sub.drain(), vec![2]);
    }

    #[test]
    fn test_stats() {
        let stream = EventStream::<u32>::new();
        let _sub = stream.subscribe();
        stream.publish(1);
        stream.publish(2);

        let stats = stream.stats();
        assert_eq!(stats.events_published, 2);
        assert_eq!(stats.events_delivered, 2);
        assert_eq!(stats.active_subscribers, 1);
    }
}
