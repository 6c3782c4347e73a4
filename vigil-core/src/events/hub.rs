use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc::{self, error::TrySendError};

use super::record::EventRecord;

/// Number of recent events kept for late joiners
pub const HISTORY_CAPACITY: usize = 100;
/// Pending events a single subscriber may queue before new ones are dropped for it
pub const SUBSCRIBER_CAPACITY: usize = 100;

// The hub sits behind the tracing bridge: nothing in here may emit a tracing
// event, or publishing would re-enter the lock.

struct HubState {
    subscribers: HashMap<u64, mpsc::Sender<Arc<EventRecord>>>,
    history: VecDeque<Arc<EventRecord>>,
}

struct HubInner {
    state: Mutex<HubState>,
    next_id: AtomicU64,
}

impl HubInner {
    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) -> bool {
        // Dropping the sender closes the channel; it exists only once in the map
        self.lock().subscribers.remove(&id).is_some()
    }
}

/// In-process fan-out of log events with a bounded replay history
/// Cloning yields another handle to the same hub
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                state: Mutex::new(HubState {
                    subscribers: HashMap::new(),
                    history: VecDeque::with_capacity(HISTORY_CAPACITY),
                }),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a new observer with its own bounded queue
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().subscribers.insert(id, tx);

        Subscription {
            id,
            rx,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Remove an observer and close its queue
    /// Unknown or already-removed handles are ignored
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.inner.remove(subscription.id);
    }

    /// Record the event in history, then offer it to every subscriber without waiting
    /// A subscriber whose queue is full misses this event
    pub fn publish(&self, event: EventRecord) {
        let event = Arc::new(event);
        let mut state = self.inner.lock();

        if state.history.len() == HISTORY_CAPACITY {
            state.history.pop_front();
        }
        state.history.push_back(event.clone());

        state.subscribers.retain(|_, tx| match tx.try_send(event.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Snapshot of the retained events, oldest first
    pub fn history(&self) -> Vec<EventRecord> {
        self.inner
            .lock()
            .history
            .iter()
            .map(|event| event.as_ref().clone())
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

/// Receiving end of a hub subscription
/// Dropping it unsubscribes, so a dropped stream never leaks a registry entry
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Arc<EventRecord>>,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next delivered event; `None` once unsubscribed and drained
    pub async fn recv(&mut self) -> Option<Arc<EventRecord>> {
        self.rx.recv().await
    }

    /// Next already-queued event, if any
    pub fn try_recv(&mut self) -> Option<Arc<EventRecord>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Severity;

    fn event(message: &str) -> EventRecord {
        EventRecord::new(Severity::Info, message)
    }

    #[tokio::test]
    async fn test_subscribe_publish_history() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();

        hub.publish(event("x"));

        let history = hub.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "x");
        assert_eq!(history[0].level, Severity::Info);

        let received = sub.recv().await.unwrap();
        assert_eq!(*received, history[0]);
    }

    #[test]
    fn test_history_is_bounded_fifo() {
        let hub = EventHub::new();
        for i in 0..250 {
            hub.publish(event(&format!("event {}", i)));
        }

        let history = hub.history();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history[0].message, "event 150");
        assert_eq!(history[99].message, "event 249");
    }

    #[test]
    fn test_full_subscriber_does_not_block_others() {
        let hub = EventHub::new();
        let stalled = hub.subscribe();
        let mut healthy = hub.subscribe();

        for i in 0..SUBSCRIBER_CAPACITY + 50 {
            hub.publish(event(&format!("event {}", i)));
            // Keep the healthy queue drained
            let got = healthy.try_recv().unwrap();
            assert_eq!(got.message, format!("event {}", i));
        }

        // The stalled subscriber is still registered; it just missed the overflow
        assert_eq!(hub.subscriber_count(), 2);
        drop(stalled);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn test_stalled_subscriber_keeps_first_events_in_order() {
        let hub = EventHub::new();
        let mut stalled = hub.subscribe();
        for i in 0..SUBSCRIBER_CAPACITY + 10 {
            hub.publish(event(&i.to_string()));
        }

        for i in 0..SUBSCRIBER_CAPACITY {
            assert_eq!(stalled.try_recv().unwrap().message, i.to_string());
        }
        assert!(stalled.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_twice_is_noop() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();
        let other = hub.subscribe();

        hub.publish(event("before"));
        hub.unsubscribe(&sub);
        hub.unsubscribe(&sub);
        assert_eq!(hub.subscriber_count(), 1);

        // Already queued events drain, then the channel reports closed
        assert_eq!(sub.recv().await.unwrap().message, "before");
        assert!(sub.recv().await.is_none());

        drop(sub);
        assert_eq!(hub.subscriber_count(), 1);
        drop(other);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_late_subscriber_sees_history_not_past_deliveries() {
        let hub = EventHub::new();
        hub.publish(event("old"));

        let mut late = hub.subscribe();
        assert!(late.try_recv().is_none());
        assert_eq!(hub.history()[0].message, "old");
    }

    #[test]
    fn test_publish_from_many_threads() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let hub = hub.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        hub.publish(event(&format!("{}-{}", t, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(hub.history().len(), 40);
        let mut received = 0;
        while sub.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, 40);
    }

    #[test]
    fn test_subscription_outliving_hub() {
        let hub = EventHub::new();
        let sub = hub.subscribe();
        drop(hub);
        drop(sub);
    }
}
