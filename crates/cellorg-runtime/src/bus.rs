//! Concrete in-process bus: per-subscriber bounded queue, drop-oldest
//! backpressure, one forwarder task per subscription.
//!
//! Grounded on `mofa_kernel::bus::queue::EventQueue` (`VecDeque` behind a
//! `Mutex` + `Notify`, notify-then-check `recv` to avoid missed wakeups) and
//! `mofa_kernel::bus::config::BackpressureStrategy::DropOldest` — chosen
//! over the sibling `broadcast`/`LagPolicy` bus in the same crate because
//! it matches this spec's literal contract: a bounded per-subscriber queue
//! with a dropped-count metric, not a lag-detecting broadcast channel.

use async_trait::async_trait;
use cellorg_kernel::bus::{Bus, BusError, BusMetricsSnapshot, BusSubscription, SubscriptionId};
use cellorg_kernel::message::Message;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;

const DEFAULT_CAPACITY: usize = 256;

struct SubscriberQueue {
    inner: Mutex<VecDeque<Arc<Message>>>,
    notify: Notify,
    capacity: usize,
    closed: AtomicBool,
    metrics: Arc<cellorg_kernel::bus::BusMetrics>,
}

impl SubscriberQueue {
    fn new(capacity: usize, metrics: Arc<cellorg_kernel::bus::BusMetrics>) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            notify: Notify::new(),
            capacity,
            closed: AtomicBool::new(false),
            metrics,
        }
    }

    async fn push(&self, msg: Arc<Message>) {
        let mut guard = self.inner.lock().await;
        if guard.len() >= self.capacity {
            guard.pop_front();
            self.metrics.record_drop();
        }
        guard.push_back(msg);
        drop(guard);
        self.notify.notify_one();
    }

    /// Notify-then-check: check the queue, and only sleep on `notified()`
    /// if it was empty, so a push racing between our check and our wait is
    /// never missed.
    async fn pop(&self) -> Option<Arc<Message>> {
        loop {
            {
                let mut guard = self.inner.lock().await;
                if let Some(m) = guard.pop_front() {
                    return Some(m);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

struct TopicState {
    subscribers: HashMap<u64, Arc<SubscriberQueue>>,
}

pub struct InProcessBus {
    topics: RwLock<HashMap<String, TopicState>>,
    next_id: AtomicU64,
    capacity: usize,
    metrics: Arc<cellorg_kernel::bus::BusMetrics>,
    forwarders: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            capacity,
            metrics: Arc::new(cellorg_kernel::bus::BusMetrics::new()),
            forwarders: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bus for InProcessBus {
    async fn publish(&self, topic: &str, message: Message) -> Result<(), BusError> {
        let arc_msg = Arc::new(message);
        let topics = self.topics.read().await;
        if let Some(state) = topics.get(topic) {
            for queue in state.subscribers.values() {
                self.metrics.record_delivery();
                queue.push(arc_msg.clone()).await;
            }
        }
        self.metrics.record_publish();
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BusSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(SubscriberQueue::new(self.capacity, self.metrics.clone()));

        {
            let mut topics = self.topics.write().await;
            topics
                .entry(topic.to_string())
                .or_insert_with(|| TopicState { subscribers: HashMap::new() })
                .subscribers
                .insert(id, queue.clone());
        }

        // One forwarding task per subscriber queue, per §5's "one thread
        // per subscriber queue" scheduling model.
        let (tx, rx) = mpsc::channel(self.capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(msg) = queue.pop().await {
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
        });
        self.forwarders.lock().await.insert(id, handle);

        BusSubscription::new(SubscriptionId(id), rx)
    }

    async fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> Result<(), BusError> {
        let removed = {
            let mut topics = self.topics.write().await;
            match topics.get_mut(topic) {
                Some(state) => state.subscribers.remove(&id.0),
                None => None,
            }
        };
        match removed {
            Some(queue) => {
                queue.close();
                if let Some(handle) = self.forwarders.lock().await.remove(&id.0) {
                    handle.abort();
                }
                Ok(())
            }
            None => Err(BusError::SubscriptionNotFound(id.0, topic.to_string())),
        }
    }

    fn metrics(&self) -> BusMetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellorg_kernel::message::{MessageBody, RequestContext, UserRequest};

    fn request_message(id: &str) -> Message {
        Message::new(
            MessageBody::UserRequest(UserRequest {
                id: id.to_string(),
                content: "hello".into(),
                context: RequestContext {
                    target_vfs: "project".into(),
                    target_root: "/tmp".into(),
                    self_modify: false,
                    workbench_root: "/tmp".into(),
                    framework_root: "/tmp".into(),
                },
            }),
            0,
        )
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_a_noop_success() {
        let bus = InProcessBus::new();
        assert!(bus.publish("pev-bus", request_message("r1")).await.is_ok());
    }

    #[tokio::test]
    async fn subscriber_receives_published_message() {
        let bus = InProcessBus::new();
        let mut sub = bus.subscribe("pev-bus").await;
        bus.publish("pev-bus", request_message("r1")).await.unwrap();
        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.request_id(), "r1");
    }

    #[tokio::test]
    async fn messages_published_before_subscribe_are_not_replayed() {
        let bus = InProcessBus::new();
        bus.publish("pev-bus", request_message("before")).await.unwrap();
        let mut sub = bus.subscribe("pev-bus").await;
        bus.publish("pev-bus", request_message("after")).await.unwrap();
        let msg = sub.recv().await.unwrap();
        assert_eq!(msg.request_id(), "after");
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_records_metric() {
        let bus = InProcessBus::with_capacity(2);
        let mut sub = bus.subscribe("pev-bus").await;
        bus.publish("pev-bus", request_message("1")).await.unwrap();
        bus.publish("pev-bus", request_message("2")).await.unwrap();
        bus.publish("pev-bus", request_message("3")).await.unwrap();

        let first = sub.recv().await.unwrap();
        assert_eq!(first.request_id(), "2");
        let second = sub.recv().await.unwrap();
        assert_eq!(second.request_id(), "3");
        assert_eq!(bus.metrics().dropped, 1);
    }

    #[tokio::test]
    async fn two_subscribers_both_receive_independently() {
        let bus = InProcessBus::new();
        let mut a = bus.subscribe("pev-bus").await;
        let mut b = bus.subscribe("pev-bus").await;
        bus.publish("pev-bus", request_message("r1")).await.unwrap();
        assert_eq!(a.recv().await.unwrap().request_id(), "r1");
        assert_eq!(b.recv().await.unwrap().request_id(), "r1");
    }

    #[tokio::test]
    async fn unsubscribe_unknown_id_errors() {
        let bus = InProcessBus::new();
        assert!(bus.unsubscribe("pev-bus", SubscriptionId(999)).await.is_err());
    }
}
