//! Bus contract (§4.1): topic-addressed pub/sub with per-subscriber queues,
//! at-least-once delivery to live subscribers, drop-oldest backpressure.
//!
//! Grounded on `mofa_kernel::bus::traits::MessageBus`, narrowed to the
//! publish/subscribe/unsubscribe surface this spec actually needs — no
//! ack/nack/dead-letter machinery, since the Coordinator (not the bus) owns
//! correctness under redelivery.

mod metrics;

pub use metrics::{BusMetrics, BusMetricsSnapshot};

use crate::message::Message;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("subscription {0} not found on topic {1}")]
    SubscriptionNotFound(u64, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A live subscriber's inbound queue handle.
pub struct BusSubscription {
    pub id: SubscriptionId,
    pub(crate) receiver: mpsc::Receiver<Arc<Message>>,
}

impl BusSubscription {
    pub fn new(id: SubscriptionId, receiver: mpsc::Receiver<Arc<Message>>) -> Self {
        Self { id, receiver }
    }

    /// Waits for the next message on this subscription.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.receiver.recv().await
    }
}

#[async_trait]
pub trait Bus: Send + Sync {
    /// Enqueues one copy of `message` onto every current subscriber queue
    /// for `topic`. A no-op success if there are no subscribers.
    async fn publish(&self, topic: &str, message: Message) -> Result<(), BusError>;

    /// Allocates a new, internally-bounded queue for this subscriber.
    async fn subscribe(&self, topic: &str) -> BusSubscription;

    /// Drains and releases a subscription.
    async fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> Result<(), BusError>;

    fn metrics(&self) -> BusMetricsSnapshot;
}
