//! Host Bridge (§4.9): the outer-process seam a CLI host uses to publish a
//! `user_request` onto `pev-bus` and observe `alfa-responses` (and,
//! optionally, `pev-bus` itself for progress) without depending on any
//! agent internals directly.

use cellorg_kernel::bus::{Bus, BusSubscription};
use cellorg_kernel::message::{Message, MessageBody, RequestContext, UserRequest};
use std::sync::Arc;

/// Thin façade over a cell's bus. Exists so a host never has to hold an
/// `Arc<dyn Bus>` and call `publish`/`subscribe` directly — the two calls
/// it actually needs are named for what they mean, not what the bus API
/// happens to expose.
pub struct HostBridge {
    bus: Arc<dyn Bus>,
}

impl HostBridge {
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self { bus }
    }

    /// Publishes a `user_request` onto `pev-bus`, starting a PEV cycle.
    pub async fn submit(&self, request_id: impl Into<String>, content: impl Into<String>, context: RequestContext) {
        let request = UserRequest { id: request_id.into(), content: content.into(), context };
        let message = Message::new(MessageBody::UserRequest(request), crate::util::now_ms());
        // `pev-bus` has subscribers by construction once a cell is running;
        // a publish error here only ever means the bus itself is gone.
        let _ = self.bus.publish("pev-bus", message).await;
    }

    /// Subscribes to `alfa-responses` for the terminal `user_response` of
    /// every in-flight request this bridge submits.
    pub async fn responses(&self) -> BusSubscription {
        self.bus.subscribe("alfa-responses").await
    }

    /// Subscribes to `pev-bus` itself for progress observation (plans,
    /// execution results, verification reports as they're produced).
    pub async fn progress(&self) -> BusSubscription {
        self.bus.subscribe("pev-bus").await
    }
}
