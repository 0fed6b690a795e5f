//! Drives one agent: `init`, then a receive-process-reply loop over its
//! single inbound topic, then `cleanup` on shutdown. One task per agent,
//! agents run in parallel, each one single-threaded over its own queue —
//! the actor-per-task model of §4.2/§9 ("one task per agent").
//!
//! Grounded on `mofa_runtime::runner::AgentRunner`, reshaped from a
//! request/response runner around `MoFAAgent::execute` into a bus-driven
//! loop around this spec's `Agent::process_message`.

use cellorg_kernel::agent::{Agent, AgentBase};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct AgentRunner {
    agent: Box<dyn Agent>,
    base: AgentBase,
    inbound_topic: String,
}

impl AgentRunner {
    pub fn new(agent: Box<dyn Agent>, base: AgentBase, inbound_topic: impl Into<String>) -> Self {
        Self { agent, base, inbound_topic: inbound_topic.into() }
    }

    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let name = self.agent.name().to_string();
            if let Err(e) = self.agent.init(&self.base).await {
                warn!(agent = %name, error = %e, "agent failed to initialize");
                return;
            }
            info!(agent = %name, topic = %self.inbound_topic, "agent initialized");

            let mut subscription = self.base.bus.subscribe(&self.inbound_topic).await;
            while let Some(msg) = subscription.recv().await {
                let outcome = self.agent.process_message(msg, &self.base).await;

                if let Some(err) = outcome.error {
                    warn!(agent = %name, error = %err, "agent reported a non-fatal error");
                }

                if let Some(reply) = outcome.reply {
                    let topic = reply.topic();
                    if let Err(e) = self.base.bus.publish(topic, reply).await {
                        warn!(agent = %name, error = %e, topic, "failed to publish reply");
                    }
                }
            }

            if let Err(e) = self.agent.cleanup(&self.base).await {
                warn!(agent = %name, error = %e, "agent cleanup failed");
            }
            info!(agent = %name, "agent shut down");
        })
    }
}
