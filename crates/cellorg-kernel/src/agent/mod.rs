//! Agent runtime contract (§4.2): `Init` / `ProcessMessage` / `Cleanup`,
//! scheduled one agent per task, single-threaded over its own inbound queue.
//! Grounded on `mofa_kernel::agent::core::MoFAAgent` (init/execute/shutdown)
//! and `mofa_kernel::agent::context::AgentContext` (typed config, bus
//! access), reshaped to this spec's exact three-method contract.

mod config;

pub use config::{AgentConfig, ConfigSource};

use crate::bus::Bus;
use crate::error::KernelError;
use crate::message::Message;
use crate::vfs::ToolDispatcher;
use async_trait::async_trait;
use std::sync::Arc;

/// Everything an agent needs besides its own state: bus access, layered
/// config, and (for the Executor) a VFS-scoped tool dispatcher. Passed by
/// reference into every lifecycle call rather than held as a global —
/// per §9 "resist adding global singletons; pass ports as constructor
/// parameters".
pub struct AgentBase {
    pub bus: Arc<dyn Bus>,
    pub config: AgentConfig,
    pub vfs: Option<Arc<dyn ToolDispatcher>>,
}

impl AgentBase {
    pub fn new(bus: Arc<dyn Bus>, config: AgentConfig) -> Self {
        Self { bus, config, vfs: None }
    }

    pub fn with_vfs(mut self, vfs: Arc<dyn ToolDispatcher>) -> Self {
        self.vfs = Some(vfs);
        self
    }
}

/// Result of processing one message: an optional reply (published by the
/// runtime to the topic the reply's own payload variant maps to) and an
/// optional error, which is recorded but never terminates the agent.
#[derive(Default)]
pub struct ProcessOutcome {
    pub reply: Option<Message>,
    pub error: Option<KernelError>,
}

impl ProcessOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn reply(message: Message) -> Self {
        Self { reply: Some(message), error: None }
    }

    pub fn error(err: KernelError) -> Self {
        Self { reply: None, error: Some(err) }
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Invoked once after configuration is bound. An error fails the agent.
    async fn init(&mut self, base: &AgentBase) -> Result<(), KernelError>;

    /// Invoked once per message delivered by the runtime.
    async fn process_message(&mut self, msg: Arc<Message>, base: &AgentBase) -> ProcessOutcome;

    /// Invoked on shutdown; must be idempotent.
    async fn cleanup(&mut self, base: &AgentBase) -> Result<(), KernelError>;
}
