//! Concrete implementations of the `cellorg-kernel` contracts: the
//! in-process bus, the VFS-rooted tool dispatcher, layered configuration,
//! the in-memory knowledge store, the five PEV agents, and the cell/
//! host-bridge wiring that assembles them into a running system.

pub mod agents;
pub mod bus;
pub mod cell;
pub mod config;
pub mod host_bridge;
pub mod knowledge_store;
pub mod llm;
pub mod runner;
pub mod util;
pub mod vfs;

#[cfg(test)]
pub(crate) mod test_support;

pub use agents::{CoordinatorAgent, ExecutorAgent, KnowledgeAgent, PlannerAgent, VerifierAgent};
pub use bus::InProcessBus;
pub use cell::Cell;
pub use config::{load_cell_config, ConfigError, LayeredConfigSource};
pub use host_bridge::HostBridge;
pub use knowledge_store::InMemoryKnowledgeStore;
pub use runner::AgentRunner;
pub use vfs::FileVfs;
