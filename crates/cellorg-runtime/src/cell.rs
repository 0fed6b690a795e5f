//! A cell: a named group of agents running together under one bus and one
//! layered configuration (glossary, "Cell"). `Cell::build` is the single
//! place that wires the bus, the VFS-scoped tool dispatcher, the knowledge
//! store, and the five agents from §4.4-§4.8 into running tasks.

use crate::agents::{CoordinatorAgent, ExecutorAgent, KnowledgeAgent, PlannerAgent, VerifierAgent};
use crate::bus::InProcessBus;
use crate::config::{load_cell_config, ConfigError, LayeredConfigSource};
use crate::knowledge_store::InMemoryKnowledgeStore;
use crate::runner::AgentRunner;
use crate::vfs::FileVfs;
use cellorg_kernel::agent::{AgentBase, AgentConfig, ConfigSource};
use cellorg_kernel::bus::Bus;
use cellorg_kernel::llm::ChatPort;
use cellorg_kernel::vfs::ToolDispatcher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A running cell: the bus handle callers publish user requests onto and
/// subscribe for responses from, plus the join handles of its agent tasks.
pub struct Cell {
    bus: Arc<InProcessBus>,
    handles: Vec<JoinHandle<()>>,
}

impl Cell {
    /// Builds and spawns the standard five-agent PEV cell: Coordinator,
    /// Planner, Executor, Verifier, Knowledge. `chat` is supplied by the
    /// host — no concrete LLM provider client lives in this workspace
    /// (§1 Non-goals).
    pub fn build(
        vfs_root: impl Into<PathBuf>,
        config_path: Option<&Path>,
        chat: Arc<dyn ChatPort>,
    ) -> Result<Self, ConfigError> {
        let bus = Arc::new(InProcessBus::new());
        let config = load_cell_config(config_path)?;
        let config_source: Arc<dyn ConfigSource> = Arc::new(LayeredConfigSource(config));
        let vfs: Arc<dyn ToolDispatcher> = Arc::new(FileVfs::new(vfs_root));
        let knowledge_store = Arc::new(InMemoryKnowledgeStore::new());

        let base = |with_vfs: bool| {
            let base = AgentBase::new(bus.clone() as Arc<dyn Bus>, AgentConfig::new(config_source.clone()));
            if with_vfs {
                base.with_vfs(vfs.clone())
            } else {
                base
            }
        };

        let handles = vec![
            AgentRunner::new(Box::new(CoordinatorAgent::new()), base(false), "pev-bus").spawn(),
            AgentRunner::new(Box::new(PlannerAgent::new(chat.clone())), base(false), "plan-requests").spawn(),
            AgentRunner::new(Box::new(ExecutorAgent::new()), base(true), "execute-tasks").spawn(),
            AgentRunner::new(Box::new(VerifierAgent::new(chat)), base(false), "verify-requests").spawn(),
            AgentRunner::new(Box::new(KnowledgeAgent::new(knowledge_store)), base(false), "pev-bus").spawn(),
        ];

        Ok(Self { bus, handles })
    }

    pub fn bus(&self) -> Arc<dyn Bus> {
        self.bus.clone()
    }

    /// Aborts every agent task. Each `Agent::cleanup` is skipped on abort,
    /// same as any other task cancellation — agents hold no state that
    /// outlives the process besides what they've already persisted.
    pub async fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::AlwaysFailingChatPort;
    use cellorg_kernel::message::{Message, MessageBody, RequestContext, UserRequest};

    #[tokio::test]
    async fn cell_round_trips_a_request_to_a_response() {
        let dir = tempfile::tempdir().unwrap();
        let cell = Cell::build(dir.path(), None, Arc::new(AlwaysFailingChatPort)).unwrap();

        let mut responses = cell.bus().subscribe("alfa-responses").await;

        let request = UserRequest {
            id: "r1".into(),
            content: "add hello.txt with hi".into(),
            context: RequestContext {
                target_vfs: "project".into(),
                target_root: dir.path().display().to_string(),
                self_modify: false,
                workbench_root: dir.path().display().to_string(),
                framework_root: dir.path().display().to_string(),
            },
        };
        cell.bus()
            .publish("pev-bus", Message::new(MessageBody::UserRequest(request), 0))
            .await
            .unwrap();

        let response = tokio::time::timeout(std::time::Duration::from_secs(5), responses.recv())
            .await
            .expect("cell should answer within the timeout")
            .expect("bus should deliver a response");

        match &response.body {
            MessageBody::UserResponse(resp) => assert_eq!(resp.request_id, "r1"),
            other => panic!("expected a user response, got {other:?}"),
        }

        cell.shutdown().await;
    }
}
