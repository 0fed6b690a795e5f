//! Test-only `ChatPort` implementations and the `FallbackStrategy` seam used
//! by Planner/Verifier when the LLM port fails or returns invalid JSON.
//! Grounded on `mofa_runtime::fallback::{FallbackStrategy, StaticFallback,
//! NoFallback}`; no concrete provider client lives here or anywhere in this
//! workspace — that integration is explicitly out of scope.

use async_trait::async_trait;
use cellorg_kernel::llm::{ChatMessage, ChatPort, LlmError};
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Always returns the next response from a fixed, ordered script. Errors
/// once the script is exhausted. Deterministic mocks like this cover every
/// Planner/Verifier unit test per §9's "LLM port" note.
pub struct ScriptedChatPort {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedChatPort {
    pub fn new(responses: impl IntoIterator<Item = String>) -> Self {
        Self { responses: Mutex::new(responses.into_iter().collect()) }
    }
}

#[async_trait]
impl ChatPort for ScriptedChatPort {
    async fn chat(&self, _messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| LlmError::Unavailable("scripted responses exhausted".into()))
    }
}

/// Always fails. Used to exercise the fallback-plan/fallback-report laws
/// (§8: "If the LLM port is replaced with one that always errors...").
pub struct AlwaysFailingChatPort;

#[async_trait]
impl ChatPort for AlwaysFailingChatPort {
    async fn chat(&self, _messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        Err(LlmError::Unavailable("llm port unreachable".into()))
    }
}
