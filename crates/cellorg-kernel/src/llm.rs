//! The narrow LLM port (§9 "LLM port"): `Chat(messages) -> {content, error}`.
//! No provider implementation lives here or in the runtime crate — only the
//! contract and, in `cellorg-runtime`'s test code, a deterministic mock.
//! Grounded on `mofa_kernel::llm::provider::LLMProvider`, reduced to the one
//! method Planner/Verifier actually call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm port unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ChatPort: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError>;
}
