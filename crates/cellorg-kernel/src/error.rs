//! Crate-level error aggregation.
//!
//! Leaf errors are small `thiserror` enums owned by the module they belong
//! to; this module composes them into one `KernelError` via `#[from]`, the
//! way `mofa_kernel::error::KernelError` composes `AgentError`/`ConfigError`/
//! etc.

use crate::bus::BusError;
use crate::llm::LlmError;
use crate::plan::PlanError;
use crate::vfs::ToolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("tool dispatcher error: {0}")]
    Tool(#[from] ToolError),

    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("llm port error: {0}")]
    Llm(#[from] LlmError),

    #[error("knowledge store error: {0}")]
    Knowledge(String),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("unknown message type for this agent")]
    UnknownMessageType,

    #[error("internal error: {0}")]
    Internal(String),
}
