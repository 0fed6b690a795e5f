//! Tool Dispatcher contract (§4.3): one `Action` in, one `ActionOutput` or
//! `ToolError` out. Modeled as a closed tagged variant with a single
//! exhaustive `dispatch`, per §9's "dynamic dispatch on actions" note —
//! deliberately not an inheritance hierarchy of per-action objects.

use crate::plan::Action;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("path escapes the VFS root")]
    PathEscape,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("file too large")]
    TooLarge,
    #[error("invalid patch operation: {0}")]
    InvalidOp(String),
    #[error("patch operation out of range: line {0}")]
    OutOfRange(usize),
    #[error("failed to spawn command: {0}")]
    Spawn(String),
    #[error("command timed out")]
    Timeout,
    #[error("command exited non-zero ({code}): {output}")]
    NonZeroExit { code: i32, output: String },
}

impl ToolError {
    /// Stable error-taxonomy tag used in `StepResult.error` (§7).
    pub fn tag(&self) -> &'static str {
        match self {
            ToolError::PathEscape => "path_escape",
            ToolError::NotFound(_) => "not_found",
            ToolError::Io(_) => "io",
            ToolError::TooLarge => "too_large",
            ToolError::InvalidOp(_) => "invalid_op",
            ToolError::OutOfRange(_) => "out_of_range",
            ToolError::Spawn(_) => "spawn",
            ToolError::Timeout => "timeout",
            ToolError::NonZeroExit { .. } => "non_zero_exit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutput {
    Paths(Vec<String>),
    Text(String),
    Confirmation(String),
    PatchSummary(String),
    /// `run_command`/`run_tests`: still returned on `non_zero_exit`.
    CommandOutput { output: String, exit_code: Option<i32> },
}

impl ActionOutput {
    pub fn as_text(&self) -> String {
        match self {
            ActionOutput::Paths(p) => p.join("\n"),
            ActionOutput::Text(t) => t.clone(),
            ActionOutput::Confirmation(c) => c.clone(),
            ActionOutput::PatchSummary(s) => s.clone(),
            ActionOutput::CommandOutput { output, .. } => output.clone(),
        }
    }
}

#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn dispatch(&self, action: &Action) -> Result<ActionOutput, ToolError>;
}
