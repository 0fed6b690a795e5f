//! Contracts and data types for the PEV cell: the bus, the agent runtime
//! contract, the plan/step/report data model, the VFS tool-dispatcher
//! contract, the LLM chat port, and the knowledge-store port.
//!
//! This crate has no concrete implementations — those live in
//! `cellorg-runtime`. The split mirrors the teacher's `mofa-kernel` /
//! `mofa-runtime` microkernel layering: this crate depends only on
//! `serde`/`tokio`/`thiserror`/`async-trait`, never on `config` or any
//! I/O-heavy crate.

pub mod agent;
pub mod bus;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod message;
pub mod plan;
pub mod vfs;

pub use agent::{Agent, AgentBase, AgentConfig, ProcessOutcome};
pub use bus::{Bus, BusError, BusSubscription, SubscriptionId};
pub use error::KernelError;
pub use knowledge::{KnowledgeError, KnowledgeStore, PlanRecord, RequestRecord, SimilarRequest};
pub use llm::{ChatMessage, ChatPort, LlmError, Role};
pub use message::{ExecuteTask, Message, MessageBody, PlanRequest, RequestContext, ResponseStatus, UserRequest, UserResponse, VerifyRequest};
pub use plan::{
    Action, ExecutionResults, Issue, NextAction, NextActionType, PatchOp, PatchOpType, Plan,
    PlanError, Priority, Severity, Step, StepPhase, StepResult, TargetContext, VerificationReport,
};
pub use vfs::{ActionOutput, ToolDispatcher, ToolError};
