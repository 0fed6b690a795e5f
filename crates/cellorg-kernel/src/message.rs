//! The bus envelope and the payload types carried on each topic (§6.2).
//!
//! `Message` plays the role of `mofa_kernel::bus::envelope::MessageEnvelope`,
//! simplified for an in-process bus: no wire serialization, a closed payload
//! enum instead of an opaque byte blob, and a `target_topic()` derived from
//! the payload rather than stored redundantly.

use crate::plan::{ExecutionResults, Issue, NextAction, Plan};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub target_vfs: String,
    pub target_root: String,
    pub self_modify: bool,
    pub workbench_root: String,
    pub framework_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRequest {
    pub id: String,
    pub content: String,
    pub context: RequestContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub request_id: String,
    pub user_request: String,
    pub context: RequestContext,
    pub iteration: u32,
    pub previous_plan: Option<String>,
    #[serde(default)]
    pub previous_issues: Vec<Issue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteTask {
    pub request_id: String,
    pub plan_id: String,
    pub plan: Plan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub request_id: String,
    pub plan_id: String,
    pub execution_results: ExecutionResults,
    pub goal: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub request_id: String,
    pub status: ResponseStatus,
    pub iterations: u32,
    pub goal_achieved: bool,
    pub message: String,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub next_actions: Vec<NextAction>,
}

/// The closed set of payloads that can travel on the bus. A tagged variant
/// rather than `serde_json::Value` so every consumer pattern-matches
/// exhaustively instead of probing an untyped map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    UserRequest(UserRequest),
    PlanRequest(PlanRequest),
    ExecutionPlan(Plan),
    ExecuteTask(ExecuteTask),
    ExecutionResults(ExecutionResults),
    VerifyRequest(VerifyRequest),
    VerificationReport(crate::plan::VerificationReport),
    UserResponse(UserResponse),
}

impl MessageBody {
    /// The request_id correlation key, present on every payload derived
    /// from a user request.
    pub fn request_id(&self) -> &str {
        match self {
            MessageBody::UserRequest(m) => &m.id,
            MessageBody::PlanRequest(m) => &m.request_id,
            MessageBody::ExecutionPlan(m) => &m.request_id,
            MessageBody::ExecuteTask(m) => &m.request_id,
            MessageBody::ExecutionResults(m) => &m.request_id,
            MessageBody::VerifyRequest(m) => &m.request_id,
            MessageBody::VerificationReport(m) => &m.request_id,
            MessageBody::UserResponse(m) => &m.request_id,
        }
    }

    /// The topic this payload is addressed to, per §6.1.
    pub fn default_topic(&self) -> &'static str {
        match self {
            MessageBody::UserRequest(_)
            | MessageBody::ExecutionPlan(_)
            | MessageBody::ExecutionResults(_)
            | MessageBody::VerificationReport(_) => "pev-bus",
            MessageBody::PlanRequest(_) => "plan-requests",
            MessageBody::ExecuteTask(_) => "execute-tasks",
            MessageBody::VerifyRequest(_) => "verify-requests",
            MessageBody::UserResponse(_) => "alfa-responses",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub meta: HashMap<String, String>,
    pub body: MessageBody,
}

impl Message {
    pub fn new(body: MessageBody, timestamp_ms: u64) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            timestamp_ms,
            meta: HashMap::new(),
            body,
        }
    }

    pub fn topic(&self) -> &'static str {
        self.body.default_topic()
    }

    pub fn request_id(&self) -> &str {
        self.body.request_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext {
            target_vfs: "project".into(),
            target_root: "/tmp/project".into(),
            self_modify: false,
            workbench_root: "/tmp/workbench".into(),
            framework_root: "/tmp/framework".into(),
        }
    }

    #[test]
    fn user_request_routes_to_pev_bus() {
        let body = MessageBody::UserRequest(UserRequest {
            id: "R1".into(),
            content: "do a thing".into(),
            context: ctx(),
        });
        let msg = Message::new(body, 0);
        assert_eq!(msg.topic(), "pev-bus");
        assert_eq!(msg.request_id(), "R1");
    }

    #[test]
    fn user_response_routes_to_alfa_responses() {
        let body = MessageBody::UserResponse(UserResponse {
            request_id: "R1".into(),
            status: ResponseStatus::Complete,
            iterations: 1,
            goal_achieved: true,
            message: "done".into(),
            issues: vec![],
            next_actions: vec![],
        });
        assert_eq!(Message::new(body, 0).topic(), "alfa-responses");
    }
}
