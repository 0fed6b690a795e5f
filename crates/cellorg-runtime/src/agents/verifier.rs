//! Verifier agent (§4.6): asks the LLM port whether the goal was achieved
//! given the execution results, falling back to a heuristic derived
//! straight from step success when the port fails or returns invalid JSON.

use crate::util::{now_ms, strip_markdown_fence};
use async_trait::async_trait;
use cellorg_kernel::agent::{Agent, AgentBase, ProcessOutcome};
use cellorg_kernel::llm::{ChatMessage, ChatPort};
use cellorg_kernel::message::{Message, MessageBody, VerifyRequest};
use cellorg_kernel::plan::{Issue, NextAction, NextActionType, Priority, Severity, VerificationReport};
use cellorg_kernel::KernelError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

const MAX_EMBEDDED_OUTPUT: usize = 2000;

#[derive(Debug, Deserialize)]
struct LlmReportPayload {
    goal_achieved: bool,
    #[serde(default)]
    issues: Vec<Issue>,
    #[serde(default)]
    next_actions: Vec<NextAction>,
}

pub struct VerifierAgent {
    chat: Arc<dyn ChatPort>,
}

impl VerifierAgent {
    pub fn new(chat: Arc<dyn ChatPort>) -> Self {
        Self { chat }
    }

    fn prompt(req: &VerifyRequest) -> Vec<ChatMessage> {
        let system = ChatMessage::system(
            "Given a goal and a list of executed step results, decide whether the \
             goal was achieved. Respond with a single strict JSON object: \
             {\"goal_achieved\":bool,\"issues\":[{\"step_id\":string,\"issue\":string,\
             \"severity\":\"critical\"|\"high\"|\"medium\"|\"low\"}],\"next_actions\":\
             [{\"type\":\"fix\"|\"adjust\"|\"retry\"|\"continue\",\"description\":string,\
             \"priority\":\"high\"|\"medium\"|\"low\"}]}. No prose, no markdown fences.",
        );
        let mut body = format!("Goal: {}\n\nStep results:\n", req.goal);
        for step in &req.execution_results.step_results {
            let mut output = step.output.clone();
            if output.len() > MAX_EMBEDDED_OUTPUT {
                output.truncate(MAX_EMBEDDED_OUTPUT);
                output.push_str("...[truncated]");
            }
            body.push_str(&format!(
                "- step {} ({}): success={} error={:?} output={}\n",
                step.step_id, step.action.name(), step.success, step.error, output
            ));
        }
        vec![system, ChatMessage::user(body)]
    }

    fn heuristic_report(req: &VerifyRequest) -> VerificationReport {
        let goal_achieved = req.execution_results.all_success;
        let issues: Vec<Issue> = req
            .execution_results
            .step_results
            .iter()
            .filter(|r| !r.success)
            .map(|r| Issue {
                step_id: r.step_id.clone(),
                issue: r.error.clone().unwrap_or_else(|| "step failed".to_string()),
                severity: Severity::High,
            })
            .collect();
        let next_actions = issues
            .iter()
            .map(|issue| NextAction {
                action_type: NextActionType::Fix,
                description: format!("address step {}: {}", issue.step_id, issue.issue),
                priority: Priority::High,
            })
            .collect();

        VerificationReport {
            request_id: req.request_id.clone(),
            goal_achieved,
            issues,
            next_actions,
        }
    }
}

#[async_trait]
impl Agent for VerifierAgent {
    fn name(&self) -> &str {
        "verifier"
    }

    async fn init(&mut self, _base: &AgentBase) -> Result<(), KernelError> {
        Ok(())
    }

    async fn process_message(&mut self, msg: Arc<Message>, _base: &AgentBase) -> ProcessOutcome {
        let req = match &msg.body {
            MessageBody::VerifyRequest(req) => req,
            _ => return ProcessOutcome::error(KernelError::UnknownMessageType),
        };

        let report = match self.chat.chat(Self::prompt(req)).await {
            Ok(raw) => {
                let cleaned = strip_markdown_fence(&raw);
                match serde_json::from_str::<LlmReportPayload>(cleaned) {
                    Ok(payload) => VerificationReport {
                        request_id: req.request_id.clone(),
                        goal_achieved: payload.goal_achieved,
                        issues: payload.issues,
                        next_actions: payload.next_actions,
                    },
                    Err(e) => {
                        warn!(error = %e, request_id = %req.request_id, "llm report was not valid json, using heuristic");
                        Self::heuristic_report(req)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, request_id = %req.request_id, "llm port unavailable, using heuristic report");
                Self::heuristic_report(req)
            }
        };

        ProcessOutcome::reply(Message::new(MessageBody::VerificationReport(report), now_ms()))
    }

    async fn cleanup(&mut self, _base: &AgentBase) -> Result<(), KernelError> {
        Ok(())
    }
}
