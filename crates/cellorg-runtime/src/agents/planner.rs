//! Planner agent (§4.4): request -> structured plan via the LLM port, with
//! a deterministic fallback when the port fails or returns invalid JSON.

use crate::util::{now_ms, strip_markdown_fence};
use async_trait::async_trait;
use cellorg_kernel::agent::{Agent, AgentBase, ProcessOutcome};
use cellorg_kernel::llm::{ChatMessage, ChatPort};
use cellorg_kernel::message::{Message, MessageBody, PlanRequest};
use cellorg_kernel::plan::{Action, Plan, Step, StepPhase, TargetContext};
use cellorg_kernel::KernelError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct LlmPlanPayload {
    goal: Option<String>,
    target_context: Option<TargetContext>,
    #[serde(default)]
    steps: Vec<Step>,
}

pub struct PlannerAgent {
    chat: Arc<dyn ChatPort>,
}

impl PlannerAgent {
    pub fn new(chat: Arc<dyn ChatPort>) -> Self {
        Self { chat }
    }

    fn system_prompt() -> ChatMessage {
        ChatMessage::system(
            "You are a planning assistant for a coding agent. Allowed actions: \
             search, read_file, write_file, patch, run_command, run_tests. Allowed \
             phases: discovery, analysis, implementation, validation. Respond with a \
             single strict JSON object: {\"goal\":string,\"target_context\":\"project\"|\
             \"framework\",\"steps\":[{\"id\":string,\"phase\":string,\"action\":string,\
             ...action params,\"depends_on\":[string],\"success_criteria\":string}]}. \
             No prose, no markdown fences.",
        )
    }

    fn user_prompt(req: &PlanRequest) -> ChatMessage {
        let mut text = format!("Request: {}\nIteration: {}\n", req.user_request, req.iteration);
        if let Some(prev) = &req.previous_plan {
            text.push_str(&format!("Previous plan id: {prev}\n"));
        }
        if !req.previous_issues.is_empty() {
            text.push_str("Previous issues:\n");
            for issue in &req.previous_issues {
                text.push_str(&format!("- [{:?}] step {}: {}\n", issue.severity, issue.step_id, issue.issue));
            }
        }
        ChatMessage::user(text)
    }

    /// A minimal discovery -> analysis -> implementation -> validation
    /// sequence targeting the request's own text, used whenever the LLM
    /// port fails or returns an invalid plan (§4.4 step 4).
    fn fallback_plan(req: &PlanRequest) -> Plan {
        let keywords = req
            .user_request
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .take(5)
            .collect::<Vec<_>>()
            .join(" ");
        let filename_guess = req
            .user_request
            .split_whitespace()
            .find(|w| w.contains('.'))
            .map(str::to_string)
            .unwrap_or_else(|| "notes.md".to_string());

        Plan {
            id: Uuid::now_v7().to_string(),
            request_id: req.request_id.clone(),
            goal: req.user_request.clone(),
            target_context: TargetContext::Project,
            steps: vec![
                Step {
                    id: "s1".into(),
                    phase: StepPhase::Discovery,
                    action: Action::Search { query: keywords, pattern: "*".into() },
                    depends_on: vec![],
                    success_criteria: "relevant files located".into(),
                },
                Step {
                    id: "s2".into(),
                    phase: StepPhase::Analysis,
                    action: Action::ReadFile { path: filename_guess.clone() },
                    depends_on: vec!["s1".into()],
                    success_criteria: "existing content understood".into(),
                },
                Step {
                    id: "s3".into(),
                    phase: StepPhase::Implementation,
                    action: Action::WriteFile {
                        path: filename_guess,
                        content: format!("// TODO: {}\n", req.user_request),
                    },
                    depends_on: vec!["s2".into()],
                    success_criteria: "change applied".into(),
                },
                Step {
                    id: "s4".into(),
                    phase: StepPhase::Validation,
                    action: Action::RunTests { pattern: "*".into() },
                    depends_on: vec!["s3".into()],
                    success_criteria: "tests pass".into(),
                },
            ],
        }
    }

    fn persist(base: &AgentBase, plan: &Plan) {
        let data_path = base.config.get_string("data_path", "./data");
        let dir = std::path::Path::new(&data_path);
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!(error = %e, "failed to create planner data_path, skipping persistence");
            return;
        }
        match serde_json::to_string_pretty(plan) {
            Ok(json) => {
                if let Err(e) = std::fs::write(dir.join(format!("{}.json", plan.id)), json) {
                    warn!(error = %e, plan_id = %plan.id, "failed to persist plan document");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize plan for persistence"),
        }
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        "planner"
    }

    async fn init(&mut self, _base: &AgentBase) -> Result<(), KernelError> {
        Ok(())
    }

    async fn process_message(&mut self, msg: Arc<Message>, base: &AgentBase) -> ProcessOutcome {
        let req = match &msg.body {
            MessageBody::PlanRequest(req) => req,
            _ => return ProcessOutcome::error(KernelError::UnknownMessageType),
        };

        let chat_result = self.chat.chat(vec![Self::system_prompt(), Self::user_prompt(req)]).await;

        let plan = match chat_result {
            Ok(raw) => {
                let cleaned = strip_markdown_fence(&raw);
                match serde_json::from_str::<LlmPlanPayload>(cleaned) {
                    Ok(payload) => {
                        let candidate = Plan {
                            id: Uuid::now_v7().to_string(),
                            request_id: req.request_id.clone(),
                            goal: payload.goal.unwrap_or_else(|| req.user_request.clone()),
                            target_context: payload.target_context.unwrap_or(TargetContext::Project),
                            steps: payload.steps,
                        };
                        match candidate.validate() {
                            Ok(()) => candidate,
                            Err(e) => {
                                warn!(error = %e, request_id = %req.request_id, "llm plan failed validation, using fallback");
                                Self::fallback_plan(req)
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, request_id = %req.request_id, "llm plan was not valid json, using fallback");
                        Self::fallback_plan(req)
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, request_id = %req.request_id, "llm port unavailable, using fallback plan");
                Self::fallback_plan(req)
            }
        };

        Self::persist(base, &plan);

        ProcessOutcome::reply(Message::new(MessageBody::ExecutionPlan(plan), now_ms()))
    }

    async fn cleanup(&mut self, _base: &AgentBase) -> Result<(), KernelError> {
        Ok(())
    }
}
