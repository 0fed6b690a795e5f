//! Coordinator agent (§4.7): the PEV state machine and the sole authority
//! over `RequestState`. This is the core of the core — every idempotency
//! rule in §4.7 is enforced here, not by the bus.

use crate::util::now_ms;
use async_trait::async_trait;
use cellorg_kernel::agent::{Agent, AgentBase, ProcessOutcome};
use cellorg_kernel::message::{
    ExecuteTask, Message, MessageBody, PlanRequest, RequestContext, ResponseStatus, UserResponse, VerifyRequest,
};
use cellorg_kernel::plan::{Action, ExecutionResults, Issue, Plan, VerificationReport};
use cellorg_kernel::KernelError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const GC_INTERVAL: Duration = Duration::from_secs(300);
const GC_MAX_AGE_MS: u64 = 600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Planning,
    Executing,
    Verifying,
    Complete,
    Failed,
}

struct RequestState {
    user_request: String,
    context: RequestContext,
    iteration: u32,
    phase: Phase,
    plan_id: Option<String>,
    last_execution_results: Option<ExecutionResults>,
    created_at_ms: u64,
    completed_at_ms: Option<u64>,
}

fn join_with_and(parts: &[String]) -> String {
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        2 => format!("{} and {}", parts[0], parts[1]),
        _ => {
            let (last, rest) = parts.split_last().unwrap();
            format!("{} and {}", rest.join(", "), last)
        }
    }
}

/// One-sentence human summary of the successful actions in the last
/// execution (§4.7 "Summary generation").
fn summarize_success(state: &RequestState) -> String {
    let Some(results) = &state.last_execution_results else {
        return "No actions were taken.".to_string();
    };

    let mut created = Vec::new();
    let mut modified = Vec::new();
    let mut ran_tests = false;
    let mut ran_commands = 0usize;

    for result in &results.step_results {
        if !result.success {
            continue;
        }
        match &result.action {
            Action::WriteFile { path, .. } => created.push(path.clone()),
            Action::Patch { file, .. } => modified.push(file.clone()),
            Action::RunTests { .. } => ran_tests = true,
            Action::RunCommand { .. } => ran_commands += 1,
            _ => {}
        }
    }

    let mut parts = Vec::new();
    if !created.is_empty() {
        parts.push(format!("created {}", created.join(", ")));
    }
    if !modified.is_empty() {
        parts.push(format!("modified {}", modified.join(", ")));
    }
    if ran_tests {
        parts.push("ran tests".to_string());
    }
    if ran_commands > 0 {
        parts.push(format!("ran {ran_commands} command(s)"));
    }

    if parts.is_empty() {
        "No actions produced observable changes.".to_string()
    } else {
        format!("I {}.", join_with_and(&parts))
    }
}

/// `"[severity] Step step_id: issue"`, per §4.7's boundary issue formatting.
fn format_issue(issue: &Issue) -> String {
    format!("[{:?}] Step {}: {}", issue.severity, issue.step_id, issue.issue)
}

fn format_failure_message(state: &RequestState, issues: &[Issue]) -> String {
    let summary = summarize_success(state);
    match issues.first() {
        Some(top) => format!("{summary} {}", format_issue(top)),
        None => summary,
    }
}

fn sweep_once(states: &mut HashMap<String, RequestState>, now: u64, max_age_ms: u64) -> usize {
    let before = states.len();
    states.retain(|_, s| {
        !(matches!(s.phase, Phase::Complete | Phase::Failed)
            && s.completed_at_ms.map(|c| now.saturating_sub(c) > max_age_ms).unwrap_or(false))
    });
    before - states.len()
}

pub struct CoordinatorAgent {
    states: Arc<Mutex<HashMap<String, RequestState>>>,
    sweeper: Option<JoinHandle<()>>,
}

impl CoordinatorAgent {
    pub fn new() -> Self {
        Self { states: Arc::new(Mutex::new(HashMap::new())), sweeper: None }
    }

    async fn handle_user_request(
        &self,
        ur: &cellorg_kernel::message::UserRequest,
    ) -> ProcessOutcome {
        let mut states = self.states.lock().await;
        if states.contains_key(&ur.id) {
            return ProcessOutcome::empty();
        }
        states.insert(
            ur.id.clone(),
            RequestState {
                user_request: ur.content.clone(),
                context: ur.context.clone(),
                iteration: 1,
                phase: Phase::Planning,
                plan_id: None,
                last_execution_results: None,
                created_at_ms: now_ms(),
                completed_at_ms: None,
            },
        );
        drop(states);

        let plan_request = PlanRequest {
            request_id: ur.id.clone(),
            user_request: ur.content.clone(),
            context: ur.context.clone(),
            iteration: 1,
            previous_plan: None,
            previous_issues: vec![],
        };
        ProcessOutcome::reply(Message::new(MessageBody::PlanRequest(plan_request), now_ms()))
    }

    async fn handle_execution_plan(&self, plan: &Plan) -> ProcessOutcome {
        let mut states = self.states.lock().await;
        let Some(state) = states.get_mut(&plan.request_id) else {
            return ProcessOutcome::empty();
        };
        if state.phase != Phase::Planning {
            // Either a stale/duplicate plan (§4.7 idempotency rule) or a
            // terminal request — ignore either way.
            return ProcessOutcome::empty();
        }
        state.plan_id = Some(plan.id.clone());
        state.phase = Phase::Executing;
        drop(states);

        let execute_task = ExecuteTask {
            request_id: plan.request_id.clone(),
            plan_id: plan.id.clone(),
            plan: plan.clone(),
        };
        ProcessOutcome::reply(Message::new(MessageBody::ExecuteTask(execute_task), now_ms()))
    }

    async fn handle_execution_results(&self, results: &ExecutionResults) -> ProcessOutcome {
        let mut states = self.states.lock().await;
        let Some(state) = states.get_mut(&results.request_id) else {
            return ProcessOutcome::empty();
        };
        if state.phase != Phase::Executing || state.plan_id.as_deref() != Some(results.plan_id.as_str()) {
            return ProcessOutcome::empty();
        }
        state.phase = Phase::Verifying;
        state.last_execution_results = Some(results.clone());
        let goal = state.user_request.clone();
        drop(states);

        let verify_request = VerifyRequest {
            request_id: results.request_id.clone(),
            plan_id: results.plan_id.clone(),
            execution_results: results.clone(),
            goal,
        };
        ProcessOutcome::reply(Message::new(MessageBody::VerifyRequest(verify_request), now_ms()))
    }

    async fn handle_verification_report(&self, report: &VerificationReport, base: &AgentBase) -> ProcessOutcome {
        let max_iterations = base.config.get_int("max_iterations", 10).max(1) as u32;
        let mut states = self.states.lock().await;
        let Some(state) = states.get_mut(&report.request_id) else {
            return ProcessOutcome::empty();
        };
        if state.phase != Phase::Verifying {
            return ProcessOutcome::empty();
        }

        if report.goal_achieved {
            state.phase = Phase::Complete;
            state.completed_at_ms = Some(now_ms());
            let iterations = state.iteration;
            let message = summarize_success(state);
            drop(states);

            ProcessOutcome::reply(Message::new(
                MessageBody::UserResponse(UserResponse {
                    request_id: report.request_id.clone(),
                    status: ResponseStatus::Complete,
                    iterations,
                    goal_achieved: true,
                    message,
                    issues: vec![],
                    next_actions: vec![],
                }),
                now_ms(),
            ))
        } else if state.iteration >= max_iterations {
            state.phase = Phase::Failed;
            state.completed_at_ms = Some(now_ms());
            let iterations = state.iteration;
            let message = format_failure_message(state, &report.issues);
            drop(states);

            ProcessOutcome::reply(Message::new(
                MessageBody::UserResponse(UserResponse {
                    request_id: report.request_id.clone(),
                    status: ResponseStatus::Failed,
                    iterations,
                    goal_achieved: false,
                    message,
                    issues: report.issues.clone(),
                    next_actions: report.next_actions.clone(),
                }),
                now_ms(),
            ))
        } else {
            state.iteration += 1;
            state.phase = Phase::Planning;
            let iteration = state.iteration;
            let previous_plan = state.plan_id.clone();
            let user_request = state.user_request.clone();
            let context = state.context.clone();
            drop(states);

            ProcessOutcome::reply(Message::new(
                MessageBody::PlanRequest(PlanRequest {
                    request_id: report.request_id.clone(),
                    user_request,
                    context,
                    iteration,
                    previous_plan,
                    previous_issues: report.issues.clone(),
                }),
                now_ms(),
            ))
        }
    }
}

impl Default for CoordinatorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for CoordinatorAgent {
    fn name(&self) -> &str {
        "coordinator"
    }

    async fn init(&mut self, _base: &AgentBase) -> Result<(), KernelError> {
        let states = self.states.clone();
        self.sweeper = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(GC_INTERVAL).await;
                let mut guard = states.lock().await;
                let removed = sweep_once(&mut guard, now_ms(), GC_MAX_AGE_MS);
                if removed > 0 {
                    tracing::info!(removed, "coordinator gc sweep removed terminal requests");
                }
            }
        }));
        Ok(())
    }

    async fn process_message(&mut self, msg: Arc<Message>, base: &AgentBase) -> ProcessOutcome {
        match &msg.body {
            MessageBody::UserRequest(ur) => self.handle_user_request(ur).await,
            MessageBody::ExecutionPlan(plan) => self.handle_execution_plan(plan).await,
            MessageBody::ExecutionResults(results) => self.handle_execution_results(results).await,
            MessageBody::VerificationReport(report) => self.handle_verification_report(report, base).await,
            _ => ProcessOutcome::error(KernelError::UnknownMessageType),
        }
    }

    async fn cleanup(&mut self, _base: &AgentBase) -> Result<(), KernelError> {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
        Ok(())
    }
}
