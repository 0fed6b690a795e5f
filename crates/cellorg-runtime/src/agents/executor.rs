//! Executor agent (§4.5): runs a plan's steps against the Tool Dispatcher
//! in order, never short-circuiting on a single step failure so the
//! Verifier sees the whole picture. Idempotent on `plan_id` (§4.5 step 1,
//! §8 scenario 5).

use crate::util::now_ms;
use async_trait::async_trait;
use cellorg_kernel::agent::{Agent, AgentBase, ProcessOutcome};
use cellorg_kernel::message::{ExecuteTask, Message, MessageBody};
use cellorg_kernel::plan::{ExecutionResults, StepResult};
use cellorg_kernel::KernelError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

pub struct ExecutorAgent {
    executed_plan_ids: Mutex<HashSet<String>>,
}

impl ExecutorAgent {
    pub fn new() -> Self {
        Self { executed_plan_ids: Mutex::new(HashSet::new()) }
    }

    async fn run_step(
        step: &cellorg_kernel::plan::Step,
        completed: &HashSet<String>,
        base: &AgentBase,
        simulate: bool,
    ) -> StepResult {
        let start = Instant::now();

        if !step.depends_on.iter().all(|d| completed.contains(d)) {
            return StepResult {
                step_id: step.id.clone(),
                action: step.action.clone(),
                success: false,
                output: String::new(),
                error: Some("dependencies not met".to_string()),
                duration_ms: start.elapsed().as_millis() as u64,
            };
        }

        if simulate || base.vfs.is_none() {
            return StepResult {
                step_id: step.id.clone(),
                action: step.action.clone(),
                success: true,
                output: format!("simulated {}", step.action.name()),
                error: None,
                duration_ms: start.elapsed().as_millis() as u64,
            };
        }

        let vfs = base.vfs.as_ref().unwrap();
        match vfs.dispatch(&step.action).await {
            Ok(output) => StepResult {
                step_id: step.id.clone(),
                action: step.action.clone(),
                success: true,
                output: output.as_text(),
                error: None,
                duration_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => {
                let output = match &e {
                    cellorg_kernel::vfs::ToolError::NonZeroExit { output, .. } => output.clone(),
                    _ => String::new(),
                };
                StepResult {
                    step_id: step.id.clone(),
                    action: step.action.clone(),
                    success: false,
                    output,
                    error: Some(e.tag().to_string()),
                    duration_ms: start.elapsed().as_millis() as u64,
                }
            }
        }
    }

    async fn execute(&self, task: &ExecuteTask, base: &AgentBase) -> ExecutionResults {
        let simulate = !base.config.get_bool("tools_enabled", true);
        let start = Instant::now();

        let mut completed: HashSet<String> = HashSet::new();
        let mut results = Vec::with_capacity(task.plan.steps.len());
        for step in &task.plan.steps {
            let result = Self::run_step(step, &completed, base, simulate).await;
            if result.success {
                completed.insert(step.id.clone());
            }
            results.push(result);
        }

        ExecutionResults::new(task.request_id.clone(), task.plan_id.clone(), results, start.elapsed().as_millis() as u64)
    }
}

impl Default for ExecutorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ExecutorAgent {
    fn name(&self) -> &str {
        "executor"
    }

    async fn init(&mut self, _base: &AgentBase) -> Result<(), KernelError> {
        Ok(())
    }

    async fn process_message(&mut self, msg: Arc<Message>, base: &AgentBase) -> ProcessOutcome {
        let task = match &msg.body {
            MessageBody::ExecuteTask(task) => task,
            _ => return ProcessOutcome::error(KernelError::UnknownMessageType),
        };

        {
            let mut executed = self.executed_plan_ids.lock().await;
            if !executed.insert(task.plan_id.clone()) {
                return ProcessOutcome::empty();
            }
        }

        let results = self.execute(task, base).await;
        ProcessOutcome::reply(Message::new(MessageBody::ExecutionResults(results), now_ms()))
    }

    async fn cleanup(&mut self, _base: &AgentBase) -> Result<(), KernelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_base;
    use cellorg_kernel::plan::{Action, Plan, Step, StepPhase, TargetContext};

    fn plan_with_dependency() -> Plan {
        Plan {
            id: "p1".into(),
            request_id: "r1".into(),
            goal: "goal".into(),
            target_context: TargetContext::Project,
            steps: vec![
                Step {
                    id: "a".into(),
                    phase: StepPhase::Discovery,
                    action: Action::Search { query: String::new(), pattern: "*".into() },
                    depends_on: vec![],
                    success_criteria: "ok".into(),
                },
                Step {
                    id: "b".into(),
                    phase: StepPhase::Implementation,
                    action: Action::WriteFile { path: "x.txt".into(), content: "y".into() },
                    depends_on: vec!["missing".into()],
                    success_criteria: "ok".into(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn unmet_dependency_fails_that_step_but_continues() {
        let mut agent = ExecutorAgent::new();
        let base = test_base();
        let task = ExecuteTask { request_id: "r1".into(), plan_id: "p1".into(), plan: plan_with_dependency() };
        let msg = Arc::new(Message::new(MessageBody::ExecuteTask(task), 0));
        let outcome = agent.process_message(msg, &base).await;
        match outcome.reply.unwrap().body {
            MessageBody::ExecutionResults(results) => {
                assert_eq!(results.step_results.len(), 2);
                assert!(results.step_results[0].success);
                assert!(!results.step_results[1].success);
                assert_eq!(results.step_results[1].error.as_deref(), Some("dependencies not met"));
                assert!(!results.all_success);
            }
            _ => panic!("expected execution results"),
        }
    }

    #[tokio::test]
    async fn duplicate_plan_id_is_executed_only_once() {
        let mut agent = ExecutorAgent::new();
        let base = test_base();
        let plan = plan_with_dependency();
        let task1 = ExecuteTask { request_id: "r1".into(), plan_id: "p1".into(), plan: plan.clone() };
        let task2 = ExecuteTask { request_id: "r1".into(), plan_id: "p1".into(), plan };

        let first = agent
            .process_message(Arc::new(Message::new(MessageBody::ExecuteTask(task1), 0)), &base)
            .await;
        assert!(first.reply.is_some());

        let second = agent
            .process_message(Arc::new(Message::new(MessageBody::ExecuteTask(task2), 0)), &base)
            .await;
        assert!(second.reply.is_none());
    }
}
