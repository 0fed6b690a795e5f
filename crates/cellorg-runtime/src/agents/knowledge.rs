//! Knowledge agent (§4.8): passively records requests and plans as they
//! cross `pev-bus`, marking completion and success once a verification
//! report reports the goal achieved. Never replies — a pure side-effect
//! subscriber, unlike the other four agents.

use async_trait::async_trait;
use cellorg_kernel::agent::{Agent, AgentBase, ProcessOutcome};
use cellorg_kernel::knowledge::{KnowledgeStore, PlanRecord, RequestRecord};
use cellorg_kernel::message::{Message, MessageBody};
use cellorg_kernel::KernelError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

struct Tracking {
    plan_count: u32,
    last_plan_id: String,
}

pub struct KnowledgeAgent {
    store: Arc<dyn KnowledgeStore>,
    tracking: Mutex<HashMap<String, Tracking>>,
}

impl KnowledgeAgent {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store, tracking: Mutex::new(HashMap::new()) }
    }

    async fn on_user_request(&self, ur: &cellorg_kernel::message::UserRequest) {
        let record = RequestRecord {
            request_id: ur.id.clone(),
            content: ur.content.clone(),
            context: format!("{:?}", ur.context),
            completed: false,
            successful_plan_id: None,
            final_iteration: 0,
        };
        if let Err(e) = self.store.put_request(record).await {
            warn!(error = %e, request_id = %ur.id, "knowledge agent failed to record request");
        }
    }

    async fn on_execution_plan(&self, plan: &cellorg_kernel::plan::Plan) {
        let iteration = {
            let mut tracking = self.tracking.lock().await;
            let entry = tracking.entry(plan.request_id.clone()).or_insert(Tracking {
                plan_count: 0,
                last_plan_id: String::new(),
            });
            entry.plan_count += 1;
            entry.last_plan_id = plan.id.clone();
            entry.plan_count
        };

        let record = PlanRecord {
            plan_id: plan.id.clone(),
            goal: plan.goal.clone(),
            step_count: plan.steps.len(),
            iteration,
            successful: false,
        };
        if let Err(e) = self.store.put_plan(record).await {
            warn!(error = %e, plan_id = %plan.id, "knowledge agent failed to record plan");
        }
        if let Err(e) = self.store.append_request_plan(&plan.request_id, &plan.id).await {
            warn!(error = %e, request_id = %plan.request_id, "knowledge agent failed to link plan to request");
        }
    }

    async fn on_verification_report(&self, report: &cellorg_kernel::plan::VerificationReport) {
        if !report.goal_achieved {
            return;
        }
        let tracked = {
            let tracking = self.tracking.lock().await;
            tracking.get(&report.request_id).map(|t| (t.last_plan_id.clone(), t.plan_count))
        };
        let Some((plan_id, final_iteration)) = tracked else {
            warn!(request_id = %report.request_id, "knowledge agent saw success with no tracked plan");
            return;
        };
        if let Err(e) = self.store.mark_request_completed(&report.request_id, &plan_id, final_iteration).await {
            warn!(error = %e, request_id = %report.request_id, "knowledge agent failed to mark request completed");
        }
        if let Err(e) = self.store.mark_plan_successful(&plan_id).await {
            warn!(error = %e, plan_id, "knowledge agent failed to mark plan successful");
        }
    }
}

#[async_trait]
impl Agent for KnowledgeAgent {
    fn name(&self) -> &str {
        "knowledge"
    }

    async fn init(&mut self, _base: &AgentBase) -> Result<(), KernelError> {
        Ok(())
    }

    async fn process_message(&mut self, msg: Arc<Message>, _base: &AgentBase) -> ProcessOutcome {
        match &msg.body {
            MessageBody::UserRequest(ur) => self.on_user_request(ur).await,
            MessageBody::ExecutionPlan(plan) => self.on_execution_plan(plan).await,
            MessageBody::VerificationReport(report) => self.on_verification_report(report).await,
            _ => {}
        }
        ProcessOutcome::empty()
    }

    async fn cleanup(&mut self, _base: &AgentBase) -> Result<(), KernelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_store::InMemoryKnowledgeStore;
    use crate::test_support::test_base;
    use cellorg_kernel::message::{RequestContext, UserRequest};
    use cellorg_kernel::plan::{Action, Plan, Step, StepPhase, TargetContext};

    fn ctx() -> RequestContext {
        RequestContext {
            target_vfs: "project".into(),
            target_root: "/tmp".into(),
            self_modify: false,
            workbench_root: "/tmp".into(),
            framework_root: "/tmp".into(),
        }
    }

    fn plan(request_id: &str, plan_id: &str) -> Plan {
        Plan {
            id: plan_id.into(),
            request_id: request_id.into(),
            goal: "add a hello file".into(),
            target_context: TargetContext::Project,
            steps: vec![Step {
                id: "s1".into(),
                phase: StepPhase::Implementation,
                action: Action::WriteFile { path: "hello.txt".into(), content: "hi".into() },
                depends_on: vec![],
                success_criteria: "ok".into(),
            }],
        }
    }

    #[tokio::test]
    async fn records_request_then_plan_then_marks_success() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let mut agent = KnowledgeAgent::new(store.clone());
        let base = test_base();

        agent
            .process_message(
                Arc::new(Message::new(
                    MessageBody::UserRequest(UserRequest {
                        id: "r1".into(),
                        content: "add a hello file".into(),
                        context: ctx(),
                    }),
                    0,
                )),
                &base,
            )
            .await;
        agent
            .process_message(Arc::new(Message::new(MessageBody::ExecutionPlan(plan("r1", "p1")), 0)), &base)
            .await;
        agent
            .process_message(
                Arc::new(Message::new(
                    MessageBody::VerificationReport(cellorg_kernel::plan::VerificationReport {
                        request_id: "r1".into(),
                        goal_achieved: true,
                        issues: vec![],
                        next_actions: vec![],
                    }),
                    0,
                )),
                &base,
            )
            .await;

        let similar = store.query_similar("add a hello file", 5).await.unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].request_id, "r1");
        assert_eq!(similar[0].final_iteration, 1);
    }

    #[tokio::test]
    async fn unsuccessful_verification_does_not_mark_completion() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let mut agent = KnowledgeAgent::new(store.clone());
        let base = test_base();

        agent
            .process_message(
                Arc::new(Message::new(
                    MessageBody::UserRequest(UserRequest {
                        id: "r1".into(),
                        content: "fix the bug".into(),
                        context: ctx(),
                    }),
                    0,
                )),
                &base,
            )
            .await;
        agent
            .process_message(Arc::new(Message::new(MessageBody::ExecutionPlan(plan("r1", "p1")), 0)), &base)
            .await;
        agent
            .process_message(
                Arc::new(Message::new(
                    MessageBody::VerificationReport(cellorg_kernel::plan::VerificationReport {
                        request_id: "r1".into(),
                        goal_achieved: false,
                        issues: vec![],
                        next_actions: vec![],
                    }),
                    0,
                )),
                &base,
            )
            .await;

        let similar = store.query_similar("fix the bug", 5).await.unwrap();
        assert!(similar.is_empty());
    }
}
