//! The PEV data model: `Plan`, `Step`, `StepResult`, `ExecutionResults`,
//! `VerificationReport`, and the actions the Tool Dispatcher understands.
//!
//! Grounded on `mofa_kernel::workflow::planning` (`Plan`/`PlanStep`/
//! `validate`/`topological_order`), adapted to this system's step shape
//! (`action` instead of free-text `tools_needed`, explicit phases).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan has no steps")]
    Empty,
    #[error("duplicate step id: {0}")]
    DuplicateStepId(String),
    #[error("step {step} depends on unknown step {dep}")]
    DanglingDependency { step: String, dep: String },
    #[error("dependency cycle detected among steps: {0:?}")]
    Cycle(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetContext {
    Framework,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    Discovery,
    Analysis,
    Implementation,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOpType {
    Insert,
    Replace,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOp {
    #[serde(rename = "type")]
    pub op: PatchOpType,
    /// 1-indexed line number.
    pub line: usize,
    pub content: Option<String>,
}

/// An executor action. A closed tagged variant, not an inheritance
/// hierarchy — `dispatch(action)` is a single exhaustive match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Search { query: String, pattern: String },
    ReadFile { path: String },
    WriteFile { path: String, content: String },
    Patch { file: String, operations: Vec<PatchOp> },
    RunCommand { command: String },
    RunTests { pattern: String },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Search { .. } => "search",
            Action::ReadFile { .. } => "read_file",
            Action::WriteFile { .. } => "write_file",
            Action::Patch { .. } => "patch",
            Action::RunCommand { .. } => "run_command",
            Action::RunTests { .. } => "run_tests",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub phase: StepPhase,
    #[serde(flatten)]
    pub action: Action,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub success_criteria: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub request_id: String,
    pub goal: String,
    pub target_context: TargetContext,
    pub steps: Vec<Step>,
}

impl Plan {
    /// Duplicate ids, then dangling deps, then cycles — in that order, so
    /// the first structural error reported is the most fundamental one.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(PlanError::DuplicateStepId(step.id.clone()));
            }
        }

        for step in &self.steps {
            for dep in &step.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(PlanError::DanglingDependency {
                        step: step.id.clone(),
                        dep: dep.clone(),
                    });
                }
            }
        }

        self.topological_order().map(|_| ())
    }

    /// Kahn's algorithm with a sorted ready-queue, for deterministic output
    /// across runs (same technique as `workflow::planning::topological_order`).
    pub fn topological_order(&self) -> Result<Vec<String>, PlanError> {
        let mut indegree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for step in &self.steps {
            indegree.entry(step.id.as_str()).or_insert(0);
            for dep in &step.depends_on {
                *indegree.entry(step.id.as_str()).or_insert(0) += 1;
                dependents.entry(dep.as_str()).or_default().push(step.id.as_str());
            }
        }

        let mut queue: Vec<&str> = indegree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(id, _)| *id)
            .collect();
        queue.sort_unstable();

        let mut order = Vec::with_capacity(self.steps.len());
        while let Some(id) = queue.first().copied() {
            queue.remove(0);
            order.push(id.to_string());
            if let Some(deps) = dependents.get(id) {
                for &next in deps {
                    let entry = indegree.get_mut(next).unwrap();
                    *entry -= 1;
                    if *entry == 0 {
                        let pos = queue.binary_search(&next).unwrap_or_else(|p| p);
                        queue.insert(pos, next);
                    }
                }
            }
        }

        if order.len() != self.steps.len() {
            let remaining: Vec<String> = self
                .steps
                .iter()
                .map(|s| s.id.clone())
                .filter(|id| !order.contains(id))
                .collect();
            return Err(PlanError::Cycle(remaining));
        }

        Ok(order)
    }

    pub fn get_step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub action: Action,
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResults {
    pub request_id: String,
    pub plan_id: String,
    pub step_results: Vec<StepResult>,
    pub all_success: bool,
    pub execution_time_ms: u64,
}

impl ExecutionResults {
    pub fn new(request_id: impl Into<String>, plan_id: impl Into<String>, step_results: Vec<StepResult>, execution_time_ms: u64) -> Self {
        let all_success = step_results.iter().all(|r| r.success);
        Self {
            request_id: request_id.into(),
            plan_id: plan_id.into(),
            step_results,
            all_success,
            execution_time_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub step_id: String,
    pub issue: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextActionType {
    Fix,
    Adjust,
    Retry,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextAction {
    #[serde(rename = "type")]
    pub action_type: NextActionType,
    pub description: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub request_id: String,
    pub goal_achieved: bool,
    pub issues: Vec<Issue>,
    pub next_actions: Vec<NextAction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, depends_on: &[&str]) -> Step {
        Step {
            id: id.to_string(),
            phase: StepPhase::Implementation,
            action: Action::ReadFile { path: "x".into() },
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            success_criteria: "ok".into(),
        }
    }

    fn plan(steps: Vec<Step>) -> Plan {
        Plan {
            id: "p1".into(),
            request_id: "r1".into(),
            goal: "goal".into(),
            target_context: TargetContext::Project,
            steps,
        }
    }

    #[test]
    fn validate_rejects_empty_plan() {
        assert_eq!(plan(vec![]).validate(), Err(PlanError::Empty));
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let p = plan(vec![step("a", &[]), step("a", &[])]);
        assert_eq!(p.validate(), Err(PlanError::DuplicateStepId("a".into())));
    }

    #[test]
    fn validate_rejects_dangling_dependency() {
        let p = plan(vec![step("a", &["missing"])]);
        assert!(matches!(p.validate(), Err(PlanError::DanglingDependency { .. })));
    }

    #[test]
    fn validate_rejects_cycle() {
        let p = plan(vec![step("a", &["b"]), step("b", &["a"])]);
        assert!(matches!(p.validate(), Err(PlanError::Cycle(_))));
    }

    #[test]
    fn topological_order_is_deterministic_for_diamond() {
        let p = plan(vec![
            step("d", &["b", "c"]),
            step("c", &["a"]),
            step("b", &["a"]),
            step("a", &[]),
        ]);
        assert_eq!(p.topological_order().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn execution_results_all_success_is_conjunction() {
        let results = vec![
            StepResult { step_id: "a".into(), action: Action::ReadFile { path: "x".into() }, success: true, output: String::new(), error: None, duration_ms: 1 },
            StepResult { step_id: "b".into(), action: Action::ReadFile { path: "y".into() }, success: false, output: String::new(), error: Some("boom".into()), duration_ms: 1 },
        ];
        let er = ExecutionResults::new("r1", "p1", results, 2);
        assert!(!er.all_success);
    }
}
