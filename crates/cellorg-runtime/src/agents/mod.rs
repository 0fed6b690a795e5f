//! The five concrete agents (§4.4-§4.8) wired into a cell by `crate::cell`.

pub mod coordinator;
pub mod executor;
pub mod knowledge;
pub mod planner;
pub mod verifier;

pub use coordinator::CoordinatorAgent;
pub use executor::ExecutorAgent;
pub use knowledge::KnowledgeAgent;
pub use planner::PlannerAgent;
pub use verifier::VerifierAgent;
