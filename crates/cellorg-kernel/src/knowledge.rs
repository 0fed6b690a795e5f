//! Knowledge store port (§3 KnowledgeRecord, §4.8, §6.5). The persistent
//! KV/graph engine is explicitly out of scope; this is the port the
//! Knowledge agent talks to, plus the records it stores.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KnowledgeError {
    #[error("knowledge store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub request_id: String,
    pub content: String,
    pub context: String,
    pub completed: bool,
    pub successful_plan_id: Option<String>,
    pub final_iteration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRecord {
    pub plan_id: String,
    pub goal: String,
    pub step_count: usize,
    pub iteration: u32,
    pub successful: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarRequest {
    pub request_id: String,
    pub goal: String,
    pub step_count: usize,
    pub final_iteration: u32,
    pub score: f64,
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn put_request(&self, record: RequestRecord) -> Result<(), KnowledgeError>;
    async fn mark_request_completed(&self, request_id: &str, plan_id: &str, final_iteration: u32) -> Result<(), KnowledgeError>;
    async fn put_plan(&self, record: PlanRecord) -> Result<(), KnowledgeError>;
    async fn append_request_plan(&self, request_id: &str, plan_id: &str) -> Result<(), KnowledgeError>;
    async fn mark_plan_successful(&self, plan_id: &str) -> Result<(), KnowledgeError>;

    /// Bounded top-K lexical similarity search over indexed request/plan
    /// goal text (§4.8).
    async fn query_similar(&self, query: &str, k: usize) -> Result<Vec<SimilarRequest>, KnowledgeError>;
}
