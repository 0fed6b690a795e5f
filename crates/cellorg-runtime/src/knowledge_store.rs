//! In-memory `KnowledgeStore`: the persistent KV/graph engine is explicitly
//! out of scope (§1), so this is the concrete port implementation — a
//! `HashMap`-backed store with a lexical-similarity search index, the same
//! shape as the `request:`/`plan:`/`request_plans:` prefixes in §6.5.

use async_trait::async_trait;
use cellorg_kernel::knowledge::{KnowledgeError, KnowledgeStore, PlanRecord, RequestRecord, SimilarRequest};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

struct Indexed<T> {
    record: T,
    tokens: HashSet<String>,
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

#[derive(Default)]
struct Inner {
    requests: HashMap<String, Indexed<RequestRecord>>,
    plans: HashMap<String, Indexed<PlanRecord>>,
    request_plans: HashMap<String, Vec<String>>,
}

pub struct InMemoryKnowledgeStore {
    inner: RwLock<Inner>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()) }
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn put_request(&self, record: RequestRecord) -> Result<(), KnowledgeError> {
        let tokens = tokenize(&record.content);
        let mut inner = self.inner.write().await;
        inner.requests.insert(record.request_id.clone(), Indexed { record, tokens });
        Ok(())
    }

    async fn mark_request_completed(&self, request_id: &str, plan_id: &str, final_iteration: u32) -> Result<(), KnowledgeError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .requests
            .get_mut(request_id)
            .ok_or_else(|| KnowledgeError::Backend(format!("unknown request {request_id}")))?;
        entry.record.completed = true;
        entry.record.successful_plan_id = Some(plan_id.to_string());
        entry.record.final_iteration = final_iteration;
        Ok(())
    }

    async fn put_plan(&self, record: PlanRecord) -> Result<(), KnowledgeError> {
        let tokens = tokenize(&record.goal);
        let mut inner = self.inner.write().await;
        inner.plans.insert(record.plan_id.clone(), Indexed { record, tokens });
        Ok(())
    }

    async fn append_request_plan(&self, request_id: &str, plan_id: &str) -> Result<(), KnowledgeError> {
        let mut inner = self.inner.write().await;
        inner.request_plans.entry(request_id.to_string()).or_default().push(plan_id.to_string());
        Ok(())
    }

    async fn mark_plan_successful(&self, plan_id: &str) -> Result<(), KnowledgeError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| KnowledgeError::Backend(format!("unknown plan {plan_id}")))?;
        entry.record.successful = true;
        Ok(())
    }

    async fn query_similar(&self, query: &str, k: usize) -> Result<Vec<SimilarRequest>, KnowledgeError> {
        let query_tokens = tokenize(query);
        let inner = self.inner.read().await;

        let mut scored: Vec<SimilarRequest> = inner
            .requests
            .values()
            .filter(|r| r.record.completed)
            .filter_map(|r| {
                let plan_id = r.record.successful_plan_id.as_ref()?;
                let plan = inner.plans.get(plan_id)?;
                Some(SimilarRequest {
                    request_id: r.record.request_id.clone(),
                    goal: plan.record.goal.clone(),
                    step_count: plan.record.step_count,
                    final_iteration: r.record.final_iteration,
                    score: jaccard(&query_tokens, &r.tokens),
                })
            })
            .filter(|s| s.score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_similar_ranks_by_token_overlap() {
        let store = InMemoryKnowledgeStore::new();
        store
            .put_request(RequestRecord {
                request_id: "r1".into(),
                content: "add a hello world file".into(),
                context: "project".into(),
                completed: false,
                successful_plan_id: None,
                final_iteration: 0,
            })
            .await
            .unwrap();
        store
            .put_plan(PlanRecord {
                plan_id: "p1".into(),
                goal: "add a hello world file".into(),
                step_count: 1,
                iteration: 1,
                successful: false,
            })
            .await
            .unwrap();
        store.mark_request_completed("r1", "p1", 2).await.unwrap();
        store.mark_plan_successful("p1").await.unwrap();

        let results = store.query_similar("hello world", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].request_id, "r1");
        assert_eq!(results[0].final_iteration, 2);
    }

    #[tokio::test]
    async fn query_similar_excludes_incomplete_requests() {
        let store = InMemoryKnowledgeStore::new();
        store
            .put_request(RequestRecord {
                request_id: "r1".into(),
                content: "fix the bug".into(),
                context: "project".into(),
                completed: false,
                successful_plan_id: None,
                final_iteration: 0,
            })
            .await
            .unwrap();
        let results = store.query_similar("fix the bug", 5).await.unwrap();
        assert!(results.is_empty());
    }
}
