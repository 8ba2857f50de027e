use crate::llm::Embedder;
use crate::metrics::RETRIEVAL_RESULTS;
use crate::models::{ClassificationRecord, RetrievedIncident, SearchPlan};
use crate::pipeline::error::PipelineError;
use crate::pipeline::outcome::StageOutcome;
use crate::search::{DocumentStore, QueryBuilder};
use std::sync::Arc;
use tracing::{error, info};

/// Runs one hybrid query per request against the document store
pub struct RetrievalEngine {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    query_builder: QueryBuilder,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
        query_builder: QueryBuilder,
    ) -> Self {
        Self {
            store,
            embedder,
            query_builder,
        }
    }

    /// Retrieve similar incidents, most relevant first.
    ///
    /// A store failure yields an empty result set; a failed embedding call is
    /// fatal.
    pub async fn retrieve(
        &self,
        plan: &SearchPlan,
        description: &str,
        record: &ClassificationRecord,
    ) -> Result<StageOutcome<Vec<RetrievedIncident>>, PipelineError> {
        let query_vector = self
            .embedder
            .embed(description)
            .await
            .map_err(PipelineError::Embedding)?;

        let query = self.query_builder.build(plan, record, query_vector);

        match self.store.search(&query).await {
            Ok(results) => {
                RETRIEVAL_RESULTS.observe(results.len() as f64);
                info!(
                    store = self.store.name(),
                    results = results.len(),
                    "Hybrid search complete"
                );
                Ok(StageOutcome::Completed(results))
            }
            Err(e) => {
                error!(store = self.store.name(), error = %e, "Document store search failed");
                Ok(StageOutcome::fallback(Vec::new(), e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, LlmResult};
    use crate::models::IncidentDocument;
    use crate::search::{HybridQuery, IndexStats, SearchError, SearchResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedEmbedder(Option<Vec<f32>>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> LlmResult<Vec<f32>> {
            self.0.clone().ok_or(LlmError::EmptyResponse)
        }
    }

    /// Records the last query and optionally fails
    #[derive(Default)]
    struct RecordingStore {
        fail: bool,
        last_query: Mutex<Option<HybridQuery>>,
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn search(&self, query: &HybridQuery) -> SearchResult<Vec<RetrievedIncident>> {
            if let Ok(mut last) = self.last_query.lock() {
                *last = Some(query.clone());
            }
            if self.fail {
                Err(SearchError::RequestFailed("connection refused".to_string()))
            } else {
                Ok(Vec::new())
            }
        }

        async fn get(&self, _incident_id: &str) -> SearchResult<Option<IncidentDocument>> {
            Ok(None)
        }

        async fn stats(&self) -> SearchResult<IndexStats> {
            Ok(IndexStats {
                backend: "recording".to_string(),
                total_documents: 0,
                index_size_bytes: None,
                num_segments: None,
            })
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn engine(store: Arc<RecordingStore>, vector: Option<Vec<f32>>) -> RetrievalEngine {
        RetrievalEngine::new(
            store,
            Arc::new(FixedEmbedder(vector)),
            QueryBuilder::new(1.0, 2.0, 10),
        )
    }

    #[tokio::test]
    async fn test_store_failure_returns_empty_fallback() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let record = ClassificationRecord::fallback();
        let plan = SearchPlan::fallback_for(&record);

        let outcome = engine(store, Some(vec![1.0, 0.0]))
            .retrieve(&plan, "disk full", &record)
            .await
            .unwrap();

        assert!(outcome.is_fallback());
        assert!(outcome.artifact().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_fatal() {
        let store = Arc::new(RecordingStore::default());
        let record = ClassificationRecord::fallback();
        let plan = SearchPlan::fallback_for(&record);

        let result = engine(store, None).retrieve(&plan, "disk full", &record).await;
        assert!(matches!(result, Err(PipelineError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_query_carries_plan_and_vector() {
        let store = Arc::new(RecordingStore::default());
        let mut record = ClassificationRecord::fallback();
        record.technical_terms = vec!["DiskPressure".to_string()];
        let mut plan = SearchPlan::fallback_for(&record);
        plan.primary_search_terms = vec!["kubelet".to_string()];

        engine(store.clone(), Some(vec![0.5, 0.5]))
            .retrieve(&plan, "node evicting pods", &record)
            .await
            .unwrap();

        let query = store.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(query.text, "kubelet DiskPressure");
        assert_eq!(query.vector, Some(vec![0.5, 0.5]));
        assert!(query.filters.contains_key("incident_type"));
    }
}
