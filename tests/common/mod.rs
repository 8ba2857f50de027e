//! Shared fixtures for integration tests
//!
//! Scripted model collaborators, a deterministic embedder and a seeded
//! on-disk index.

#![allow(dead_code)]

use async_trait::async_trait;
use incident_oracle::config::PipelineConfig;
use incident_oracle::llm::{Embedder, LlmError, LlmResult, TextGenerator};
use incident_oracle::models::IncidentDocument;
use incident_oracle::pipeline::Pipeline;
use incident_oracle::search::{
    DocumentStore, HybridQuery, IndexStats, QueryBuilder, SearchConfig, SearchError, SearchResult,
    TantivyStore,
};
use incident_oracle::models::RetrievedIncident;
use incident_oracle::seed::{ingest, sample_incidents};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const DIMENSIONS: usize = 64;

/// Number of incidents in the seeded index
pub const SEEDED_COUNT: usize = 10;

pub const CONNECTION_POOL_DESCRIPTION: &str = "Checkout is failing with HTTP 500s. Logs show \
    HikariCP - Connection is not available, request timed out after 30000ms. \
    The database connection pool looks exhausted during peak traffic.";

pub const DATABASE_ANALYSIS: &str = r#"{
    "severity": "P1",
    "incident_type": "database",
    "key_symptoms": ["HTTP 500 on checkout", "connection timeouts"],
    "technical_terms": ["HikariCP", "connection pool"],
    "affected_systems": ["checkout-service"],
    "urgency_score": 8,
    "summary": "Database connection pool exhausted under peak load"
}"#;

pub const DATABASE_PLAN: &str = r#"```json
{
    "primary_search_terms": ["HikariCP", "connection pool"],
    "secondary_search_terms": ["timeout"],
    "filters": {"incident_type": "database"},
    "source_priority": ["past_incidents"]
}
```"#;

/// Synthesis output citing one real and one unknown incident
pub const CITING_RECOMMENDATION: &str = r#"{
    "immediate_actions": ["Raise the HikariCP maximum pool size"],
    "root_cause_hypothesis": "Traffic spike exceeded pool capacity",
    "resolution_steps": ["Increase pool size to 50", "Enable leak detection"],
    "preventive_measures": ["Alert on pool utilization"],
    "estimated_resolution_time_minutes": 15,
    "confidence_score": 0.85,
    "confidence_reasoning": "Matches a previously resolved incident",
    "similar_incident_references": ["INC-10000", "INC-99999"],
    "risk_assessment": "low"
}"#;

/// One scripted reply
#[derive(Clone)]
pub enum Reply {
    Text(String),
    Fail,
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

/// Generator answering by stage, recognized from the prompt wording
pub struct ScriptedGenerator {
    pub extract: Reply,
    pub plan: Reply,
    pub synthesize: Reply,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(extract: Reply, plan: Reply, synthesize: Reply) -> Self {
        Self {
            extract,
            plan,
            synthesize,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Well-formed replies for the connection pool scenario
    pub fn connection_pool() -> Self {
        Self::new(
            Reply::text(DATABASE_ANALYSIS),
            Reply::text(DATABASE_PLAN),
            Reply::text(CITING_RECOMMENDATION),
        )
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> LlmResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let reply = if prompt.contains("search strategy") {
            &self.plan
        } else if prompt.contains("resolution guidance") {
            &self.synthesize
        } else {
            &self.extract
        };

        match reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::Fail => Err(LlmError::Status {
                status: 503,
                body: "model overloaded".to_string(),
            }),
        }
    }
}

/// Bag-of-words embedder: each lowercase token is hashed into a bucket and
/// the vector is L2-normalized, so texts sharing words point the same way.
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIMENSIONS];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() as usize) % DIMENSIONS] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>> {
        Ok(Self::vector(text))
    }
}

/// Embedder whose service is always down
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> LlmResult<Vec<f32>> {
        Err(LlmError::Transport("connection refused".to_string()))
    }
}

/// Store that is unreachable
pub struct FailingStore;

#[async_trait]
impl DocumentStore for FailingStore {
    async fn search(&self, _query: &HybridQuery) -> SearchResult<Vec<RetrievedIncident>> {
        Err(SearchError::RequestFailed("connection refused".to_string()))
    }

    async fn get(&self, _incident_id: &str) -> SearchResult<Option<IncidentDocument>> {
        Err(SearchError::RequestFailed("connection refused".to_string()))
    }

    async fn stats(&self) -> SearchResult<IndexStats> {
        Err(SearchError::RequestFailed("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Index in a temp dir holding the sample incidents, embedded with
/// [`HashEmbedder`]. Keep the `TempDir` alive for the store's lifetime.
pub async fn seeded_store() -> (TempDir, Arc<TantivyStore>) {
    let dir = TempDir::new().unwrap();
    let config = SearchConfig {
        index_path: dir.path().to_path_buf(),
        ..Default::default()
    };
    let store = TantivyStore::open(&config).await.unwrap();
    ingest(&store, &HashEmbedder, sample_incidents(SEEDED_COUNT))
        .await
        .unwrap();

    (dir, Arc::new(store))
}

/// Empty index in a temp dir
pub async fn empty_store() -> (TempDir, Arc<TantivyStore>) {
    let dir = TempDir::new().unwrap();
    let config = SearchConfig {
        index_path: dir.path().to_path_buf(),
        ..Default::default()
    };
    let store = TantivyStore::open(&config).await.unwrap();

    (dir, Arc::new(store))
}

pub fn pipeline(
    generator: Arc<dyn TextGenerator>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
) -> Pipeline {
    Pipeline::new(
        generator,
        embedder,
        store,
        QueryBuilder::default(),
        &PipelineConfig::default(),
    )
}
