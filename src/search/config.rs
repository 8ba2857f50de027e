//! Search configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which document store backs retrieval
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Embedded Tantivy index on local disk
    #[default]
    Tantivy,
    /// Remote Elasticsearch cluster
    Elasticsearch,
}

/// Search service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Document store backend
    pub backend: StoreBackend,

    /// Path to the search index directory (tantivy)
    pub index_path: PathBuf,

    /// Index writer heap size in bytes (default: 50MB)
    pub writer_heap_size: usize,

    /// Elasticsearch base URL
    pub elasticsearch_url: Option<String>,

    /// Elasticsearch index name
    pub index_name: String,

    /// Name of the environment variable holding the Elasticsearch API key
    pub api_key_env: Option<String>,

    /// Per-request timeout against a remote store (seconds)
    pub request_timeout_secs: u64,

    /// Maximum documents returned per hybrid query
    pub max_results: usize,

    /// Boost multiplier for the lexical clause
    pub keyword_boost: f32,

    /// Boost multiplier for the vector clause
    pub vector_boost: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Tantivy,
            index_path: PathBuf::from("./data/incident_index"),
            writer_heap_size: 50_000_000, // 50MB
            elasticsearch_url: None,
            index_name: "devops-incidents".to_string(),
            api_key_env: None,
            request_timeout_secs: 30,
            max_results: 10,
            keyword_boost: 1.0,
            vector_boost: 2.0,
        }
    }
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn backend(mut self, backend: StoreBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn index_path(mut self, path: PathBuf) -> Self {
        self.config.index_path = path;
        self
    }

    pub fn writer_heap_size(mut self, size: usize) -> Self {
        self.config.writer_heap_size = size;
        self
    }

    pub fn elasticsearch(mut self, url: impl Into<String>, index_name: impl Into<String>) -> Self {
        self.config.backend = StoreBackend::Elasticsearch;
        self.config.elasticsearch_url = Some(url.into());
        self.config.index_name = index_name.into();
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.config.max_results = max;
        self
    }

    pub fn keyword_boost(mut self, boost: f32) -> Self {
        self.config.keyword_boost = boost;
        self
    }

    pub fn vector_boost(mut self, boost: f32) -> Self {
        self.config.vector_boost = boost;
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
