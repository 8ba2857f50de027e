//! Hybrid retrieval over historical incidents
//!
//! Retrieval combines two signals per query:
//!
//! - **Lexical**: weighted, typo-tolerant matching over title, description,
//!   error messages, technical terms, resolution steps and root cause
//! - **Semantic**: cosine similarity between the query embedding and the
//!   stored description embedding
//!
//! Filters are hard constraints; highlights wrap matched terms in `<mark>`.
//!
//! ```text
//!   SearchPlan + ClassificationRecord + embedding
//!                      │
//!                      ▼
//!               QueryBuilder ──► HybridQuery
//!                      │
//!          ┌───────────┴────────────┐
//!          ▼                        ▼
//!    TantivyStore           ElasticsearchStore
//!    (embedded index)       (remote, HTTP)
//! ```
//!
//! Both stores implement [`DocumentStore`], so the pipeline never knows which
//! backend it is talking to.

pub mod config;
pub mod document;
pub mod elasticsearch;
pub mod error;
pub mod index;
pub mod query;
pub mod store;

pub use config::{SearchConfig, SearchConfigBuilder, StoreBackend};
pub use elasticsearch::ElasticsearchStore;
pub use error::{SearchError, SearchResult};
pub use index::IndexManager;
pub use query::{HybridQuery, QueryBuilder, FILTERABLE_FIELDS, LEXICAL_FIELDS};
pub use store::{cosine_similarity, DocumentStore, IndexStats, TantivyStore};

use std::sync::Arc;
use tracing::info;

/// Open the configured document store
pub async fn open_store(config: &SearchConfig) -> SearchResult<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.backend {
        StoreBackend::Tantivy => Arc::new(TantivyStore::open(config).await?),
        StoreBackend::Elasticsearch => Arc::new(ElasticsearchStore::new(config)?),
    };

    info!(backend = store.name(), "Document store ready");
    Ok(store)
}
