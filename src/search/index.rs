//! Search index management

use crate::models::IncidentDocument;
use crate::search::config::SearchConfig;
use crate::search::document::{build_incident_schema, IncidentFields};
use crate::search::error::{SearchError, SearchResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tantivy::schema::Schema;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Term};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Manages the Tantivy index holding historical incidents
pub struct IndexManager {
    index: Index,

    schema: Schema,

    fields: IncidentFields,

    /// Index writer (wrapped in RwLock for thread-safety)
    writer: Arc<RwLock<IndexWriter>>,

    /// Reloaded explicitly after every commit
    reader: IndexReader,

    index_path: PathBuf,
}

impl IndexManager {
    /// Open the index at `config.index_path`, creating it if needed
    pub async fn new(config: &SearchConfig) -> SearchResult<Self> {
        std::fs::create_dir_all(&config.index_path).map_err(|e| {
            SearchError::IndexInitFailed(format!("Failed to create index directory: {}", e))
        })?;

        let schema = build_incident_schema();

        let index = if Self::index_exists(&config.index_path) {
            Index::open_in_dir(&config.index_path).map_err(|e| {
                SearchError::IndexInitFailed(format!("Failed to open existing index: {}", e))
            })?
        } else {
            Index::create_in_dir(&config.index_path, schema.clone()).map_err(|e| {
                SearchError::IndexInitFailed(format!("Failed to create new index: {}", e))
            })?
        };

        // An index created by an older schema is rejected rather than misread
        let schema = index.schema();
        let fields = IncidentFields::from_schema(&schema)?;

        let writer = index
            .writer(config.writer_heap_size)
            .map_err(|e| SearchError::IndexInitFailed(format!("Failed to create writer: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SearchError::IndexInitFailed(format!("Failed to create reader: {}", e)))?;

        info!(path = %config.index_path.display(), "Opened incident index");

        Ok(Self {
            index,
            schema,
            fields,
            writer: Arc::new(RwLock::new(writer)),
            reader,
            index_path: config.index_path.clone(),
        })
    }

    fn index_exists(path: &Path) -> bool {
        path.join("meta.json").exists()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    pub fn fields(&self) -> &IncidentFields {
        &self.fields
    }

    /// Index a batch of incidents, replacing any with the same id
    pub async fn index_documents(&self, documents: &[IncidentDocument]) -> SearchResult<usize> {
        let mut writer = self.writer.write().await;
        let mut indexed = 0;

        for document in documents {
            let tantivy_doc = self.fields.to_tantivy_doc(document)?;

            writer.delete_term(Term::from_field_text(
                self.fields.incident_id,
                &document.incident_id,
            ));

            writer.add_document(tantivy_doc).map_err(|e| {
                SearchError::IndexingFailed(format!(
                    "Failed to add document {}: {}",
                    document.incident_id, e
                ))
            })?;

            indexed += 1;
        }

        writer
            .commit()
            .map_err(|e| SearchError::IndexingFailed(format!("Failed to commit batch: {}", e)))?;
        self.reload()?;

        debug!(indexed, "Indexed incident batch");
        Ok(indexed)
    }

    /// Delete a document by incident id
    pub async fn delete_document(&self, incident_id: &str) -> SearchResult<()> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.incident_id, incident_id));
        writer.commit().map_err(|e| {
            SearchError::DeletionFailed(format!("Failed to commit deletion: {}", e))
        })?;
        self.reload()
    }

    /// Clear the entire index
    pub async fn clear_index(&self) -> SearchResult<()> {
        let mut writer = self.writer.write().await;
        writer.delete_all_documents().map_err(|e| {
            SearchError::IndexingFailed(format!("Failed to clear index: {}", e))
        })?;
        writer
            .commit()
            .map_err(|e| SearchError::IndexingFailed(format!("Failed to commit clear: {}", e)))?;
        self.reload()
    }

    fn reload(&self) -> SearchResult<()> {
        self.reader
            .reload()
            .map_err(|e| SearchError::IndexingFailed(format!("Failed to reload reader: {}", e)))
    }

    /// Approximate on-disk size of the index
    pub fn size_bytes(&self) -> u64 {
        std::fs::read_dir(&self.index_path)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::sample_incidents;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> SearchConfig {
        SearchConfig {
            index_path: dir.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_index_creation() {
        let temp_dir = TempDir::new().unwrap();
        let manager = IndexManager::new(&config_in(&temp_dir)).await;
        assert!(manager.is_ok());
    }

    #[tokio::test]
    async fn test_reindexing_replaces_documents() {
        let temp_dir = TempDir::new().unwrap();
        let manager = IndexManager::new(&config_in(&temp_dir)).await.unwrap();
        let incidents = sample_incidents(5);

        manager.index_documents(&incidents).await.unwrap();
        manager.index_documents(&incidents).await.unwrap();
        assert_eq!(manager.reader().searcher().num_docs(), 5);

        manager.delete_document(&incidents[0].incident_id).await.unwrap();
        assert_eq!(manager.reader().searcher().num_docs(), 4);

        manager.clear_index().await.unwrap();
        assert_eq!(manager.reader().searcher().num_docs(), 0);
    }

    #[tokio::test]
    async fn test_reopen_existing_index() {
        let temp_dir = TempDir::new().unwrap();
        {
            let manager = IndexManager::new(&config_in(&temp_dir)).await.unwrap();
            manager.index_documents(&sample_incidents(2)).await.unwrap();
        }

        let reopened = IndexManager::new(&config_in(&temp_dir)).await.unwrap();
        assert_eq!(reopened.reader().searcher().num_docs(), 2);
    }
}
