//! Remote Elasticsearch document store

use crate::models::{IncidentDocument, RetrievedIncident};
use crate::search::config::SearchConfig;
use crate::search::error::{SearchError, SearchResult};
use crate::search::query::HybridQuery;
use crate::search::store::{DocumentStore, IndexStats};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    /// Decoded one at a time so a single bad document does not sink the query
    #[serde(default)]
    hits: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: IncidentDocument,
    #[serde(default)]
    highlight: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<IncidentDocument>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

/// Store backed by an Elasticsearch index queried over HTTP
pub struct ElasticsearchStore {
    client: Client,
    base_url: String,
    index_name: String,
    api_key: Option<String>,
}

impl ElasticsearchStore {
    pub fn new(config: &SearchConfig) -> SearchResult<Self> {
        let base_url = config
            .elasticsearch_url
            .clone()
            .ok_or_else(|| {
                SearchError::InvalidConfiguration("elasticsearch_url is not set".to_string())
            })?
            .trim_end_matches('/')
            .to_string();

        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SearchError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            index_name: config.index_name.clone(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.index_name, path)
    }

    /// `_doc` path with the id percent-encoded as a single segment
    fn document_url(&self, incident_id: &str) -> SearchResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SearchError::InvalidConfiguration(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| {
                SearchError::InvalidConfiguration(format!(
                    "{} cannot be used as a base URL",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push(&self.index_name)
            .push("_doc")
            .push(incident_id);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("ApiKey {}", key)),
            None => request,
        }
    }

    async fn error_for(response: reqwest::Response) -> SearchError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        SearchError::RequestFailed(format!("{}: {}", status, body))
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    #[instrument(skip(self, query), fields(index = %self.index_name, size = query.size))]
    async fn search(&self, query: &HybridQuery) -> SearchResult<Vec<RetrievedIncident>> {
        let response = self
            .authorize(self.client.post(self.url("_search")))
            .json(&query.to_elasticsearch_body())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::CorruptDocument(e.to_string()))?;

        let mut hits: Vec<RetrievedIncident> = body
            .hits
            .hits
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<Hit>(raw) {
                Ok(hit) => Some(RetrievedIncident::from_document(
                    hit.source,
                    hit.score.unwrap_or(0.0),
                    hit.highlight,
                )),
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable search hit");
                    None
                }
            })
            .collect();

        // Elasticsearch already sorts by score; keep the order contract explicit
        hits.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        hits.truncate(query.size);

        debug!(hits = hits.len(), "Elasticsearch search complete");
        Ok(hits)
    }

    async fn get(&self, incident_id: &str) -> SearchResult<Option<IncidentDocument>> {
        let response = self
            .authorize(self.client.get(self.document_url(incident_id)?))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let body: GetResponse = response
            .json()
            .await
            .map_err(|e| SearchError::CorruptDocument(e.to_string()))?;

        if !body.found {
            warn!(incident_id, "Document reported as not found");
        }
        Ok(body.source.filter(|_| body.found))
    }

    async fn stats(&self) -> SearchResult<IndexStats> {
        let response = self
            .authorize(self.client.get(self.url("_count")))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let body: CountResponse = response
            .json()
            .await
            .map_err(|e| SearchError::CorruptDocument(e.to_string()))?;

        Ok(IndexStats {
            backend: self.name().to_string(),
            total_documents: body.count,
            index_size_bytes: None,
            num_segments: None,
        })
    }

    fn name(&self) -> &str {
        "elasticsearch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::config::SearchConfigBuilder;
    use mockito::Matcher;
    use serde_json::json;

    fn source(id: &str) -> serde_json::Value {
        json!({
            "incident_id": id,
            "title": "Redis cluster split-brain",
            "description": "Network partition caused two masters",
            "severity": "P0",
            "incident_type": "database",
            "status": "resolved",
            "resolution_steps": "1. Stop writes",
            "resolution_time_minutes": 45,
            "created_at": "2024-03-01T10:00:00Z"
        })
    }

    fn store_for(server: &mockito::Server) -> ElasticsearchStore {
        let config = SearchConfigBuilder::new()
            .elasticsearch(server.url(), "devops-incidents")
            .build();
        ElasticsearchStore::new(&config).unwrap()
    }

    #[test]
    fn test_requires_url() {
        let config = SearchConfig {
            elasticsearch_url: None,
            ..Default::default()
        };
        assert!(matches!(
            ElasticsearchStore::new(&config),
            Err(SearchError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_search_posts_hybrid_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/devops-incidents/_search")
            .match_body(Matcher::PartialJson(json!({
                "size": 10,
                "query": { "bool": { "minimum_should_match": 1 } }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "hits": { "hits": [
                        { "_score": 1.5, "_source": source("INC-2"), "highlight": {} },
                        { "_score": 3.0, "_source": source("INC-1"),
                          "highlight": { "description": ["<mark>partition</mark>"] } }
                    ]}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let store = store_for(&server);
        let hits = store
            .search(&HybridQuery::new("redis partition").with_vector(vec![0.1, 0.2]))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].incident_id, "INC-1");
        assert_eq!(hits[0].highlights["description"][0], "<mark>partition</mark>");
    }

    #[tokio::test]
    async fn test_search_reads_naive_timestamps_and_skips_bad_hits() {
        let mut naive = source("INC-7");
        naive["created_at"] = json!("2025-04-19T12:34:56.123456");
        let mut broken = source("INC-8");
        broken["created_at"] = json!("not a date");

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/devops-incidents/_search")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "hits": { "hits": [
                        { "_score": 2.0, "_source": naive },
                        { "_score": 1.0, "_source": broken }
                    ]}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let store = store_for(&server);
        let hits = store.search(&HybridQuery::new("redis")).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].incident_id, "INC-7");
        assert_eq!(
            hits[0].created_at.to_rfc3339(),
            "2025-04-19T12:34:56.123456+00:00"
        );
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/devops-incidents/_search")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let store = store_for(&server);
        let result = store.search(&HybridQuery::new("redis")).await;
        assert!(matches!(result, Err(SearchError::RequestFailed(_))));
    }

    #[tokio::test]
    async fn test_get_missing_document() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/devops-incidents/_doc/INC-404")
            .with_status(404)
            .with_body(json!({ "found": false }).to_string())
            .create_async()
            .await;

        let store = store_for(&server);
        assert!(store.get("INC-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_encodes_id_as_one_segment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/devops-incidents/_doc/a%2Fb")
            .with_status(200)
            .with_body(json!({ "found": true, "_source": source("a/b") }).to_string())
            .create_async()
            .await;

        let store = store_for(&server);
        let doc = store.get("a/b").await.unwrap().unwrap();

        mock.assert_async().await;
        assert_eq!(doc.incident_id, "a/b");
    }

    #[tokio::test]
    async fn test_get_and_count() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/devops-incidents/_doc/INC-1")
            .with_status(200)
            .with_body(json!({ "found": true, "_source": source("INC-1") }).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/devops-incidents/_count")
            .with_status(200)
            .with_body(json!({ "count": 42 }).to_string())
            .create_async()
            .await;

        let store = store_for(&server);
        let doc = store.get("INC-1").await.unwrap().unwrap();
        assert_eq!(doc.resolution_time_minutes, 45);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_documents, 42);
        assert_eq!(stats.backend, "elasticsearch");
    }
}
