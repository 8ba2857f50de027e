//! Document store abstraction and the embedded Tantivy implementation

use crate::models::{IncidentDocument, RetrievedIncident};
use crate::search::config::SearchConfig;
use crate::search::error::{SearchError, SearchResult};
use crate::search::index::IndexManager;
use crate::search::query::{fuzziness_for, HighlightField, HybridQuery};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{
    AllQuery, BooleanQuery, BoostQuery, DisjunctionMaxQuery, FuzzyTermQuery, Occur, Query,
    TermQuery,
};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::snippet::SnippetGenerator;
use tantivy::tokenizer::TokenStream;
use tantivy::{DocAddress, Searcher, TantivyDocument, Term};
use tracing::{debug, instrument};

/// Boost applied to fuzzy expansions relative to exact term matches
const FUZZY_BOOST: f32 = 0.5;

/// Store statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStats {
    pub backend: String,

    pub total_documents: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_size_bytes: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_segments: Option<usize>,
}

/// A searchable collection of historical incidents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Execute a hybrid query; hits are sorted by descending score
    async fn search(&self, query: &HybridQuery) -> SearchResult<Vec<RetrievedIncident>>;

    /// Fetch one incident by id
    async fn get(&self, incident_id: &str) -> SearchResult<Option<IncidentDocument>>;

    async fn stats(&self) -> SearchResult<IndexStats>;

    /// Backend name for logs and stats
    fn name(&self) -> &str;
}

/// Cosine similarity, `None` when undefined. Clamped to `[-1, 1]` so that
/// `cosine + 1` is never negative under rounding.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Embedded store backed by a local Tantivy index.
///
/// Scores mirror the Elasticsearch query: the weighted lexical clause scaled
/// by the keyword boost, plus `cosine + 1` scaled by the vector boost.
pub struct TantivyStore {
    index_manager: Arc<IndexManager>,
}

impl TantivyStore {
    pub async fn open(config: &SearchConfig) -> SearchResult<Self> {
        let index_manager = Arc::new(IndexManager::new(config).await?);
        Ok(Self { index_manager })
    }

    pub fn index_manager(&self) -> &Arc<IndexManager> {
        &self.index_manager
    }

    /// Index a batch of incidents, replacing any with the same id
    pub async fn index_documents(&self, documents: &[IncidentDocument]) -> SearchResult<usize> {
        self.index_manager.index_documents(documents).await
    }

    pub async fn delete_document(&self, incident_id: &str) -> SearchResult<()> {
        self.index_manager.delete_document(incident_id).await
    }

    pub async fn clear(&self) -> SearchResult<()> {
        self.index_manager.clear_index().await
    }

    /// Conjunction of all filters; matches everything when there are none
    fn filter_query(&self, query: &HybridQuery) -> SearchResult<Box<dyn Query>> {
        let fields = self.index_manager.fields();
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        for (name, value) in &query.filters {
            let field = fields.keyword(name).ok_or_else(|| {
                SearchError::QueryBuildFailed(format!("'{}' is not filterable", name))
            })?;

            let alternatives: Vec<(Occur, Box<dyn Query>)> = value
                .values()
                .into_iter()
                .map(|v| {
                    let term = Term::from_field_text(field, v);
                    (
                        Occur::Should,
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic)) as Box<dyn Query>,
                    )
                })
                .collect();

            clauses.push((Occur::Must, Box::new(BooleanQuery::new(alternatives))));
        }

        if clauses.is_empty() {
            Ok(Box::new(AllQuery))
        } else {
            Ok(Box::new(BooleanQuery::new(clauses)))
        }
    }

    /// Weighted best-fields query over the lexical fields.
    ///
    /// Returns `None` when the text yields no tokens.
    fn lexical_query(&self, query: &HybridQuery) -> SearchResult<Option<Box<dyn Query>>> {
        if !query.has_lexical_clause() {
            return Ok(None);
        }

        let fields = self.index_manager.fields();
        let mut per_field: Vec<Box<dyn Query>> = Vec::new();

        for weighted in &query.fields {
            let Some(field) = fields.lexical(&weighted.field) else {
                continue;
            };

            let tokens = self.tokenize(field, &query.text)?;
            if tokens.is_empty() {
                continue;
            }

            let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
            for token in &tokens {
                let term = Term::from_field_text(field, token);
                clauses.push((
                    Occur::Should,
                    Box::new(TermQuery::new(term.clone(), IndexRecordOption::WithFreqs)),
                ));

                let distance = fuzziness_for(token);
                if query.fuzzy && distance > 0 {
                    clauses.push((
                        Occur::Should,
                        Box::new(BoostQuery::new(
                            Box::new(FuzzyTermQuery::new(term, distance, true)),
                            FUZZY_BOOST,
                        )),
                    ));
                }
            }

            per_field.push(Box::new(BoostQuery::new(
                Box::new(BooleanQuery::new(clauses)),
                weighted.weight,
            )));
        }

        if per_field.is_empty() {
            return Ok(None);
        }

        Ok(Some(Box::new(DisjunctionMaxQuery::new(per_field))))
    }

    /// Tokens of `text` as the field's analyzer produces them, deduplicated
    fn tokenize(&self, field: Field, text: &str) -> SearchResult<Vec<String>> {
        let mut analyzer = self
            .index_manager
            .index()
            .tokenizer_for_field(field)
            .map_err(|e| SearchError::QueryBuildFailed(e.to_string()))?;

        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        let mut stream = analyzer.token_stream(text);
        while stream.advance() {
            let token = stream.token().text.clone();
            if seen.insert(token.clone()) {
                tokens.push(token);
            }
        }

        Ok(tokens)
    }

    fn load(&self, searcher: &Searcher, address: DocAddress) -> SearchResult<TantivyDocument> {
        searcher
            .doc(address)
            .map_err(|e| SearchError::SearchFailed(format!("Failed to retrieve doc: {}", e)))
    }

    /// One snippet generator per highlightable field
    fn snippet_generators<'q>(
        &self,
        searcher: &Searcher,
        lexical: &dyn Query,
        query: &'q HybridQuery,
    ) -> SearchResult<Vec<(&'q HighlightField, SnippetGenerator)>> {
        let fields = self.index_manager.fields();
        let mut generators = Vec::new();

        for spec in &query.highlight.fields {
            let Some(field) = fields.lexical(&spec.field) else {
                continue;
            };

            let mut generator = SnippetGenerator::create(searcher, lexical, field)
                .map_err(|e| SearchError::SearchFailed(format!("Highlighting failed: {}", e)))?;
            generator.set_max_num_chars(spec.fragment_size);
            generators.push((spec, generator));
        }

        Ok(generators)
    }
}

/// Highlighted fragments per field, matches wrapped in the query's tags.
///
/// Tantivy yields the single best fragment per field.
fn highlight_doc(
    generators: &[(&HighlightField, SnippetGenerator)],
    query: &HybridQuery,
    doc: &TantivyDocument,
) -> HashMap<String, Vec<String>> {
    let mut highlights = HashMap::new();

    for (spec, generator) in generators {
        if spec.number_of_fragments == 0 {
            continue;
        }

        let snippet = generator.snippet_from_doc(doc);
        if snippet.highlighted().is_empty() {
            continue;
        }

        let fragment = snippet.fragment();
        let mut marked = String::with_capacity(fragment.len() + 16);
        let mut cursor = 0;
        for range in snippet.highlighted() {
            marked.push_str(&fragment[cursor..range.start]);
            marked.push_str(&query.highlight.pre_tag);
            marked.push_str(&fragment[range.start..range.end]);
            marked.push_str(&query.highlight.post_tag);
            cursor = range.end;
        }
        marked.push_str(&fragment[cursor..]);

        highlights.insert(spec.field.clone(), vec![marked]);
    }

    highlights
}

#[async_trait]
impl DocumentStore for TantivyStore {
    #[instrument(skip(self, query), fields(size = query.size, filters = query.filters.len()))]
    async fn search(&self, query: &HybridQuery) -> SearchResult<Vec<RetrievedIncident>> {
        let fields = self.index_manager.fields();
        let searcher = self.index_manager.reader().searcher();

        let filter = self.filter_query(query)?;
        let mut candidates: Vec<DocAddress> = searcher
            .search(&*filter, &DocSetCollector)
            .map_err(|e| SearchError::SearchFailed(format!("Filter execution failed: {}", e)))?
            .into_iter()
            .collect();
        candidates.sort();

        let lexical = self.lexical_query(query)?;
        let lexical_scores: HashMap<DocAddress, f32> = match &lexical {
            Some(lexical) => {
                let limit = (searcher.num_docs() as usize).max(1);
                searcher
                    .search(&**lexical, &TopDocs::with_limit(limit))
                    .map_err(|e| {
                        SearchError::SearchFailed(format!("Search execution failed: {}", e))
                    })?
                    .into_iter()
                    .map(|(score, address)| (address, score))
                    .collect()
            }
            None => HashMap::new(),
        };

        let mut scored: Vec<(f64, DocAddress, TantivyDocument)> = Vec::new();
        for address in candidates {
            let lexical_score = lexical_scores.get(&address).copied();
            if lexical_score.is_none() && query.vector.is_none() {
                continue;
            }

            let doc = self.load(&searcher, address)?;
            let cosine = query.vector.as_deref().and_then(|vector| {
                fields
                    .embedding_of(&doc)
                    .and_then(|embedding| cosine_similarity(vector, &embedding))
            });

            if lexical_score.is_none() && cosine.is_none() {
                continue;
            }

            let score = f64::from(query.keyword_boost * lexical_score.unwrap_or(0.0))
                + f64::from(query.vector_boost * cosine.map(|c| c + 1.0).unwrap_or(0.0));
            scored.push((score, address, doc));
        }

        // Stable, so ties keep index order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(query.size);

        let generators = match &lexical {
            Some(lexical) => self.snippet_generators(&searcher, &**lexical, query)?,
            None => Vec::new(),
        };

        let mut hits = Vec::with_capacity(scored.len());
        for (score, _, doc) in scored {
            let highlights = highlight_doc(&generators, query, &doc);
            let incident = fields.from_tantivy_doc(&doc)?;
            hits.push(RetrievedIncident::from_document(incident, score, highlights));
        }

        debug!(hits = hits.len(), "Hybrid search complete");
        Ok(hits)
    }

    async fn get(&self, incident_id: &str) -> SearchResult<Option<IncidentDocument>> {
        let fields = self.index_manager.fields();
        let searcher = self.index_manager.reader().searcher();

        let query = TermQuery::new(
            Term::from_field_text(fields.incident_id, incident_id),
            IndexRecordOption::Basic,
        );
        let top = searcher
            .search(&query, &TopDocs::with_limit(1))
            .map_err(|e| SearchError::SearchFailed(format!("Lookup failed: {}", e)))?;

        match top.first() {
            Some((_, address)) => {
                let doc = self.load(&searcher, *address)?;
                Ok(Some(fields.from_tantivy_doc(&doc)?))
            }
            None => Ok(None),
        }
    }

    async fn stats(&self) -> SearchResult<IndexStats> {
        let searcher = self.index_manager.reader().searcher();

        Ok(IndexStats {
            backend: self.name().to_string(),
            total_documents: searcher.num_docs(),
            index_size_bytes: Some(self.index_manager.size_bytes()),
            num_segments: Some(searcher.segment_readers().len()),
        })
    }

    fn name(&self) -> &str {
        "tantivy"
    }
}
