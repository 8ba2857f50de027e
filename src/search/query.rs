//! Hybrid query construction
//!
//! A [`HybridQuery`] is the backend-neutral description of one retrieval: a
//! weighted, typo-tolerant lexical clause and a cosine-similarity vector
//! clause combined as alternatives, hard filters, a highlight spec and a
//! result cap. Each [`DocumentStore`](crate::search::DocumentStore) executes
//! it natively.

use crate::models::{ClassificationRecord, FilterValue, SearchPlan};
use crate::search::config::SearchConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Lexical fields and their weights, highest first
pub const LEXICAL_FIELDS: [(&str, f32); 6] = [
    ("title", 3.0),
    ("description", 2.0),
    ("error_messages", 2.0),
    ("technical_terms", 2.0),
    ("resolution_steps", 1.0),
    ("root_cause", 1.0),
];

/// Keyword fields that accept exact-match filters
pub const FILTERABLE_FIELDS: [&str; 7] = [
    "incident_id",
    "severity",
    "incident_type",
    "status",
    "source_type",
    "affected_systems",
    "tags",
];

/// Stored field holding the document embedding
pub const EMBEDDING_FIELD: &str = "description_embedding";

pub const HIGHLIGHT_PRE_TAG: &str = "<mark>";
pub const HIGHLIGHT_POST_TAG: &str = "</mark>";

/// A lexical field and its weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWeight {
    pub field: String,
    pub weight: f32,
}

/// Highlight limits for one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightField {
    pub field: String,
    pub fragment_size: usize,
    pub number_of_fragments: usize,
}

impl HighlightField {
    fn new(field: &str, fragment_size: usize, number_of_fragments: usize) -> Self {
        Self {
            field: field.to_string(),
            fragment_size,
            number_of_fragments,
        }
    }
}

/// Which fields to highlight and how matches are marked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightSpec {
    pub fields: Vec<HighlightField>,
    pub pre_tag: String,
    pub post_tag: String,
}

impl Default for HighlightSpec {
    fn default() -> Self {
        Self {
            fields: vec![
                HighlightField::new("description", 150, 3),
                HighlightField::new("error_messages", 150, 2),
                HighlightField::new("resolution_steps", 200, 3),
            ],
            pre_tag: HIGHLIGHT_PRE_TAG.to_string(),
            post_tag: HIGHLIGHT_POST_TAG.to_string(),
        }
    }
}

/// One hybrid retrieval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridQuery {
    /// Lexical query text; blank disables the lexical clause
    pub text: String,

    /// Weighted lexical fields
    pub fields: Vec<FieldWeight>,

    /// Enable typo tolerance on the lexical clause
    pub fuzzy: bool,

    /// Query embedding; `None` disables the vector clause
    pub vector: Option<Vec<f32>>,

    pub keyword_boost: f32,

    pub vector_boost: f32,

    /// Hard constraints, restricted to [`FILTERABLE_FIELDS`]
    pub filters: BTreeMap<String, FilterValue>,

    pub highlight: HighlightSpec,

    /// Maximum number of hits
    pub size: usize,
}

impl HybridQuery {
    /// Create a lexical-only query with default weights, boosts and highlighting
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fields: LEXICAL_FIELDS
                .iter()
                .map(|(field, weight)| FieldWeight {
                    field: field.to_string(),
                    weight: *weight,
                })
                .collect(),
            fuzzy: true,
            vector: None,
            keyword_boost: 1.0,
            vector_boost: 2.0,
            filters: BTreeMap::new(),
            highlight: HighlightSpec::default(),
            size: 10,
        }
    }

    /// Attach the query embedding; an empty vector leaves the clause disabled
    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = if vector.is_empty() { None } else { Some(vector) };
        self
    }

    pub fn with_boosts(mut self, keyword_boost: f32, vector_boost: f32) -> Self {
        self.keyword_boost = keyword_boost;
        self.vector_boost = vector_boost;
        self
    }

    /// Add a filter. Fields outside [`FILTERABLE_FIELDS`] are dropped.
    pub fn with_filter(mut self, field: impl Into<String>, value: FilterValue) -> Self {
        let field = field.into();
        if !FILTERABLE_FIELDS.contains(&field.as_str()) {
            warn!(field = %field, "Dropping filter on non-filterable field");
            return self;
        }
        if value.values().is_empty() {
            warn!(field = %field, "Dropping filter with no values");
            return self;
        }
        self.filters.insert(field, value);
        self
    }

    pub fn with_filters(self, filters: &BTreeMap<String, FilterValue>) -> Self {
        filters
            .iter()
            .fold(self, |query, (field, value)| query.with_filter(field.clone(), value.clone()))
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn has_lexical_clause(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn has_vector_clause(&self) -> bool {
        self.vector.is_some()
    }

    /// Render as an Elasticsearch `_search` request body
    pub fn to_elasticsearch_body(&self) -> Value {
        let mut should = Vec::new();

        if self.has_lexical_clause() {
            let fields: Vec<String> = self
                .fields
                .iter()
                .map(|fw| {
                    if (fw.weight - 1.0).abs() < f32::EPSILON {
                        fw.field.clone()
                    } else {
                        format!("{}^{}", fw.field, fw.weight)
                    }
                })
                .collect();

            let mut multi_match = json!({
                "query": self.text,
                "fields": fields,
                "type": "best_fields",
                "boost": self.keyword_boost,
            });
            if self.fuzzy {
                multi_match["fuzziness"] = json!("AUTO");
            }
            should.push(json!({ "multi_match": multi_match }));
        }

        if let Some(vector) = &self.vector {
            should.push(json!({
                "script_score": {
                    "query": { "match_all": {} },
                    "script": {
                        "source": format!("cosineSimilarity(params.query_vector, '{}') + 1.0", EMBEDDING_FIELD),
                        "params": { "query_vector": vector }
                    },
                    "boost": self.vector_boost
                }
            }));
        }

        let filter: Vec<Value> = self
            .filters
            .iter()
            .map(|(field, value)| match value {
                FilterValue::One(v) => json!({ "term": { field.as_str(): v } }),
                FilterValue::Many(vs) => json!({ "terms": { field.as_str(): vs } }),
            })
            .collect();

        let highlight_fields: serde_json::Map<String, Value> = self
            .highlight
            .fields
            .iter()
            .map(|hf| {
                (
                    hf.field.clone(),
                    json!({
                        "fragment_size": hf.fragment_size,
                        "number_of_fragments": hf.number_of_fragments
                    }),
                )
            })
            .collect();

        json!({
            "size": self.size,
            "query": {
                "bool": {
                    "should": should,
                    "filter": filter,
                    "minimum_should_match": 1
                }
            },
            "highlight": {
                "fields": highlight_fields,
                "pre_tags": [self.highlight.pre_tag],
                "post_tags": [self.highlight.post_tag]
            }
        })
    }
}

/// Union of the plan's primary terms and the record's technical terms.
///
/// Order is preserved and duplicates are removed case-insensitively.
pub fn combined_search_text(plan: &SearchPlan, record: &ClassificationRecord) -> String {
    let mut seen = HashSet::new();
    plan.primary_search_terms
        .iter()
        .chain(record.technical_terms.iter())
        .map(|term| term.trim())
        .filter(|term| !term.is_empty())
        .filter(|term| seen.insert(term.to_lowercase()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Edit distance allowed for a term of this length (Elasticsearch `AUTO`)
pub fn fuzziness_for(term: &str) -> u8 {
    match term.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

/// Builds hybrid queries from pipeline artifacts using configured boosts
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    keyword_boost: f32,
    vector_boost: f32,
    max_results: usize,
}

impl QueryBuilder {
    pub fn new(keyword_boost: f32, vector_boost: f32, max_results: usize) -> Self {
        Self {
            keyword_boost,
            vector_boost,
            max_results,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.keyword_boost, config.vector_boost, config.max_results)
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Build the query for one pipeline run
    pub fn build(
        &self,
        plan: &SearchPlan,
        record: &ClassificationRecord,
        query_vector: Vec<f32>,
    ) -> HybridQuery {
        HybridQuery::new(combined_search_text(plan, record))
            .with_vector(query_vector)
            .with_boosts(self.keyword_boost, self.vector_boost)
            .with_filters(&plan.filters)
            .with_size(self.max_results)
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IncidentType;

    fn record_with_terms(terms: &[&str]) -> ClassificationRecord {
        let mut record = ClassificationRecord::fallback();
        record.incident_type = IncidentType::Database;
        record.technical_terms = terms.iter().map(|t| t.to_string()).collect();
        record
    }

    #[test]
    fn test_combined_text_is_deduplicated_union() {
        let record = record_with_terms(&["HikariCP", "timeout"]);
        let mut plan = SearchPlan::fallback_for(&record);
        plan.primary_search_terms = vec!["connection pool".to_string(), "hikaricp".to_string()];

        assert_eq!(
            combined_search_text(&plan, &record),
            "connection pool hikaricp timeout"
        );
    }

    #[test]
    fn test_builder_applies_boosts_filters_and_cap() {
        let record = record_with_terms(&["HikariCP"]);
        let plan = SearchPlan::fallback_for(&record);
        let query = QueryBuilder::new(1.0, 2.0, 7).build(&plan, &record, vec![0.1, 0.2]);

        assert_eq!(query.size, 7);
        assert_eq!(query.keyword_boost, 1.0);
        assert_eq!(query.vector_boost, 2.0);
        assert!(query.has_lexical_clause());
        assert!(query.has_vector_clause());
        assert_eq!(
            query.filters.get("incident_type"),
            Some(&FilterValue::One("database".to_string()))
        );
    }

    #[test]
    fn test_unknown_filter_fields_are_dropped() {
        let query = HybridQuery::new("oom")
            .with_filter("search_priority", FilterValue::from("logs"))
            .with_filter("severity", FilterValue::Many(vec!["P0".into(), "P1".into()]))
            .with_filter("tags", FilterValue::Many(vec![]));

        assert_eq!(query.filters.len(), 1);
        assert!(query.filters.contains_key("severity"));
    }

    #[test]
    fn test_empty_vector_disables_vector_clause() {
        let query = HybridQuery::new("").with_vector(Vec::new());
        assert!(!query.has_vector_clause());
        assert!(!query.has_lexical_clause());
    }

    #[test]
    fn test_elasticsearch_body_shape() {
        let query = HybridQuery::new("HikariCP timeout")
            .with_vector(vec![0.5, 0.5])
            .with_boosts(1.0, 2.0)
            .with_filter("incident_type", FilterValue::from("database"))
            .with_filter("severity", FilterValue::Many(vec!["P0".into(), "P1".into()]))
            .with_size(10);

        let body = query.to_elasticsearch_body();
        assert_eq!(body["size"], 10);

        let bool_query = &body["query"]["bool"];
        assert_eq!(bool_query["minimum_should_match"], 1);

        let multi_match = &bool_query["should"][0]["multi_match"];
        assert_eq!(multi_match["type"], "best_fields");
        assert_eq!(multi_match["fuzziness"], "AUTO");
        assert_eq!(multi_match["fields"][0], "title^3");
        assert_eq!(multi_match["fields"][4], "resolution_steps");

        let script_score = &bool_query["should"][1]["script_score"];
        assert_eq!(script_score["boost"], 2.0);
        assert!(script_score["script"]["source"]
            .as_str()
            .unwrap()
            .ends_with("+ 1.0"));

        let filters = bool_query["filter"].as_array().unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0]["term"]["incident_type"], "database");
        assert_eq!(filters[1]["terms"]["severity"][1], "P1");

        assert_eq!(body["highlight"]["pre_tags"][0], "<mark>");
        assert_eq!(
            body["highlight"]["fields"]["resolution_steps"]["fragment_size"],
            200
        );
    }

    #[test]
    fn test_fuzziness_auto() {
        assert_eq!(fuzziness_for("db"), 0);
        assert_eq!(fuzziness_for("redis"), 1);
        assert_eq!(fuzziness_for("hikaricp"), 2);
    }
}
