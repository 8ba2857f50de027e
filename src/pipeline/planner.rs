use crate::llm::TextGenerator;
use crate::models::{ClassificationRecord, FilterValue, SearchPlan, SourceKind, Stage};
use crate::pipeline::error::PipelineError;
use crate::pipeline::outcome::StageOutcome;
use crate::pipeline::prompts::planning_prompt;
use crate::pipeline::validation::{excerpt, parse_model_json};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

/// A single value or a list of values
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Planner output as the model emits it
#[derive(Debug, Deserialize, Validate)]
struct PlannerOutput {
    #[validate(length(min = 1))]
    primary_search_terms: Vec<String>,

    #[serde(default)]
    secondary_search_terms: Vec<String>,

    #[serde(default, alias = "search_filters")]
    filters: BTreeMap<String, FilterValue>,

    #[serde(default, alias = "search_priority", alias = "source_priorities")]
    source_priority: OneOrMany<SourceKind>,
}

impl PlannerOutput {
    fn into_plan(self) -> SearchPlan {
        let mut source_priority = Vec::new();
        for source in self.source_priority.into_vec() {
            if !source_priority.contains(&source) {
                source_priority.push(source);
            }
        }
        if source_priority.is_empty() {
            source_priority.push(SourceKind::PastIncidents);
        }

        SearchPlan {
            primary_search_terms: clean_terms(self.primary_search_terms),
            secondary_search_terms: clean_terms(self.secondary_search_terms),
            filters: self
                .filters
                .into_iter()
                .map(|(field, value)| {
                    let value = normalize_filter(&field, value);
                    (field, value)
                })
                .collect(),
            source_priority,
        }
    }
}

fn clean_terms(terms: Vec<String>) -> Vec<String> {
    terms
        .into_iter()
        .map(|term| term.trim().to_string())
        .filter(|term| !term.is_empty())
        .collect()
}

/// Match the casing the index stores for enumerated fields
fn normalize_filter(field: &str, value: FilterValue) -> FilterValue {
    let normalize: fn(&str) -> String = match field {
        "severity" => |v: &str| v.trim().to_uppercase(),
        "incident_type" | "status" => |v: &str| v.trim().to_lowercase(),
        _ => return value,
    };

    match value {
        FilterValue::One(v) => FilterValue::One(normalize(&v)),
        FilterValue::Many(vs) => FilterValue::Many(vs.iter().map(|v| normalize(v)).collect()),
    }
}

/// Turns a classification record into a retrieval plan
pub struct Planner {
    generator: Arc<dyn TextGenerator>,
}

impl Planner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Derive a search plan.
    ///
    /// Unusable output yields [`SearchPlan::fallback_for`] the record; a failed
    /// generation call is fatal.
    pub async fn plan(
        &self,
        record: &ClassificationRecord,
    ) -> Result<StageOutcome<SearchPlan>, PipelineError> {
        let raw = self
            .generator
            .generate(&planning_prompt(record))
            .await
            .map_err(|e| PipelineError::generation(Stage::Plan, e))?;

        match parse_model_json::<PlannerOutput>(&raw) {
            Ok(output) => {
                let plan = output.into_plan();
                info!(
                    primary_terms = plan.primary_search_terms.len(),
                    filters = plan.filters.len(),
                    "Search strategy created"
                );
                Ok(StageOutcome::Completed(plan))
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse search strategy; using fallback plan");
                debug!(output = %excerpt(&raw, 500), "Rejected strategy output");
                Ok(StageOutcome::fallback(
                    SearchPlan::fallback_for(record),
                    e.to_string(),
                ))
            }
        }
    }
}
