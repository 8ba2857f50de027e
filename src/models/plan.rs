use crate::models::ClassificationRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// Knowledge sources the planner can prioritise
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceKind {
    PastIncidents,
    Documentation,
    Logs,
}

/// Required value(s) for one filter field.
///
/// A single value is an exact match; a list matches any of its values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl FilterValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            FilterValue::One(value) => vec![value.as_str()],
            FilterValue::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.values().iter().any(|v| *v == candidate)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::One(value.to_string())
    }
}

/// Retrieval plan derived from a classification record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchPlan {
    pub primary_search_terms: Vec<String>,

    #[serde(default)]
    pub secondary_search_terms: Vec<String>,

    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,

    pub source_priority: Vec<SourceKind>,
}

impl SearchPlan {
    /// Deterministic plan used when the planner output is unusable.
    ///
    /// Depends only on the record, so identical records always yield
    /// identical plans.
    pub fn fallback_for(record: &ClassificationRecord) -> Self {
        let mut filters = BTreeMap::new();
        filters.insert(
            "incident_type".to_string(),
            FilterValue::from(record.incident_type.as_str()),
        );

        Self {
            primary_search_terms: record.technical_terms.clone(),
            secondary_search_terms: Vec::new(),
            filters,
            source_priority: vec![SourceKind::PastIncidents],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IncidentType;

    #[test]
    fn test_filter_value_matching() {
        let one = FilterValue::from("database");
        assert!(one.matches("database"));
        assert!(!one.matches("network"));

        let many = FilterValue::Many(vec!["P0".to_string(), "P1".to_string()]);
        assert!(many.matches("P1"));
        assert!(!many.matches("P2"));
    }

    #[test]
    fn test_filter_value_untagged_wire_format() {
        let one: FilterValue = serde_json::from_str("\"database\"").unwrap();
        assert_eq!(one, FilterValue::One("database".to_string()));

        let many: FilterValue = serde_json::from_str("[\"P0\", \"P1\"]").unwrap();
        assert_eq!(many.values(), vec!["P0", "P1"]);
    }

    #[test]
    fn test_fallback_plan_is_pure() {
        let mut record = ClassificationRecord::fallback();
        record.incident_type = IncidentType::Database;
        record.technical_terms = vec!["HikariCP".to_string(), "connection pool".to_string()];

        let first = SearchPlan::fallback_for(&record);
        let second = SearchPlan::fallback_for(&record.clone());

        assert_eq!(first, second);
        assert_eq!(first.primary_search_terms, record.technical_terms);
        assert_eq!(
            first.filters.get("incident_type"),
            Some(&FilterValue::One("database".to_string()))
        );
        assert_eq!(first.source_priority, vec![SourceKind::PastIncidents]);
    }
}
