use crate::models::{IncidentType, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

/// Lifecycle status of a historical incident
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Resolved,
}

/// A historical incident as stored in the document store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentDocument {
    pub incident_id: String,

    pub title: String,

    pub description: String,

    pub severity: Severity,

    pub incident_type: IncidentType,

    pub status: IncidentStatus,

    #[serde(default)]
    pub affected_systems: Vec<String>,

    #[serde(default)]
    pub error_messages: String,

    /// Stored only, never searched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,

    #[serde(default)]
    pub technical_terms: Vec<String>,

    pub resolution_steps: String,

    #[serde(default)]
    pub resolution_time_minutes: u32,

    #[serde(default)]
    pub root_cause: String,

    /// incident, log, documentation, slack
    #[serde(default = "default_source_type")]
    pub source_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// Offset-less timestamps are read as UTC
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,

    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub resolved_at: Option<DateTime<Utc>>,

    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Semantic embedding of title, description and error messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_embedding: Option<Vec<f32>>,

    #[serde(default)]
    pub related_incidents: Vec<String>,
}

fn default_source_type() -> String {
    "incident".to_string()
}

/// RFC 3339 timestamps, plus naive ISO 8601 ones taken as UTC
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, ParseError, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub(super) fn parse(value: &str) -> Result<DateTime<Utc>, ParseError> {
        let rfc3339 = match DateTime::parse_from_rfc3339(value) {
            Ok(parsed) => return Ok(parsed.with_timezone(&Utc)),
            Err(e) => e,
        };

        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or(rfc3339)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        parse(&value).map_err(de::Error::custom)
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(value) => parse(&value).map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

impl IncidentDocument {
    /// Text that is embedded for semantic search
    pub fn embedding_text(&self) -> String {
        format!("{} {} {}", self.title, self.description, self.error_messages)
    }
}

/// One ranked hit of a hybrid query.
///
/// `similarity_score` is a blended lexical/vector score: non-negative, larger
/// is more relevant, and not bounded to `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedIncident {
    pub incident_id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub incident_type: IncidentType,
    pub resolution_steps: String,
    pub resolution_time_minutes: u32,
    pub similarity_score: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub highlights: HashMap<String, Vec<String>>,
}

impl RetrievedIncident {
    pub fn from_document(
        document: IncidentDocument,
        score: f64,
        highlights: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            incident_id: document.incident_id,
            title: document.title,
            description: document.description,
            severity: document.severity,
            incident_type: document.incident_type,
            resolution_steps: document.resolution_steps,
            resolution_time_minutes: document.resolution_time_minutes,
            similarity_score: score,
            created_at: document.created_at,
            highlights,
        }
    }
}
