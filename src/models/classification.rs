use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

/// Lowest urgency score the extractor accepts
pub const MIN_URGENCY: u8 = 1;

/// Highest urgency score the extractor accepts
pub const MAX_URGENCY: u8 = 10;

/// Severity levels, most urgent first
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display,
)]
pub enum Severity {
    P0, // Critical - immediate action
    P1, // High - < 1 hour
    P2, // Medium - < 24 hours
    P3, // Low - < 1 week
}

impl Severity {
    pub const ALL: [Severity; 4] = [Severity::P0, Severity::P1, Severity::P2, Severity::P3];

    /// Get numeric priority (lower is more urgent)
    pub fn priority(&self) -> u8 {
        match self {
            Severity::P0 => 0,
            Severity::P1 => 1,
            Severity::P2 => 2,
            Severity::P3 => 3,
        }
    }

    /// Check if severity requires immediate attention
    pub fn is_urgent(&self) -> bool {
        matches!(self, Severity::P0 | Severity::P1)
    }
}

/// Incident category as stored in the `incident_type` field of the index
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncidentType {
    Database,
    Network,
    Application,
    Infrastructure,
    Security,
}

impl IncidentType {
    pub const ALL: [IncidentType; 5] = [
        IncidentType::Database,
        IncidentType::Network,
        IncidentType::Application,
        IncidentType::Infrastructure,
        IncidentType::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::Database => "database",
            IncidentType::Network => "network",
            IncidentType::Application => "application",
            IncidentType::Infrastructure => "infrastructure",
            IncidentType::Security => "security",
        }
    }
}

/// Structured facts extracted from a free-text incident description.
///
/// Produced once per run by the extractor and never mutated afterwards; a
/// record that fails validation is replaced wholesale by
/// [`ClassificationRecord::fallback`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct ClassificationRecord {
    pub severity: Severity,

    pub incident_type: IncidentType,

    #[serde(default)]
    pub key_symptoms: Vec<String>,

    #[serde(default)]
    pub technical_terms: Vec<String>,

    #[serde(default)]
    pub affected_systems: Vec<String>,

    #[validate(range(min = 1, max = 10))]
    pub urgency_score: u8,

    #[validate(length(min = 1))]
    pub summary: String,
}

impl ClassificationRecord {
    /// Record substituted when the model output cannot be validated
    pub fn fallback() -> Self {
        Self {
            severity: Severity::P2,
            incident_type: IncidentType::Application,
            key_symptoms: Vec::new(),
            technical_terms: Vec::new(),
            affected_systems: vec!["unknown".to_string()],
            urgency_score: (MIN_URGENCY + MAX_URGENCY) / 2,
            summary: "Unable to fully analyze incident; analysis incomplete".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_severity_parsing() {
        assert_eq!(Severity::from_str("P1").unwrap(), Severity::P1);
        assert!(Severity::from_str("P4").is_err());
        assert!(Severity::P0.is_urgent());
        assert!(!Severity::P3.is_urgent());
        assert!(Severity::P0 < Severity::P3);
    }

    #[test]
    fn test_incident_type_wire_format() {
        let json = serde_json::to_string(&IncidentType::Infrastructure).unwrap();
        assert_eq!(json, "\"infrastructure\"");
        assert_eq!(IncidentType::Database.to_string(), "database");
        assert_eq!(
            IncidentType::from_str("network").unwrap(),
            IncidentType::Network
        );
    }

    #[test]
    fn test_fallback_record_is_valid() {
        let record = ClassificationRecord::fallback();
        assert!(record.validate().is_ok());
        assert_eq!(record.severity, Severity::P2);
        assert_eq!(record.incident_type, IncidentType::Application);
        assert_eq!(record.urgency_score, 5);
        assert!(record.key_symptoms.is_empty());
        assert!(record.technical_terms.is_empty());
        assert_eq!(record.affected_systems, vec!["unknown".to_string()]);
    }

    #[test]
    fn test_urgency_out_of_range_is_rejected() {
        let mut record = ClassificationRecord::fallback();
        record.urgency_score = 11;
        assert!(record.validate().is_err());
        record.urgency_score = 0;
        assert!(record.validate().is_err());
    }
}
