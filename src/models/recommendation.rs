use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

/// Confidence ceiling applied when synthesis had no evidence to ground on
pub const NO_EVIDENCE_CONFIDENCE_CAP: f64 = 0.4;

/// Confidence below this value is reported as low confidence
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Ranked, confidence-scored remediation plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Recommendation {
    #[validate(length(min = 1))]
    pub immediate_actions: Vec<String>,

    pub root_cause_hypothesis: String,

    #[serde(default)]
    pub resolution_steps: Vec<String>,

    #[serde(default)]
    pub preventive_measures: Vec<String>,

    #[validate(range(min = 1))]
    pub estimated_resolution_time_minutes: u32,

    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_score: f64,

    pub confidence_reasoning: String,

    /// Identifiers of retrieved incidents the plan draws on
    #[serde(default)]
    pub similar_incident_references: Vec<String>,

    pub risk_assessment: RiskLevel,
}

impl Recommendation {
    /// Generic triage plan substituted when synthesis output is unusable
    pub fn fallback() -> Self {
        Self {
            immediate_actions: vec![
                "Check system logs".to_string(),
                "Verify service health".to_string(),
                "Review recent deployments".to_string(),
            ],
            root_cause_hypothesis:
                "Unable to determine specific root cause without similar incidents".to_string(),
            resolution_steps: vec![
                "Investigate logs".to_string(),
                "Check monitoring".to_string(),
                "Escalate if needed".to_string(),
            ],
            preventive_measures: vec![
                "Add monitoring".to_string(),
                "Review logs regularly".to_string(),
            ],
            estimated_resolution_time_minutes: 30,
            confidence_score: 0.3,
            confidence_reasoning:
                "Low confidence due to synthesis error or no similar incidents".to_string(),
            similar_incident_references: Vec::new(),
            risk_assessment: RiskLevel::Medium,
        }
    }

    pub fn is_low_confidence(&self) -> bool {
        self.confidence_score < LOW_CONFIDENCE_THRESHOLD
    }
}
