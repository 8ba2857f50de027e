//! Prompt templates for the three generation stages

use crate::models::{
    ClassificationRecord, IncidentType, RetrievedIncident, Severity, MAX_URGENCY, MIN_URGENCY,
};
use crate::pipeline::validation::excerpt;

const NO_EVIDENCE: &str = "No similar incidents found in database.";

fn joined<T: ToString>(values: &[T], separator: &str) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

fn record_json(record: &ClassificationRecord) -> String {
    serde_json::to_string_pretty(record).unwrap_or_else(|_| format!("{:?}", record))
}

/// Prompt asking for a classification record
pub fn extraction_prompt(description: &str) -> String {
    let severities = joined(&Severity::ALL, ", ");
    let types = joined(&IncidentType::ALL, ", ");

    format!(
        r#"You are an expert DevOps engineer analyzing a production incident.

Incident Description:
{description}

Extract and return ONLY a valid JSON object with these exact fields:
{{
    "severity": "{severity_choices}",
    "incident_type": "{type_choices}",
    "key_symptoms": ["symptom1", "symptom2"],
    "technical_terms": ["term1", "term2"],
    "affected_systems": ["system1", "system2"],
    "urgency_score": 8,
    "summary": "one-sentence technical summary"
}}

Rules:
- severity must be exactly one of: {severities}
- incident_type must be exactly one of: {types}
- urgency_score must be an integer between {min}-{max}
- Extract actual technical terms, error codes, and system names
- Be precise and technical

Return ONLY the JSON object, no other text."#,
        description = description,
        severity_choices = joined(&Severity::ALL, " or "),
        type_choices = joined(&IncidentType::ALL, " or "),
        severities = severities,
        types = types,
        min = MIN_URGENCY,
        max = MAX_URGENCY,
    )
}

/// Prompt asking for a search plan seeded with the full record
pub fn planning_prompt(record: &ClassificationRecord) -> String {
    format!(
        r#"Based on this incident analysis, determine the optimal search strategy.

Analysis:
{analysis}

Return ONLY a valid JSON object:
{{
    "primary_search_terms": ["term1", "term2", "term3"],
    "secondary_search_terms": ["term4", "term5"],
    "filters": {{"incident_type": "{incident_type}"}},
    "source_priority": ["past_incidents", "documentation", "logs"]
}}

Focus on:
- Technical terms that will find similar incidents
- Error codes, exception names, system components
- Root cause indicators

Filters may only use: incident_type, severity, status, affected_systems, tags.
A filter value may be a single string or a list of strings.

Return ONLY the JSON object, no other text."#,
        analysis = record_json(record),
        incident_type = record.incident_type,
    )
}

/// Evidence block for the synthesis prompt
pub fn format_evidence(evidence: &[RetrievedIncident], excerpt_chars: usize) -> String {
    if evidence.is_empty() {
        return NO_EVIDENCE.to_string();
    }

    evidence
        .iter()
        .enumerate()
        .map(|(i, incident)| {
            format!(
                "Similar Incident {} (Similarity: {:.2}):\nID: {}\nTitle: {}\nType: {}, Severity: {}\nResolution: {}\nTime to resolve: {} minutes",
                i + 1,
                incident.similarity_score,
                incident.incident_id,
                incident.title,
                incident.incident_type,
                incident.severity,
                excerpt(&incident.resolution_steps, excerpt_chars),
                incident.resolution_time_minutes,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt asking for a recommendation grounded on the evidence
pub fn synthesis_prompt(
    description: &str,
    record: &ClassificationRecord,
    evidence: &[RetrievedIncident],
    excerpt_chars: usize,
) -> String {
    let grounding = if evidence.is_empty() {
        "- No similar incidents were found: base the plan on the incident analysis alone and keep confidence_score below 0.5"
    } else {
        "- Reference the similar incident IDs you relied on, using only IDs listed above"
    };

    format!(
        r#"You are an expert DevOps engineer providing incident resolution guidance.

Current Incident:
{description}

Incident Analysis:
{analysis}

Similar Past Incidents:
{evidence}

Provide a comprehensive resolution recommendation as JSON:
{{
    "immediate_actions": ["specific action 1", "specific action 2", "specific action 3"],
    "root_cause_hypothesis": "detailed technical explanation of likely root cause",
    "resolution_steps": ["detailed step 1 with commands", "detailed step 2 with commands", "step 3"],
    "preventive_measures": ["prevention 1", "prevention 2"],
    "estimated_resolution_time_minutes": 20,
    "confidence_score": 0.85,
    "confidence_reasoning": "explain why this confidence level based on similarity and past incidents",
    "similar_incident_references": ["INC-10001", "INC-10002"],
    "risk_assessment": "low or medium or high"
}}

Requirements:
- Be specific and actionable (include actual commands, configs, etc)
- confidence_score must be between 0 and 1
- Base confidence on similarity scores from search results
{grounding}
- estimated_resolution_time_minutes must be a realistic whole number of minutes, at least 1

Return ONLY the JSON object, no other text."#,
        description = description,
        analysis = record_json(record),
        evidence = format_evidence(evidence, excerpt_chars),
        grounding = grounding,
    )
}
