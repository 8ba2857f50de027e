use crate::models::{ClassificationRecord, Recommendation, RetrievedIncident, SearchPlan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use strum::{Display, EnumString};
use uuid::Uuid;

/// The four stages of a pipeline run, in execution order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display)]
pub enum Stage {
    #[strum(serialize = "analyze_incident")]
    #[serde(rename = "analyze_incident")]
    Extract,
    #[strum(serialize = "create_search_strategy")]
    #[serde(rename = "create_search_strategy")]
    Plan,
    #[strum(serialize = "execute_search")]
    #[serde(rename = "execute_search")]
    Retrieve,
    #[strum(serialize = "synthesize_resolution")]
    #[serde(rename = "synthesize_resolution")]
    Synthesize,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [Stage::Extract, Stage::Plan, Stage::Retrieve, Stage::Synthesize];

    /// Prefix used for this stage's entries in the error log
    pub fn error_label(&self) -> &'static str {
        match self {
            Stage::Extract => "Analysis parsing error",
            Stage::Plan => "Strategy error",
            Stage::Retrieve => "Search error",
            Stage::Synthesize => "Synthesis error",
        }
    }
}

/// Stage-completion marker appended to the step trace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStep {
    pub stage: Stage,
    pub elapsed_ms: u64,
    pub fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AgentStep {
    pub fn new(stage: Stage, elapsed: Duration, fallback: bool) -> Self {
        Self {
            stage,
            elapsed_ms: elapsed.as_millis() as u64,
            fallback,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for AgentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.elapsed_ms as f64 / 1000.0;
        match (&self.detail, self.fallback) {
            (Some(detail), true) => write!(f, "{} ({:.2}s, fallback, {})", self.stage, seconds, detail),
            (Some(detail), false) => write!(f, "{} ({:.2}s, {})", self.stage, seconds, detail),
            (None, true) => write!(f, "{} ({:.2}s, fallback)", self.stage, seconds),
            (None, false) => write!(f, "{} ({:.2}s)", self.stage, seconds),
        }
    }
}

/// Non-fatal failure recorded in a run's error log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage.error_label(), self.message)
    }
}

/// Result of one completed pipeline run.
///
/// Every artifact is present; stages that fell back contribute their fallback
/// artifact plus an entry in `errors`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub request_id: Uuid,
    pub incident_description: String,
    pub analysis: ClassificationRecord,
    pub search_plan: SearchPlan,
    pub search_results: Vec<RetrievedIncident>,
    pub recommendation: Recommendation,
    pub agent_steps: Vec<AgentStep>,
    pub errors: Vec<StageError>,
    pub processing_time_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl PipelineRun {
    /// Stages that substituted a fallback artifact
    pub fn fallback_stages(&self) -> Vec<Stage> {
        self.agent_steps
            .iter()
            .filter(|step| step.fallback)
            .map(|step| step.stage)
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Observable progress of a streaming run, emitted in pipeline order
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started { request_id: Uuid },
    Step(AgentStep),
    Analysis(ClassificationRecord),
    SearchPlan(SearchPlan),
    SearchResults(Vec<RetrievedIncident>),
    Recommendation(Recommendation),
    Completed(Box<PipelineRun>),
    Failed { error: String },
}

impl PipelineEvent {
    /// Short event name, used as the SSE event field
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::Started { .. } => "start",
            PipelineEvent::Step(_) => "step",
            PipelineEvent::Analysis(_) => "analysis",
            PipelineEvent::SearchPlan(_) => "search_plan",
            PipelineEvent::SearchResults(_) => "search_results",
            PipelineEvent::Recommendation(_) => "recommendation",
            PipelineEvent::Completed(_) => "complete",
            PipelineEvent::Failed { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Extract.to_string(), "analyze_incident");
        assert_eq!(Stage::Synthesize.to_string(), "synthesize_resolution");
        assert_eq!(
            serde_json::to_string(&Stage::Retrieve).unwrap(),
            "\"execute_search\""
        );
    }

    #[test]
    fn test_agent_step_display() {
        let step = AgentStep::new(Stage::Retrieve, Duration::from_millis(1250), false)
            .with_detail("3 results");
        assert_eq!(step.to_string(), "execute_search (1.25s, 3 results)");

        let fallback = AgentStep::new(Stage::Plan, Duration::from_millis(10), true);
        assert_eq!(fallback.to_string(), "create_search_strategy (0.01s, fallback)");
    }

    #[test]
    fn test_stage_error_display() {
        let error = StageError::new(Stage::Extract, "expected value at line 1 column 1");
        assert_eq!(
            error.to_string(),
            "Analysis parsing error: expected value at line 1 column 1"
        );
    }
}
