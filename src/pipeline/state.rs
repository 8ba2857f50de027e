//! Per-run state threaded through the stages by the orchestrator

use crate::metrics::record_stage;
use crate::models::{
    AgentStep, ClassificationRecord, PipelineRun, Recommendation, RetrievedIncident, SearchPlan,
    Stage, StageError,
};
use crate::pipeline::error::PipelineError;
use crate::pipeline::outcome::StageOutcome;
use chrono::Utc;
use serde::Serialize;
use std::time::{Duration, Instant};
use strum::Display;
use uuid::Uuid;

/// Position of a run in the linear stage sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Start,
    Extracted,
    Planned,
    Retrieved,
    Synthesized,
    Done,
}

impl Phase {
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Start => Some(Phase::Extracted),
            Phase::Extracted => Some(Phase::Planned),
            Phase::Planned => Some(Phase::Retrieved),
            Phase::Retrieved => Some(Phase::Synthesized),
            Phase::Synthesized => Some(Phase::Done),
            Phase::Done => None,
        }
    }

    /// Phase reached once `stage` has completed
    pub fn after(stage: Stage) -> Phase {
        match stage {
            Stage::Extract => Phase::Extracted,
            Stage::Plan => Phase::Planned,
            Stage::Retrieve => Phase::Retrieved,
            Stage::Synthesize => Phase::Synthesized,
        }
    }
}

/// Mutable state of one run. Only the orchestrator touches it, and only
/// between stages.
pub(crate) struct RunState {
    request_id: Uuid,
    description: String,
    started: Instant,
    phase: Phase,
    analysis: Option<ClassificationRecord>,
    search_plan: Option<SearchPlan>,
    search_results: Option<Vec<RetrievedIncident>>,
    recommendation: Option<Recommendation>,
    agent_steps: Vec<AgentStep>,
    errors: Vec<StageError>,
}

impl RunState {
    pub fn new(request_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            request_id,
            description: description.into(),
            started: Instant::now(),
            phase: Phase::Start,
            analysis: None,
            search_plan: None,
            search_results: None,
            recommendation: None,
            agent_steps: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn advance(&mut self, to: Phase) -> Result<(), PipelineError> {
        if self.phase.next() != Some(to) {
            return Err(PipelineError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// Log a stage's outcome and advance past it, returning the artifact and step
    fn complete<T>(
        &mut self,
        stage: Stage,
        outcome: StageOutcome<T>,
        elapsed: Duration,
        detail: impl FnOnce(&T) -> Option<String>,
    ) -> Result<(T, AgentStep), PipelineError> {
        self.advance(Phase::after(stage))?;

        let (artifact, reason) = outcome.into_parts();
        let fallback = reason.is_some();
        if let Some(reason) = reason {
            self.errors.push(StageError::new(stage, reason));
        }

        let mut step = AgentStep::new(stage, elapsed, fallback);
        if let Some(detail) = detail(&artifact) {
            step = step.with_detail(detail);
        }
        self.agent_steps.push(step.clone());
        record_stage(&stage.to_string(), fallback, elapsed);

        Ok((artifact, step))
    }

    pub fn record_analysis(
        &mut self,
        outcome: StageOutcome<ClassificationRecord>,
        elapsed: Duration,
    ) -> Result<AgentStep, PipelineError> {
        let (record, step) = self.complete(Stage::Extract, outcome, elapsed, |_| None)?;
        self.analysis = Some(record);
        Ok(step)
    }

    pub fn record_plan(
        &mut self,
        outcome: StageOutcome<SearchPlan>,
        elapsed: Duration,
    ) -> Result<AgentStep, PipelineError> {
        let (plan, step) = self.complete(Stage::Plan, outcome, elapsed, |_| None)?;
        self.search_plan = Some(plan);
        Ok(step)
    }

    pub fn record_results(
        &mut self,
        outcome: StageOutcome<Vec<RetrievedIncident>>,
        elapsed: Duration,
    ) -> Result<AgentStep, PipelineError> {
        let (results, step) = self.complete(Stage::Retrieve, outcome, elapsed, |results| {
            Some(format!("{} results", results.len()))
        })?;
        self.search_results = Some(results);
        Ok(step)
    }

    pub fn record_recommendation(
        &mut self,
        outcome: StageOutcome<Recommendation>,
        elapsed: Duration,
    ) -> Result<AgentStep, PipelineError> {
        let (recommendation, step) =
            self.complete(Stage::Synthesize, outcome, elapsed, |recommendation| {
                Some(format!("confidence {:.2}", recommendation.confidence_score))
            })?;
        self.recommendation = Some(recommendation);
        Ok(step)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn analysis(&self) -> Option<&ClassificationRecord> {
        self.analysis.as_ref()
    }

    pub fn search_plan(&self) -> Option<&SearchPlan> {
        self.search_plan.as_ref()
    }

    pub fn search_results(&self) -> Option<&[RetrievedIncident]> {
        self.search_results.as_deref()
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        self.recommendation.as_ref()
    }

    /// Enter `Done` and assemble the final run
    pub fn finish(mut self) -> Result<PipelineRun, PipelineError> {
        let from = self.phase;
        self.advance(Phase::Done)?;

        let missing = PipelineError::InvalidTransition {
            from,
            to: Phase::Done,
        };
        match (
            self.analysis,
            self.search_plan,
            self.search_results,
            self.recommendation,
        ) {
            (Some(analysis), Some(search_plan), Some(search_results), Some(recommendation)) => {
                Ok(PipelineRun {
                    request_id: self.request_id,
                    incident_description: self.description,
                    analysis,
                    search_plan,
                    search_results,
                    recommendation,
                    agent_steps: self.agent_steps,
                    errors: self.errors,
                    processing_time_ms: self.started.elapsed().as_millis() as u64,
                    completed_at: Utc::now(),
                })
            }
            _ => Err(missing),
        }
    }
}
