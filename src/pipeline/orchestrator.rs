use crate::config::PipelineConfig;
use crate::llm::{Embedder, TextGenerator};
use crate::metrics::PIPELINE_RUNS_TOTAL;
use crate::models::{PipelineEvent, PipelineRun};
use crate::pipeline::error::PipelineError;
use crate::pipeline::extractor::Extractor;
use crate::pipeline::planner::Planner;
use crate::pipeline::retrieval::RetrievalEngine;
use crate::pipeline::state::RunState;
use crate::pipeline::synthesizer::Synthesizer;
use crate::search::{DocumentStore, QueryBuilder};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, Instrument};
use uuid::Uuid;

/// Buffered events per streaming run
const EVENT_BUFFER: usize = 16;

/// Runs extract → plan → retrieve → synthesize for one description at a time.
///
/// Holds no per-request state, so one instance serves concurrent requests.
pub struct Pipeline {
    extractor: Extractor,
    planner: Planner,
    retrieval: RetrievalEngine,
    synthesizer: Synthesizer,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        query_builder: QueryBuilder,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            extractor: Extractor::new(generator.clone()),
            planner: Planner::new(generator.clone()),
            retrieval: RetrievalEngine::new(store, embedder, query_builder),
            synthesizer: Synthesizer::new(
                generator,
                config.evidence_limit,
                config.resolution_excerpt_chars,
            ),
        }
    }

    /// Analyze one incident description
    pub async fn run(&self, description: &str) -> Result<PipelineRun, PipelineError> {
        let request_id = Uuid::new_v4();
        self.execute(request_id, description, None)
            .instrument(tracing::info_span!("pipeline", %request_id))
            .await
    }

    /// Analyze one description, emitting each stage's artifacts as soon as
    /// they are produced.
    ///
    /// The stream ends with [`PipelineEvent::Completed`] or
    /// [`PipelineEvent::Failed`].
    pub fn run_streaming(self: Arc<Self>, description: String) -> ReceiverStream<PipelineEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let request_id = Uuid::new_v4();

        tokio::spawn(
            async move {
                let event = match self.execute(request_id, &description, Some(&tx)).await {
                    Ok(run) => PipelineEvent::Completed(Box::new(run)),
                    Err(e) => PipelineEvent::Failed {
                        error: e.to_string(),
                    },
                };
                let _ = tx.send(event).await;
            }
            .instrument(tracing::info_span!("pipeline", %request_id, streaming = true)),
        );

        ReceiverStream::new(rx)
    }

    async fn execute(
        &self,
        request_id: Uuid,
        description: &str,
        events: Option<&mpsc::Sender<PipelineEvent>>,
    ) -> Result<PipelineRun, PipelineError> {
        let result = self.stages(request_id, description, events).await;

        match &result {
            Ok(run) => {
                let outcome = if run.is_degraded() { "degraded" } else { "complete" };
                PIPELINE_RUNS_TOTAL.with_label_values(&[outcome]).inc();
                info!(
                    processing_time_ms = run.processing_time_ms,
                    errors = run.errors.len(),
                    confidence = run.recommendation.confidence_score,
                    "Pipeline run complete"
                );
            }
            Err(e) => {
                PIPELINE_RUNS_TOTAL.with_label_values(&["failed"]).inc();
                error!(error = %e, "Pipeline run failed");
            }
        }

        result
    }

    async fn stages(
        &self,
        request_id: Uuid,
        description: &str,
        events: Option<&mpsc::Sender<PipelineEvent>>,
    ) -> Result<PipelineRun, PipelineError> {
        let mut state = RunState::new(request_id, description);
        emit(events, PipelineEvent::Started { request_id }).await;
        info!("Starting incident analysis");

        let start = Instant::now();
        let outcome = self.extractor.extract(state.description()).await?;
        let step = state.record_analysis(outcome, start.elapsed())?;
        info!(step = %step, "Stage complete");
        emit(events, PipelineEvent::Step(step)).await;
        if let Some(record) = state.analysis() {
            emit(events, PipelineEvent::Analysis(record.clone())).await;
        }

        let start = Instant::now();
        let outcome = match state.analysis() {
            Some(record) => self.planner.plan(record).await?,
            None => return Err(missing(&state)),
        };
        let step = state.record_plan(outcome, start.elapsed())?;
        info!(step = %step, "Stage complete");
        emit(events, PipelineEvent::Step(step)).await;
        if let Some(plan) = state.search_plan() {
            emit(events, PipelineEvent::SearchPlan(plan.clone())).await;
        }

        let start = Instant::now();
        let outcome = match (state.search_plan(), state.analysis()) {
            (Some(plan), Some(record)) => {
                self.retrieval
                    .retrieve(plan, state.description(), record)
                    .await?
            }
            _ => return Err(missing(&state)),
        };
        let step = state.record_results(outcome, start.elapsed())?;
        info!(step = %step, "Stage complete");
        emit(events, PipelineEvent::Step(step)).await;
        if let Some(results) = state.search_results() {
            emit(events, PipelineEvent::SearchResults(results.to_vec())).await;
        }

        let start = Instant::now();
        let outcome = match (state.analysis(), state.search_results()) {
            (Some(record), Some(results)) => {
                self.synthesizer
                    .synthesize(state.description(), record, results)
                    .await?
            }
            _ => return Err(missing(&state)),
        };
        let step = state.record_recommendation(outcome, start.elapsed())?;
        info!(step = %step, "Stage complete");
        emit(events, PipelineEvent::Step(step)).await;
        if let Some(recommendation) = state.recommendation() {
            emit(events, PipelineEvent::Recommendation(recommendation.clone())).await;
        }

        state.finish()
    }
}

/// A stage input that should already exist does not
fn missing(state: &RunState) -> PipelineError {
    let from = state.phase();
    PipelineError::InvalidTransition {
        from,
        to: from.next().unwrap_or(from),
    }
}

/// Send to the stream, if any. A dropped receiver does not stop the run.
async fn emit(events: Option<&mpsc::Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
