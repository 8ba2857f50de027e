//! Fatal pipeline failures

use crate::llm::LlmError;
use crate::models::Stage;
use crate::pipeline::state::Phase;

/// A condition with no safe fallback artifact.
///
/// Returning one of these aborts the run; the caller gets no partial result.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The text generation call itself failed
    #[error("Generation failed during {stage}: {source}")]
    Generation {
        stage: Stage,
        #[source]
        source: LlmError,
    },

    /// The query embedding could not be computed
    #[error("Embedding failed: {0}")]
    Embedding(#[source] LlmError),

    /// The orchestrator attempted an out-of-order transition
    #[error("Invalid pipeline transition from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },
}

impl PipelineError {
    pub fn generation(stage: Stage, source: LlmError) -> Self {
        PipelineError::Generation { stage, source }
    }
}
