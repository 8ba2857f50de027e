/// Multi-stage incident analysis pipeline
///
/// Each request runs four dependent stages:
/// - Extraction: free text to a validated classification record
/// - Planning: classification to a retrieval plan
/// - Retrieval: one hybrid lexical/vector query against the document store
/// - Synthesis: classification plus evidence to a recommendation
///
/// Malformed model output and store failures fall back to fixed artifacts and
/// are logged in the run; failed model calls abort the run.

pub mod error;
pub mod extractor;
pub mod orchestrator;
pub mod outcome;
pub mod planner;
pub mod prompts;
pub mod retrieval;
pub mod state;
pub mod synthesizer;
pub mod validation;

pub use error::PipelineError;
pub use extractor::Extractor;
pub use orchestrator::Pipeline;
pub use outcome::StageOutcome;
pub use planner::Planner;
pub use retrieval::RetrievalEngine;
pub use state::Phase;
pub use synthesizer::Synthesizer;
pub use validation::{parse_model_json, strip_code_fences, ValidationError};
