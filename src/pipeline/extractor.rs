use crate::llm::TextGenerator;
use crate::models::{ClassificationRecord, Stage};
use crate::pipeline::error::PipelineError;
use crate::pipeline::outcome::StageOutcome;
use crate::pipeline::prompts::extraction_prompt;
use crate::pipeline::validation::{excerpt, parse_model_json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns free-text incident descriptions into classification records
pub struct Extractor {
    generator: Arc<dyn TextGenerator>,
}

impl Extractor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Classify an incident description.
    ///
    /// Unparseable output yields [`ClassificationRecord::fallback`]; a failed
    /// generation call is fatal.
    pub async fn extract(
        &self,
        description: &str,
    ) -> Result<StageOutcome<ClassificationRecord>, PipelineError> {
        let raw = self
            .generator
            .generate(&extraction_prompt(description))
            .await
            .map_err(|e| PipelineError::generation(Stage::Extract, e))?;

        match parse_model_json::<ClassificationRecord>(&raw) {
            Ok(record) => {
                info!(
                    severity = %record.severity,
                    incident_type = %record.incident_type,
                    urgency = record.urgency_score,
                    "Incident classified"
                );
                Ok(StageOutcome::Completed(record))
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse classification; using fallback record");
                debug!(output = %excerpt(&raw, 500), "Rejected classification output");
                Ok(StageOutcome::fallback(
                    ClassificationRecord::fallback(),
                    e.to_string(),
                ))
            }
        }
    }
}
