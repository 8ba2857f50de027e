use crate::llm::TextGenerator;
use crate::models::{
    ClassificationRecord, Recommendation, RetrievedIncident, Stage, NO_EVIDENCE_CONFIDENCE_CAP,
};
use crate::pipeline::error::PipelineError;
use crate::pipeline::outcome::StageOutcome;
use crate::pipeline::prompts::synthesis_prompt;
use crate::pipeline::validation::{excerpt, parse_model_json};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns classification plus evidence into a remediation plan
pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
    evidence_limit: usize,
    excerpt_chars: usize,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, evidence_limit: usize, excerpt_chars: usize) -> Self {
        Self {
            generator,
            evidence_limit,
            excerpt_chars,
        }
    }

    /// Produce a recommendation from the top retrieved incidents.
    ///
    /// Unusable output yields [`Recommendation::fallback`]; a failed generation
    /// call is fatal.
    pub async fn synthesize(
        &self,
        description: &str,
        record: &ClassificationRecord,
        results: &[RetrievedIncident],
    ) -> Result<StageOutcome<Recommendation>, PipelineError> {
        let evidence = &results[..results.len().min(self.evidence_limit)];
        let prompt = synthesis_prompt(description, record, evidence, self.excerpt_chars);

        let raw = self
            .generator
            .generate(&prompt)
            .await
            .map_err(|e| PipelineError::generation(Stage::Synthesize, e))?;

        match parse_model_json::<Recommendation>(&raw) {
            Ok(recommendation) => {
                let recommendation = ground(recommendation, results);
                info!(
                    confidence = recommendation.confidence_score,
                    references = recommendation.similar_incident_references.len(),
                    risk = %recommendation.risk_assessment,
                    "Resolution synthesized"
                );
                Ok(StageOutcome::Completed(recommendation))
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse recommendation; using fallback");
                debug!(output = %excerpt(&raw, 500), "Rejected recommendation output");
                Ok(StageOutcome::fallback(Recommendation::fallback(), e.to_string()))
            }
        }
    }
}

/// Tie a recommendation to the evidence it was given.
///
/// References to incidents outside the retrieved set are dropped, and
/// confidence is capped when there was nothing to ground on.
fn ground(mut recommendation: Recommendation, results: &[RetrievedIncident]) -> Recommendation {
    let known: HashSet<&str> = results.iter().map(|r| r.incident_id.as_str()).collect();

    let before = recommendation.similar_incident_references.len();
    let mut seen = HashSet::new();
    recommendation
        .similar_incident_references
        .retain(|id| known.contains(id.as_str()) && seen.insert(id.clone()));
    let dropped = before - recommendation.similar_incident_references.len();
    if dropped > 0 {
        warn!(dropped, "Dropped references to incidents outside the retrieved set");
    }

    if results.is_empty() && recommendation.confidence_score > NO_EVIDENCE_CONFIDENCE_CAP {
        debug!(
            confidence = recommendation.confidence_score,
            cap = NO_EVIDENCE_CONFIDENCE_CAP,
            "Capping confidence for evidence-free recommendation"
        );
        recommendation.confidence_score = NO_EVIDENCE_CONFIDENCE_CAP;
    }

    recommendation
}
