//! Validation of model output, independent of the model call

use serde::de::DeserializeOwned;
use validator::Validate;

/// Model output that does not conform to the expected schema
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("empty model output")]
    Empty,

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Schema(#[from] validator::ValidationErrors),
}

/// Remove a Markdown code fence (```` ```json ```` or ```` ``` ````) around the payload
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse and validate a JSON object emitted by the model
pub fn parse_model_json<T>(raw: &str) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Validate,
{
    let payload = strip_code_fences(raw);
    if payload.is_empty() {
        return Err(ValidationError::Empty);
    }

    let value: T = serde_json::from_str(payload)?;
    value.validate()?;
    Ok(value)
}

/// Shorten model output for logging
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
