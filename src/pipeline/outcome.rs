/// Non-fatal result of one stage.
///
/// Fatal failures travel separately as `Err(PipelineError)`, so a stage
/// returns `Result<StageOutcome<T>, PipelineError>`.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// The stage produced a validated artifact
    Completed(T),

    /// The stage substituted its fallback artifact
    Fallback { artifact: T, reason: String },
}

impl<T> StageOutcome<T> {
    pub fn fallback(artifact: T, reason: impl Into<String>) -> Self {
        StageOutcome::Fallback {
            artifact,
            reason: reason.into(),
        }
    }

    pub fn artifact(&self) -> &T {
        match self {
            StageOutcome::Completed(artifact) => artifact,
            StageOutcome::Fallback { artifact, .. } => artifact,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, StageOutcome::Fallback { .. })
    }

    /// Split into the artifact and the fallback reason, if any
    pub fn into_parts(self) -> (T, Option<String>) {
        match self {
            StageOutcome::Completed(artifact) => (artifact, None),
            StageOutcome::Fallback { artifact, reason } => (artifact, Some(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_parts() {
        let completed = StageOutcome::Completed(3);
        assert!(!completed.is_fallback());
        assert_eq!(completed.into_parts(), (3, None));

        let fallback = StageOutcome::fallback(0, "bad json");
        assert!(fallback.is_fallback());
        assert_eq!(*fallback.artifact(), 0);
        assert_eq!(fallback.into_parts(), (0, Some("bad json".to_string())));
    }
}
