use std::fmt;
use thiserror::Error;

/// Pipeline step in which a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Staging,
    Classification,
    Remux,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Stage::Staging => "staging",
            Stage::Classification => "classification",
            Stage::Remux => "remux",
            Stage::Publish => "publish",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("upload exceeds the maximum size of {limit} bytes")]
    SizeExceeded { limit: u64 },

    #[error("failed to stage upload: {0}")]
    StagingFailed(#[from] std::io::Error),

    #[error("media probe failed: {0}")]
    ProbeFailed(String),

    #[error("no video stream found")]
    NoVideoStream,

    #[error("remux failed ({reason}): {diagnostics}")]
    RemuxFailed { reason: String, diagnostics: String },

    #[error("publish failed: {0}")]
    PublishFailed(String),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::SizeExceeded { .. } | PipelineError::StagingFailed(_) => Stage::Staging,
            PipelineError::ProbeFailed(_) | PipelineError::NoVideoStream => Stage::Classification,
            PipelineError::RemuxFailed { .. } => Stage::Remux,
            PipelineError::PublishFailed(_) => Stage::Publish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_stage_identity() {
        assert_eq!(
            PipelineError::SizeExceeded { limit: 1 }.stage(),
            Stage::Staging
        );
        assert_eq!(PipelineError::NoVideoStream.stage(), Stage::Classification);
        assert_eq!(
            PipelineError::ProbeFailed("exit code 1".into()).stage(),
            Stage::Classification
        );
        assert_eq!(
            PipelineError::PublishFailed("timeout".into()).stage(),
            Stage::Publish
        );
    }

    #[test]
    fn test_remux_error_carries_diagnostics() {
        let err = PipelineError::RemuxFailed {
            reason: "exit code 1".into(),
            diagnostics: "moov atom not found".into(),
        };
        assert_eq!(err.stage(), Stage::Remux);
        assert!(err.to_string().contains("moov atom not found"));
    }
}
