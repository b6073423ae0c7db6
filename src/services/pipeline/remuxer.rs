use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::error::PipelineError;
use super::staging::{RemuxedArtifact, StageManager};
use crate::services::media_tools::MediaToolRunner;

/// Appended to the input path to name the fast-start copy
pub const REMUX_SUFFIX: &str = ".processing";

pub fn remux_output_path(input: &Path) -> PathBuf {
    let mut path = OsString::from(input.as_os_str());
    path.push(REMUX_SUFFIX);
    PathBuf::from(path)
}

/// Rewrites a staged file with its index at the front, copying streams as-is
#[derive(Clone)]
pub struct Remuxer {
    runner: Arc<dyn MediaToolRunner>,
    staging: StageManager,
}

impl Remuxer {
    pub fn new(runner: Arc<dyn MediaToolRunner>, staging: StageManager) -> Self {
        Self { runner, staging }
    }

    pub async fn remux(
        &self,
        input: &Path,
        deadline: Duration,
    ) -> Result<RemuxedArtifact, PipelineError> {
        let output_path = remux_output_path(input);

        // Adopt before running so a partial output is removed on every failure path
        let mut artifact = self.staging.adopt(&output_path);

        let output = match tokio::time::timeout(
            deadline,
            self.runner.faststart(input, &output_path),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(PipelineError::RemuxFailed {
                    reason: format!("could not run remuxer: {}", e),
                    diagnostics: String::new(),
                });
            }
            Err(_) => {
                return Err(PipelineError::RemuxFailed {
                    reason: format!("timed out after {:?}", deadline),
                    diagnostics: String::new(),
                });
            }
        };

        if !output.success() {
            let diagnostics = output.stderr_text();
            tracing::error!("ffmpeg failed with {}: {}", output.status_text(), diagnostics);
            return Err(PipelineError::RemuxFailed {
                reason: output.status_text(),
                diagnostics,
            });
        }

        let metadata = tokio::fs::metadata(&output_path)
            .await
            .map_err(|e| PipelineError::RemuxFailed {
                reason: format!("no output written: {}", e),
                diagnostics: output.stderr_text(),
            })?;
        artifact.set_size(metadata.len());

        Ok(artifact)
    }
}
