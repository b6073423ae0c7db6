//! Upload-to-publish pipeline for videos.
//!
//! A run stages the uploaded bytes to a temporary file, classifies the
//! video's orientation with a probe, rewrites the container for fast start,
//! and publishes the rewritten file to object storage under an
//! orientation-prefixed random key. Both local files are deleted on every
//! exit path, including cancellation of the run.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tracing::Instrument;
use uuid::Uuid;

pub mod classifier;
pub mod error;
pub mod key;
pub mod publisher;
pub mod remuxer;
pub mod staging;

pub use classifier::{AspectClass, AspectClassifier};
pub use error::{PipelineError, Stage};
pub use key::PublishKey;
pub use publisher::{PublishResult, Publisher};
pub use remuxer::Remuxer;
pub use staging::{RemuxedArtifact, StageManager, StagedArtifact};

use crate::services::media_tools::MediaToolRunner;
use crate::services::storage::StorageService;

/// Independent time budget for each suspending step of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDeadlines {
    pub probe: Duration,
    pub remux: Duration,
    pub publish: Duration,
}

impl Default for StageDeadlines {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(5),
            remux: Duration::from_secs(10 * 60),
            publish: Duration::from_secs(60),
        }
    }
}

/// Progress of a single run. Linear; `Failed` absorbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Staged,
    Classified,
    Remuxed,
    Published,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone)]
pub struct VideoPipeline {
    staging: StageManager,
    classifier: AspectClassifier,
    remuxer: Remuxer,
    publisher: Publisher,
    deadlines: StageDeadlines,
}

impl VideoPipeline {
    pub fn new(
        runner: Arc<dyn MediaToolRunner>,
        storage: Arc<dyn StorageService>,
        staging: StageManager,
        deadlines: StageDeadlines,
    ) -> Self {
        Self {
            classifier: AspectClassifier::new(runner.clone()),
            remuxer: Remuxer::new(runner, staging.clone()),
            publisher: Publisher::new(storage),
            staging,
            deadlines,
        }
    }

    pub fn staging(&self) -> &StageManager {
        &self.staging
    }

    /// Stage, classify, remux and publish one upload.
    ///
    /// Errors come back exactly as the failing step raised them, so
    /// [`PipelineError::stage`] identifies where the run stopped.
    pub async fn run<R>(
        &self,
        source: R,
        size_limit: u64,
        content_type: &str,
        extension: &str,
    ) -> Result<PublishResult, PipelineError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let span = tracing::info_span!("video_pipeline", run_id = %Uuid::new_v4());

        async {
            match self.run_stages(source, size_limit, content_type, extension).await {
                Ok(result) => {
                    transition(PipelineState::Done);
                    Ok(result)
                }
                Err(e) => {
                    tracing::warn!(
                        state = %PipelineState::Failed,
                        stage = %e.stage(),
                        "Pipeline failed: {}",
                        e
                    );
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stages<R>(
        &self,
        source: R,
        size_limit: u64,
        content_type: &str,
        extension: &str,
    ) -> Result<PublishResult, PipelineError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut original = self.staging.stage(source, size_limit, extension).await?;
        transition(PipelineState::Staged);

        let outcome = self
            .process_staged(&original, content_type, extension)
            .await;

        self.staging.release(&mut original);
        outcome
    }

    async fn process_staged(
        &self,
        original: &StagedArtifact,
        content_type: &str,
        extension: &str,
    ) -> Result<PublishResult, PipelineError> {
        let aspect = self
            .classifier
            .classify(original.path(), self.deadlines.probe)
            .await?;
        transition(PipelineState::Classified);
        tracing::info!("Classified upload as {}", aspect);

        let mut remuxed = self
            .remuxer
            .remux(original.path(), self.deadlines.remux)
            .await?;
        transition(PipelineState::Remuxed);

        let key = PublishKey::for_aspect(aspect, extension);
        let published = self
            .publisher
            .publish(&remuxed, &key, content_type, self.deadlines.publish)
            .await;

        self.staging.release(&mut remuxed);

        let published = published?;
        transition(PipelineState::Published);
        Ok(published)
    }
}

fn transition(state: PipelineState) {
    tracing::debug!(state = %state, "Pipeline state changed");
}
