use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use super::error::PipelineError;
use super::key::PublishKey;
use super::staging::StagedArtifact;
use crate::services::storage::StorageService;

/// Where a finished artifact ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PublishResult {
    pub url: String,
    pub key: String,
}

/// Uploads finished artifacts to object storage. Never retries.
#[derive(Clone)]
pub struct Publisher {
    storage: Arc<dyn StorageService>,
}

impl Publisher {
    pub fn new(storage: Arc<dyn StorageService>) -> Self {
        Self { storage }
    }

    pub async fn publish(
        &self,
        artifact: &StagedArtifact,
        key: &PublishKey,
        content_type: &str,
        deadline: Duration,
    ) -> Result<PublishResult, PipelineError> {
        let upload = self
            .storage
            .upload_file(key.as_str(), artifact.path(), content_type);

        match tokio::time::timeout(deadline, upload).await {
            Ok(Ok(())) => {
                tracing::info!("Published {} ({} bytes)", key, artifact.size());
                Ok(PublishResult {
                    url: self.storage.public_url(key.as_str()),
                    key: key.to_string(),
                })
            }
            Ok(Err(e)) => {
                tracing::error!("Upload of {} failed: {:?}", key, e);
                Err(PipelineError::PublishFailed(format!("{:#}", e)))
            }
            Err(_) => Err(PipelineError::PublishFailed(format!(
                "upload timed out after {:?}",
                deadline
            ))),
        }
    }
}
