use tokio::io::AsyncRead;
use tracing::info;

use crate::services::pipeline::{
    PipelineError, PublishKey, PublishResult, Publisher, StageDeadlines, StageManager,
};

/// Key namespace for published thumbnails
pub const THUMBNAIL_PREFIX: &str = "thumbnails/";

/// Publishes still images as-is. No probing or remuxing.
#[derive(Clone)]
pub struct ThumbnailService {
    staging: StageManager,
    publisher: Publisher,
    deadlines: StageDeadlines,
}

impl ThumbnailService {
    pub fn new(staging: StageManager, publisher: Publisher, deadlines: StageDeadlines) -> Self {
        Self {
            staging,
            publisher,
            deadlines,
        }
    }

    pub async fn publish<R>(
        &self,
        source: R,
        size_limit: u64,
        content_type: &str,
        extension: &str,
    ) -> Result<PublishResult, PipelineError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut staged = self.staging.stage(source, size_limit, extension).await?;
        info!("Staged thumbnail ({} bytes)", staged.size());

        let key = PublishKey::with_prefix(THUMBNAIL_PREFIX, extension);
        let published = self
            .publisher
            .publish(&staged, &key, content_type, self.deadlines.publish)
            .await;

        self.staging.release(&mut staged);
        published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::StorageService;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingStorage {
        keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StorageService for RecordingStorage {
        async fn upload_file(&self, key: &str, path: &Path, _content_type: &str) -> Result<()> {
            assert!(path.exists());
            self.keys.lock().unwrap().push(key.to_string());
            Ok(())
        }
        fn public_url(&self, key: &str) -> String {
            format!("https://cdn.test/{}", key)
        }
    }

    #[tokio::test]
    async fn test_thumbnail_published_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StageManager::new(dir.path());
        let storage = Arc::new(RecordingStorage::default());
        let service = ThumbnailService::new(
            staging.clone(),
            Publisher::new(storage.clone()),
            StageDeadlines::default(),
        );

        let png = b"\x89PNG\r\n\x1a\n fake image".to_vec();
        let result = service
            .publish(&png[..], 1024, "image/png", ".png")
            .await
            .unwrap();

        assert!(result.key.starts_with(THUMBNAIL_PREFIX));
        assert!(result.key.ends_with(".png"));
        assert_eq!(result.url, format!("https://cdn.test/{}", result.key));
        assert_eq!(storage.keys.lock().unwrap().len(), 1);
        assert_eq!(staging.outstanding(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_thumbnail_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StageManager::new(dir.path());
        let storage = Arc::new(RecordingStorage::default());
        let service = ThumbnailService::new(
            staging.clone(),
            Publisher::new(storage.clone()),
            StageDeadlines::default(),
        );

        let big = vec![0u8; 2048];
        let err = service
            .publish(&big[..], 1024, "image/jpeg", ".jpg")
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::SizeExceeded { limit: 1024 }));
        assert!(storage.keys.lock().unwrap().is_empty());
        assert_eq!(staging.outstanding(), 0);
    }
}
