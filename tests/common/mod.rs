#![allow(dead_code)]

use async_trait::async_trait;
use rust_video_backend::services::storage::{StorageService, public_object_url};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

pub const TEST_BUCKET: &str = "tubely-test";
pub const TEST_REGION: &str = "us-east-1";

/// Stored object: bytes and the content type it was uploaded with
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

pub struct MockStorageService {
    files: Mutex<HashMap<String, StoredObject>>,
    fail_uploads: bool,
    upload_delay: Option<Duration>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            fail_uploads: false,
            upload_delay: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            fail_uploads: true,
            upload_delay: None,
        }
    }

    /// Uploads that stall for `delay` before anything is stored
    pub fn with_upload_delay(delay: Duration) -> Self {
        Self {
            upload_delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.files.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn upload_file(&self, key: &str, path: &Path, content_type: &str) -> anyhow::Result<()> {
        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_uploads {
            return Err(anyhow::anyhow!("AccessDenied: bucket policy rejects writes"));
        }
        let data = tokio::fs::read(path).await?;
        self.files.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        public_object_url(TEST_BUCKET, TEST_REGION, None, key)
    }
}

/// Number of entries left in a directory
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

/// Deterministic pseudo-video payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
