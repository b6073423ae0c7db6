use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Files above this size are sent as a multipart upload
const MULTIPART_THRESHOLD: u64 = 64 * 1024 * 1024;

/// Size of each multipart chunk
const PART_SIZE: usize = 16 * 1024 * 1024;

/// Public URL of an object.
///
/// Without a configured base this is the virtual-hosted AWS form
/// `https://{bucket}.s3.{region}.amazonaws.com/{key}`; S3-compatible
/// backends supply their own base and get `{base}/{key}`.
pub fn public_object_url(
    bucket: &str,
    region: &str,
    public_base_url: Option<&str>,
    key: &str,
) -> String {
    match public_base_url {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

/// Open multipart upload that is aborted when dropped unless disarmed
struct MultipartAbortGuard {
    upload_id: String,
    abort: Option<Box<dyn FnOnce(String) + Send>>,
}

impl MultipartAbortGuard {
    fn new(upload_id: String, abort: impl FnOnce(String) + Send + 'static) -> Self {
        Self {
            upload_id,
            abort: Some(Box::new(abort)),
        }
    }

    fn upload_id(&self) -> &str {
        &self.upload_id
    }

    fn disarm(mut self) {
        self.abort.take();
    }
}

impl Drop for MultipartAbortGuard {
    fn drop(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort(std::mem::take(&mut self.upload_id));
        }
    }
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Store the file at `path` under `key`. The object only becomes visible
    /// once the whole upload has succeeded.
    async fn upload_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()>;
    fn public_url(&self, key: &str) -> String;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
    region: String,
    public_base_url: Option<String>,
}

impl S3StorageService {
    pub fn new(
        client: Client,
        bucket: String,
        region: String,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            client,
            bucket,
            region,
            public_base_url,
        }
    }

    async fn upload_multipart(&self, key: &str, path: &Path, content_type: &str) -> Result<()> {
        let multipart_upload_res = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await?;

        let upload_id = multipart_upload_res
            .upload_id()
            .ok_or_else(|| anyhow!("No upload ID"))?
            .to_string();

        // Armed until completion succeeds: errors, deadlines and cancellation all abort
        let guard = MultipartAbortGuard::new(upload_id, self.abort_fn(key));

        let completed_parts = self.upload_parts(key, guard.upload_id(), path).await?;
        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(guard.upload_id())
            .multipart_upload(completed_multipart_upload)
            .send()
            .await?;

        guard.disarm();
        Ok(())
    }

    /// Sends `AbortMultipartUpload` in the background. Runs from `Drop`, so it
    /// cannot await the request itself.
    fn abort_fn(&self, key: &str) -> impl FnOnce(String) + Send + 'static {
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let key = key.to_string();

        move |upload_id| {
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                tracing::warn!(
                    "No runtime to abort multipart upload {} for {}",
                    upload_id,
                    key
                );
                return;
            };

            handle.spawn(async move {
                match client
                    .abort_multipart_upload()
                    .bucket(&bucket)
                    .key(&key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    Ok(_) => tracing::info!("Aborted multipart upload {} for {}", upload_id, key),
                    Err(e) => tracing::warn!(
                        "Failed to abort multipart upload {} for {}: {}",
                        upload_id,
                        key,
                        e
                    ),
                }
            });
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        path: &Path,
    ) -> Result<Vec<CompletedPart>> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut chunk_index = 1;
        let mut completed_parts = Vec::new();
        let mut buffer = vec![0u8; PART_SIZE];

        loop {
            let mut n = 0;
            while n < PART_SIZE {
                let read = file.read(&mut buffer[n..]).await?;
                if read == 0 {
                    break;
                }
                n += read;
            }

            if n == 0 {
                break;
            }

            let upload_part_res = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .body(ByteStream::from(buffer[..n].to_vec()))
                .part_number(chunk_index)
                .send()
                .await?;

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(upload_part_res.e_tag().unwrap_or_default())
                    .part_number(chunk_index)
                    .build(),
            );

            chunk_index += 1;
        }

        Ok(completed_parts)
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn upload_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()> {
        let size = tokio::fs::metadata(path).await?.len();
        if size > MULTIPART_THRESHOLD {
            tracing::debug!("Uploading {} ({} bytes) in parts", key, size);
            return self.upload_multipart(key, path, content_type).await;
        }

        let body = ByteStream::from_path(path).await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        public_object_url(
            &self.bucket,
            &self.region,
            self.public_base_url.as_deref(),
            key,
        )
    }
}
