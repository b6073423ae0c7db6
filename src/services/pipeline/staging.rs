use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::error::PipelineError;

/// Hard ceiling on a single staged upload: 10 GiB
pub const MAX_STAGE_SIZE: u64 = 10 << 30;

const STAGE_PREFIX: &str = "tubely-upload";

/// Local temporary copy of an upload (or of a file derived from one).
///
/// The backing file is deleted by [`StagedArtifact::release`] or, failing
/// that, when the artifact is dropped. Releasing twice is a no-op.
pub struct StagedArtifact {
    path: PathBuf,
    file: Option<File>,
    temp_path: Option<TempPath>,
    size: u64,
    outstanding: Option<Arc<AtomicUsize>>,
}

/// Output of the remuxer; tracked and released exactly like the original upload
pub type RemuxedArtifact = StagedArtifact;

impl StagedArtifact {
    fn new(temp_path: TempPath, file: Option<File>, outstanding: Arc<AtomicUsize>) -> Self {
        outstanding.fetch_add(1, Ordering::SeqCst);
        Self {
            path: temp_path.to_path_buf(),
            file,
            temp_path: Some(temp_path),
            size: 0,
            outstanding: Some(outstanding),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.temp_path.is_none()
    }

    /// Read handle positioned at the start of the staged bytes
    pub fn file_mut(&mut self) -> Option<&mut File> {
        self.file.as_mut()
    }

    /// Close the handle and delete the backing file. A file that is already
    /// gone is not an error.
    pub fn release(&mut self) {
        self.file.take();

        let Some(temp_path) = self.temp_path.take() else {
            return;
        };

        if let Err(e) = temp_path.close()
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!("Failed to delete staged file {}: {}", self.path.display(), e);
        }

        if let Some(outstanding) = self.outstanding.take() {
            outstanding.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for StagedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedArtifact")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("open", &self.is_open())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Creates staged artifacts in one directory and keeps count of the ones
/// not yet released.
#[derive(Clone)]
pub struct StageManager {
    temp_dir: PathBuf,
    outstanding: Arc<AtomicUsize>,
}

impl StageManager {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            outstanding: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Number of artifacts created by this manager and not yet released
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Copy `source` into a new temporary file, failing with `SizeExceeded`
    /// as soon as it yields more than `size_limit` bytes. The returned
    /// artifact's handle is rewound to the start.
    pub async fn stage<R>(
        &self,
        mut source: R,
        size_limit: u64,
        extension: &str,
    ) -> Result<StagedArtifact, PipelineError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let limit = size_limit.min(MAX_STAGE_SIZE);

        // Creating the file is a blocking syscall
        let temp_dir = self.temp_dir.clone();
        let suffix = extension.to_string();
        let (file, temp_path) = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(STAGE_PREFIX)
                .suffix(&suffix)
                .tempfile_in(&temp_dir)
        })
        .await
        .map_err(std::io::Error::other)??
        .into_parts();

        let mut artifact = StagedArtifact::new(
            temp_path,
            Some(File::from_std(file)),
            self.outstanding.clone(),
        );

        let Some(file) = artifact.file_mut() else {
            return Err(PipelineError::StagingFailed(std::io::Error::other(
                "staged file handle missing",
            )));
        };

        let mut bounded = (&mut source).take(limit.saturating_add(1));
        let written = tokio::io::copy(&mut bounded, file).await?;
        if written > limit {
            tracing::warn!("Upload rejected: more than {} bytes", limit);
            return Err(PipelineError::SizeExceeded { limit });
        }

        file.flush().await?;
        file.seek(SeekFrom::Start(0)).await?;
        artifact.set_size(written);

        tracing::debug!(
            "Staged {} bytes at {}",
            written,
            artifact.path().display()
        );
        Ok(artifact)
    }

    /// Take ownership of a file another step writes to (or will write to).
    /// The path does not need to exist yet.
    pub fn adopt(&self, path: impl Into<PathBuf>) -> StagedArtifact {
        StagedArtifact::new(TempPath::from_path(path), None, self.outstanding.clone())
    }

    pub fn release(&self, artifact: &mut StagedArtifact) {
        artifact.release();
    }
}
