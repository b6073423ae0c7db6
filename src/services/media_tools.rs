use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::process::Command;

/// Captured result of one external tool invocation
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn status_text(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "termination by signal".to_string(),
        }
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

impl From<std::process::Output> for ToolOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Runs the external media tools the upload pipeline depends on.
///
/// Implementations must not apply their own deadlines: callers wrap each
/// invocation in `tokio::time::timeout`, and dropping the returned future
/// must stop the underlying process.
#[async_trait]
pub trait MediaToolRunner: Send + Sync {
    /// Stream listing of `path` as ffprobe-style JSON on stdout
    async fn probe(&self, path: &Path) -> std::io::Result<ToolOutput>;

    /// Copy every stream of `input` into `output` with the index moved to the front
    async fn faststart(&self, input: &Path, output: &Path) -> std::io::Result<ToolOutput>;

    /// Check that the tools can be executed at all
    async fn health_check(&self) -> bool;
}

/// Shells out to the `ffprobe` and `ffmpeg` binaries
pub struct FfmpegToolRunner {
    ffprobe_path: PathBuf,
    ffmpeg_path: PathBuf,
}

impl FfmpegToolRunner {
    pub fn new(ffprobe_path: impl Into<PathBuf>, ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    fn command(program: &Path) -> Command {
        let mut command = Command::new(program);
        command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    async fn version_ok(program: &Path) -> bool {
        match Self::command(program).arg("-version").output().await {
            Ok(output) => output.status.success(),
            Err(e) => {
                tracing::debug!("{} -version failed: {}", program.display(), e);
                false
            }
        }
    }
}

#[async_trait]
impl MediaToolRunner for FfmpegToolRunner {
    async fn probe(&self, path: &Path) -> std::io::Result<ToolOutput> {
        let output = Self::command(&self.ffprobe_path)
            .arg("-v")
            .arg("error")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg(path)
            .output()
            .await?;
        Ok(output.into())
    }

    async fn faststart(&self, input: &Path, output: &Path) -> std::io::Result<ToolOutput> {
        let result = Self::command(&self.ffmpeg_path)
            .arg("-i")
            .arg(input)
            .arg("-c")
            .arg("copy")
            .arg("-movflags")
            .arg("faststart")
            .arg("-f")
            .arg("mp4")
            .arg(output)
            .output()
            .await?;
        Ok(result.into())
    }

    async fn health_check(&self) -> bool {
        Self::version_ok(&self.ffprobe_path).await && Self::version_ok(&self.ffmpeg_path).await
    }
}

/// Scripted tool runner for tests and local development without ffmpeg.
///
/// `probe` answers with the configured JSON and exit code. `faststart`
/// copies the input to the output path unless a failing exit code is
/// scripted, in which case it leaves a partial output behind like a crashed
/// ffmpeg would.
pub struct ScriptedToolRunner {
    probe_output: ToolOutput,
    remux_output: ToolOutput,
    probe_delay: Option<Duration>,
    remux_delay: Option<Duration>,
    probe_calls: AtomicUsize,
    remux_calls: AtomicUsize,
}

impl ScriptedToolRunner {
    /// Runner whose probe reports the given JSON document
    pub fn with_probe_json(json: impl Into<String>) -> Self {
        Self {
            probe_output: ToolOutput {
                exit_code: Some(0),
                stdout: json.into().into_bytes(),
                stderr: Vec::new(),
            },
            remux_output: ToolOutput {
                exit_code: Some(0),
                ..Default::default()
            },
            probe_delay: None,
            remux_delay: None,
            probe_calls: AtomicUsize::new(0),
            remux_calls: AtomicUsize::new(0),
        }
    }

    /// Runner that reports one video stream with the given dimensions
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self::with_probe_json(format!(
            r#"{{"streams":[{{"index":0,"codec_type":"video","width":{},"height":{}}}]}}"#,
            width, height
        ))
    }

    pub fn landscape() -> Self {
        Self::with_dimensions(1920, 1080)
    }

    pub fn portrait() -> Self {
        Self::with_dimensions(1080, 1920)
    }

    pub fn probe_exit(mut self, code: i32, stderr: &str) -> Self {
        self.probe_output = ToolOutput {
            exit_code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        };
        self
    }

    pub fn remux_exit(mut self, code: i32, stderr: &str) -> Self {
        self.remux_output = ToolOutput {
            exit_code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        };
        self
    }

    pub fn probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    pub fn remux_delay(mut self, delay: Duration) -> Self {
        self.remux_delay = Some(delay);
        self
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn remux_calls(&self) -> usize {
        self.remux_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaToolRunner for ScriptedToolRunner {
    async fn probe(&self, _path: &Path) -> std::io::Result<ToolOutput> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.probe_output.clone())
    }

    async fn faststart(&self, input: &Path, output: &Path) -> std::io::Result<ToolOutput> {
        self.remux_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.remux_output.clone();

        if scripted.success() {
            tokio::fs::copy(input, output).await?;
        } else {
            tokio::fs::write(output, b"partial").await?;
        }

        if let Some(delay) = self.remux_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(scripted)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
