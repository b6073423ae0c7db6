use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::error::PipelineError;
use crate::services::media_tools::MediaToolRunner;

/// Pixel ratios within this distance of 16:9 or 9:16 count as exact matches
const RATIO_TOLERANCE: f64 = 0.01;

/// Coarse orientation of an uploaded video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectClass {
    Landscape,
    Portrait,
    Other,
}

impl AspectClass {
    /// Classification of an explicit display aspect ratio string
    pub fn from_ratio_label(label: &str) -> Self {
        match label {
            "16:9" => AspectClass::Landscape,
            "9:16" => AspectClass::Portrait,
            _ => AspectClass::Other,
        }
    }

    /// Classification from pixel dimensions, `None` when neither standard ratio matches
    pub fn from_dimensions(width: i64, height: i64) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }
        let ratio = width as f64 / height as f64;
        if (ratio - 16.0 / 9.0).abs() < RATIO_TOLERANCE {
            Some(AspectClass::Landscape)
        } else if (ratio - 9.0 / 16.0).abs() < RATIO_TOLERANCE {
            Some(AspectClass::Portrait)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AspectClass::Landscape => "16:9",
            AspectClass::Portrait => "9:16",
            AspectClass::Other => "other",
        }
    }

    /// Storage key prefix for published objects of this orientation
    pub fn prefix(&self) -> &'static str {
        match self {
            AspectClass::Landscape => "landscape/",
            AspectClass::Portrait => "portrait/",
            AspectClass::Other => "other/",
        }
    }
}

impl fmt::Display for AspectClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeOutput {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub display_aspect_ratio: Option<String>,
}

/// Classify a parsed stream listing.
///
/// The first video stream with an explicit display aspect ratio decides.
/// Without one, a stream whose pixel ratio matches 16:9 or 9:16 decides. A
/// video stream with usable dimensions that matches neither only yields
/// `Other` once no later stream classifies.
pub fn classify_streams(streams: &[ProbeStream]) -> Result<AspectClass, PipelineError> {
    let mut saw_sized_video = false;

    for stream in streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("video"))
    {
        if let Some(ratio) = stream
            .display_aspect_ratio
            .as_deref()
            .filter(|r| !r.is_empty())
        {
            return Ok(AspectClass::from_ratio_label(ratio));
        }

        if let (Some(width), Some(height)) = (stream.width, stream.height)
            && width > 0
            && height > 0
        {
            saw_sized_video = true;
            if let Some(class) = AspectClass::from_dimensions(width, height) {
                return Ok(class);
            }
        }
    }

    if saw_sized_video {
        Ok(AspectClass::Other)
    } else {
        Err(PipelineError::NoVideoStream)
    }
}

pub fn classify_probe_output(stdout: &[u8]) -> Result<AspectClass, PipelineError> {
    let output: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| PipelineError::ProbeFailed(format!("unreadable probe output: {}", e)))?;
    classify_streams(&output.streams)
}

/// Derives the orientation of a staged file by running the probe tool on it
#[derive(Clone)]
pub struct AspectClassifier {
    runner: Arc<dyn MediaToolRunner>,
}

impl AspectClassifier {
    pub fn new(runner: Arc<dyn MediaToolRunner>) -> Self {
        Self { runner }
    }

    pub async fn classify(
        &self,
        path: &Path,
        deadline: Duration,
    ) -> Result<AspectClass, PipelineError> {
        let output = match tokio::time::timeout(deadline, self.runner.probe(path)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(PipelineError::ProbeFailed(format!(
                    "could not run probe: {}",
                    e
                )));
            }
            Err(_) => {
                return Err(PipelineError::ProbeFailed(format!(
                    "probe timed out after {:?}",
                    deadline
                )));
            }
        };

        if !output.success() {
            return Err(PipelineError::ProbeFailed(format!(
                "probe exited with {}: {}",
                output.status_text(),
                output.stderr_text()
            )));
        }

        classify_probe_output(&output.stdout)
    }
}
