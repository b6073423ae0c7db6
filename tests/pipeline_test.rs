mod common;

use common::{MockStorageService, entries, payload};
use rust_video_backend::services::media_tools::{MediaToolRunner, ScriptedToolRunner};
use rust_video_backend::services::pipeline::{
    PipelineError, Stage, StageDeadlines, StageManager, VideoPipeline,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    dir: TempDir,
    runner: Arc<ScriptedToolRunner>,
    storage: Arc<MockStorageService>,
    pipeline: VideoPipeline,
}

impl Harness {
    fn new(runner: ScriptedToolRunner, storage: MockStorageService) -> Self {
        Self::with_deadlines(runner, storage, StageDeadlines::default())
    }

    fn with_deadlines(
        runner: ScriptedToolRunner,
        storage: MockStorageService,
        deadlines: StageDeadlines,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(runner);
        let storage = Arc::new(storage);
        let pipeline = VideoPipeline::new(
            runner.clone() as Arc<dyn MediaToolRunner>,
            storage.clone(),
            StageManager::new(dir.path()),
            deadlines,
        );
        Self {
            dir,
            runner,
            storage,
            pipeline,
        }
    }

    fn assert_clean(&self) {
        assert_eq!(self.pipeline.staging().outstanding(), 0);
        assert_eq!(entries(self.dir.path()), 0, "temporary files left behind");
    }
}

#[tokio::test]
async fn test_landscape_upload_is_published() {
    let h = Harness::new(ScriptedToolRunner::landscape(), MockStorageService::new());
    let video = payload(5 * 1024 * 1024);

    let result = h
        .pipeline
        .run(&video[..], 10 << 30, "video/mp4", ".mp4")
        .await
        .unwrap();

    assert!(result.key.starts_with("landscape/"));
    assert!(result.key.ends_with(".mp4"));
    assert_eq!(
        result.url,
        format!("https://tubely-test.s3.us-east-1.amazonaws.com/{}", result.key)
    );

    let stored = h.storage.object(&result.key).unwrap();
    assert_eq!(stored.data, video);
    assert_eq!(stored.content_type, "video/mp4");

    assert_eq!(h.runner.probe_calls(), 1);
    assert_eq!(h.runner.remux_calls(), 1);
    h.assert_clean();
}

#[tokio::test]
async fn test_portrait_upload_is_published() {
    let h = Harness::new(ScriptedToolRunner::portrait(), MockStorageService::new());
    let video = payload(64 * 1024);

    let result = h
        .pipeline
        .run(&video[..], 10 << 30, "video/mp4", ".mp4")
        .await
        .unwrap();

    assert!(result.key.starts_with("portrait/"));
    h.assert_clean();
}

#[tokio::test]
async fn test_unusual_ratio_is_published_as_other() {
    let h = Harness::new(
        ScriptedToolRunner::with_dimensions(1000, 800),
        MockStorageService::new(),
    );
    let video = payload(4096);

    let result = h
        .pipeline
        .run(&video[..], 10 << 30, "video/mp4", ".mp4")
        .await
        .unwrap();

    assert!(result.key.starts_with("other/"));
    h.assert_clean();
}

#[tokio::test]
async fn test_probe_failure_stops_before_remux() {
    let h = Harness::new(
        ScriptedToolRunner::landscape().probe_exit(1, "Invalid data found when processing input"),
        MockStorageService::new(),
    );
    let garbage = payload(2048);

    let err = h
        .pipeline
        .run(&garbage[..], 10 << 30, "video/mp4", ".mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::ProbeFailed(_)));
    assert_eq!(err.stage(), Stage::Classification);
    assert_eq!(h.runner.remux_calls(), 0);
    assert!(h.storage.keys().is_empty());
    h.assert_clean();
}

#[tokio::test]
async fn test_audio_only_upload_has_no_video_stream() {
    let h = Harness::new(
        ScriptedToolRunner::with_probe_json(
            r#"{"streams":[{"index":0,"codec_type":"audio"}]}"#,
        ),
        MockStorageService::new(),
    );
    let audio = payload(1024);

    let err = h
        .pipeline
        .run(&audio[..], 10 << 30, "video/mp4", ".mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NoVideoStream));
    assert_eq!(err.stage(), Stage::Classification);
    h.assert_clean();
}

#[tokio::test]
async fn test_oversized_upload_never_reaches_tools() {
    let h = Harness::new(ScriptedToolRunner::landscape(), MockStorageService::new());
    let video = payload(2 * 1024 * 1024);

    let err = h
        .pipeline
        .run(&video[..], 1024 * 1024, "video/mp4", ".mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::SizeExceeded { limit } if limit == 1024 * 1024));
    assert_eq!(err.stage(), Stage::Staging);
    assert_eq!(h.runner.probe_calls(), 0);
    assert_eq!(h.runner.remux_calls(), 0);
    h.assert_clean();
}

#[tokio::test]
async fn test_upload_at_exact_limit_is_accepted() {
    let h = Harness::new(ScriptedToolRunner::landscape(), MockStorageService::new());
    let video = payload(1024 * 1024);

    let result = h
        .pipeline
        .run(&video[..], 1024 * 1024, "video/mp4", ".mp4")
        .await;

    assert!(result.is_ok());
    h.assert_clean();
}

#[tokio::test]
async fn test_remux_failure_carries_tool_stderr() {
    let h = Harness::new(
        ScriptedToolRunner::landscape().remux_exit(1, "moov atom not found"),
        MockStorageService::new(),
    );
    let video = payload(8192);

    let err = h
        .pipeline
        .run(&video[..], 10 << 30, "video/mp4", ".mp4")
        .await
        .unwrap_err();

    match &err {
        PipelineError::RemuxFailed { diagnostics, .. } => {
            assert!(diagnostics.contains("moov atom not found"));
        }
        other => panic!("expected RemuxFailed, got {:?}", other),
    }
    assert_eq!(err.stage(), Stage::Remux);
    assert!(h.storage.keys().is_empty());
    h.assert_clean();
}

#[tokio::test]
async fn test_publish_failure_cleans_up() {
    let h = Harness::new(ScriptedToolRunner::landscape(), MockStorageService::failing());
    let video = payload(8192);

    let err = h
        .pipeline
        .run(&video[..], 10 << 30, "video/mp4", ".mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::PublishFailed(ref msg) if msg.contains("AccessDenied")));
    assert_eq!(err.stage(), Stage::Publish);
    h.assert_clean();
}

#[tokio::test]
async fn test_probe_deadline_is_enforced() {
    let deadlines = StageDeadlines {
        probe: Duration::from_millis(50),
        ..StageDeadlines::default()
    };
    let h = Harness::with_deadlines(
        ScriptedToolRunner::landscape().probe_delay(Duration::from_secs(30)),
        MockStorageService::new(),
        deadlines,
    );
    let video = payload(1024);

    let err = h
        .pipeline
        .run(&video[..], 10 << 30, "video/mp4", ".mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::ProbeFailed(_)));
    assert_eq!(h.runner.remux_calls(), 0);
    h.assert_clean();
}

#[tokio::test]
async fn test_publish_deadline_is_enforced() {
    let deadlines = StageDeadlines {
        publish: Duration::from_millis(50),
        ..StageDeadlines::default()
    };
    let h = Harness::with_deadlines(
        ScriptedToolRunner::landscape(),
        MockStorageService::with_upload_delay(Duration::from_secs(30)),
        deadlines,
    );
    let video = payload(4096);

    let err = h
        .pipeline
        .run(&video[..], 10 << 30, "video/mp4", ".mp4")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::PublishFailed(ref msg) if msg.contains("timed out")));
    assert_eq!(err.stage(), Stage::Publish);
    assert_eq!(h.runner.remux_calls(), 1);
    assert!(h.storage.keys().is_empty());
    h.assert_clean();
}

#[tokio::test]
async fn test_cancelled_run_leaves_no_files() {
    let h = Harness::new(
        ScriptedToolRunner::landscape().remux_delay(Duration::from_secs(30)),
        MockStorageService::new(),
    );
    let video = payload(16 * 1024);

    let run = h.pipeline.run(&video[..], 10 << 30, "video/mp4", ".mp4");
    let outcome = tokio::time::timeout(Duration::from_millis(200), run).await;

    assert!(outcome.is_err(), "run should still be remuxing");
    assert_eq!(h.runner.remux_calls(), 1);
    assert!(h.storage.keys().is_empty());
    h.assert_clean();
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let h = Harness::new(ScriptedToolRunner::landscape(), MockStorageService::new());
    let videos: Vec<Vec<u8>> = (0..8).map(|i| payload(1024 + i * 97)).collect();

    let runs = videos
        .iter()
        .map(|video| h.pipeline.run(&video[..], 10 << 30, "video/mp4", ".mp4"));
    let results = futures::future::join_all(runs).await;

    let mut keys = HashSet::new();
    for (video, result) in videos.iter().zip(results) {
        let result = result.unwrap();
        assert_eq!(&h.storage.object(&result.key).unwrap().data, video);
        assert!(keys.insert(result.key));
    }
    h.assert_clean();
}
