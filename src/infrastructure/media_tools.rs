use crate::config::AppConfig;
use crate::services::media_tools::{FfmpegToolRunner, MediaToolRunner};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn setup_media_tools(config: &AppConfig) -> Arc<dyn MediaToolRunner> {
    let runner = FfmpegToolRunner::new(&config.ffprobe_path, &config.ffmpeg_path);

    if runner.health_check().await {
        info!(
            "🎬 Media tools ready ({} / {})",
            config.ffprobe_path, config.ffmpeg_path
        );
    } else {
        warn!(
            "⚠️  Media tools unavailable ({} / {}). Video uploads will fail until they are installed.",
            config.ffprobe_path, config.ffmpeg_path
        );
    }

    Arc::new(runner)
}
