use clap::Parser;
use dotenvy::dotenv;
use rust_video_backend::config::AppConfig;
use rust_video_backend::infrastructure::{media_tools, storage};
use rust_video_backend::services::pipeline::{StageManager, VideoPipeline};
use rust_video_backend::services::storage::StorageService;
use rust_video_backend::utils::validation::{parse_media_type, video_extension};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Run the upload pipeline on a local file and print where it was published
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// MP4 file to publish
    file: PathBuf,

    /// Media type recorded on the published object
    #[arg(long, default_value = "video/mp4")]
    content_type: String,

    /// Use local development defaults instead of the environment
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "publish_video=info,rust_video_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let media_type = parse_media_type(&args.content_type)
        .ok_or_else(|| anyhow::anyhow!("invalid content type: {}", args.content_type))?;
    let extension = video_extension(&media_type)
        .ok_or_else(|| anyhow::anyhow!("unsupported content type: {}", media_type))?;

    let config = if args.dev {
        AppConfig::development()
    } else {
        AppConfig::from_env()
    };

    info!("📼 Publishing {}", args.file.display());

    let storage_service: Arc<dyn StorageService> = storage::setup_storage(&config).await;
    let runner = media_tools::setup_media_tools(&config).await;
    let pipeline = VideoPipeline::new(
        runner,
        storage_service,
        StageManager::new(&config.upload_temp_dir),
        config.stage_deadlines(),
    );

    let file = tokio::fs::File::open(&args.file).await?;
    let result = pipeline
        .run(file, config.max_upload_size, &media_type, extension)
        .await
        .map_err(|e| anyhow::anyhow!("{} stage: {}", e.stage(), e))?;

    info!("✅ Published {}", result.key);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
