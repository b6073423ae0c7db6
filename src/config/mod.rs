use crate::services::pipeline::StageDeadlines;
use crate::services::pipeline::staging::MAX_STAGE_SIZE;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the video backend
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Largest accepted video upload in bytes (default: 10 GiB)
    pub max_upload_size: u64,

    /// Largest accepted thumbnail in bytes (default: 10 MiB)
    pub max_thumbnail_size: u64,

    pub probe_timeout_secs: u64,
    pub remux_timeout_secs: u64,
    pub publish_timeout_secs: u64,

    pub ffprobe_path: String,
    pub ffmpeg_path: String,

    /// Directory for staged uploads (default: system temp dir)
    pub upload_temp_dir: PathBuf,

    pub s3_bucket: String,
    pub s3_region: String,
    /// S3-compatible endpoint, e.g. MinIO. Unset means AWS.
    pub s3_endpoint: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    /// Base URL published objects are served from when not on AWS
    pub s3_public_base_url: Option<String>,

    /// JWT Secret Key (Required in production)
    pub jwt_secret: String,

    pub database_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_upload_size: MAX_STAGE_SIZE,
            max_thumbnail_size: 10 * 1024 * 1024,
            probe_timeout_secs: 5,
            remux_timeout_secs: 600,
            publish_timeout_secs: 60,
            ffprobe_path: "ffprobe".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            upload_temp_dir: env::temp_dir(),
            s3_bucket: "tubely-videos".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_endpoint: None,
            s3_access_key: None,
            s3_secret_key: None,
            s3_public_base_url: None,
            jwt_secret: "secret".to_string(),
            database_url: "sqlite://tubely.db?mode=rwc".to_string(),
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_upload_size: parsed("MAX_UPLOAD_SIZE", default.max_upload_size),
            max_thumbnail_size: parsed("MAX_THUMBNAIL_SIZE", default.max_thumbnail_size),
            probe_timeout_secs: parsed("PROBE_TIMEOUT_SECS", default.probe_timeout_secs),
            remux_timeout_secs: parsed("REMUX_TIMEOUT_SECS", default.remux_timeout_secs),
            publish_timeout_secs: parsed("PUBLISH_TIMEOUT_SECS", default.publish_timeout_secs),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or(default.ffprobe_path),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(default.ffmpeg_path),
            upload_temp_dir: env::var("UPLOAD_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_temp_dir),
            s3_bucket: env::var("S3_BUCKET").unwrap_or(default.s3_bucket),
            s3_region: env::var("S3_REGION").unwrap_or(default.s3_region),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            s3_access_key: env::var("S3_ACCESS_KEY").ok(),
            s3_secret_key: env::var("S3_SECRET_KEY").ok(),
            s3_public_base_url: env::var("S3_PUBLIC_BASE_URL").ok(),
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),
            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),
        }
    }

    /// Local setup: MinIO on localhost, SQLite file, short deadlines
    pub fn development() -> Self {
        Self {
            remux_timeout_secs: 120,
            s3_endpoint: Some("http://localhost:9000".to_string()),
            s3_access_key: Some("minioadmin".to_string()),
            s3_secret_key: Some("minioadmin".to_string()),
            s3_public_base_url: Some("http://localhost:9000/tubely-videos".to_string()),
            ..Self::default()
        }
    }

    /// Create config for production. The JWT secret must come from the environment.
    pub fn production() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("CRITICAL: JWT_SECRET must be set"))?;
        Ok(Self {
            jwt_secret,
            ..Self::from_env()
        })
    }

    /// Config for the server binary: development defaults with `--dev`,
    /// otherwise production, which refuses to start without `JWT_SECRET`.
    pub fn load(dev: bool) -> anyhow::Result<Self> {
        if dev {
            Ok(Self::development())
        } else {
            Self::production()
        }
    }

    pub fn stage_deadlines(&self) -> StageDeadlines {
        StageDeadlines {
            probe: Duration::from_secs(self.probe_timeout_secs),
            remux: Duration::from_secs(self.remux_timeout_secs),
            publish: Duration::from_secs(self.publish_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_upload_size, 10 << 30);
        assert_eq!(config.max_thumbnail_size, 10 * 1024 * 1024);
        assert_eq!(config.stage_deadlines(), StageDeadlines::default());
        assert!(config.s3_endpoint.is_none());
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.s3_endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.stage_deadlines().remux, Duration::from_secs(120));
        assert_eq!(config.max_upload_size, AppConfig::default().max_upload_size);
    }

    #[test]
    fn test_server_config_requires_jwt_secret() {
        unsafe { env::remove_var("JWT_SECRET") };
        let missing = AppConfig::load(false);

        unsafe { env::set_var("JWT_SECRET", "test_secret") };
        let present = AppConfig::load(false);
        unsafe { env::remove_var("JWT_SECRET") };

        assert!(missing.unwrap_err().to_string().contains("JWT_SECRET"));
        assert_eq!(present.unwrap().jwt_secret, "test_secret");
        assert!(AppConfig::load(true).is_ok());
    }

    #[test]
    fn test_from_env_ignores_unparsable_numbers() {
        unsafe { env::set_var("PROBE_TIMEOUT_SECS", "soon") };
        let config = AppConfig::from_env();
        unsafe { env::remove_var("PROBE_TIMEOUT_SECS") };
        assert_eq!(config.probe_timeout_secs, 5);
    }
}
