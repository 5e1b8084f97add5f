use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::automation::engine::DEFAULT_TOPIC_VARIATIONS;
use crate::publish::graph_api::DEFAULT_GRAPH_API_BASE;
use crate::publish::{PublishConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_NOT_READY_CODE};

/// Where generated media is stored.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Local { root: PathBuf },
    S3 {
        bucket: String,
        endpoint: String,
        access_key_id: String,
        secret_access_key: String,
    },
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    /// Unset disables AI image modes; they then resolve to no URL.
    pub openai_api_key: Option<String>,
    pub storage: StorageBackend,
    pub media_public_base_url: String,
    pub graph_api_base: String,
    pub publish_max_attempts: u32,
    pub publish_retry_delay: Duration,
    pub publish_not_ready_code: i64,
    pub sweep_interval: Duration,
    pub http_timeout: Duration,
    pub packs_path: Option<PathBuf>,
    pub placeholder_image_url: Option<String>,
    pub topic_variations: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage = match optional_env("STORAGE_BACKEND").as_deref().unwrap_or("local") {
            "local" => StorageBackend::Local {
                root: PathBuf::from(
                    optional_env("LOCAL_MEDIA_DIR").unwrap_or_else(|| "./media".to_string()),
                ),
            },
            "s3" => StorageBackend::S3 {
                bucket: require_env("S3_BUCKET")?,
                endpoint: require_env("S3_ENDPOINT")?,
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            },
            other => bail!("STORAGE_BACKEND must be 'local' or 's3', got '{other}'"),
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            openai_api_key: optional_env("OPENAI_API_KEY"),
            storage,
            media_public_base_url: optional_env("MEDIA_PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8080/media".to_string()),
            graph_api_base: optional_env("GRAPH_API_BASE")
                .unwrap_or_else(|| DEFAULT_GRAPH_API_BASE.to_string()),
            publish_max_attempts: parse_env("PUBLISH_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            publish_retry_delay: Duration::from_secs(parse_env("PUBLISH_RETRY_DELAY_SECS", 4)?),
            publish_not_ready_code: parse_env("PUBLISH_NOT_READY_CODE", DEFAULT_NOT_READY_CODE)?,
            sweep_interval: Duration::from_secs(parse_env::<u64>("SWEEP_INTERVAL_SECS", 60)?.max(1)),
            http_timeout: Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 30)?),
            packs_path: optional_env("PACKS_PATH").map(PathBuf::from),
            placeholder_image_url: optional_env("PLACEHOLDER_IMAGE_URL"),
            topic_variations: parse_env("TOPIC_VARIATIONS", DEFAULT_TOPIC_VARIATIONS)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn publish_config(&self) -> PublishConfig {
        PublishConfig {
            max_attempts: self.publish_max_attempts,
            retry_delay: self.publish_retry_delay,
            not_ready_code: self.publish_not_ready_code,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and empty are treated the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
