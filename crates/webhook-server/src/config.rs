//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_POOL_SIZE: usize = 20;

/// Webhook server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// SQLite connection pool size.
    pub pool_size: u32,
    /// Directory holding uploaded image files.
    pub upload_dir: PathBuf,
    /// Largest accepted uploaded file.
    pub max_upload_bytes: usize,
    /// Largest accepted request body (webhook payloads carry base64 images).
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `WEBHOOK_ADDR` | Server bind address | `127.0.0.1:8790` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:pcf.db?mode=rwc` |
    /// | `DB_POOL_SIZE` | Connection pool size | `20` |
    /// | `UPLOAD_DIR` | Uploaded image directory | `uploads` |
    /// | `MAX_UPLOAD_BYTES` | Per-file upload limit | `10485760` |
    /// | `MAX_BODY_BYTES` | Request body limit | `52428800` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("WEBHOOK_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8790".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url =
            env::var("SQLITE_PATH").unwrap_or_else(|_| "sqlite:pcf.db?mode=rwc".to_string());

        let pool_size = positive("DB_POOL_SIZE", DEFAULT_POOL_SIZE)?;
        let pool_size =
            u32::try_from(pool_size).map_err(|_| ConfigError::Invalid("DB_POOL_SIZE"))?;

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let max_upload_bytes = positive("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let max_body_bytes = positive("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?;

        Ok(Self {
            addr,
            database_url,
            pool_size,
            upload_dir,
            max_upload_bytes,
            max_body_bytes: max_body_bytes.max(max_upload_bytes),
        })
    }

    /// Configuration for tests: in-memory database, uploads under `upload_dir`.
    pub fn for_tests(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: "sqlite::memory:".to_string(),
            pool_size: DEFAULT_POOL_SIZE as u32,
            upload_dir: upload_dir.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

fn positive(var: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or(ConfigError::Invalid(var)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid WEBHOOK_ADDR format")]
    InvalidAddr,

    #[error("{0} must be a positive number")]
    Invalid(&'static str),
}
