//! Runtime configuration
//!
//! Every setting comes from an environment variable with a default, so the
//! tool runs with no configuration at all.

use std::path::PathBuf;
use std::time::Duration;

use crate::collab::signing::generate_secret;
use crate::db::{Database, DEFAULT_BUSY_TIMEOUT};
use crate::error::{EngineError, EngineResult};

const ENV_DB: &str = "CONTRACTCMD_DB";
const ENV_BLOB_DIR: &str = "CONTRACTCMD_BLOB_DIR";
const ENV_PRESIGN_TTL: &str = "CONTRACTCMD_PRESIGN_TTL_MINUTES";
const ENV_PRESIGN_SECRET: &str = "CONTRACTCMD_PRESIGN_SECRET";
const ENV_WEBHOOK_URL: &str = "CONTRACTCMD_WEBHOOK_URL";
const ENV_CONFLICT_RETRIES: &str = "CONTRACTCMD_CONFLICT_RETRIES";
const ENV_BUSY_TIMEOUT: &str = "CONTRACTCMD_BUSY_TIMEOUT_MS";
const ENV_LOG_JSON: &str = "CONTRACTCMD_LOG_JSON";

pub const DEFAULT_PRESIGN_TTL_MINUTES: u32 = 15;
pub const DEFAULT_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    /// None keeps attachments in memory for the life of the process.
    pub blob_dir: Option<PathBuf>,
    pub presign_ttl_minutes: u32,
    pub presign_secret: String,
    pub webhook_url: Option<String>,
    pub conflict_retries: u32,
    pub busy_timeout: Duration,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> EngineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = match get(ENV_DB) {
            Some(p) => PathBuf::from(p),
            None => Database::default_path().ok_or_else(|| {
                EngineError::validation(format!(
                    "cannot determine config directory; set {}",
                    ENV_DB
                ))
            })?,
        };

        let blob_dir = get(ENV_BLOB_DIR).map(PathBuf::from).or_else(|| {
            dirs::data_dir().map(|dir| dir.join("contractcmd").join("blobs"))
        });

        let busy_ms = parse_number(ENV_BUSY_TIMEOUT, get(ENV_BUSY_TIMEOUT))?
            .map(|ms: u64| Duration::from_millis(ms))
            .unwrap_or(DEFAULT_BUSY_TIMEOUT);

        Ok(Self {
            db_path,
            blob_dir,
            presign_ttl_minutes: parse_number(ENV_PRESIGN_TTL, get(ENV_PRESIGN_TTL))?
                .unwrap_or(DEFAULT_PRESIGN_TTL_MINUTES),
            presign_secret: get(ENV_PRESIGN_SECRET).unwrap_or_else(generate_secret),
            webhook_url: get(ENV_WEBHOOK_URL),
            conflict_retries: parse_number(ENV_CONFLICT_RETRIES, get(ENV_CONFLICT_RETRIES))?
                .unwrap_or(DEFAULT_CONFLICT_RETRIES),
            busy_timeout: busy_ms,
            log_json: get(ENV_LOG_JSON)
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: Option<String>) -> EngineResult<Option<T>> {
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| EngineError::validation(format!("{} must be a non-negative integer, got '{}'", key, v)))
        })
        .transpose()
}
