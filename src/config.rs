//! Configuration management for the redate server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::age::AgeUpPolicy;
use crate::patch::{FontResolver, DEFAULT_FONT_PATHS};
use crate::session::{DEFAULT_CLEANUP_SECS, DEFAULT_TTL_MINUTES};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub sessions: SessionConfig,
    pub processing: ProcessingConfig,
    pub age_up: AgeUpPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty means any
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Parent directory of the per-session working directories
    pub work_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ttl_minutes: i64,
    pub cleanup_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    pub timeout_secs: u64,
    pub font_paths: Vec<PathBuf>,
}

impl ProcessingConfig {
    pub fn font_resolver(&self) -> FontResolver {
        FontResolver::new(self.font_paths.iter().cloned())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                cors_origins: Vec::new(),
                max_upload_bytes: 50 * 1024 * 1024,
            },
            storage: StorageConfig {
                work_dir: env::temp_dir().join("redate-server"),
            },
            sessions: SessionConfig {
                ttl_minutes: DEFAULT_TTL_MINUTES,
                cleanup_secs: DEFAULT_CLEANUP_SECS,
            },
            processing: ProcessingConfig {
                timeout_secs: 60,
                font_paths: DEFAULT_FONT_PATHS.iter().map(PathBuf::from).collect(),
            },
            age_up: AgeUpPolicy::default(),
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", key, value);
            default
        }),
        Err(_) => default,
    }
}

fn list(key: &str, separator: char) -> Option<Vec<String>> {
    env::var(key).ok().map(|value| {
        value
            .split(separator)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
}

impl Config {
    /// Read configuration from the environment, falling back to defaults per key
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = Config::default();
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parsed("SERVER_PORT", defaults.server.port),
                cors_origins: list("CORS_ORIGINS", ',').unwrap_or(defaults.server.cors_origins),
                max_upload_bytes: parsed("MAX_UPLOAD_BYTES", defaults.server.max_upload_bytes),
            },
            storage: StorageConfig {
                work_dir: env::var("WORK_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.work_dir),
            },
            sessions: SessionConfig {
                ttl_minutes: parsed("SESSION_TTL_MINUTES", defaults.sessions.ttl_minutes),
                cleanup_secs: parsed("SESSION_CLEANUP_SECS", defaults.sessions.cleanup_secs),
            },
            processing: ProcessingConfig {
                timeout_secs: parsed("PROCESS_TIMEOUT_SECS", defaults.processing.timeout_secs),
                font_paths: list("FONT_PATHS", ':')
                    .map(|paths| paths.into_iter().map(PathBuf::from).collect())
                    .unwrap_or(defaults.processing.font_paths),
            },
            age_up: AgeUpPolicy {
                min_year: parsed("AGE_UP_MIN_YEAR", defaults.age_up.min_year),
                max_year: parsed("AGE_UP_MAX_YEAR", defaults.age_up.max_year),
                target_year: parsed("AGE_UP_TARGET_YEAR", defaults.age_up.target_year),
            },
        })
    }
}
