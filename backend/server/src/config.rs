use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

use crate::pipeline::Compatibility;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Failed to read secret {name}: {source}")]
    Secret {
        name: &'static str,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Redis,
    Memory,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: Backend,
    pub redis_url: String,
    pub meili_url: String,
    pub compatibility: Compatibility,
    pub require_session: bool,
    pub allowed_origin: String,
    pub seed_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("RUST_PORT", "4000")?,
            backend: try_load("STORE_BACKEND", "redis")?,
            redis_url: try_load("REDIS_URL", "redis://redis:6379")?,
            meili_url: try_load("MEILI_URL", "http://meilisearch:7700")?,
            compatibility: try_load("PIPELINE_COMPAT", "corrected")?,
            require_session: try_load("REQUIRE_SESSION", "false")?,
            allowed_origin: try_load("ALLOWED_ORIGIN", "http://localhost:3000")?,
            seed_file: var("SEED_FILE").ok().map(PathBuf::from),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            backend: Backend::Memory,
            redis_url: "redis://redis:6379".to_string(),
            meili_url: "http://meilisearch:7700".to_string(),
            compatibility: Compatibility::Corrected,
            require_session: false,
            allowed_origin: "http://localhost:3000".to_string(),
            seed_file: None,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}

pub fn read_secret(secret_name: &'static str) -> Result<String, ConfigError> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|source| {
            warn!("Failed to read {secret_name} from file: {source}");
            ConfigError::Secret {
                name: secret_name,
                source,
            }
        })
}
