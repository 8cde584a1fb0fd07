use std::env;
use thiserror::Error;

const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value of {0}: {1}")]
    Invalid(&'static str, String),
}

/// Process configuration, read once at startup and injected into services.
///
/// All store credentials are required; the process refuses to serve rather
/// than operate against an undefined bucket.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub region: String,
    pub key_id: String,
    pub secret_key: String,
    pub bucket: String,
    /// Frontend origin allowed by CORS. Unset means any origin.
    pub allowed_origin: Option<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: required("PAIL_S3_ENDPOINT")?,
            region: required("PAIL_S3_REGION")?,
            key_id: required("PAIL_S3_KEY_ID")?,
            secret_key: required("PAIL_S3_SECRET_KEY")?,
            bucket: required("PAIL_S3_BUCKET")?,
            allowed_origin: env::var("PAIL_ALLOWED_ORIGIN").ok(),
            port: match env::var("PAIL_PORT") {
                Ok(raw) => raw
                    .parse()
                    .map_err(|_| ConfigError::Invalid("PAIL_PORT", raw))?,
                Err(_) => DEFAULT_PORT,
            },
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}
