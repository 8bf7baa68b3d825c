use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

use crate::error::{ProxyError, Result};

pub const DEFAULT_PORT: &str = "8080";
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_LM_STUDIO_URL: &str = "http://127.0.0.1:1234/v1";

/// Where the proxy listens and where it forwards to.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Base URL of the SHENRON Python backend, without a trailing slash.
    pub backend_url: String,
    /// Base URL of LM Studio's OpenAI-compatible API, usually ending in `/v1`.
    pub lm_studio_url: String,
}

impl Config {
    pub fn new(port: u16, backend_url: impl Into<String>, lm_studio_url: impl Into<String>) -> Self {
        Self {
            port,
            backend_url: trim_base(backend_url.into()),
            lm_studio_url: trim_base(lm_studio_url.into()),
        }
    }

    /// Read `SHENRON_PROXY_PORT`, `SHENRON_BACKEND_URL` and
    /// `SHENRON_LM_STUDIO_URL`, falling back to local defaults.
    pub fn load() -> Result<Self> {
        Ok(Self::new(
            try_load("SHENRON_PROXY_PORT", DEFAULT_PORT)?,
            try_load::<String>("SHENRON_BACKEND_URL", DEFAULT_BACKEND_URL)?,
            try_load::<String>("SHENRON_LM_STUDIO_URL", DEFAULT_LM_STUDIO_URL)?,
        ))
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ProxyError::Config(format!("invalid {key} value '{raw}': {e}"))
    })
}
