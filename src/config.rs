use std::net::SocketAddr;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 60;

/// Return the first non-empty (trimmed) value among the given environment keys.
pub fn env_var_first_nonempty(keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Ok(value) = std::env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Runtime configuration, resolved once at startup.
///
/// A missing model key is not fatal: the server still starts and the affected
/// endpoints answer "API key not configured".
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub speech_api_key: Option<String>,
    pub chat_model: String,
    pub image_model: String,
    pub bind_addr: SocketAddr,
    pub upstream_timeout: Duration,
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Failed to read .env: {}", e),
        }
        Self::from_lookup(env_var_first_nonempty)
    }

    /// Resolve configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&[&str]) -> Option<String>,
    {
        let gemini_api_key = lookup(&["GEMINI_API_KEY"]);
        let speech_api_key = lookup(&["GOOGLE_CLOUD_API_KEY", "GEMINI_API_KEY"]);

        let bind_raw = lookup(&["NIETO_BIND_ADDR"]).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_raw.parse().map_err(|_| {
            AppError::Configuration(format!("NIETO_BIND_ADDR is not a socket address: {bind_raw}"))
        })?;

        let upstream_timeout = match lookup(&["NIETO_UPSTREAM_TIMEOUT_SECS"]) {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    AppError::Configuration(format!("NIETO_UPSTREAM_TIMEOUT_SECS must be a number: {raw}"))
                })?;
                if secs == 0 {
                    return Err(AppError::Configuration(
                        "NIETO_UPSTREAM_TIMEOUT_SECS must be greater than zero".into(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        };

        Ok(Self {
            gemini_api_key,
            speech_api_key,
            chat_model: lookup(&["NIETO_CHAT_MODEL"]).unwrap_or_else(|| DEFAULT_CHAT_MODEL.into()),
            image_model: lookup(&["NIETO_IMAGE_MODEL"]).unwrap_or_else(|| DEFAULT_IMAGE_MODEL.into()),
            bind_addr,
            upstream_timeout,
        })
    }
}
