//! Upstream failure classification.
//!
//! Pure functions over a normalized [`ErrorDescriptor`]. The upstream client
//! reports throttling inconsistently (sometimes a 429 status, sometimes only
//! prose in the message), so rate-limit detection is a list of independent
//! predicates OR-ed together.

use std::sync::OnceLock;

use regex::Regex;

use super::provider::UpstreamError;
use crate::error::AppError;

/// Delay recommended when the upstream gives no retry hint.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Message tokens that indicate throttling (matched case-insensitively).
const RATE_LIMIT_TOKENS: &[&str] = &["429", "too many requests", "quota", "resource_exhausted"];

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimit { retry_after_secs: u64 },
    General,
}

/// The three views of an error the classifier inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDescriptor {
    pub status: Option<u16>,
    pub message: String,
    /// Serialized form of the whole error.
    pub serialized: String,
}

impl ErrorDescriptor {
    pub fn new(status: Option<u16>, message: impl Into<String>, serialized: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            serialized: serialized.into(),
        }
    }
}

impl From<&UpstreamError> for ErrorDescriptor {
    fn from(err: &UpstreamError) -> Self {
        Self {
            status: err.status,
            message: err.message.clone(),
            serialized: err.serialized(),
        }
    }
}

impl From<&AppError> for ErrorDescriptor {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::Upstream(upstream) => upstream.into(),
            AppError::Http(e) => Self {
                status: e.status().map(|s| s.as_u16()),
                message: err.to_string(),
                serialized: serde_json::to_string(err).unwrap_or_default(),
            },
            other => Self {
                status: None,
                message: other.to_string(),
                serialized: serde_json::to_string(other).unwrap_or_default(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

type Predicate = fn(&ErrorDescriptor) -> bool;

fn status_is_429(e: &ErrorDescriptor) -> bool {
    e.status == Some(429)
}

fn message_has_token(e: &ErrorDescriptor) -> bool {
    let lower = e.message.to_lowercase();
    RATE_LIMIT_TOKENS.iter().any(|t| lower.contains(t))
}

fn serialized_mentions_rate(e: &ErrorDescriptor) -> bool {
    e.serialized.to_lowercase().contains("rate")
}

/// Rate-limit predicates in priority order; any match wins.
const RATE_LIMIT_PREDICATES: &[(&str, Predicate)] = &[
    ("status_429", status_is_429),
    ("message_token", message_has_token),
    ("serialized_rate", serialized_mentions_rate),
];

fn retry_in_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)retry in (\d+(?:\.\d+)?)").expect("valid regex"))
}

/// Seconds from a "retry in <n>" hint in the message, rounded up.
pub fn retry_after_secs(message: &str) -> Option<u64> {
    let captured = retry_in_re().captures(message)?.get(1)?.as_str();
    let secs: f64 = captured.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(secs.ceil() as u64)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify an upstream failure. Pure and idempotent.
pub fn classify(error: &ErrorDescriptor) -> FailureClass {
    let matched = RATE_LIMIT_PREDICATES
        .iter()
        .find(|(_, predicate)| predicate(error))
        .map(|(name, _)| *name);

    match matched {
        Some(rule) => {
            let retry_after_secs =
                retry_after_secs(&error.message).unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            tracing::debug!(rule, retry_after_secs, "Classified upstream failure as rate limit");
            FailureClass::RateLimit { retry_after_secs }
        }
        None => FailureClass::General,
    }
}

/// Convenience wrapper for crate errors.
pub fn classify_app_error(error: &AppError) -> FailureClass {
    classify(&ErrorDescriptor::from(error))
}
