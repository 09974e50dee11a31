use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Timeout applied when a request does not name one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Arguments of one `applescript_execute` call, as received.
///
/// Fields are optional here so that absence can be reported as a validation
/// failure instead of a decoding error. `timeout_seconds` is wide enough to
/// hold any JSON integer, so sign and magnitude are checked by `validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecutionRequest {
    #[serde(default, alias = "code_snippet")]
    pub script: Option<String>,
    #[serde(default, alias = "timeout")]
    pub timeout_seconds: Option<i128>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Missing script argument")]
    MissingScript,
    #[error("Script must not be empty")]
    EmptyScript,
    #[error("timeout_seconds must be a positive integer, got {0}")]
    NonPositiveTimeout(i128),
}

/// A request that passed validation and can be staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub script: String,
    pub timeout_secs: u64,
}

impl ExecutionRequest {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: Some(script.into()),
            timeout_seconds: None,
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: i128) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Check the request without touching the filesystem or spawning anything.
    ///
    /// `default_timeout_secs` fills in an omitted timeout. Explicit timeouts
    /// must be positive but are otherwise unbounded; values past `u64::MAX`
    /// seconds saturate.
    pub fn validate(self, default_timeout_secs: u64) -> Result<ValidatedRequest, RequestError> {
        let script = self.script.ok_or(RequestError::MissingScript)?;
        if script.is_empty() {
            return Err(RequestError::EmptyScript);
        }

        let timeout_secs = match self.timeout_seconds {
            None => default_timeout_secs,
            Some(secs) if secs > 0 => u64::try_from(secs).unwrap_or(u64::MAX),
            Some(secs) => return Err(RequestError::NonPositiveTimeout(secs)),
        };

        Ok(ValidatedRequest {
            script,
            timeout_secs,
        })
    }
}

impl ValidatedRequest {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
