//! Error types shared across the planning, normalization and execution stages.

use thiserror::Error;

/// Failures while turning a wall-clock reading into an absolute instant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    #[error("invalid time format: {0:?}")]
    InvalidTimeFormat(String),

    #[error("unknown time zone: {0:?}")]
    UnknownTimeZone(String),

    #[error("event ends before it starts ({start} -> {end})")]
    InvertedInterval { start: String, end: String },
}

/// Failures talking to the language model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Http(String),

    #[error("oracle request timed out")]
    Timeout,

    #[error("oracle request failed with status {status}")]
    Status { status: u16, body: String },

    #[error("no response from oracle")]
    EmptyResponse,

    #[error("failed to decode oracle response: {0}")]
    Decode(String),

    #[error("not a valid prompt type: {0}")]
    UnknownPromptType(String),
}

impl OracleError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Http(_) | OracleError::Timeout => true,
            OracleError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OracleError::Timeout
        } else {
            OracleError::Http(err.to_string())
        }
    }
}

/// Failures producing an action plan from an instruction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("oracle response is not valid JSON: {0}")]
    OracleResponseMalformed(String),
}

/// Failures reported by a calendar backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("calendar backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("calendar backend rejected the request: {0}")]
    BackendRejected(String),

    #[error("event not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::BackendRejected(err.to_string())
        } else {
            GatewayError::BackendUnavailable(err.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(String),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to read config file: {0}")]
    File(String),
}

/// Failures of a direct event listing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListEventsError {
    #[error(transparent)]
    Time(#[from] TimeError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
