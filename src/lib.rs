//! Quote-Harvester: an authenticated pagination crawler
//!
//! This crate logs into a quotes site through its CSRF-protected login form,
//! walks the paginated listing and turns each page into validated quote
//! records, retrying transient network failures with exponential backoff.

pub mod config;
pub mod crawler;
pub mod jobs;
pub mod output;
pub mod record;
pub mod retry;
pub mod session;
pub mod state;
pub mod storage;
pub mod url;

use std::fmt;
use thiserror::Error;

/// Classification of a transport-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The request or response timed out
    Timeout,
    /// The connection could not be established or was reset
    Connect,
    /// The server answered with a non-success status
    Status(u16),
    /// The response body could not be read
    Body,
    /// Any other client-side request failure
    Other,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connect => write!(f, "connection failure"),
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Body => write!(f, "body read failure"),
            Self::Other => write!(f, "request failure"),
        }
    }
}

/// Main error type for Quote-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error for {url} ({kind}): {message}")]
    Transport {
        url: String,
        kind: TransportKind,
        message: String,
    },

    #[error("Login page structure changed: {0}")]
    AuthenticationStructure(String),

    #[error("Login rejected: credentials were not accepted")]
    LoginRejected,

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Session is not authenticated, cannot fetch {url}")]
    Unauthenticated { url: String },

    #[error("{label} failed after {attempts} attempt(s): {source}")]
    RetryExhausted {
        label: String,
        attempts: u32,
        #[source]
        source: Box<HarvestError>,
    },

    #[error("Failed to fetch {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: Box<HarvestError>,
    },

    #[error("Invalid record: {0}")]
    RecordInvalid(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::CrawlState,
        to: state::CrawlState,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Builds a transport error from a reqwest failure, classifying its cause
    pub fn from_transport(url: &str, error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportKind::Timeout
        } else if error.is_connect() {
            TransportKind::Connect
        } else if let Some(status) = error.status() {
            TransportKind::Status(status.as_u16())
        } else if error.is_body() || error.is_decode() {
            TransportKind::Body
        } else {
            TransportKind::Other
        };

        Self::Transport {
            url: url.to_string(),
            kind,
            message: error.to_string(),
        }
    }

    /// Returns the innermost error, unwrapping retry and fetch wrappers
    pub fn root_cause(&self) -> &HarvestError {
        match self {
            Self::RetryExhausted { source, .. } | Self::FetchFailed { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    /// Returns true if the failure is a transport-level failure
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Quote-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, CrawlController, CrawlReport};
pub use record::{Record, Tag};
pub use state::{AbortReason, CrawlState, SessionState};
