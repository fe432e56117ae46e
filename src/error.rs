//! Error types for hlget

use thiserror::Error;

/// Main error type for hlget operations
#[derive(Debug, Error)]
pub enum HlgetError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Could not determine user ID: {0}")]
    UserLookup(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Listing error: {0}")]
    Listing(#[from] ListingError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Remux error: {0}")]
    Remux(#[from] RemuxError),
}

/// Errors that stop highlight enumeration.
///
/// These never fail a run: the listing keeps whatever it accumulated and
/// reports the error that interrupted it.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("listing endpoint returned status {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("malformed page: {0}")]
    MalformedPage(String),

    #[error("listing cancelled")]
    Cancelled,
}

/// Errors from the playback token exchange
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned status {0}")]
    Status(u16),

    #[error("video {0} is unavailable (deleted, private or missing)")]
    VideoUnavailable(String),

    #[error("token response is missing field `{0}`")]
    MissingField(&'static str),

    #[error("malformed token response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not build playback URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Errors from the external remux tool
#[derive(Debug, Error)]
pub enum RemuxError {
    #[error("could not prepare output {path}: {source}")]
    PrepareOutput {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} not found")]
    ToolMissing { tool: String },

    #[error("{tool} exited with code {code:?}: {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("remux cancelled")]
    Cancelled,
}

impl ListingError {
    /// Classify a transport error, keeping timeouts distinct
    pub fn from_request(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ListingError::Timeout
        } else {
            ListingError::Http(error)
        }
    }
}

impl RemuxError {
    /// Tool diagnostics, if the failure carried any
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            RemuxError::ToolFailed { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }
}
