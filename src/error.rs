//! Error types for every layer of a session.
//!
//! Each concern gets its own enum so callers can decide per failure class:
//! fetch failures degrade silently, channel failures are logged and dropped,
//! and only [`SessionError::MissingProjectId`] aborts a host session.

use thiserror::Error;

/// Failure of a single REST fetch.
///
/// Each variant carries enough context to diagnose the failure without
/// needing to inspect the originating error directly.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The endpoint URL could not be built from the configured base URL.
    #[error("invalid endpoint URL {url}: {detail}")]
    Url { url: String, detail: String },
    /// A TCP-level connection could not be established or the request timed out.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },
    /// The server replied with a non-2xx HTTP status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    /// Response body could not be parsed as the expected JSON structure.
    #[error("JSON parse error on field '{field}': {detail}")]
    Json { field: String, detail: String },
}

/// Failure to transmit on, or connect, a messaging channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("channel connect to {url} failed: {detail}")]
    Connect { url: String, detail: String },
    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// An inbound frame that was rejected instead of being blindly cast.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("unknown event '{0}'")]
    UnknownEvent(String),
    #[error("malformed '{event}' payload: {detail}")]
    Malformed { event: String, detail: String },
    #[error("unknown emoji '{0}'")]
    UnknownEmoji(String),
}

/// Failure to resolve the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Session-level errors surfaced by the controllers.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Fatal: a host session cannot exist without a project to drive.
    #[error("project ID is required")]
    MissingProjectId,
    /// The loaded project has no questions to navigate.
    #[error("project has no questions")]
    NoQuestions,
    /// The session task has already stopped.
    #[error("session has ended")]
    Ended,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
