//! Server error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Main error type for the relay server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a metadata probe failed.
///
/// Clients only ever see one generic message for all of these; the detail is
/// for the server log.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to run extractor: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("extractor did not answer within {0}s")]
    Timeout(u64),

    #[error("extractor exited with {code:?}: {stderr}")]
    Exited { code: Option<i32>, stderr: String },

    #[error("unsupported media: {0}")]
    Unsupported(&'static str),

    #[error("unreadable extractor output: {0}")]
    Parse(#[from] serde_json::Error),
}
