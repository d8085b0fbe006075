//! Classification of extractor error output
//!
//! Only used to make log lines more useful. Clients get one fixed message
//! whatever the cause.

use std::fmt;

/// Rough cause of an extractor failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Private, removed, region-locked or otherwise unavailable media
    Unavailable,
    /// Site asked for sign-in or flagged the request as a bot
    AccessDenied,
    /// Unsupported URL or site
    Unsupported,
    /// Timeouts, DNS, refused connections
    Network,
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Unavailable => "unavailable",
            FailureKind::AccessDenied => "access_denied",
            FailureKind::Unsupported => "unsupported",
            FailureKind::Network => "network",
            FailureKind::Unknown => "unknown",
        })
    }
}

/// Classify the extractor's stderr
pub fn classify(stderr: &str) -> FailureKind {
    let stderr = stderr.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| stderr.contains(n));

    if has(&[
        "private video",
        "video is private",
        "video unavailable",
        "not available",
        "has been removed",
        "does not exist",
    ]) {
        FailureKind::Unavailable
    } else if has(&[
        "sign in to confirm",
        "please sign in",
        "login required",
        "http error 403",
        "use --cookies",
    ]) {
        FailureKind::AccessDenied
    } else if has(&["unsupported url", "is not a valid url", "no video formats found"]) {
        FailureKind::Unsupported
    } else if has(&[
        "timed out",
        "timeout",
        "connection",
        "name or service not known",
        "temporary failure in name resolution",
        "network is unreachable",
    ]) {
        FailureKind::Network
    } else {
        FailureKind::Unknown
    }
}
