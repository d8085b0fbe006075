//! Metadata probing
//!
//! Asks the extractor for the media's JSON description without downloading
//! anything and keeps the two fields the relay needs.

use serde::{Deserialize, Serialize};
use std::process::Stdio;

use super::stderr::classify;
use crate::config::YtDlpConfig;
use crate::error::ResolveError;

/// Title used when the extractor reports none
pub const DEFAULT_TITLE: &str = "video";

/// What the relay knows about a media URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaMetadata {
    pub title: String,
    /// Whole seconds; `None` when the extractor did not report a duration
    pub duration_secs: Option<u64>,
}

impl MediaMetadata {
    /// Duration with a missing value read as zero
    pub fn duration_or_default(&self) -> u64 {
        self.duration_secs.unwrap_or(0)
    }
}

/// Subset of the extractor's `--dump-single-json` output
#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(rename = "_type")]
    kind: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
}

/// Parse the extractor's JSON description
pub fn parse_info(json: &[u8]) -> Result<MediaMetadata, ResolveError> {
    let info: InfoJson = serde_json::from_slice(json)?;

    if info.kind.as_deref() == Some("playlist") {
        return Err(ResolveError::Unsupported("playlist"));
    }

    let title = info
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let duration_secs = info
        .duration
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| d as u64);

    Ok(MediaMetadata {
        title,
        duration_secs,
    })
}

/// Resolve title and duration for `url`.
///
/// Runs the extractor in metadata-only mode, bounded by the configured
/// timeout. The probe process is killed if the timeout fires.
pub async fn resolve(config: &YtDlpConfig, url: &str) -> Result<MediaMetadata, ResolveError> {
    let mut cmd = super::command(config);
    cmd.args([
        "--dump-single-json",
        "--no-playlist",
        "--quiet",
        "--no-warnings",
        "--",
    ])
    .arg(url)
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let child = cmd.spawn().map_err(ResolveError::Spawn)?;
    let output = tokio::time::timeout(config.metadata_timeout(), child.wait_with_output())
        .await
        .map_err(|_| ResolveError::Timeout(config.metadata_timeout_secs))?
        .map_err(ResolveError::Spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::debug!(
            url,
            cause = %classify(&stderr),
            "metadata probe exited with {}",
            output.status
        );
        return Err(ResolveError::Exited {
            code: output.status.code(),
            stderr,
        });
    }

    parse_info(&output.stdout)
}
