//! yt-dlp integration
//!
//! Everything that talks to the external extractor lives here:
//! - Command construction shared by every invocation
//! - Version detection at startup
//! - Metadata probing (title, duration)
//! - The download subprocess and its output stream
//! - Classification of the extractor's error output

pub mod metadata;
pub mod process;
pub mod stderr;

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::YtDlpConfig;

pub use metadata::{resolve, MediaMetadata};
pub use process::DownloadProcess;

/// Base command for one extractor invocation.
///
/// The child never reads stdin and is killed if its handle is dropped.
pub fn command(config: &YtDlpConfig) -> Command {
    let mut cmd = Command::new(&config.binary);
    cmd.args(&config.base_args)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    cmd
}

/// Version string reported by the extractor, if it can be run at all
pub async fn version_info(config: &YtDlpConfig) -> Option<String> {
    let mut cmd = command(config);
    cmd.arg("--version")
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    match tokio::time::timeout(Duration::from_secs(10), cmd.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            (!version.is_empty()).then_some(version)
        }
        Ok(Ok(output)) => {
            tracing::warn!("{} --version exited with {}", config.binary, output.status);
            None
        }
        Ok(Err(e)) => {
            tracing::warn!("Failed to run {}: {}", config.binary, e);
            None
        }
        Err(_) => {
            tracing::warn!("{} --version timed out", config.binary);
            None
        }
    }
}
