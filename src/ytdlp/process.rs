//! Download subprocess
//!
//! [`DownloadProcess`] owns one running extractor that writes the media to
//! its standard output. Its lifetime bounds the child's: dropping it kills
//! the child if it is still running, so a response body that is dropped
//! early (client gone, read error) never leaves the extractor behind.

use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use super::stderr::classify;
use crate::config::{DownloadConfig, YtDlpConfig};
use crate::format::FormatDirective;

/// Number of stderr lines kept for the failure log
const STDERR_TAIL_LINES: usize = 20;

type StderrTail = Arc<Mutex<VecDeque<String>>>;

/// A running download
pub struct DownloadProcess {
    id: Uuid,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_tail: StderrTail,
    chunk_size: usize,
    exit_wait: Duration,
}

impl DownloadProcess {
    /// Start the extractor for `url`, writing the selected format to stdout
    pub fn spawn(
        id: Uuid,
        ytdlp: &YtDlpConfig,
        download: &DownloadConfig,
        url: &str,
        directive: &FormatDirective,
    ) -> io::Result<Self> {
        let mut cmd = super::command(ytdlp);
        cmd.args([
            "--no-part",
            "--quiet",
            "--no-warnings",
            "--no-progress",
            "--no-playlist",
            "-o",
            "-",
        ])
        .args(&directive.args)
        .arg("--")
        .arg(url)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not captured"))?;

        let stderr_tail: StderrTail =
            Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(id, stderr, Arc::clone(&stderr_tail)));
        }

        tracing::debug!(
            download = %id,
            pid = ?child.id(),
            strategy = directive.strategy.as_str(),
            "spawned extractor"
        );

        Ok(Self {
            id,
            child: Some(child),
            stdout: Some(stdout),
            stderr_tail,
            chunk_size: download.chunk_size,
            exit_wait: download.exit_wait(),
        })
    }

    /// OS process id, while the child is owned
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    fn stderr_summary(&self) -> String {
        let tail = self.stderr_tail.lock();
        tail.iter().cloned().collect::<Vec<_>>().join(" | ")
    }

    /// Reap the child once its output is exhausted.
    ///
    /// A non-zero exit, or a child that is still alive after the exit wait,
    /// is returned as an error. In the latter case the child is left for
    /// `Drop` to kill.
    async fn finish(&mut self) -> io::Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };

        let waited = tokio::time::timeout(self.exit_wait, child.wait()).await;
        match waited {
            Ok(Ok(status)) => {
                self.child = None;
                if status.success() {
                    return Ok(());
                }
                let stderr = self.stderr_summary();
                tracing::warn!(
                    download = %self.id,
                    cause = %classify(&stderr),
                    "extractor exited with {}: {}",
                    status,
                    stderr
                );
                Err(io::Error::other(format!("extractor exited with {}", status)))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(
                    download = %self.id,
                    "extractor closed its output but did not exit within {:?}",
                    self.exit_wait
                );
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "extractor did not exit",
                ))
            }
        }
    }

    /// Turn the process into its output byte stream.
    ///
    /// Chunks are at most `chunk_size` bytes and arrive in the order the
    /// extractor wrote them. A failed exit is reported as a final error item
    /// so the HTTP layer aborts the body instead of ending it cleanly.
    pub fn into_stream(mut self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        let reader = self
            .stdout
            .take()
            .map(|stdout| ReaderStream::with_capacity(stdout, self.chunk_size));

        stream::unfold(
            (reader, self),
            |(mut reader, mut process)| async move {
                let next = reader.as_mut()?.next().await;
                match next {
                    Some(Ok(bytes)) => Some((Ok(bytes), (reader, process))),
                    Some(Err(e)) => {
                        tracing::warn!(download = %process.id, "reading extractor output failed: {}", e);
                        Some((Err(e), (None, process)))
                    }
                    None => match process.finish().await {
                        Ok(()) => None,
                        Err(e) => Some((Err(e), (None, process))),
                    },
                }
            },
        )
    }
}

impl Drop for DownloadProcess {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }

        match child.start_kill() {
            Ok(()) => tracing::debug!(download = %self.id, pid = ?child.id(), "killed extractor"),
            Err(e) => tracing::warn!(download = %self.id, "failed to kill extractor: {}", e),
        }

        // Reap in the background; without a runtime `kill_on_drop` covers it.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = child.wait().await;
            });
        }
    }
}

/// Log the extractor's stderr and keep its last lines
async fn drain_stderr(id: Uuid, stderr: ChildStderr, tail: StderrTail) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(download = %id, "extractor: {}", line);
        let mut tail = tail.lock();
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
}
