//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - Server configuration and the format policy derived from it
//! - The download limiter
//! - Metrics counters
//! - The registry of in-flight downloads (for the debug endpoint)

use dashmap::DashMap;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::format::{FormatPolicy, FormatStrategy, MediaKind};
use crate::limits::{DownloadLimiter, DownloadSlot};
use crate::metrics::{DownloadOutcome, Metrics};
use crate::ytdlp::MediaMetadata;

/// An in-flight download
#[derive(Debug)]
pub struct ActiveDownload {
    pub id: Uuid,
    pub title: String,
    pub duration_secs: u64,
    pub kind: MediaKind,
    pub strategy: FormatStrategy,
    pub client: Option<IpAddr>,
    pub started: Instant,
    pub bytes_sent: AtomicU64,
}

/// Serializable view of an [`ActiveDownload`]
#[derive(Debug, Serialize)]
pub struct ActiveDownloadInfo {
    pub id: Uuid,
    pub title: String,
    pub duration_secs: u64,
    pub kind: MediaKind,
    pub strategy: FormatStrategy,
    pub bytes_sent: u64,
    pub elapsed_secs: u64,
}

impl ActiveDownload {
    pub fn info(&self) -> ActiveDownloadInfo {
        ActiveDownloadInfo {
            id: self.id,
            title: self.title.clone(),
            duration_secs: self.duration_secs,
            kind: self.kind,
            strategy: self.strategy,
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            elapsed_secs: self.started.elapsed().as_secs(),
        }
    }
}

/// Application state shared across all handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,

    /// Format decision policy
    pub policy: FormatPolicy,

    /// Concurrent download limiter
    pub limiter: DownloadLimiter,

    /// Metrics counters
    pub metrics: Metrics,

    /// In-flight downloads (id -> download)
    pub downloads: DashMap<Uuid, Arc<ActiveDownload>>,

    /// Extractor version detected at startup
    pub ytdlp_version: Option<String>,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self {
            policy: FormatPolicy::from_config(&config.download),
            limiter: DownloadLimiter::from_config(&config.limits),
            metrics: Metrics::new(),
            downloads: DashMap::new(),
            ytdlp_version: None,
            config,
        }
    }

    /// Record the detected extractor version
    pub fn with_ytdlp_version(mut self, version: Option<String>) -> Self {
        self.ytdlp_version = version;
        self
    }

    /// Register a started download.
    ///
    /// The returned ticket keeps the download slot and the registry entry
    /// alive; dropping it releases both and records the outcome.
    pub fn open_download(
        state: &Arc<Self>,
        id: Uuid,
        metadata: &MediaMetadata,
        kind: MediaKind,
        strategy: FormatStrategy,
        client: Option<IpAddr>,
        slot: DownloadSlot,
    ) -> DownloadTicket {
        let entry = Arc::new(ActiveDownload {
            id,
            title: metadata.title.clone(),
            duration_secs: metadata.duration_or_default(),
            kind,
            strategy,
            client,
            started: Instant::now(),
            bytes_sent: AtomicU64::new(0),
        });
        state.downloads.insert(id, Arc::clone(&entry));
        state.metrics.record_download_started();

        DownloadTicket {
            state: Arc::clone(state),
            entry,
            outcome: None,
            _slot: slot,
        }
    }

    /// Snapshot of the in-flight downloads
    pub fn active_downloads(&self) -> Vec<ActiveDownloadInfo> {
        let mut downloads: Vec<_> = self.downloads.iter().map(|d| d.info()).collect();
        downloads.sort_by(|a, b| b.elapsed_secs.cmp(&a.elapsed_secs));
        downloads
    }
}

/// Bookkeeping for one download, tied to the response body's lifetime
pub struct DownloadTicket {
    state: Arc<AppState>,
    entry: Arc<ActiveDownload>,
    outcome: Option<DownloadOutcome>,
    _slot: DownloadSlot,
}

impl DownloadTicket {
    pub fn id(&self) -> Uuid {
        self.entry.id
    }

    /// Count a chunk handed to the client
    pub fn record_chunk(&self, len: usize) {
        self.entry.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
        self.state.metrics.record_bytes(len as u64);
    }

    /// Set the outcome; the first call wins
    pub fn finish(&mut self, outcome: DownloadOutcome) {
        self.outcome.get_or_insert(outcome);
    }
}

impl Drop for DownloadTicket {
    fn drop(&mut self) {
        let outcome = self.outcome.unwrap_or(DownloadOutcome::Cancelled);
        self.state.downloads.remove(&self.entry.id);
        self.state.metrics.record_outcome(outcome);

        let bytes = self.entry.bytes_sent.load(Ordering::Relaxed);
        let elapsed = self.entry.started.elapsed();
        match outcome {
            DownloadOutcome::Completed => tracing::info!(
                download = %self.entry.id,
                bytes,
                "download completed in {:?}",
                elapsed
            ),
            DownloadOutcome::Failed | DownloadOutcome::Cancelled => tracing::warn!(
                download = %self.entry.id,
                bytes,
                client = ?self.entry.client,
                "download {} after {:?}",
                outcome.as_str(),
                elapsed
            ),
        }
    }
}
