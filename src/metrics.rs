//! Prometheus-compatible metrics endpoint

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::state::AppState;

/// How a download ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Extractor finished and every byte was sent
    Completed,
    /// Extractor failed or its output could not be read
    Failed,
    /// Response dropped before the end, usually a client disconnect
    Cancelled,
}

impl DownloadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadOutcome::Completed => "completed",
            DownloadOutcome::Failed => "failed",
            DownloadOutcome::Cancelled => "cancelled",
        }
    }
}

/// Metrics collector
#[derive(Debug)]
pub struct Metrics {
    /// Server start time
    start_time: Instant,
    /// Download requests received
    request_count: AtomicU64,
    /// Requests rejected by the download limiter
    rejected_count: AtomicU64,
    /// Metadata probes that failed
    resolution_failures: AtomicU64,
    /// Extractor processes started
    downloads_started: AtomicU64,
    downloads_completed: AtomicU64,
    downloads_failed: AtomicU64,
    downloads_cancelled: AtomicU64,
    /// Total bytes streamed to clients
    bytes_streamed: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            rejected_count: AtomicU64::new(0),
            resolution_failures: AtomicU64::new(0),
            downloads_started: AtomicU64::new(0),
            downloads_completed: AtomicU64::new(0),
            downloads_failed: AtomicU64::new(0),
            downloads_cancelled: AtomicU64::new(0),
            bytes_streamed: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolution_failure(&self) {
        self.resolution_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download_started(&self) {
        self.downloads_started.fetch_add(1, Ordering::Relaxed);
    }

    fn outcome_counter(&self, outcome: DownloadOutcome) -> &AtomicU64 {
        match outcome {
            DownloadOutcome::Completed => &self.downloads_completed,
            DownloadOutcome::Failed => &self.downloads_failed,
            DownloadOutcome::Cancelled => &self.downloads_cancelled,
        }
    }

    pub fn record_outcome(&self, outcome: DownloadOutcome) {
        self.outcome_counter(outcome).fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes streamed
    pub fn record_bytes(&self, bytes: u64) {
        self.bytes_streamed.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus format
    pub fn export_prometheus(&self, active_downloads: usize) -> String {
        let mut output = String::new();

        let start_time = std::time::SystemTime::UNIX_EPOCH
            .elapsed()
            .unwrap_or(Duration::ZERO)
            .as_secs()
            .saturating_sub(self.uptime_secs());

        let counters = [
            (
                "ytdl_relay_uptime_seconds",
                "Server uptime in seconds",
                "counter",
                self.uptime_secs(),
            ),
            (
                "ytdl_relay_start_time_seconds",
                "Server start time as Unix timestamp",
                "gauge",
                start_time,
            ),
            (
                "ytdl_relay_requests_total",
                "Download requests received",
                "counter",
                self.request_count.load(Ordering::Relaxed),
            ),
            (
                "ytdl_relay_rejected_total",
                "Download requests rejected by the concurrency limit",
                "counter",
                self.rejected_count.load(Ordering::Relaxed),
            ),
            (
                "ytdl_relay_resolution_failures_total",
                "Metadata probes that failed",
                "counter",
                self.resolution_failures.load(Ordering::Relaxed),
            ),
            (
                "ytdl_relay_downloads_started_total",
                "Extractor processes started",
                "counter",
                self.downloads_started.load(Ordering::Relaxed),
            ),
            (
                "ytdl_relay_bytes_streamed_total",
                "Total bytes streamed to clients",
                "counter",
                self.bytes_streamed.load(Ordering::Relaxed),
            ),
            (
                "ytdl_relay_active_downloads",
                "Downloads currently streaming",
                "gauge",
                active_downloads as u64,
            ),
        ];

        for (name, help, kind, value) in counters {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} {}", name, kind);
            let _ = writeln!(output, "{} {}\n", name, value);
        }

        let _ = writeln!(
            output,
            "# HELP ytdl_relay_downloads_finished_total Downloads by outcome"
        );
        let _ = writeln!(output, "# TYPE ytdl_relay_downloads_finished_total counter");
        for outcome in [
            DownloadOutcome::Completed,
            DownloadOutcome::Failed,
            DownloadOutcome::Cancelled,
        ] {
            let value = self.outcome_counter(outcome).load(Ordering::Relaxed);
            let _ = writeln!(
                output,
                "ytdl_relay_downloads_finished_total{{outcome=\"{}\"}} {}",
                outcome.as_str(),
                value
            );
        }

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let prometheus_output = state.metrics.export_prometheus(state.limiter.active());

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        prometheus_output,
    )
        .into_response()
}
