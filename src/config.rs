//! Server configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How to treat media whose duration the extractor did not report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownDuration {
    /// Treat as zero seconds, which selects the merged-stream format
    Merge,
    /// Treat as long, which selects the pre-muxed single-file format
    SingleFile,
}

/// yt-dlp invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtDlpConfig {
    /// Program to run
    pub binary: String,

    /// Arguments placed before every invocation (e.g. `["-m", "yt_dlp"]`
    /// when `binary` is a Python interpreter)
    pub base_args: Vec<String>,

    /// Upper bound for a metadata probe in seconds
    pub metadata_timeout_secs: u64,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            base_args: Vec::new(),
            metadata_timeout_secs: 60,
        }
    }
}

impl YtDlpConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }
}

/// Download pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Videos shorter than this are fetched as separate streams and merged
    pub merge_threshold_secs: u64,

    /// Policy for media without a reported duration
    pub unknown_duration: UnknownDuration,

    /// Read size for the tool's standard output in bytes
    pub chunk_size: usize,

    /// How long to wait for the tool to exit once its output is exhausted
    pub exit_wait_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            merge_threshold_secs: 300,
            unknown_duration: UnknownDuration::Merge,
            chunk_size: 64 * 1024,
            exit_wait_secs: 10,
        }
    }
}

impl DownloadConfig {
    pub fn exit_wait(&self) -> Duration {
        Duration::from_secs(self.exit_wait_secs)
    }
}

/// Concurrency limits for downloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum downloads running at the same time
    pub max_concurrent_downloads: usize,

    /// Maximum downloads running at the same time for one client address
    pub max_downloads_per_client: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 8,
            max_downloads_per_client: 2,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// yt-dlp configuration
    pub ytdlp: YtDlpConfig,

    /// Download configuration
    pub download: DownloadConfig,

    /// Download limits
    pub limits: LimitsConfig,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            ytdlp: YtDlpConfig::default(),
            download: DownloadConfig::default(),
            limits: LimitsConfig::default(),
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default tracing filter when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> String {
        format!(
            "ytdl_relay={level},tower_http={level}",
            level = self.log_level
        )
    }
}
