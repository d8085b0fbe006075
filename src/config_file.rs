//! Configuration file support
//!
//! Loads server configuration from TOML files. Every section and most keys
//! are optional; anything left out falls back to [`ServerConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{
    DownloadConfig, LimitsConfig, ServerConfig, UnknownDuration, YtDlpConfig,
};
use crate::error::{Result, ServerError};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: Option<ServerSettings>,
    /// yt-dlp settings
    pub ytdlp: Option<YtDlpSettings>,
    /// Download pipeline settings
    pub download: Option<DownloadSettings>,
    /// Limits settings
    pub limits: Option<LimitsSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtDlpSettings {
    /// Program to run
    pub binary: Option<String>,
    /// Arguments placed before every invocation
    pub base_args: Option<Vec<String>>,
    /// Metadata probe timeout in seconds
    pub metadata_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    /// Duration below which separate streams are merged
    pub merge_threshold_secs: Option<u64>,
    /// Policy for media without a duration
    pub unknown_duration: Option<UnknownDuration>,
    /// Output read size in bytes
    pub chunk_size: Option<usize>,
    /// Exit wait after end of output, in seconds
    pub exit_wait_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSettings {
    /// Maximum concurrent downloads
    pub max_concurrent_downloads: Option<usize>,
    /// Maximum concurrent downloads per client address
    pub max_downloads_per_client: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let defaults = ServerConfig::default();
        Self {
            server: Some(ServerSettings {
                host: defaults.host,
                port: defaults.port,
                cors_enabled: Some(defaults.cors_enabled),
            }),
            ytdlp: Some(YtDlpSettings {
                binary: Some(defaults.ytdlp.binary),
                base_args: Some(defaults.ytdlp.base_args),
                metadata_timeout_secs: Some(defaults.ytdlp.metadata_timeout_secs),
            }),
            download: Some(DownloadSettings {
                merge_threshold_secs: Some(defaults.download.merge_threshold_secs),
                unknown_duration: Some(defaults.download.unknown_duration),
                chunk_size: Some(defaults.download.chunk_size),
                exit_wait_secs: Some(defaults.download.exit_wait_secs),
            }),
            limits: Some(LimitsSettings {
                max_concurrent_downloads: Some(defaults.limits.max_concurrent_downloads),
                max_downloads_per_client: Some(defaults.limits.max_downloads_per_client),
            }),
            logging: Some(LoggingSettings {
                level: defaults.log_level,
                format: Some(defaults.log_format),
            }),
        }
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();

        let (host, port, cors_enabled) = match self.server {
            Some(s) => (s.host, s.port, s.cors_enabled.unwrap_or(true)),
            None => (defaults.host, defaults.port, defaults.cors_enabled),
        };

        let ytdlp = match self.ytdlp {
            Some(y) => YtDlpConfig {
                binary: y.binary.unwrap_or(defaults.ytdlp.binary),
                base_args: y.base_args.unwrap_or(defaults.ytdlp.base_args),
                metadata_timeout_secs: y
                    .metadata_timeout_secs
                    .unwrap_or(defaults.ytdlp.metadata_timeout_secs),
            },
            None => defaults.ytdlp,
        };

        let download = match self.download {
            Some(d) => DownloadConfig {
                merge_threshold_secs: d
                    .merge_threshold_secs
                    .unwrap_or(defaults.download.merge_threshold_secs),
                unknown_duration: d
                    .unknown_duration
                    .unwrap_or(defaults.download.unknown_duration),
                chunk_size: d
                    .chunk_size
                    .filter(|&n| n > 0)
                    .unwrap_or(defaults.download.chunk_size),
                exit_wait_secs: d.exit_wait_secs.unwrap_or(defaults.download.exit_wait_secs),
            },
            None => defaults.download,
        };

        let limits = match self.limits {
            Some(l) => LimitsConfig {
                max_concurrent_downloads: l
                    .max_concurrent_downloads
                    .unwrap_or(defaults.limits.max_concurrent_downloads),
                max_downloads_per_client: l
                    .max_downloads_per_client
                    .unwrap_or(defaults.limits.max_downloads_per_client),
            },
            None => defaults.limits,
        };

        let (log_level, log_format) = match self.logging {
            Some(l) => (l.level, l.format.unwrap_or(defaults.log_format)),
            None => (defaults.log_level, defaults.log_format),
        };

        ServerConfig {
            host,
            port,
            ytdlp,
            download,
            limits,
            cors_enabled,
            log_level,
            log_format,
        }
    }
}

/// Load the server configuration from `path`.
///
/// A missing file yields the defaults. A file that fails to load also yields
/// the defaults, together with a message for the caller to log once logging
/// is up.
pub fn load_server_config<P: AsRef<Path>>(path: P) -> (ServerConfig, Option<String>) {
    let path = path.as_ref();
    if !path.exists() {
        return (ServerConfig::default(), None);
    }
    match ConfigFile::from_file(path) {
        Ok(cf) => (cf.into_server_config(), None),
        Err(e) => (
            ServerConfig::default(),
            Some(format!(
                "Failed to load config file {}: {}. Using defaults.",
                path.display(),
                e
            )),
        ),
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    ConfigFile::default_config().to_file(path)
}
