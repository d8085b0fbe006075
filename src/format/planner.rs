//! Format planner - decides how a download is fetched

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::config::{DownloadConfig, UnknownDuration};

/// Kind of media the client asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            other => Err(other.to_string()),
        }
    }
}

/// Container of the file handed to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    Mp3,
}

impl Container {
    /// File extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mp3 => "mp3",
        }
    }

    /// Content-Type of the streamed response
    pub fn content_type(&self) -> &'static str {
        match self {
            Container::Mp4 => "application/octet-stream",
            Container::Mp3 => "audio/mpeg",
        }
    }
}

/// Which row of the decision table was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatStrategy {
    /// Best video and best audio fetched separately and merged into MP4
    MergedStreams,
    /// Best single pre-muxed file, preferring MP4
    SingleFile,
    /// Best audio, converted to MP3
    AudioExtract,
}

impl FormatStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatStrategy::MergedStreams => "merged_streams",
            FormatStrategy::SingleFile => "single_file",
            FormatStrategy::AudioExtract => "audio_extract",
        }
    }
}

/// Format arguments for yt-dlp plus the resulting container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDirective {
    pub strategy: FormatStrategy,
    pub args: Vec<String>,
    pub container: Container,
}

impl FormatDirective {
    fn new(strategy: FormatStrategy, args: &[&str], container: Container) -> Self {
        Self {
            strategy,
            args: args.iter().map(|a| a.to_string()).collect(),
            container,
        }
    }
}

/// Select the format directive for a download.
///
/// Audio ignores the duration. Video below `merge_threshold_secs` merges
/// separate streams; at or above it a pre-muxed file is used.
pub fn select_format(
    kind: MediaKind,
    duration_secs: u64,
    merge_threshold_secs: u64,
) -> FormatDirective {
    match kind {
        MediaKind::Audio => FormatDirective::new(
            FormatStrategy::AudioExtract,
            &["-f", "bestaudio/best", "-x", "--audio-format", "mp3"],
            Container::Mp3,
        ),
        MediaKind::Video if duration_secs < merge_threshold_secs => FormatDirective::new(
            FormatStrategy::MergedStreams,
            &["-f", "bestvideo+bestaudio/best", "--merge-output-format", "mp4"],
            Container::Mp4,
        ),
        MediaKind::Video => FormatDirective::new(
            FormatStrategy::SingleFile,
            &["-f", "best[ext=mp4]/best"],
            Container::Mp4,
        ),
    }
}

/// Configured front end of [`select_format`]
#[derive(Debug, Clone, Copy)]
pub struct FormatPolicy {
    pub merge_threshold_secs: u64,
    pub unknown_duration: UnknownDuration,
}

impl FormatPolicy {
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            merge_threshold_secs: config.merge_threshold_secs,
            unknown_duration: config.unknown_duration,
        }
    }

    /// Pick the directive, resolving a missing duration per policy
    pub fn directive_for(&self, kind: MediaKind, duration_secs: Option<u64>) -> FormatDirective {
        let duration = duration_secs.unwrap_or(match self.unknown_duration {
            UnknownDuration::Merge => 0,
            UnknownDuration::SingleFile => self.merge_threshold_secs,
        });
        select_format(kind, duration, self.merge_threshold_secs)
    }
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self::from_config(&DownloadConfig::default())
    }
}
