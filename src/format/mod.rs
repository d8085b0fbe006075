//! Format selection module
//!
//! Maps the requested media kind and the reported duration to the
//! yt-dlp format arguments and the container the client receives:
//! - Audio is always extracted and converted to MP3
//! - Short videos fetch the best video and audio streams and merge them
//! - Long videos take the best pre-muxed single file to spare the host

pub mod planner;

pub use planner::{select_format, Container, FormatDirective, FormatPolicy, FormatStrategy, MediaKind};
