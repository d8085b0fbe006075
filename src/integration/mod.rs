//! Integration tests
//!
//! These drive the real router against a scripted stand-in for yt-dlp, so
//! they cover process spawning, streaming and cleanup end to end.

#[cfg(unix)]
pub mod e2e;
#[cfg(unix)]
pub mod fixtures;
