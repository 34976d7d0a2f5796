use async_trait::async_trait;
use chrono::Duration;
use std::path::{Path, PathBuf};

pub mod lame;
pub mod mplayer;

pub use lame::LameEncoder;
pub use mplayer::MplayerCapture;

use crate::Result;

/// Captures a network stream into an uncompressed file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptureProcess: Send + Sync {
    /// Record `url` into `<base>.<ext>` for at most `budget`, where `ext` is
    /// the configured capture extension.
    ///
    /// Returns once the external process exits, whether the full budget was
    /// recorded or the stream ended early.
    async fn capture(&self, base: &Path, url: &str, budget: Duration) -> Result<()>;
}

/// Compresses a captured file into its final format
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscodeProcess: Send + Sync {
    /// Compress `<base>.<source_ext>` into `<base>.<ext>`; the source is left in place
    async fn transcode(&self, base: &Path, source_ext: &str) -> Result<()>;
}

/// Append an extension to a base path without touching dots in the base name
pub fn with_extension(base: &Path, extension: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
