//! Stream Catcher - A Rust CLI tool for recording Internet radio streams
//!
//! This library records a station's stream for a planned duration through an external
//! capture tool, compresses each capture with an external encoder, and keeps resuming
//! under fresh file names until the full planned duration has been recorded.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod duration;
pub mod session;
pub mod stations;
pub mod utils;

pub use adapters::{CaptureProcess, TranscodeProcess};
pub use cli::Cli;
pub use config::Config;
pub use duration::{parse_duration, DurationParseError};
pub use session::{CaptureLoop, Session, SessionReport, SessionStatus};
pub use stations::StationRegistry;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the catcher
#[derive(thiserror::Error, Debug)]
pub enum CatcherError {
    #[error("Invalid format for time: {input}!")]
    InvalidDurationFormat {
        input: String,
        #[source]
        source: DurationParseError,
    },

    #[error("Sorry! I don't know anything about {0}!")]
    UnknownStation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Gave up after {attempts} attempts with {remaining} still unrecorded")]
    AttemptLimitReached { attempts: usize, remaining: String },
}

impl CatcherError {
    /// Process exit code reported for this failure kind
    pub fn exit_code(&self) -> u8 {
        match self {
            CatcherError::UnknownStation(_) => 2,
            CatcherError::InvalidDurationFormat { .. } => 3,
            CatcherError::AttemptLimitReached { .. } => 4,
            CatcherError::InvalidConfig(_) => 5,
        }
    }
}
