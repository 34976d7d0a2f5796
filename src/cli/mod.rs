use clap::Parser;
use std::path::PathBuf;

use crate::duration::DEFAULT_DURATION;

#[derive(Parser, Debug)]
#[command(
    name = "catchstream",
    about = "Stream Catcher - Record an Internet radio stream for a set length of time",
    version,
    long_about = "Records an Internet radio station with an external capture tool, compresses the \
                  recording, and keeps resuming under new file names if the stream drops before \
                  the requested time is up."
)]
pub struct Cli {
    /// Station to record (defaults to the configured default station)
    #[arg(value_name = "STATION")]
    pub station: Option<String>,

    /// How long to record, as hh:mm:ss
    #[arg(value_name = "DURATION", default_value = DEFAULT_DURATION)]
    pub duration: String,

    /// Configuration file
    #[arg(short, long, value_name = "FILE", env = "CATCHSTREAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory to write recordings to (overrides the config file)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Stop resuming after this many attempts (unlimited by default)
    #[arg(long, value_name = "COUNT", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// Seconds to wait before resuming a dropped stream
    #[arg(long, value_name = "SECS")]
    pub retry_delay: Option<u64>,

    /// List known stations and exit
    #[arg(long)]
    pub list_stations: bool,

    /// Show current configuration and exit
    #[arg(long)]
    pub show_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable progress indicators and informational logging
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Default tracing filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "stream_catcher=debug,catchstream=debug"
        } else if self.quiet {
            "stream_catcher=warn,catchstream=warn"
        } else {
            "stream_catcher=info,catchstream=info"
        }
    }
}
