use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::utils;
use crate::CatcherError;

/// Name of the config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "catchstream.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Station used when none is given on the command line
    pub default_station: String,

    /// Station name to stream URL
    pub stations: BTreeMap<String, String>,

    /// Directory recordings are written to
    pub output_dir: PathBuf,

    /// Capture tool settings
    pub capture: CaptureConfig,

    /// Encoder settings
    pub encoder: EncoderConfig,

    /// Retry hardening, off by default
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture executable
    pub program: String,

    /// Stream cache size in kilobytes
    pub cache_kb: u32,

    /// Extension of the uncompressed capture
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder executable
    pub program: String,

    /// Variable bitrate quality (0 = best, 9 = smallest)
    pub vbr_quality: u8,

    /// Extension of the compressed output
    pub extension: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Stop after this many attempts (unlimited if unset)
    pub max_attempts: Option<usize>,

    /// Pause between attempts in seconds
    pub delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let stations = [
            ("KCRW", "http://media.kcrw.com/live/kcrwlive.pls"),
            ("WFMU", "http://stream0.wfmu.org/freeform-128k"),
            ("WPRB", "http://stardust.wavestreamer.com:2152/1"),
            ("SomaFM", "http://somafm.com/indiepop130.pls"),
        ]
        .into_iter()
        .map(|(name, url)| (name.to_string(), url.to_string()))
        .collect();

        Self {
            default_station: "WFMU".to_string(),
            stations,
            output_dir: PathBuf::from("."),
            capture: CaptureConfig::default(),
            encoder: EncoderConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            program: "mplayer".to_string(),
            cache_kb: 4096,
            extension: "wav".to_string(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: "lame".to_string(),
            vbr_quality: 0,
            extension: "mp3".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, the usual locations, or fall back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(CatcherError::InvalidConfig(format!(
                        "config file not found: {}",
                        path.display()
                    ))
                    .into());
                }
                Some(path.to_path_buf())
            }
            None => Self::config_path().filter(|path| path.exists()),
        };

        match path {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                let content = fs_err::read_to_string(&path)
                    .context("Failed to read config file")?;
                Self::from_yaml(&content)
            }
            None => {
                tracing::debug!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| CatcherError::InvalidConfig(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Get configuration file path
    fn config_path() -> Option<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir().map(|dir| dir.join("stream-catcher").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), CatcherError> {
        if self.stations.is_empty() {
            return Err(CatcherError::InvalidConfig(
                "no stations configured".to_string(),
            ));
        }

        if !self.stations.contains_key(&self.default_station) {
            return Err(CatcherError::InvalidConfig(format!(
                "default station {} is not in the station list",
                self.default_station
            )));
        }

        for (name, url) in &self.stations {
            utils::validate_stream_url(url)
                .map_err(|e| CatcherError::InvalidConfig(format!("station {}: {}", name, e)))?;
        }

        if self.capture.program.is_empty() || self.encoder.program.is_empty() {
            return Err(CatcherError::InvalidConfig(
                "capture and encoder programs must be set".to_string(),
            ));
        }

        if self.capture.extension.is_empty() || self.encoder.extension.is_empty() {
            return Err(CatcherError::InvalidConfig(
                "capture and encoder extensions must be set".to_string(),
            ));
        }

        if self.capture.extension == self.encoder.extension {
            return Err(CatcherError::InvalidConfig(
                "capture and encoder extensions must differ".to_string(),
            ));
        }

        if self.encoder.vbr_quality > 9 {
            return Err(CatcherError::InvalidConfig(format!(
                "encoder vbr_quality must be 0-9, got {}",
                self.encoder.vbr_quality
            )));
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Default Station: {}", self.default_station);
        println!("  Output Directory: {}", self.output_dir.display());
        println!(
            "  Capture: {} (cache {} KB, .{})",
            self.capture.program, self.capture.cache_kb, self.capture.extension
        );
        println!(
            "  Encoder: {} (-V {}, .{})",
            self.encoder.program, self.encoder.vbr_quality, self.encoder.extension
        );
        match self.retry.max_attempts {
            Some(max) => println!("  Max Attempts: {}", max),
            None => println!("  Max Attempts: unlimited"),
        }
        println!("  Retry Delay: {}s", self.retry.delay_secs);
        println!("  Stations:");
        for (name, url) in &self.stations {
            println!("    {:<10} {}", name, url);
        }
    }
}
