use async_trait::async_trait;
use chrono::Duration;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{with_extension, CaptureProcess};
use crate::config::CaptureConfig;
use crate::utils;
use crate::Result;

/// Stream capture using mplayer's PCM audio output
pub struct MplayerCapture {
    program: String,
    cache_kb: u32,
    extension: String,
    show_progress: bool,
}

impl MplayerCapture {
    pub fn new(config: &CaptureConfig, show_progress: bool) -> Self {
        Self {
            program: config.program.clone(),
            cache_kb: config.cache_kb,
            extension: config.extension.clone(),
            show_progress,
        }
    }

    /// Arguments for one capture run
    pub fn build_args(&self, base: &Path, url: &str, budget: Duration) -> Vec<String> {
        let output = with_extension(base, &self.extension);
        let output = output.to_string_lossy();
        let mut args = vec![
            // Stop after the budget
            "-endpos".to_string(),
            utils::duration_as_seconds_arg(budget),
            // Large cache rides out short network hiccups
            "-cache".to_string(),
            self.cache_kb.to_string(),
            "-vc".to_string(),
            "null".to_string(),
            "-vo".to_string(),
            "null".to_string(),
            "-ao".to_string(),
            // %len% quoting keeps ':' and ',' in the path out of the suboption parser
            format!("pcm:waveheader:file=%{}%{}", output.len(), output),
        ];

        if utils::is_playlist_url(url) {
            args.push("-playlist".to_string());
        }
        args.push(url.to_string());

        args
    }

    fn spinner(&self, base: &Path, budget: Duration) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.set_message(format!(
            "Recording {} (up to {})",
            base.display(),
            utils::format_duration(budget)
        ));
        progress.enable_steady_tick(std::time::Duration::from_millis(200));
        Some(progress)
    }
}

#[async_trait]
impl CaptureProcess for MplayerCapture {
    async fn capture(&self, base: &Path, url: &str, budget: Duration) -> Result<()> {
        let args = self.build_args(base, url, budget);
        tracing::info!("{} {}", self.program, args.join(" "));

        let progress = self.spinner(base, budget);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;

        if let Some(progress) = progress {
            progress.finish_and_clear();
        }

        let output = output?;
        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                error.trim()
            );
        }

        Ok(())
    }
}
