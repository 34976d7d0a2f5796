use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{with_extension, TranscodeProcess};
use crate::config::EncoderConfig;
use crate::Result;

/// MP3 compression with the lame encoder
pub struct LameEncoder {
    program: String,
    vbr_quality: u8,
    extension: String,
}

impl LameEncoder {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            program: config.program.clone(),
            vbr_quality: config.vbr_quality,
            extension: config.extension.clone(),
        }
    }

    pub fn build_args(&self, base: &Path, source_ext: &str) -> Vec<String> {
        vec![
            "--quiet".to_string(),
            "-V".to_string(),
            self.vbr_quality.to_string(),
            with_extension(base, source_ext).to_string_lossy().into_owned(),
            with_extension(base, &self.extension).to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl TranscodeProcess for LameEncoder {
    async fn transcode(&self, base: &Path, source_ext: &str) -> Result<()> {
        let args = self.build_args(base, source_ext);
        tracing::info!("{} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

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
