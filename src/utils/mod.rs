use anyhow::Result;
use chrono::Duration;
use url::Url;

/// Schemes the capture tool knows how to open
const STREAM_SCHEMES: &[&str] = &["http", "https", "mms", "mmsh", "rtsp", "rtmp"];

/// Validate a station stream URL
pub fn validate_stream_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !STREAM_SCHEMES.contains(&parsed.scheme()) {
        anyhow::bail!("Unsupported stream protocol: {}", parsed.scheme());
    }

    Ok(parsed)
}

/// Whether the URL points at a playlist file rather than the stream itself
pub fn is_playlist_url(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|parsed| parsed.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());

    path.ends_with(".pls") || path.ends_with(".m3u")
}

/// Format a duration as `H:MM:SS`, with microseconds when present
pub fn format_duration(duration: Duration) -> String {
    let (sign, duration) = if duration < Duration::zero() {
        ("-", -duration)
    } else {
        ("", duration)
    };

    let total_seconds = duration.num_seconds();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    let micros = duration.subsec_nanos() / 1_000;

    if micros > 0 {
        format!("{}{}:{:02}:{:02}.{:06}", sign, hours, minutes, secs, micros)
    } else {
        format!("{}{}:{:02}:{:02}", sign, hours, minutes, secs)
    }
}

/// Seconds argument for the capture tool, never negative
pub fn duration_as_seconds_arg(duration: Duration) -> String {
    let millis = duration.num_milliseconds().max(0);
    format!("{}.{:03}", millis / 1000, millis % 1000)
}

/// Sanitize a station name for use as a file name
pub fn sanitize_filename(filename: &str) -> String {
    let sanitized = filename
        .chars()
        .map(|c| {
            match c {
                // Keep alphanumeric characters, hyphens, underscores, and dots
                c if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' => c,
                // Replace everything else with underscore
                _ => '_',
            }
        })
        .collect::<String>();

    let trimmed = sanitized.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "stream".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Check if the current environment has the external tools
pub async fn check_dependencies(capture_program: &str, encoder_program: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(capture_program).await {
        missing.push(format!("{} - required to capture the stream", capture_program));
    }

    if !check_command_available(encoder_program).await {
        missing.push(format!("{} - required to compress recordings", encoder_program));
    }

    missing
}

/// Check if a command can be spawned from PATH
async fn check_command_available(command: &str) -> bool {
    use std::process::Stdio;
    use tokio::process::Command;

    // mplayer has no --version flag, so only spawning is checked
    Command::new(command)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok()
}
