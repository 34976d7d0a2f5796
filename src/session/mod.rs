use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod clock;
pub mod naming;

pub use clock::{Clock, ManualClock, SystemClock};
pub use naming::BaseNamer;

use crate::adapters::{with_extension, CaptureProcess, TranscodeProcess};
use crate::config::{Config, RetryConfig};
use crate::utils::format_duration;
use crate::Result;

/// Seconds charged against the budget when an attempt measures no elapsed
/// time, so the budget keeps shrinking even if the clock stalls or jumps back
pub const STALLED_CLOCK_CHARGE_SECS: i64 = 1;

/// One recording request: a station and the total time to record it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub station: String,
    pub url: String,
    pub planned: Duration,
}

impl Session {
    pub fn new(station: impl Into<String>, url: impl Into<String>, planned: Duration) -> Self {
        Self {
            station: station.into(),
            url: url.into(),
            planned,
        }
    }
}

/// A single capture + transcode + cleanup cycle
#[derive(Debug, Clone)]
pub struct Attempt {
    pub number: usize,
    pub base_name: String,
    pub budget: Duration,
    pub started_at: DateTime<Utc>,
}

/// Measured result of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub budget: Duration,
    pub elapsed: Duration,
}

impl Outcome {
    /// The attempt used up its whole budget, or nothing would be left for another
    pub fn is_complete(&self) -> bool {
        self.elapsed >= self.budget || self.remaining() <= Duration::zero()
    }

    /// Budget left for the next attempt: strictly below this one's and never negative
    pub fn remaining(&self) -> Duration {
        let charged = if self.elapsed > Duration::zero() {
            self.elapsed
        } else {
            Duration::seconds(STALLED_CLOCK_CHARGE_SECS)
        };
        (self.budget - charged.min(self.budget)).max(Duration::zero())
    }
}

/// What one attempt left behind
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub number: usize,
    pub base_name: String,
    pub budget: Duration,
    pub elapsed: Duration,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Cumulative capture time reached the planned duration
    Completed,
    /// The configured attempt cap stopped the session early
    AttemptLimitReached { remaining: Duration },
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session: Session,
    pub attempts: Vec<AttemptRecord>,
    pub status: SessionStatus,
}

impl SessionReport {
    /// Total wall-clock time spent across all attempts
    pub fn recorded(&self) -> Duration {
        self.attempts
            .iter()
            .fold(Duration::zero(), |total, attempt| total + attempt.elapsed)
    }

    /// Compressed files that exist on disk
    pub fn outputs(&self) -> Vec<&Path> {
        self.attempts
            .iter()
            .map(|attempt| attempt.output.as_path())
            .filter(|path| path.exists())
            .collect()
    }
}

/// Where an attempt's files live
#[derive(Debug, Clone)]
pub struct OutputLayout {
    dir: PathBuf,
    uncompressed_ext: String,
    compressed_ext: String,
}

impl OutputLayout {
    pub fn new(
        dir: impl Into<PathBuf>,
        uncompressed_ext: impl Into<String>,
        compressed_ext: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            uncompressed_ext: uncompressed_ext.into(),
            compressed_ext: compressed_ext.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.output_dir.clone(),
            config.capture.extension.clone(),
            config.encoder.extension.clone(),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base_path(&self, base_name: &str) -> PathBuf {
        self.dir.join(base_name)
    }

    pub fn uncompressed_path(&self, base_name: &str) -> PathBuf {
        with_extension(&self.base_path(base_name), &self.uncompressed_ext)
    }

    pub fn compressed_path(&self, base_name: &str) -> PathBuf {
        with_extension(&self.base_path(base_name), &self.compressed_ext)
    }

    /// Either file for this base name already exists
    pub fn is_taken(&self, base_name: &str) -> bool {
        self.uncompressed_path(base_name).exists() || self.compressed_path(base_name).exists()
    }
}

/// Optional limits on resuming; the default retries immediately and forever
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<usize>,
    pub delay: std::time::Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: std::time::Duration::from_secs(config.delay_secs),
        }
    }
}

/// Records a session, resuming under new names until the planned time is covered
pub struct CaptureLoop {
    capture: Box<dyn CaptureProcess>,
    transcode: Box<dyn TranscodeProcess>,
    clock: Arc<dyn Clock>,
    layout: OutputLayout,
    policy: RetryPolicy,
}

impl CaptureLoop {
    pub fn new(
        capture: Box<dyn CaptureProcess>,
        transcode: Box<dyn TranscodeProcess>,
        clock: Arc<dyn Clock>,
        layout: OutputLayout,
    ) -> Self {
        Self {
            capture,
            transcode,
            clock,
            layout,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Record the session until its planned duration is covered
    pub async fn run(&self, session: &Session) -> Result<SessionReport> {
        fs_err::create_dir_all(self.layout.dir())
            .context("Failed to create output directory")?;

        let mut namer = BaseNamer::new(&session.station);
        let mut attempts = Vec::new();
        let mut attempt = Attempt {
            number: 1,
            base_name: namer.first(),
            budget: session.planned,
            started_at: self.clock.now(),
        };

        loop {
            let outcome = self.run_attempt(session, &attempt).await;
            tracing::info!(
                "Streaming ended after {} ({} had been planned.)",
                format_duration(outcome.elapsed),
                format_duration(outcome.budget)
            );

            attempts.push(AttemptRecord {
                number: attempt.number,
                output: self.layout.compressed_path(&attempt.base_name),
                base_name: attempt.base_name,
                budget: outcome.budget,
                elapsed: outcome.elapsed,
            });

            if outcome.is_complete() {
                return Ok(SessionReport {
                    session: session.clone(),
                    attempts,
                    status: SessionStatus::Completed,
                });
            }

            let remaining = outcome.remaining();
            if let Some(max_attempts) = self.policy.max_attempts {
                if attempts.len() >= max_attempts {
                    tracing::warn!(
                        "Giving up after {} attempts, {} left unrecorded",
                        attempts.len(),
                        format_duration(remaining)
                    );
                    return Ok(SessionReport {
                        session: session.clone(),
                        attempts,
                        status: SessionStatus::AttemptLimitReached { remaining },
                    });
                }
            }

            tracing::info!("Resuming stream!");
            if !self.policy.delay.is_zero() {
                tracing::debug!("Waiting {:?} before resuming", self.policy.delay);
                tokio::time::sleep(self.policy.delay).await;
            }

            let started_at = self.clock.now();
            let base_name = namer.resumed(started_at, &self.layout);
            tracing::info!(
                "New file: {}",
                self.layout.uncompressed_path(&base_name).display()
            );

            attempt = Attempt {
                number: attempt.number + 1,
                base_name,
                budget: remaining,
                started_at,
            };
        }
    }

    /// Capture, transcode and clean up; failures only show up as a short elapsed time
    async fn run_attempt(&self, session: &Session, attempt: &Attempt) -> Outcome {
        let base = self.layout.base_path(&attempt.base_name);
        tracing::debug!(
            "Attempt {} for {}: {} into {}",
            attempt.number,
            session.station,
            format_duration(attempt.budget),
            base.display()
        );

        if let Err(e) = self.capture.capture(&base, &session.url, attempt.budget).await {
            tracing::warn!("Capture failed: {:#}", e);
        }

        let source_ext = &self.layout.uncompressed_ext;
        if let Err(e) = self.transcode.transcode(&base, source_ext).await {
            tracing::warn!("Transcode failed: {:#}", e);
        }

        let uncompressed = self.layout.uncompressed_path(&attempt.base_name);
        match fs_err::remove_file(&uncompressed) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("No capture to clean up at {}", uncompressed.display());
            }
            Err(e) => tracing::warn!("Failed to remove capture: {}", e),
        }

        Outcome {
            budget: attempt.budget,
            elapsed: self.clock.now() - attempt.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockCaptureProcess, MockTranscodeProcess};
    use mockall::predicate::*;
    use std::sync::Mutex;
    use std::time::Instant;

    const WFMU_URL: &str = "http://stream0.wfmu.org/freeform-128k";

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn outcome(budget: Duration, elapsed: Duration) -> Outcome {
        Outcome { budget, elapsed }
    }

    #[test]
    fn test_outcome_complete_when_budget_used() {
        assert!(outcome(Duration::seconds(10), Duration::seconds(10)).is_complete());
        assert!(outcome(Duration::seconds(10), Duration::seconds(12)).is_complete());
    }

    #[test]
    fn test_outcome_remaining_is_budget_minus_elapsed() {
        let outcome = outcome(Duration::seconds(60), Duration::seconds(20));
        assert!(!outcome.is_complete());
        assert_eq!(outcome.remaining(), Duration::seconds(40));
    }

    #[test]
    fn test_outcome_remaining_shrinks_on_stalled_clock() {
        for elapsed in [Duration::zero(), Duration::seconds(-30)] {
            let outcome = outcome(Duration::seconds(60), elapsed);
            assert!(!outcome.is_complete());
            assert_eq!(outcome.remaining(), Duration::seconds(59));
        }
    }

    #[test]
    fn test_stall_charge_never_leaves_negative_budget() {
        for elapsed in [Duration::zero(), Duration::seconds(-30)] {
            let outcome = outcome(Duration::milliseconds(500), elapsed);
            assert_eq!(outcome.remaining(), Duration::zero());
            assert!(outcome.is_complete());
        }

        let exact = outcome(Duration::seconds(1), Duration::zero());
        assert_eq!(exact.remaining(), Duration::zero());
        assert!(exact.is_complete());
    }

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new("/srv/radio", "wav", "mp3");
        assert_eq!(
            layout.uncompressed_path("WFMU"),
            PathBuf::from("/srv/radio/WFMU.wav")
        );
        assert_eq!(
            layout.compressed_path("WFMU"),
            PathBuf::from("/srv/radio/WFMU.mp3")
        );
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = RetryConfig {
            max_attempts: Some(3),
            delay_secs: 2,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, Some(3));
        assert_eq!(policy.delay, std::time::Duration::from_secs(2));
        assert_eq!(
            RetryPolicy::from(&RetryConfig::default()),
            RetryPolicy::default()
        );
    }

    #[tokio::test]
    async fn test_each_attempt_is_transcoded_once() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(start()));

        let mut capture = MockCaptureProcess::new();
        let capture_clock = clock.clone();
        let mut elapsed = vec![Duration::seconds(40), Duration::seconds(20)];
        capture.expect_capture().times(2).returning(move |_, _, _| {
            capture_clock.advance(elapsed.pop().unwrap());
            Ok(())
        });

        let mut transcode = MockTranscodeProcess::new();
        for name in ["WFMU", "WFMU-1700000020"] {
            let expected = dir.path().join(name);
            transcode
                .expect_transcode()
                .with(
                    function(move |base: &Path| base == expected.as_path()),
                    eq("wav"),
                )
                .times(1)
                .returning(|_, _| Ok(()));
        }

        let capture_loop = CaptureLoop::new(
            Box::new(capture),
            Box::new(transcode),
            clock,
            OutputLayout::new(dir.path(), "wav", "mp3"),
        );
        let session = Session::new("WFMU", WFMU_URL, Duration::minutes(1));

        let report = capture_loop.run(&session).await.unwrap();
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_budget_is_passed_to_capture() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(start()));

        let mut capture = MockCaptureProcess::new();
        let capture_clock = clock.clone();
        capture
            .expect_capture()
            .with(
                always(),
                eq("http://example.com/live"),
                eq(Duration::minutes(30)),
            )
            .times(1)
            .returning(move |_, _, budget| {
                capture_clock.advance(budget);
                Ok(())
            });

        let mut transcode = MockTranscodeProcess::new();
        transcode.expect_transcode().returning(|_, _| Ok(()));

        let capture_loop = CaptureLoop::new(
            Box::new(capture),
            Box::new(transcode),
            clock,
            OutputLayout::new(dir.path(), "wav", "mp3"),
        );
        let session = Session::new("TEST", "http://example.com/live", Duration::minutes(30));

        let report = capture_loop.run(&session).await.unwrap();
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.recorded(), Duration::minutes(30));
    }

    #[tokio::test]
    async fn test_short_session_on_stalled_clock_captures_once() {
        let dir = tempfile::tempdir().unwrap();
        // never advanced
        let clock = Arc::new(ManualClock::new(start()));

        let mut capture = MockCaptureProcess::new();
        capture
            .expect_capture()
            .with(always(), eq(WFMU_URL), eq(Duration::milliseconds(500)))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut transcode = MockTranscodeProcess::new();
        transcode.expect_transcode().times(1).returning(|_, _| Ok(()));

        let capture_loop = CaptureLoop::new(
            Box::new(capture),
            Box::new(transcode),
            clock,
            OutputLayout::new(dir.path(), "wav", "mp3"),
        );
        let session = Session::new("WFMU", WFMU_URL, Duration::milliseconds(500));

        let report = capture_loop.run(&session).await.unwrap();
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_retry_delay_is_waited_but_not_charged() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(start()));
        let delay = std::time::Duration::from_millis(50);

        let started: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
        let mut capture = MockCaptureProcess::new();
        let capture_clock = clock.clone();
        let capture_started = started.clone();
        let mut elapsed = vec![Duration::seconds(40), Duration::seconds(20)];
        capture.expect_capture().times(2).returning(move |_, _, _| {
            capture_started.lock().unwrap().push(Instant::now());
            capture_clock.advance(elapsed.pop().unwrap());
            Ok(())
        });

        let mut transcode = MockTranscodeProcess::new();
        transcode.expect_transcode().times(2).returning(|_, _| Ok(()));

        let capture_loop = CaptureLoop::new(
            Box::new(capture),
            Box::new(transcode),
            clock,
            OutputLayout::new(dir.path(), "wav", "mp3"),
        )
        .with_policy(RetryPolicy {
            max_attempts: None,
            delay,
        });
        let session = Session::new("WFMU", WFMU_URL, Duration::minutes(1));

        let report = capture_loop.run(&session).await.unwrap();
        let budgets: Vec<_> = report.attempts.iter().map(|a| a.budget).collect();
        assert_eq!(budgets, vec![Duration::seconds(60), Duration::seconds(40)]);
        assert_eq!(report.recorded(), Duration::minutes(1));
        assert_eq!(report.status, SessionStatus::Completed);

        let started = started.lock().unwrap();
        assert_eq!(started.len(), 2);
        assert!(started[1].duration_since(started[0]) >= delay);
    }

    #[tokio::test]
    async fn test_adapter_failures_count_as_early_termination() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(start()));

        let mut capture = MockCaptureProcess::new();
        let capture_clock = clock.clone();
        let mut calls = 0;
        capture.expect_capture().times(3).returning(move |_, _, budget| {
            calls += 1;
            if calls < 3 {
                capture_clock.advance(Duration::seconds(2));
                Err(anyhow::anyhow!("connection refused"))
            } else {
                capture_clock.advance(budget);
                Ok(())
            }
        });

        let mut transcode = MockTranscodeProcess::new();
        transcode
            .expect_transcode()
            .returning(|_, _| Err(anyhow::anyhow!("no input file")));

        let capture_loop = CaptureLoop::new(
            Box::new(capture),
            Box::new(transcode),
            clock,
            OutputLayout::new(dir.path(), "wav", "mp3"),
        );
        let session = Session::new(
            "WPRB",
            "http://stardust.wavestreamer.com:2152/1",
            Duration::seconds(10),
        );

        let report = capture_loop.run(&session).await.unwrap();
        let budgets: Vec<_> = report.attempts.iter().map(|a| a.budget).collect();
        assert_eq!(
            budgets,
            vec![
                Duration::seconds(10),
                Duration::seconds(8),
                Duration::seconds(6)
            ]
        );
        assert_eq!(report.status, SessionStatus::Completed);
        assert!(report.outputs().is_empty());
    }

    #[tokio::test]
    async fn test_attempt_cap_stops_retry_storm() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(start()));

        let mut capture = MockCaptureProcess::new();
        capture
            .expect_capture()
            .times(3)
            .returning(|_, _, _| Err(anyhow::anyhow!("host unreachable")));
        let mut transcode = MockTranscodeProcess::new();
        transcode.expect_transcode().times(3).returning(|_, _| Ok(()));

        let capture_loop = CaptureLoop::new(
            Box::new(capture),
            Box::new(transcode),
            clock,
            OutputLayout::new(dir.path(), "wav", "mp3"),
        )
        .with_policy(RetryPolicy {
            max_attempts: Some(3),
            delay: std::time::Duration::ZERO,
        });
        let session = Session::new(
            "KCRW",
            "http://media.kcrw.com/live/kcrwlive.pls",
            Duration::minutes(5),
        );

        let report = capture_loop.run(&session).await.unwrap();
        assert_eq!(report.attempts.len(), 3);
        // the clock never moved, so each attempt was charged the stall minimum
        assert_eq!(
            report.status,
            SessionStatus::AttemptLimitReached {
                remaining: Duration::seconds(297)
            }
        );
    }
}
