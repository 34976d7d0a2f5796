use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stream_catcher::adapters::{LameEncoder, MplayerCapture};
use stream_catcher::session::{OutputLayout, RetryPolicy, SystemClock};
use stream_catcher::utils::{self, format_duration};
use stream_catcher::{
    parse_duration, CaptureLoop, CatcherError, Cli, Config, Session, SessionStatus, StationRegistry,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("\n{:#}\n", err);
            let code = err
                .downcast_ref::<CatcherError>()
                .map(CatcherError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.retry.max_attempts = Some(max_attempts as usize);
    }
    if let Some(delay) = cli.retry_delay {
        config.retry.delay_secs = delay;
    }

    if cli.show_config {
        config.display();
        return Ok(());
    }

    let registry = StationRegistry::from_config(&config)?;

    if cli.list_stations {
        println!("Known stations:");
        for (name, url) in registry.iter() {
            let marker = if name == registry.default_station() {
                " (default)"
            } else {
                ""
            };
            println!("  • {}{} - {}", name, marker, url);
        }
        return Ok(());
    }

    // Resolve everything before touching the filesystem
    let (station, url) = registry.resolve(cli.station.as_deref())?;
    let planned = parse_duration(&cli.duration)?;

    // Check for required external tools (non-fatal)
    let missing_deps =
        utils::check_dependencies(&config.capture.program, &config.encoder.program).await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - attempts will end immediately without them)");
    }

    let session = Session::new(station, url, planned);
    println!(
        "\n*** Recording {} for {}. ***\n",
        session.station,
        format_duration(planned)
    );

    let capture_loop = CaptureLoop::new(
        Box::new(MplayerCapture::new(&config.capture, !cli.quiet)),
        Box::new(LameEncoder::new(&config.encoder)),
        Arc::new(SystemClock),
        OutputLayout::from_config(&config),
    )
    .with_policy(RetryPolicy::from(&config.retry));

    let report = capture_loop.run(&session).await?;

    println!(
        "Recorded {} of {} in {} attempt(s).",
        format_duration(report.recorded()),
        format_duration(planned),
        report.attempts.len()
    );
    for output in report.outputs() {
        println!("  {}", output.display());
    }

    match report.status {
        SessionStatus::Completed => Ok(()),
        SessionStatus::AttemptLimitReached { remaining } => {
            Err(CatcherError::AttemptLimitReached {
                attempts: report.attempts.len(),
                remaining: format_duration(remaining),
            }
            .into())
        }
    }
}
