//! Main entry point for the hlget CLI

use anyhow::Context;
use clap::Parser;
use hlget::cli::output::OutputFormatter;
use hlget::cli::{Args, InterruptAction, Interrupts, VerbosityLevel, INTERRUPTED_EXIT_CODE};
use hlget::core::{Credentials, Downloader, RunEvent};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbosity_level())?;
    info!("Starting hlget {}", env!("CARGO_PKG_VERSION"));

    args.validate()?;
    let credentials = args.credentials()?;
    let mut formatter = OutputFormatter::new(args.verbosity_level());

    let mut downloader = Downloader::new()
        .with_concurrency(args.concurrency)
        .with_timeout(args.timeout_duration())
        .with_ffmpeg(&args.ffmpeg)
        .with_container(&args.ext);
    if let Some(proxy) = &args.proxy {
        downloader = downloader.with_proxy(proxy);
    }
    if let Some(user_agent) = &args.user_agent {
        downloader = downloader.with_user_agent(user_agent);
    }

    let user_id = match &args.user_id {
        Some(id) => id.clone(),
        None => {
            formatter.info("Looking up user ID from the access token");
            downloader
                .resolve_user_id(&credentials.access_token)
                .await
                .context("pass --user-id to skip the lookup")?
        }
    };
    debug!("Using user ID {}", user_id);

    if args.list {
        return handle_list(&downloader, &credentials, &user_id, &args, &formatter).await;
    }

    match downloader.ffmpeg_version().await {
        Some(version) => debug!("Using {}", version),
        None => formatter.warning(&format!(
            "{} did not run; downloads will fail (set --ffmpeg or HLGET_FFMPEG)",
            args.ffmpeg.display()
        )),
    }

    handle_run(&downloader, credentials, &user_id, &args, &mut formatter).await
}

/// Print the highlights without downloading
async fn handle_list(
    downloader: &Downloader,
    credentials: &Credentials,
    user_id: &str,
    args: &Args,
    formatter: &OutputFormatter,
) -> anyhow::Result<ExitCode> {
    let listing = downloader
        .list(credentials, user_id, args.max_videos)
        .await?;

    if let Some(e) = &listing.interrupted {
        formatter.warning(&format!("Listing stopped early: {}", e));
    }
    if listing.videos.is_empty() {
        formatter.info("No highlights found");
        return Ok(ExitCode::SUCCESS);
    }

    let total = listing.videos.len();
    for (index, video) in listing.videos.iter().enumerate() {
        formatter.print_highlight(index, total, video);
    }
    Ok(ExitCode::SUCCESS)
}

/// Download every highlight, reporting progress until the run ends
async fn handle_run(
    downloader: &Downloader,
    credentials: Credentials,
    user_id: &str,
    args: &Args,
    formatter: &mut OutputFormatter,
) -> anyhow::Result<ExitCode> {
    let start_time = Instant::now();
    let output_dir = args.output_dir();
    formatter.info(&format!("Saving highlights to {}", output_dir.display()));

    let mut run = downloader.start_run(credentials, user_id, output_dir, args.max_videos)?;
    let mut interrupts = Interrupts::new();

    loop {
        tokio::select! {
            event = run.next_event() => {
                let Some(event) = event else { break };
                if let RunEvent::Listed { total, .. } = &event {
                    if !args.no_progress && *total > 0 {
                        formatter.create_progress_bar(*total as u64);
                    }
                }
                formatter.handle_event(&event);
                formatter.update_progress(&run.state());
                if matches!(event, RunEvent::Summary(_)) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => match interrupts.record() {
                InterruptAction::Cancel => {
                    formatter.warning("Interrupted, stopping downloads (Ctrl-C again to exit now)...");
                    downloader.cancel_run();
                }
                InterruptAction::Exit => {
                    formatter.finish_progress("Exited");
                    formatter.warning("Interrupted again, exiting without waiting");
                    return Ok(ExitCode::from(INTERRUPTED_EXIT_CODE));
                }
            },
        }
    }

    let summary = run.wait().await;
    formatter.finish_progress(summary.status_message());
    formatter.print_summary(&summary, start_time.elapsed());

    if summary.failed_titles.is_empty() && !summary.cancelled {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Initialize logging system
fn init_logging(verbosity: VerbosityLevel) -> anyhow::Result<()> {
    let log_level = match verbosity {
        VerbosityLevel::Quiet => "error",
        VerbosityLevel::Normal => "info",
        VerbosityLevel::Verbose => "debug",
    };

    // RUST_LOG wins over the verbosity flags
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
        .context("failed to initialize logging")?;

    Ok(())
}
