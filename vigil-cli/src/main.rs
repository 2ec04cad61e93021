use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use vigil_engine::{NotificationDispatcher, StreamMonitor, TerminalBell};

mod cli;
mod config;
mod error;
mod replay;

use cli::CliArgs;
use config::ProgramConfig;
use error::AppError;
use replay::{Replayer, parse_script};

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

/// Logs go to stderr so the snapshot on stdout stays machine readable.
fn init_logging(args: &CliArgs) -> Result<Option<WorkerGuard>, AppError> {
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let guard = match &args.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;
            let (file_writer, guard) = tracing_appender::non_blocking(file);

            let subscriber = FmtSubscriber::builder()
                .with_max_level(log_level)
                .with_writer(MakeWriterExt::and(std::io::stderr, file_writer))
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| AppError::Initialization(e.to_string()))?;
            Some(guard)
        }
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(log_level)
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| AppError::Initialization(e.to_string()))?;
            None
        }
    };
    Ok(guard)
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();
    let _guard = init_logging(&args)?;

    info!("Vigil - live stream health monitor");
    info!("==================================================================");

    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            ProgramConfig::load(path)?
        }
        None => ProgramConfig::default(),
    };
    if let Some(url) = &args.url {
        config.panel.video_url = url.clone();
    }

    let monitor = if args.dry_run {
        config.panel.validate()?;
        info!("Dry run, external notifications disabled");
        StreamMonitor::new(&config.panel, Arc::new(NotificationDispatcher::default()))
    } else {
        StreamMonitor::from_options(&config.panel)?
    };
    if !monitor.dispatcher().is_empty() {
        info!(
            channels = ?monitor.dispatcher().channel_names(),
            "External alert channels configured"
        );
    }
    let monitor = if args.no_bell {
        monitor
    } else {
        monitor.with_sound(Arc::new(TerminalBell))
    };

    let script = std::fs::read_to_string(&args.events)?;
    let entries = parse_script(&script)?;
    info!(
        path = %args.events.display(),
        entries = entries.len(),
        "Replaying event log"
    );

    let mut replayer = Replayer::new(config.panel.clone(), monitor, Local::now());
    replayer.prime(&config.series)?;
    for entry in entries {
        replayer.apply(entry)?;
    }

    let (snapshot, reports) = replayer.finish().await;
    for report in &reports {
        for (channel, reason) in &report.failed {
            warn!(channel = %channel, reason = %reason, "External alert was not delivered");
        }
    }

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
