//! ROI Watch - Main Entry Point
//!
//! Follows open positions until the engine books profit (or the watch gives up).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roi_watch::config::Config;
use roi_watch::monitor::{
    portfolio_report, run_session, ChannelReportSink, FileLogSource, LogEvidenceSource,
    PositionWatcher, Report, ReportSink, ThresholdPolicy, TracingReportSink, WatcherSettings,
};
use roi_watch::source::{EngineClient, PositionSnapshotSource};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// ROI Watch CLI
#[derive(Parser)]
#[command(name = "roi-watch")]
#[command(version, about = "Watch leveraged positions until early profit booking is confirmed")]
struct Cli {
    /// Emit log records as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch one or more positions until they close or the session times out
    Watch {
        /// Symbol to watch (repeatable)
        #[arg(short, long = "symbol", required = true, num_args = 1..)]
        symbols: Vec<String>,

        /// Print status events as JSON lines on stdout
        #[arg(long)]
        json: bool,
    },

    /// Print a one-shot ROI report for every open position
    Report {
        /// Print the report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Load and validate configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Machine-readable stdout means human logs move to stderr
    let stdout_reserved = matches!(
        cli.command,
        Commands::Watch { json: true, .. } | Commands::Report { json: true }
    );
    init_logging(cli.log_json, stdout_reserved)?;

    let config = Config::load()?;
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Watch { symbols, json } => run_watch(config, symbols, json).await,
        Commands::Report { json } => run_report(&config, json).await,
        Commands::CheckConfig => {
            log_config(&config);
            info!("✅ Configuration is valid");
            Ok(())
        }
    }
}

/// Watch every symbol in parallel, one isolated watcher per task.
async fn run_watch(config: Config, symbols: Vec<String>, json: bool) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║              ROI Watch v{} - Position Monitor              ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");
    log_config(&config);

    let client: Arc<dyn PositionSnapshotSource> =
        Arc::new(EngineClient::new(&config.api).context("Failed to create engine client")?);
    let log: Arc<dyn LogEvidenceSource> = Arc::new(FileLogSource::from_config(&config.evidence));
    let settings = WatcherSettings::from_config(&config);
    let poll_interval = Duration::from_secs(config.watch.poll_interval_seconds);

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received, finishing current tick...");
        let _ = shutdown_tx.send(true);
    });

    let (sink, mut reports) = ChannelReportSink::channel();
    let history_window = config.watch.history_window;
    let renderer = tokio::spawn(async move {
        let mut tracing_sink = TracingReportSink::new(history_window);
        while let Some(report) = reports.recv().await {
            if json {
                match serde_json::to_string(&report) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to serialize report: {}", e),
                }
                continue;
            }
            match &report {
                Report::Event(event) => tracing_sink.on_event(event),
                Report::Summary(summary) => tracing_sink.on_summary(summary),
            }
        }
    });

    let mut handles = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let symbol = symbol.trim().to_uppercase();
        let watcher = PositionWatcher::new(
            &symbol,
            client.clone(),
            log.clone(),
            settings.clone(),
            chrono::Utc::now(),
        );
        let mut sink = sink.clone();
        let shutdown = shutdown_rx.clone();

        handles.push(tokio::spawn(async move {
            run_session(watcher, &mut sink, shutdown, poll_interval).await
        }));
    }
    drop(sink);

    let mut summaries = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(summary) => summaries.push(summary),
            Err(e) => error!("Watcher task failed: {}", e),
        }
    }

    // All sinks are gone once the watchers finish, which ends the renderer
    renderer.await.context("Report renderer failed")?;

    for summary in &summaries {
        info!(
            symbol = %summary.symbol,
            final_state = %summary.final_state,
            cancelled = summary.cancelled,
            "Watch finished"
        );
    }
    info!("👋 ROI Watch shutdown complete");

    Ok(())
}

/// Fetch one snapshot and report ROI for every open position.
async fn run_report(config: &Config, json: bool) -> Result<()> {
    let client = EngineClient::new(&config.api).context("Failed to create engine client")?;
    let policy = ThresholdPolicy::from_config(&config.watch);

    let report = portfolio_report(&client, &policy, config.watch.fee_rate)
        .await
        .with_context(|| format!("Failed to fetch positions from {}", client.positions_url()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.positions.is_empty() {
        info!("No open positions");
    } else {
        report.log();
    }

    Ok(())
}

/// Initialize logging to the console and an hourly rolling file under `logs/`.
fn init_logging(json: bool, stderr_console: bool) -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "roi-watch.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the flush guard alive for the program duration
    Box::leak(Box::new(guard));

    let writer = if stderr_console {
        BoxMakeWriter::new(std::io::stderr.and(file_writer))
    } else {
        BoxMakeWriter::new(std::io::stdout.and(file_writer))
    };

    let filter = EnvFilter::from_default_env()
        .add_directive("roi_watch=debug".parse()?)
        .add_directive(Level::INFO.into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE);

    if json {
        builder.json().init();
    } else {
        builder.with_ansi(!stderr_console).init();
    }

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Engine: {}{}", config.api.base_url, config.api.positions_path);
    info!(
        "   Poll Interval: {}s (max session {}s)",
        config.watch.poll_interval_seconds, config.watch.max_monitoring_seconds
    );
    info!("   Fee Rate: {:.3}%", config.watch.fee_rate * dec!(100));

    let mut modes: Vec<_> = config.watch.threshold_by_mode.iter().collect();
    modes.sort_by(|a, b| a.0.cmp(b.0));
    for (mode, threshold) in modes {
        info!("   Threshold [{}]: {}%", mode, threshold);
    }
    info!("   Threshold [default]: {}%", config.watch.default_threshold);

    for (symbol, threshold) in &config.watch.symbol_overrides {
        info!("   Override [{}]: {}%", symbol, threshold);
    }

    info!(
        "   Evidence Log: {} (last {} lines)",
        config.evidence.log_path, config.evidence.lookback_lines
    );
}
