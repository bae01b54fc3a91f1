use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use notice_monitor::fetch::SiteFetcher;
use notice_monitor::lock::InstanceLock;
use notice_monitor::notifier::Notifier;
use notice_monitor::storage::open_store;
use notice_monitor::{Config, Monitor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Run a single check cycle and exit
    Once,
    /// Keep checking every `check_interval` seconds
    Watch,
}

#[derive(Debug, Parser)]
#[command(name = "notice-monitor", about = "Watch notice boards and post new notices to Slack")]
struct Cli {
    #[arg(value_enum, default_value_t = Mode::Watch)]
    mode: Mode,

    #[arg(short, long, default_value = "config/config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("notice_monitor=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!("Starting Notice Monitor");

    let config = Arc::new(
        Config::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?,
    );
    info!("Loaded {} sites from {}", config.sites.len(), cli.config.display());

    let _lock = InstanceLock::acquire(&config.lock_file)?;

    let store = open_store(&config).await.context("opening state store")?;
    let fetcher = SiteFetcher::from_config(&config).context("building HTTP client")?;
    let notifier = Notifier::from_config(&config).context("building Slack client")?;

    let mut monitor = Monitor::new(Arc::clone(&config), Box::new(fetcher), store, notifier);

    match cli.mode {
        Mode::Once => {
            let report = monitor.run_once().await?;
            monitor.shutdown().await?;
            info!(
                "Single run finished: {} new notices, {} failed sites",
                report.new_notices(),
                report.failures()
            );
        }
        Mode::Watch => {
            let cancel = CancellationToken::new();
            tokio::spawn(shutdown_signal(cancel.clone()));
            monitor.run_continuous(cancel).await?;
        }
    }

    Ok(())
}

/// Cancel `token` on Ctrl-C or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown requested, finishing current site");
    token.cancel();
}
