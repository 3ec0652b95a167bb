use std::path::PathBuf;

use anyhow::Context;
use carbon_intensity::config::AppConfig;
use carbon_intensity::orchestrator::Orchestrator;
use carbon_intensity::shutdown::shutdown_signal;
use carbon_intensity::telemetry::{self, LogFormat};
use clap::Parser;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the application configuration file
    #[arg(
        long,
        env = "CARBON_CONFIG",
        default_value = "./config/app-config.toml"
    )]
    config: PathBuf,

    /// Publish to the console instead of the configured publisher
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// Log line format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init(args.log_format);

    info!(
        "Starting carbon-intensity v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut config = AppConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;
    config.apply_dry_run(args.dry_run);

    let orchestrator =
        Orchestrator::from_config(&config).context("resolving pipeline components")?;

    let shutdown = async {
        if let Err(e) = shutdown_signal().await {
            // Without a handler the run can only end when the reader does
            error!(error = %e, "Failed to install signal handlers");
            std::future::pending::<()>().await;
        }
    };

    let summary = orchestrator
        .run(shutdown)
        .await
        .context("pipeline stopped with an error")?;

    info!(
        published = summary.published,
        reason = ?summary.stop_reason,
        "Shutdown complete"
    );
    Ok(())
}
