//! # symbIoTe Core Interface
//!
//! Synchronous HTTP entry point to the symbIoTe Core. Every call is relayed
//! to the Core services over the message broker and answered with their
//! reply.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ci_telemetry::{init_telemetry, TelemetryConfig};
use interface_runtime::{load_config, open_session, run, Transport};
use tracing::{error, info};

/// symbIoTe Core Interface
#[derive(Parser, Debug)]
#[command(name = "core-interface")]
#[command(about = "HTTP facade relaying requests to the symbIoTe Core over AMQP")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "CI_CONFIG")]
    config: Option<PathBuf>,

    /// Use an in-process broker instead of connecting to RabbitMQ
    #[arg(long)]
    standalone: bool,

    /// Override the log level (e.g. `debug`, `core_interface=trace`)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = &args.log_level {
        telemetry = telemetry.with_log_level(level.clone());
    }
    let _telemetry = init_telemetry(telemetry).context("Failed to initialize telemetry")?;

    let config = load_config(args.config.as_deref())?;
    info!(
        http = %config.http_addr(),
        reply_queue = %config.broker.reply_queue,
        "Configuration loaded"
    );

    let transport = if args.standalone {
        Transport::Standalone
    } else {
        Transport::Amqp
    };
    let session = open_session(&config, transport).await?;

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    };

    run(config, session, shutdown).await
}
