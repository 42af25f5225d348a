// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Local Volume Node Driver
//!
//! The `local-volume` binary plays two roles on a cluster node:
//!
//! - **Daemon**: `local-volume daemon` serves the driver protocol over HTTP and
//!   pins each mounted volume to this node before mounting it
//! - **Driver shim**: `local-volume init|mount|unmount` is what the orchestrator
//!   executes; each verb is forwarded to the daemon and the driver response is
//!   printed as JSON on stdout
//!
//! ## Commands
//!
//! - `local-volume daemon` - Run the protocol server in the foreground
//! - `local-volume config show|validate|generate` - Configuration management
//! - `local-volume init|mount|unmount` - Flexvolume driver verbs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use local_volume::commands::{self, flex, ConfigCommand, FlexVerb};
use local_volume::daemon::{self, DaemonClient, ServeOptions};
use local_volume_core::domain::protocol::{DriverResponse, DriverStatus};

/// Upper bound for one forwarded verb, covering the affinity update and the mount.
const SHIM_TIMEOUT: Duration = Duration::from_secs(120);

/// Local volume node driver - pins local persistent volumes to their node
#[derive(Parser)]
#[command(name = "local-volume")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "LOCAL_VOLUME_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Daemon HTTP port (default: from configuration, 8099)
    #[arg(long, global = true, env = "LOCAL_VOLUME_PORT")]
    port: Option<u16>,

    /// Daemon HTTP host (default: from configuration, 127.0.0.1)
    #[arg(long, global = true, env = "LOCAL_VOLUME_HOST")]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOCAL_VOLUME_LOG_LEVEL")]
    log_level: Option<String>,

    /// Node identity recorded in volume affinity (overrides configuration)
    #[arg(long, global = true, env = "NODE_NAME")]
    node_name: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the driver protocol daemon in the foreground
    #[command(name = "daemon")]
    Daemon,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Driver verb: initialize the driver
    #[command(name = "init")]
    Init,

    /// Driver verb: mount a volume at the target directory
    #[command(name = "mount")]
    Mount {
        /// Directory where the volume must appear
        #[arg(value_name = "TARGET_DIR")]
        target_dir: String,

        /// Driver options as a JSON object of strings
        #[arg(value_name = "OPTIONS_JSON")]
        options: Option<String>,
    },

    /// Driver verb: unmount the volume at the target directory
    #[command(name = "unmount")]
    Unmount {
        #[arg(value_name = "TARGET_DIR")]
        target_dir: String,
    },

    /// Any other driver verb is answered with "Not supported"
    #[command(external_subcommand)]
    Other(Vec<String>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Daemon) => {
            let config = daemon::load_config(cli.config.clone(), cli.node_name.clone())?;
            let logging = config.logging();
            init_logging(
                cli.log_level.as_deref().unwrap_or(&logging.level),
                &logging.format,
            )?;

            info!("Starting local volume daemon");
            daemon::start_daemon(
                config,
                ServeOptions {
                    host: cli.host,
                    port: cli.port,
                },
            )
            .await
        }
        Some(Commands::Config { command }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Init) => run_shim(FlexVerb::Init, &cli).await,
        Some(Commands::Mount {
            ref target_dir,
            ref options,
        }) => {
            let verb = FlexVerb::Mount {
                target_dir: target_dir.clone(),
                options: options.clone(),
            };
            run_shim(verb, &cli).await
        }
        Some(Commands::Unmount { ref target_dir }) => {
            let verb = FlexVerb::Unmount {
                target_dir: target_dir.clone(),
            };
            run_shim(verb, &cli).await
        }
        Some(Commands::Other(ref args)) => {
            let verb = args.first().cloned().unwrap_or_default();
            flex::print_response(&flex::unsupported(&verb))
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Forward one driver verb to the daemon and print its response.
///
/// The process exits non-zero when the response is a `Failure`.
async fn run_shim(verb: FlexVerb, cli: &Cli) -> Result<()> {
    // stdout carries the driver response only
    init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;

    let response = match shim_client(cli) {
        Ok(client) => flex::execute(verb, &client).await,
        Err(e) => DriverResponse::failure(format!("{:#}", e)),
    };

    flex::print_response(&response)?;
    if response.status == DriverStatus::Failure {
        std::process::exit(1);
    }
    Ok(())
}

fn shim_client(cli: &Cli) -> Result<DaemonClient> {
    let config = daemon::load_config(cli.config.clone(), None)?;
    let host = cli
        .host
        .clone()
        .unwrap_or_else(|| config.spec.server.bind_address.clone());
    let port = cli.port.unwrap_or(config.spec.server.port);

    DaemonClient::new(daemon::base_url(&host, port), SHIM_TIMEOUT)
}

/// Initialize tracing subscriber for logging
///
/// Logs go to stderr so that the shim's stdout stays machine-readable.
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .init();
    }

    Ok(())
}
