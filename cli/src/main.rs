// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0

//! # gateway CLI
//!
//! The `gateway` binary both runs the sandboxed code-execution gateway
//! (`gateway serve`) and acts as a thin REST client against a running one
//! (`gateway task|source|policy|credential|approval ...`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use gateway_cli::client::GatewayClient;
use gateway_cli::commands::{self, ApprovalCommand, ConfigCommand, CredentialCommand, PolicyCommand, ServeArgs, SourceCommand, TaskCommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gateway")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Base URL of a running gateway, used by every subcommand except `serve`
    #[arg(long, global = true, env = "GATEWAY_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Path to a configuration file (overrides discovery)
    #[arg(short, long, global = true, env = "GATEWAY_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "GATEWAY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway server
    Serve(ServeArgs),

    /// Submit and inspect sandboxed tasks
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Register and manage tool sources
    Source {
        #[command(subcommand)]
        command: SourceCommand,
    },

    /// Manage access policies
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },

    /// Register credentials for tool sources
    Credential {
        #[command(subcommand)]
        command: CredentialCommand,
    },

    /// Review and resolve pending approvals
    Approval {
        #[command(subcommand)]
        command: ApprovalCommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Serve(args) => commands::serve::run(args).await,
        Commands::Task { command } => commands::task::handle_command(command, GatewayClient::new(cli.url)?).await,
        Commands::Source { command } => commands::source::handle_command(command, GatewayClient::new(cli.url)?).await,
        Commands::Policy { command } => commands::policy::handle_command(command, GatewayClient::new(cli.url)?).await,
        Commands::Credential { command } => commands::credential::handle_command(command, GatewayClient::new(cli.url)?).await,
        Commands::Approval { command } => commands::approval::handle_command(command, GatewayClient::new(cli.url)?).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
