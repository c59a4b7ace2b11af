// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use gateway_core::domain::config::GatewayConfig;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (file + env overrides)
    Show {
        /// Show config file discovery order
        #[arg(long)]
        paths: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write a sample configuration file
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./gateway-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    if show_paths {
        println!("{}", "Configuration discovery:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. GATEWAY_CONFIG_PATH: {}",
            std::env::var("GATEWAY_CONFIG_PATH").unwrap_or_else(|_| "(not set)".to_string()).dimmed()
        );
        println!("  3. GATEWAY_* environment overrides (host/port/database_url/oauth/vault)");
        println!();
    }

    let config = gateway_core::infrastructure::config::load(config_override.as_deref()).context("failed to load configuration")?;

    println!("{}", "Current configuration:".bold());
    println!("  Host: {}:{}", config.host, config.port);
    println!("  Storage backend: {:?}", config.storage_backend);
    if let Some(database_url) = &config.database_url {
        println!("  Database URL: {database_url}");
    }
    match &config.oauth {
        Some(oauth) => {
            println!("  OAuth issuer: {}", oauth.issuer);
            println!("  Anonymous OAuth: {}", oauth.allow_anonymous);
        }
        None => println!("  OAuth: {}", "disabled".dimmed()),
    }
    println!("  Prepared-spec cache TTL: {}ms", config.prepared_spec_max_age_ms);
    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");
    gateway_core::infrastructure::config::load(config_path.as_deref()).context("configuration is invalid")?;
    println!("{}", "✓ configuration is valid".green());
    Ok(())
}

async fn generate(output: PathBuf) -> Result<()> {
    let sample = serde_yaml::to_string(&GatewayConfig::default()).context("failed to render default configuration")?;
    std::fs::write(&output, sample).with_context(|| format!("failed to write config to {}", output.display()))?;
    println!("{}", format!("✓ configuration generated: {}", output.display()).green());
    Ok(())
}
