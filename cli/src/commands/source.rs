// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Tool source registration commands (OpenAPI/GraphQL/MCP).

use crate::client::GatewayClient;
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

#[derive(Subcommand)]
pub enum SourceCommand {
    /// Register a new tool source
    Add {
        #[arg(long)]
        workspace: String,
        #[arg(long)]
        name: String,
        /// openapi | graphql | mcp
        #[arg(long, value_parser = ["openapi", "graphql", "mcp"])]
        source_type: String,
        /// Source-type-specific config as a JSON string or @file.json
        #[arg(long)]
        config: String,
    },

    /// List tool sources registered in a workspace
    List {
        #[arg(long)]
        workspace: String,
    },

    /// Remove a tool source
    Remove {
        #[arg(value_name = "SOURCE_ID")]
        id: String,
    },
}

pub async fn handle_command(command: SourceCommand, client: GatewayClient) -> Result<()> {
    match command {
        SourceCommand::Add { workspace, name, source_type, config } => {
            let config_value = crate::commands::read_json_arg(&config)?;
            let payload = json!({
                "workspace": workspace,
                "name": name,
                "source_type": source_type,
                "config": config_value,
            });
            let source = client.create_source(payload).await?;
            println!("{}", format!("✓ source registered: {}", source["id"]).green());
            Ok(())
        }
        SourceCommand::List { workspace } => {
            let response = client.list_sources(&workspace).await?;
            let sources = response["sources"].as_array().cloned().unwrap_or_default();
            if sources.is_empty() {
                println!("{}", "no tool sources found".yellow());
                return Ok(());
            }
            for source in sources {
                println!(
                    "  {} {} ({})",
                    source["id"].as_str().unwrap_or("?"),
                    source["name"].as_str().unwrap_or("?"),
                    source["source_type"].as_str().unwrap_or("?"),
                );
            }
            Ok(())
        }
        SourceCommand::Remove { id } => {
            client.delete_source(&id).await?;
            println!("{}", format!("✓ source {id} removed").green());
            Ok(())
        }
    }
}
