// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Access policy management commands.

use crate::client::GatewayClient;
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

#[derive(Subcommand)]
pub enum PolicyCommand {
    /// Add an access policy rule
    Add {
        #[arg(long)]
        workspace: String,
        /// Restrict this rule to a specific actor
        #[arg(long)]
        actor: Option<String>,
        /// Restrict this rule to a specific calling client
        #[arg(long)]
        client: Option<String>,
        /// Wildcard tool-path pattern, e.g. "github.*"
        #[arg(long)]
        pattern: String,
        /// allow | require_approval | deny
        #[arg(long, value_parser = ["allow", "require_approval", "deny"])]
        decision: String,
        /// Higher priority wins among equally specific rules
        #[arg(long, default_value_t = 0)]
        priority: i64,
    },

    /// List access policies for a workspace
    List {
        #[arg(long)]
        workspace: String,
    },

    /// Remove an access policy rule
    Remove {
        #[arg(value_name = "POLICY_ID")]
        id: String,
    },
}

pub async fn handle_command(command: PolicyCommand, client: GatewayClient) -> Result<()> {
    match command {
        PolicyCommand::Add { workspace, actor, client: calling_client, pattern, decision, priority } => {
            let payload = json!({
                "workspace": workspace,
                "actor": actor,
                "client": calling_client,
                "pattern": pattern,
                "decision": decision,
                "priority": priority,
            });
            let policy = client.create_policy(payload).await?;
            println!("{}", format!("✓ policy added: {}", policy["id"]).green());
            Ok(())
        }
        PolicyCommand::List { workspace } => {
            let response = client.list_policies(&workspace).await?;
            let policies = response["policies"].as_array().cloned().unwrap_or_default();
            if policies.is_empty() {
                println!("{}", "no policies found".yellow());
                return Ok(());
            }
            for policy in policies {
                println!(
                    "  {} {} -> {} (priority {})",
                    policy["id"].as_str().unwrap_or("?"),
                    policy["pattern"].as_str().unwrap_or("?"),
                    policy["decision"].as_str().unwrap_or("?"),
                    policy["priority"],
                );
            }
            Ok(())
        }
        PolicyCommand::Remove { id } => {
            client.delete_policy(&id).await?;
            println!("{}", format!("✓ policy {id} removed").green());
            Ok(())
        }
    }
}
