// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Human-in-the-loop approval review commands.

use crate::client::GatewayClient;
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

#[derive(Subcommand)]
pub enum ApprovalCommand {
    /// List approvals in a workspace
    List {
        #[arg(long)]
        workspace: String,
        /// pending | approved | denied
        #[arg(long, value_parser = ["pending", "approved", "denied"])]
        status: Option<String>,
    },

    /// Fetch a single approval
    Get {
        #[arg(value_name = "APPROVAL_ID")]
        id: String,
        #[arg(long)]
        workspace: String,
    },

    /// Approve a pending approval
    Approve {
        #[arg(value_name = "APPROVAL_ID")]
        id: String,
        #[arg(long)]
        workspace: String,
        #[arg(long)]
        reviewer: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Deny a pending approval
    Deny {
        #[arg(value_name = "APPROVAL_ID")]
        id: String,
        #[arg(long)]
        workspace: String,
        #[arg(long)]
        reviewer: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
}

pub async fn handle_command(command: ApprovalCommand, client: GatewayClient) -> Result<()> {
    match command {
        ApprovalCommand::List { workspace, status } => {
            let response = client.list_approvals(&workspace, status.as_deref()).await?;
            let approvals = response["approvals"].as_array().cloned().unwrap_or_default();
            if approvals.is_empty() {
                println!("{}", "no approvals found".yellow());
                return Ok(());
            }
            for approval in approvals {
                println!(
                    "  {} [{}] {} requested by {}",
                    approval["id"].as_str().unwrap_or("?"),
                    approval["status"].as_str().unwrap_or("?"),
                    approval["tool_path"].as_str().unwrap_or("?"),
                    approval["actor"].as_str().unwrap_or("?"),
                );
            }
            Ok(())
        }
        ApprovalCommand::Get { id, workspace } => {
            let approval = client.get_approval(&id, &workspace).await?;
            println!("{}", serde_json::to_string_pretty(&approval)?);
            Ok(())
        }
        ApprovalCommand::Approve { id, workspace, reviewer, reason } => {
            resolve(id, workspace, true, reviewer, reason, client).await
        }
        ApprovalCommand::Deny { id, workspace, reviewer, reason } => {
            resolve(id, workspace, false, reviewer, reason, client).await
        }
    }
}

async fn resolve(
    id: String,
    workspace: String,
    approved: bool,
    reviewer: Option<String>,
    reason: Option<String>,
    client: GatewayClient,
) -> Result<()> {
    let payload = json!({
        "workspace": workspace,
        "approved": approved,
        "reviewer": reviewer,
        "reason": reason,
    });
    let approval = client.resolve_approval(&id, payload).await?;
    let verb = if approved { "approved" } else { "denied" };
    println!("{}", format!("✓ approval {id} {verb}").green());
    let _ = approval;
    Ok(())
}
