// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Task submission and inspection commands.

use crate::client::GatewayClient;
use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Submit a code snippet for sandboxed execution
    Submit {
        /// Path to the code file to execute (use "-" for @file.json-style inline code via --code)
        #[arg(value_name = "FILE", required_unless_present = "code")]
        file: Option<PathBuf>,

        /// Inline code, overrides FILE when present
        #[arg(long)]
        code: Option<String>,

        /// Sandbox runtime identifier
        #[arg(long, default_value = "python3.11")]
        runtime: String,

        /// Workspace the task runs in
        #[arg(long)]
        workspace: String,

        /// Acting identity
        #[arg(long)]
        actor: String,

        /// Calling client identifier
        #[arg(long)]
        client: Option<String>,

        /// Timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Follow the task's event stream until it finishes
        #[arg(short, long)]
        follow: bool,
    },

    /// Fetch a task by id
    Get {
        #[arg(value_name = "TASK_ID")]
        id: String,
        #[arg(long)]
        workspace: String,
    },

    /// List tasks in a workspace
    List {
        #[arg(long)]
        workspace: String,
    },

    /// Stream a task's event log
    Events {
        #[arg(value_name = "TASK_ID")]
        id: String,
        #[arg(long)]
        workspace: String,
        /// Keep the connection open for events published after this call starts
        #[arg(short, long)]
        follow: bool,
    },
}

pub async fn handle_command(command: TaskCommand, client: GatewayClient) -> Result<()> {
    match command {
        TaskCommand::Submit {
            file,
            code,
            runtime,
            workspace,
            actor,
            client: calling_client,
            timeout_ms,
            follow,
        } => submit(file, code, runtime, workspace, actor, calling_client, timeout_ms, follow, client).await,
        TaskCommand::Get { id, workspace } => get(id, workspace, client).await,
        TaskCommand::List { workspace } => list(workspace, client).await,
        TaskCommand::Events { id, workspace, follow } => events(id, workspace, follow, client).await,
    }
}

#[allow(clippy::too_many_arguments)]
async fn submit(
    file: Option<PathBuf>,
    inline_code: Option<String>,
    runtime: String,
    workspace: String,
    actor: String,
    calling_client: Option<String>,
    timeout_ms: Option<u64>,
    follow: bool,
    client: GatewayClient,
) -> Result<()> {
    let code = match inline_code {
        Some(code) => code,
        None => {
            let path = file.context("either FILE or --code must be provided")?;
            std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?
        }
    };

    let payload = json!({
        "code": code,
        "runtime_id": runtime,
        "timeout_ms": timeout_ms,
        "workspace": workspace,
        "actor": actor,
        "client": calling_client,
    });

    let task = client.create_task(payload).await?;
    let id = task["id"].as_str().unwrap_or_default().to_string();
    println!("{}", format!("✓ task submitted: {id}").green());

    if follow {
        events(id, workspace, true, client).await?;
    }
    Ok(())
}

async fn get(id: String, workspace: String, client: GatewayClient) -> Result<()> {
    let task = client.get_task(&id, &workspace).await?;
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(())
}

async fn list(workspace: String, client: GatewayClient) -> Result<()> {
    let response = client.list_tasks(&workspace).await?;
    let tasks = response["tasks"].as_array().cloned().unwrap_or_default();
    if tasks.is_empty() {
        println!("{}", "no tasks found".yellow());
        return Ok(());
    }
    for task in tasks {
        println!(
            "  {} [{}] runtime={}",
            task["id"].as_str().unwrap_or("?"),
            format_status(task["status"].as_str().unwrap_or("?")),
            task["runtime_id"].as_str().unwrap_or("?"),
        );
    }
    Ok(())
}

async fn events(id: String, workspace: String, follow: bool, client: GatewayClient) -> Result<()> {
    client
        .stream_task_events(&id, &workspace, follow, |event| {
            let event_type = event["event_type"].as_str().unwrap_or("?");
            println!("  [{event_type}] {}", event["payload"]);
        })
        .await
}

fn format_status(status: &str) -> colored::ColoredString {
    match status {
        "running" => status.yellow(),
        "completed" => status.green(),
        "failed" | "denied" => status.red(),
        _ => status.normal(),
    }
}
