// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Credential registration commands.

use crate::client::GatewayClient;
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

#[derive(Subcommand)]
pub enum CredentialCommand {
    /// Register a credential for a tool source
    Set {
        #[arg(long)]
        workspace: String,
        /// Matches a tool source's credential spec `source_key`
        #[arg(long)]
        source_key: String,
        /// workspace | actor
        #[arg(long, value_parser = ["workspace", "actor"])]
        scope: String,
        /// Required when scope is "actor"
        #[arg(long)]
        actor_id: Option<String>,
        /// managed | workos-vault
        #[arg(long, value_parser = ["managed", "workos-vault"])]
        provider: String,
        /// Secret payload as a JSON string, e.g. '{"token":"sk-..."}'
        #[arg(long)]
        payload: String,
        /// bearer | apiKey | basic, used when the source's spec doesn't already pin one
        #[arg(long)]
        auth_kind: Option<String>,
        #[arg(long)]
        header_name: Option<String>,
    },
}

pub async fn handle_command(command: CredentialCommand, client: GatewayClient) -> Result<()> {
    match command {
        CredentialCommand::Set {
            workspace,
            source_key,
            scope,
            actor_id,
            provider,
            payload,
            auth_kind,
            header_name,
        } => {
            let payload_value = crate::commands::read_json_arg(&payload)?;
            let request = json!({
                "workspace": workspace,
                "source_key": source_key,
                "scope": scope,
                "actor_id": actor_id,
                "provider": provider,
                "payload": payload_value,
                "auth_kind": auth_kind,
                "header_name": header_name,
            });
            let response = client.create_credential(request).await?;
            println!("{}", format!("✓ credential saved: {}", response["id"]).green());
            Ok(())
        }
    }
}
