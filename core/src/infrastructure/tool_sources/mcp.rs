// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! MCP tool-source compiler (§4.4). Each remote tool the source lists
//! becomes one `ToolDefinition` whose invoker proxies a JSON-RPC
//! `tools/call` request to the remote MCP server over `streamable-http` or
//! `sse` transport. Discovery of the remote tool list itself (an MCP
//! `tools/list` round trip) is out of scope here — the source config
//! carries a pre-declared tool list, mirroring how the OpenAPI compiler
//! takes a pre-declared spec rather than crawling an unknown surface.

use crate::domain::credential::CredentialSpec;
use crate::domain::tool::{ApprovalMode, CompiledArtifact, InvocationContext, InvokeError, ToolDefinition, ToolInvoker};
use crate::domain::tool_source::{SourceType, ToolSource};
use crate::infrastructure::tool_sources::{CompileError, SourceCompiler};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
struct McpRemoteTool {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    approval: Option<String>,
    #[serde(default = "default_object_schema")]
    args_schema: serde_json::Value,
}

fn default_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object" })
}

#[derive(Debug, Clone, Deserialize)]
struct McpSourceConfig {
    url: String,
    #[serde(default = "default_transport")]
    transport: String,
    #[serde(default)]
    default_approval: Option<String>,
    #[serde(default)]
    credential: Option<CredentialSpec>,
    tools: Vec<McpRemoteTool>,
}

fn default_transport() -> String {
    "streamable-http".to_string()
}

fn parse_approval_mode(s: &str) -> Option<ApprovalMode> {
    match s {
        "auto" => Some(ApprovalMode::Auto),
        "required" => Some(ApprovalMode::Required),
        _ => None,
    }
}

pub struct McpInvoker {
    client: reqwest::Client,
    url: String,
    remote_tool_name: String,
}

#[async_trait]
impl ToolInvoker for McpInvoker {
    async fn invoke(&self, input: serde_json::Value, ctx: &InvocationContext) -> Result<serde_json::Value, InvokeError> {
        let mut req = self.client.post(&self.url).header("Accept", "application/json, text/event-stream");
        if let Some(headers) = &ctx.credential_headers {
            for (name, value) in headers {
                req = req.header(name, value);
            }
        }
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": self.remote_tool_name, "arguments": input },
        });
        let resp = req.json(&body).send().await.map_err(|e| InvokeError(e.to_string()))?;
        let status = resp.status();
        let payload: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
        if !status.is_success() {
            return Err(InvokeError(format!("HTTP {status}: {payload}")));
        }
        if let Some(error) = payload.get("error") {
            return Err(InvokeError(format!("MCP error: {error}")));
        }
        Ok(payload.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }
}

pub struct McpCompiler {
    client: reqwest::Client,
}

impl Default for McpCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl McpCompiler {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl SourceCompiler for McpCompiler {
    async fn compile(&self, source: &ToolSource) -> Result<Vec<(ToolDefinition, CompiledArtifact)>, CompileError> {
        let config: McpSourceConfig = serde_json::from_value(source.config.0.clone())
            .map_err(|e| CompileError::failed("mcp", &source.name, format!("invalid config: {e}")))?;

        if config.tools.is_empty() {
            return Err(CompileError::failed("mcp", &source.name, "source declares no tools"));
        }

        let default_mode = config
            .default_approval
            .as_deref()
            .and_then(parse_approval_mode)
            .unwrap_or(ApprovalMode::Required);

        let mut out = Vec::with_capacity(config.tools.len());
        for remote_tool in &config.tools {
            let path = format!("{}.{}", source.name, remote_tool.name);
            let approval_mode = remote_tool
                .approval
                .as_deref()
                .and_then(parse_approval_mode)
                .unwrap_or(default_mode);

            let invoker = Arc::new(McpInvoker {
                client: self.client.clone(),
                url: config.url.clone(),
                remote_tool_name: remote_tool.name.clone(),
            });

            let description = if remote_tool.description.is_empty() {
                format!("MCP tool '{}' on {} ({})", remote_tool.name, source.name, config.transport)
            } else {
                remote_tool.description.clone()
            };

            let definition = ToolDefinition {
                path: path.clone(),
                description: description.clone(),
                approval_mode,
                origin_source: Some(source.id.to_string()),
                credential_spec: config.credential.clone(),
                args_schema: remote_tool.args_schema.clone(),
                returns_schema: default_object_schema(),
                is_graphql_source: false,
                invoker,
            };

            let artifact = CompiledArtifact {
                path,
                description,
                approval_mode,
                source_id: source.id.to_string(),
                source_type: SOURCE_TYPE,
                credential_spec: config.credential.clone(),
                args_schema: remote_tool.args_schema.clone(),
                returns_schema: default_object_schema(),
                is_graphql_source: false,
                invoker_spec: serde_json::json!({
                    "url": config.url,
                    "remote_tool_name": remote_tool.name,
                    "transport": config.transport,
                }),
            };

            out.push((definition, artifact));
        }
        Ok(out)
    }

    fn rehydrate(&self, artifact: &CompiledArtifact) -> ToolDefinition {
        let url = artifact.invoker_spec.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let remote_tool_name = artifact
            .invoker_spec
            .get("remote_tool_name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let invoker = Arc::new(McpInvoker {
            client: self.client.clone(),
            url,
            remote_tool_name,
        });
        ToolDefinition {
            path: artifact.path.clone(),
            description: artifact.description.clone(),
            approval_mode: artifact.approval_mode,
            origin_source: Some(artifact.source_id.clone()),
            credential_spec: artifact.credential_spec.clone(),
            args_schema: artifact.args_schema.clone(),
            returns_schema: artifact.returns_schema.clone(),
            is_graphql_source: false,
            invoker,
        }
    }
}

pub const SOURCE_TYPE: SourceType = SourceType::Mcp;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tool_source::SourceConfig;

    fn source_with_tools(tools: serde_json::Value) -> ToolSource {
        ToolSource::new(
            "ws_1".to_string(),
            "notion".to_string(),
            SourceType::Mcp,
            SourceConfig(serde_json::json!({
                "url": "https://mcp.example.com/stream",
                "transport": "streamable-http",
                "tools": tools,
            })),
        )
    }

    #[tokio::test]
    async fn compiles_one_tool_definition_per_remote_tool() {
        let compiler = McpCompiler::new();
        let source = source_with_tools(serde_json::json!([
            {"name": "search_pages"},
            {"name": "create_page", "approval": "required"},
        ]));
        let compiled = compiler.compile(&source).await.unwrap();
        assert_eq!(compiled.len(), 2);
        assert_eq!(compiled[0].0.path, "notion.search_pages");
        assert_eq!(compiled[1].0.path, "notion.create_page");
    }

    #[tokio::test]
    async fn empty_tool_list_is_a_compile_error() {
        let compiler = McpCompiler::new();
        let source = source_with_tools(serde_json::json!([]));
        assert!(compiler.compile(&source).await.is_err());
    }

    #[test]
    fn rehydrate_restores_remote_tool_name_and_url() {
        let compiler = McpCompiler::new();
        let artifact = CompiledArtifact {
            path: "notion.search_pages".to_string(),
            description: "desc".to_string(),
            approval_mode: ApprovalMode::Auto,
            source_id: "src_1".to_string(),
            source_type: SourceType::Mcp,
            credential_spec: None,
            args_schema: serde_json::json!({}),
            returns_schema: serde_json::json!({}),
            is_graphql_source: false,
            invoker_spec: serde_json::json!({"url": "https://mcp.example.com/stream", "remote_tool_name": "search_pages", "transport": "streamable-http"}),
        };
        let definition = compiler.rehydrate(&artifact);
        assert_eq!(definition.path, "notion.search_pages");
    }
}
