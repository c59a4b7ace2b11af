// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! GraphQL tool-source compiler (§4.4). Produces exactly one synthetic
//! tool per source — "execute a GraphQL operation against this endpoint" —
//! whose invoker posts `{query, variables}` over HTTP. The pseudo-tools of
//! shape `<source>.query.<field>`/`<source>.mutation.<field>` the policy
//! evaluator needs (§4.7) are derived at evaluation time from the operation
//! string itself (`application::policy_service::evaluate_graphql`), not
//! materialized here as standalone `ToolDefinition`s.

use crate::domain::credential::CredentialSpec;
use crate::domain::tool::{ApprovalMode, CompiledArtifact, InvocationContext, InvokeError, ToolDefinition, ToolInvoker};
use crate::domain::tool_source::{SourceType, ToolSource};
use crate::infrastructure::tool_sources::{CompileError, SourceCompiler};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
struct GraphqlSourceConfig {
    endpoint: String,
    #[serde(default)]
    default_approval: Option<String>,
    #[serde(default)]
    credential: Option<CredentialSpec>,
}

fn parse_approval_mode(s: &str) -> Option<ApprovalMode> {
    match s {
        "auto" => Some(ApprovalMode::Auto),
        "required" => Some(ApprovalMode::Required),
        _ => None,
    }
}

pub struct GraphqlInvoker {
    client: reqwest::Client,
    endpoint: String,
}

#[async_trait]
impl ToolInvoker for GraphqlInvoker {
    async fn invoke(&self, input: serde_json::Value, ctx: &InvocationContext) -> Result<serde_json::Value, InvokeError> {
        let query = input
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| InvokeError("GraphQL tool input requires a 'query' string".to_string()))?;
        let variables = input.get("variables").cloned().unwrap_or(serde_json::json!({}));

        let mut req = self.client.post(&self.endpoint);
        if let Some(headers) = &ctx.credential_headers {
            for (name, value) in headers {
                req = req.header(name, value);
            }
        }
        let resp = req
            .json(&serde_json::json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| InvokeError(e.to_string()))?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
        if !status.is_success() {
            return Err(InvokeError(format!("HTTP {status}: {body}")));
        }
        if let Some(errors) = body.get("errors") {
            if errors.as_array().is_some_and(|a| !a.is_empty()) {
                return Err(InvokeError(format!("GraphQL errors: {errors}")));
            }
        }
        Ok(body)
    }
}

pub struct GraphqlCompiler {
    client: reqwest::Client,
}

impl Default for GraphqlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphqlCompiler {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl SourceCompiler for GraphqlCompiler {
    async fn compile(&self, source: &ToolSource) -> Result<Vec<(ToolDefinition, CompiledArtifact)>, CompileError> {
        let config: GraphqlSourceConfig = serde_json::from_value(source.config.0.clone())
            .map_err(|e| CompileError::failed("graphql", &source.name, format!("invalid config: {e}")))?;

        let approval_mode = config
            .default_approval
            .as_deref()
            .and_then(parse_approval_mode)
            .unwrap_or(ApprovalMode::Required);

        let path = source.name.clone();
        let invoker = Arc::new(GraphqlInvoker {
            client: self.client.clone(),
            endpoint: config.endpoint.clone(),
        });

        let definition = ToolDefinition {
            path: path.clone(),
            description: format!("Execute a GraphQL operation against '{}'", source.name),
            approval_mode,
            origin_source: Some(source.id.to_string()),
            credential_spec: config.credential.clone(),
            args_schema: serde_json::json!({
                "type": "object",
                "required": ["query"],
                "properties": { "query": {"type": "string"}, "variables": {"type": "object"} },
            }),
            returns_schema: serde_json::json!({ "type": "object" }),
            is_graphql_source: true,
            invoker,
        };

        let artifact = CompiledArtifact {
            path,
            description: definition.description.clone(),
            approval_mode,
            source_id: source.id.to_string(),
            source_type: SOURCE_TYPE,
            credential_spec: config.credential.clone(),
            args_schema: definition.args_schema.clone(),
            returns_schema: definition.returns_schema.clone(),
            is_graphql_source: true,
            invoker_spec: serde_json::json!({ "endpoint": config.endpoint }),
        };

        Ok(vec![(definition, artifact)])
    }

    fn rehydrate(&self, artifact: &CompiledArtifact) -> ToolDefinition {
        let endpoint = artifact
            .invoker_spec
            .get("endpoint")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let invoker = Arc::new(GraphqlInvoker {
            client: self.client.clone(),
            endpoint,
        });
        ToolDefinition {
            path: artifact.path.clone(),
            description: artifact.description.clone(),
            approval_mode: artifact.approval_mode,
            origin_source: Some(artifact.source_id.clone()),
            credential_spec: artifact.credential_spec.clone(),
            args_schema: artifact.args_schema.clone(),
            returns_schema: artifact.returns_schema.clone(),
            is_graphql_source: true,
            invoker,
        }
    }
}

pub const SOURCE_TYPE: SourceType = SourceType::Graphql;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tool_source::ToolSource;

    fn source_with(endpoint: &str, default_approval: Option<&str>) -> ToolSource {
        let mut config = serde_json::json!({ "endpoint": endpoint });
        if let Some(mode) = default_approval {
            config["default_approval"] = serde_json::json!(mode);
        }
        ToolSource::new(
            "ws_1".to_string(),
            "github_gql".to_string(),
            SourceType::Graphql,
            crate::domain::tool_source::SourceConfig(config),
        )
    }

    #[tokio::test]
    async fn compiles_exactly_one_synthetic_tool_marked_as_graphql_source() {
        let compiler = GraphqlCompiler::new();
        let source = source_with("https://api.github.com/graphql", None);
        let compiled = compiler.compile(&source).await.unwrap();
        assert_eq!(compiled.len(), 1);
        let (definition, artifact) = &compiled[0];
        assert!(definition.is_graphql_source);
        assert_eq!(definition.path, "github_gql");
        assert!(artifact.is_graphql_source);
        assert_eq!(artifact.approval_mode, ApprovalMode::Required);
    }

    #[tokio::test]
    async fn default_approval_override_is_honored() {
        let compiler = GraphqlCompiler::new();
        let source = source_with("https://api.github.com/graphql", Some("auto"));
        let compiled = compiler.compile(&source).await.unwrap();
        assert_eq!(compiled[0].0.approval_mode, ApprovalMode::Auto);
    }

    #[test]
    fn rehydrate_restores_the_endpoint() {
        let compiler = GraphqlCompiler::new();
        let artifact = CompiledArtifact {
            path: "github_gql".to_string(),
            description: "desc".to_string(),
            approval_mode: ApprovalMode::Required,
            source_id: "src_1".to_string(),
            source_type: SourceType::Graphql,
            credential_spec: None,
            args_schema: serde_json::json!({}),
            returns_schema: serde_json::json!({}),
            is_graphql_source: true,
            invoker_spec: serde_json::json!({ "endpoint": "https://api.github.com/graphql" }),
        };
        let definition = compiler.rehydrate(&artifact);
        assert_eq!(definition.path, "github_gql");
        assert!(definition.is_graphql_source);
    }
}
