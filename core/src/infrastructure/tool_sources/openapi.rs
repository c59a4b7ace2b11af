// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! OpenAPI tool-source compiler (§4.4). When `spec` is a URL string, the
//! document is fetched and normalized through the Prepared-Spec Cache
//! (§4.3); an inline spec object is prepared directly. Each operation
//! becomes one tool whose invoker issues an HTTP request with bound
//! parameters and credential headers.

use crate::domain::credential::{AuthKind, CredentialScope, CredentialSpec};
use crate::domain::tool::{
    ApprovalMode, CompiledArtifact, InvocationContext, InvokeError, ToolDefinition, ToolInvoker,
};
use crate::domain::tool_source::{SourceType, ToolSource};
use crate::infrastructure::prepared_spec_cache::PreparedSpecCache;
use crate::infrastructure::tool_sources::{CompileError, SourceCompiler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenApiOperation {
    operation_id: String,
    method: String,
    path: String,
    #[serde(default)]
    summary: String,
    #[serde(default = "default_object_schema")]
    args_schema: serde_json::Value,
    #[serde(default = "default_object_schema")]
    returns_schema: serde_json::Value,
}

fn default_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object" })
}

/// The document shape the compiler understands after normalization. A full
/// OpenAPI resolver (refs, allOf, discriminators) is out of scope; this
/// captures exactly what the dispatcher needs: a base URL and a flat list
/// of callable operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreparedOpenApiSpec {
    base_url: String,
    operations: Vec<OpenApiOperation>,
}

fn is_read_method(method: &str) -> bool {
    matches!(method.to_ascii_uppercase().as_str(), "GET" | "HEAD")
}

/// Parses a raw OpenAPI document (JSON or YAML-as-JSON-value) into the
/// compiler's flat operation list. Every `paths.<path>.<method>` entry
/// becomes one operation; `operationId` falls back to `<method>_<path>`
/// when absent.
fn normalize_document(doc: &serde_json::Value, fallback_base_url: &str) -> Result<PreparedOpenApiSpec, String> {
    let base_url = doc
        .get("servers")
        .and_then(|s| s.as_array())
        .and_then(|arr| arr.first())
        .and_then(|s| s.get("url"))
        .and_then(|u| u.as_str())
        .unwrap_or(fallback_base_url)
        .to_string();

    let paths = doc
        .get("paths")
        .and_then(|p| p.as_object())
        .ok_or_else(|| "document has no 'paths' object".to_string())?;

    let mut operations = Vec::new();
    for (path, methods) in paths {
        let Some(methods) = methods.as_object() else { continue };
        for (method, op) in methods {
            let upper = method.to_ascii_uppercase();
            if !matches!(
                upper.as_str(),
                "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD"
            ) {
                continue;
            }
            let operation_id = op
                .get("operationId")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("{}_{}", method.to_ascii_lowercase(), sanitize_path(path)));
            let summary = op
                .get("summary")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            operations.push(OpenApiOperation {
                operation_id,
                method: upper,
                path: path.clone(),
                summary,
                args_schema: default_object_schema(),
                returns_schema: default_object_schema(),
            });
        }
    }

    if operations.is_empty() {
        return Err("no operations found under 'paths'".to_string());
    }

    Ok(PreparedOpenApiSpec { base_url, operations })
}

fn sanitize_path(path: &str) -> String {
    path.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
struct OpenApiSourceConfig {
    spec: serde_json::Value,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    default_read_approval: Option<String>,
    #[serde(default)]
    overrides: std::collections::HashMap<String, String>,
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

pub struct OpenApiInvoker {
    client: reqwest::Client,
    base_url: String,
    method: String,
    path: String,
}

#[async_trait]
impl ToolInvoker for OpenApiInvoker {
    async fn invoke(&self, input: serde_json::Value, ctx: &InvocationContext) -> Result<serde_json::Value, InvokeError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), self.path);
        let method = reqwest::Method::from_bytes(self.method.as_bytes())
            .map_err(|e| InvokeError(e.to_string()))?;
        let mut req = self.client.request(method, &url);
        if let Some(headers) = &ctx.credential_headers {
            for (name, value) in headers {
                req = req.header(name, value);
            }
        }
        if !input.is_null() {
            req = req.json(&input);
        }
        let resp = req.send().await.map_err(|e| InvokeError(e.to_string()))?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
        if !status.is_success() {
            return Err(InvokeError(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

pub struct OpenApiCompiler {
    client: reqwest::Client,
    spec_cache: Arc<dyn PreparedSpecCache>,
    max_age_ms: i64,
}

impl OpenApiCompiler {
    pub fn new(spec_cache: Arc<dyn PreparedSpecCache>, max_age_ms: i64) -> Self {
        Self {
            client: reqwest::Client::new(),
            spec_cache,
            max_age_ms,
        }
    }

    async fn prepared_spec(&self, config: &OpenApiSourceConfig, source_name: &str) -> Result<PreparedOpenApiSpec, CompileError> {
        if let Some(url) = config.spec.as_str() {
            if let Some(handle) = self.spec_cache.get(url, self.max_age_ms).await {
                return serde_json::from_value((*handle.blob).clone())
                    .map_err(|e| CompileError::failed("openapi", source_name, e.to_string()));
            }
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| CompileError::failed("openapi", source_name, e.to_string()))?;
            if !resp.status().is_success() {
                return Err(CompileError::failed(
                    "openapi",
                    source_name,
                    format!("fetching spec returned HTTP {}", resp.status()),
                ));
            }
            let doc: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| CompileError::failed("openapi", source_name, e.to_string()))?;
            let prepared = normalize_document(&doc, config.base_url.as_deref().unwrap_or_default())
                .map_err(|e| CompileError::failed("openapi", source_name, e))?;
            let prepared_value =
                serde_json::to_value(&prepared).map_err(|e| CompileError::failed("openapi", source_name, e.to_string()))?;
            self.spec_cache.put(url, prepared_value).await;
            Ok(prepared)
        } else {
            normalize_document(&config.spec, config.base_url.as_deref().unwrap_or_default())
                .map_err(|e| CompileError::failed("openapi", source_name, e))
        }
    }
}

#[async_trait]
impl SourceCompiler for OpenApiCompiler {
    async fn compile(&self, source: &ToolSource) -> Result<Vec<(ToolDefinition, CompiledArtifact)>, CompileError> {
        let config: OpenApiSourceConfig = serde_json::from_value(source.config.0.clone())
            .map_err(|e| CompileError::failed("openapi", &source.name, format!("invalid config: {e}")))?;

        let prepared = self.prepared_spec(&config, &source.name).await?;
        let base_url = config.base_url.clone().unwrap_or(prepared.base_url.clone());

        let mut tools = Vec::with_capacity(prepared.operations.len());
        for op in &prepared.operations {
            let path = format!("{}.{}", source.name, op.operation_id);
            let default_mode = if is_read_method(&op.method) {
                config
                    .default_read_approval
                    .as_deref()
                    .and_then(parse_approval_mode)
                    .unwrap_or(ApprovalMode::Auto)
            } else {
                ApprovalMode::Required
            };
            let approval_mode = config
                .overrides
                .get(&path)
                .or_else(|| config.overrides.get(&op.operation_id))
                .and_then(|s| parse_approval_mode(s))
                .unwrap_or(default_mode);

            let invoker = Arc::new(OpenApiInvoker {
                client: self.client.clone(),
                base_url: base_url.clone(),
                method: op.method.clone(),
                path: op.path.clone(),
            });

            let description = if op.summary.is_empty() {
                format!("{} {}", op.method, op.path)
            } else {
                op.summary.clone()
            };

            let definition = ToolDefinition {
                path: path.clone(),
                description: description.clone(),
                approval_mode,
                origin_source: Some(source.id.to_string()),
                credential_spec: config.credential.clone(),
                args_schema: op.args_schema.clone(),
                returns_schema: op.returns_schema.clone(),
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
                args_schema: op.args_schema.clone(),
                returns_schema: op.returns_schema.clone(),
                is_graphql_source: false,
                invoker_spec: serde_json::json!({
                    "method": op.method,
                    "path": op.path,
                    "base_url": base_url,
                }),
            };

            tools.push((definition, artifact));
        }
        Ok(tools)
    }

    fn rehydrate(&self, artifact: &CompiledArtifact) -> ToolDefinition {
        let method = artifact
            .invoker_spec
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET")
            .to_string();
        let path = artifact
            .invoker_spec
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let base_url = artifact
            .invoker_spec
            .get("base_url")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let invoker = Arc::new(OpenApiInvoker {
            client: self.client.clone(),
            base_url,
            method,
            path,
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

pub fn default_credential_spec(source_key: &str) -> CredentialSpec {
    CredentialSpec {
        source_key: source_key.to_string(),
        scope: CredentialScope::Workspace,
        auth_kind: AuthKind::Bearer,
        header_name: None,
        static_fallback: None,
    }
}

/// `source_type` tag recorded on every `CompiledArtifact` produced here.
pub const SOURCE_TYPE: SourceType = SourceType::Openapi;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_get_and_post_operations_with_default_approval_split() {
        let doc = serde_json::json!({
            "servers": [{"url": "https://api.example.com"}],
            "paths": {
                "/widgets": {
                    "get": {"operationId": "listWidgets"},
                    "post": {"operationId": "createWidget"}
                }
            }
        });
        let prepared = normalize_document(&doc, "").unwrap();
        assert_eq!(prepared.base_url, "https://api.example.com");
        assert_eq!(prepared.operations.len(), 2);
        assert!(is_read_method("GET"));
        assert!(!is_read_method("POST"));
    }

    #[test]
    fn falls_back_to_method_and_sanitized_path_when_operation_id_missing() {
        let doc = serde_json::json!({
            "paths": { "/widgets/{id}": { "delete": {} } }
        });
        let prepared = normalize_document(&doc, "https://fallback").unwrap();
        assert_eq!(prepared.operations[0].operation_id, "delete__widgets__id_");
    }

    #[test]
    fn empty_paths_is_an_error() {
        let doc = serde_json::json!({ "paths": {} });
        assert!(normalize_document(&doc, "").is_err());
    }
}
