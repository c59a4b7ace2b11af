// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Runtime-only Tool Definitions. These never hit a repository directly —
//! the Workspace Tool Cache persists the `CompiledArtifact` shape found in
//! `crate::infrastructure::workspace_tool_cache` and rehydrates a live
//! `ToolDefinition` (with a freshly re-materialized invoker) on each cache
//! hit, per §9's "closures across caches" design note.

use crate::domain::credential::CredentialSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DISCOVER_TOOL_PATH: &str = "discover";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    Auto,
    Required,
}

/// Context handed to an invoker at call time (§4.9 step 6).
#[derive(Clone)]
pub struct InvocationContext {
    pub task_id: crate::domain::task::TaskId,
    pub workspace: String,
    pub actor: String,
    pub client: Option<String>,
    pub credential_headers: Option<std::collections::HashMap<String, String>>,
    /// `discover`'s own implementation filters its tool listing through
    /// this predicate so it never leaks tools the caller's policies would
    /// deny (§9 "Discover tool").
    pub is_tool_allowed: std::sync::Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("task_id", &self.task_id)
            .field("workspace", &self.workspace)
            .field("actor", &self.actor)
            .field("client", &self.client)
            .finish()
    }
}

#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct InvokeError(pub String);

#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(
        &self,
        input: serde_json::Value,
        ctx: &InvocationContext,
    ) -> Result<serde_json::Value, InvokeError>;
}

/// A tool materialized from a built-in or from a compiled external source.
#[derive(Clone)]
pub struct ToolDefinition {
    pub path: String,
    pub description: String,
    pub approval_mode: ApprovalMode,
    /// `None` for built-ins; `Some(source_id)` for compiled external tools.
    pub origin_source: Option<String>,
    pub credential_spec: Option<CredentialSpec>,
    pub args_schema: serde_json::Value,
    pub returns_schema: serde_json::Value,
    /// Set for the GraphQL source's synthetic tool; the Policy Evaluator
    /// decomposes the call into pseudo-tools rather than evaluating the
    /// synthetic tool's own policy directly (§4.7).
    pub is_graphql_source: bool,
    pub invoker: std::sync::Arc<dyn ToolInvoker>,
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("path", &self.path)
            .field("approval_mode", &self.approval_mode)
            .field("origin_source", &self.origin_source)
            .field("is_graphql_source", &self.is_graphql_source)
            .finish()
    }
}

impl ToolDefinition {
    pub fn is_builtin(&self) -> bool {
        self.origin_source.is_none()
    }
}

/// Stable, serializable description of a tool, independent of its invoker —
/// what the Workspace Tool Cache actually persists (§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub path: String,
    pub description: String,
    pub approval_mode: ApprovalMode,
    pub source_id: String,
    pub source_type: crate::domain::tool_source::SourceType,
    pub credential_spec: Option<CredentialSpec>,
    pub args_schema: serde_json::Value,
    pub returns_schema: serde_json::Value,
    pub is_graphql_source: bool,
    /// Type-specific data the compiler needs to re-materialize an invoker on
    /// rehydrate (e.g. the HTTP method + path template for an OpenAPI
    /// operation, or the remote URL for an MCP tool).
    pub invoker_spec: serde_json::Value,
}
