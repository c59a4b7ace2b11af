// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Workspace Tool Cache (§4.5): resolves the live tool map for a workspace,
//! either by rehydrating a signature-matched cache snapshot or by rebuilding
//! from enabled `ToolSource` rows. Always rebuilds the privileged `discover`
//! tool over the resulting set (§9 "Discover tool"). Grounded on
//! `infrastructure::tool_router::rebuild_index`'s rebuild-on-change shape.

use crate::application::tool_compiler_service::ToolCompilerService;
use crate::domain::repository::ToolSourceRepository;
use crate::domain::tool::{
    ApprovalMode, InvocationContext, InvokeError, ToolDefinition, ToolInvoker, DISCOVER_TOOL_PATH,
};
use crate::infrastructure::workspace_tool_cache::{
    compute_signature, CachedSnapshot, SourceSignatureInput, WorkspaceToolCacheStore,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

struct DiscoverInvoker {
    tool_paths: Vec<String>,
}

#[async_trait]
impl ToolInvoker for DiscoverInvoker {
    async fn invoke(&self, _input: serde_json::Value, ctx: &InvocationContext) -> Result<serde_json::Value, InvokeError> {
        let visible: Vec<&str> = self
            .tool_paths
            .iter()
            .map(|p| p.as_str())
            .filter(|p| (ctx.is_tool_allowed)(p))
            .collect();
        Ok(serde_json::json!({ "tools": visible }))
    }
}

fn discover_tool(tool_paths: Vec<String>) -> ToolDefinition {
    ToolDefinition {
        path: DISCOVER_TOOL_PATH.to_string(),
        description: "Enumerate tools currently callable by the caller".to_string(),
        approval_mode: ApprovalMode::Auto,
        origin_source: None,
        credential_spec: None,
        args_schema: serde_json::json!({ "type": "object" }),
        returns_schema: serde_json::json!({ "type": "object" }),
        is_graphql_source: false,
        invoker: Arc::new(DiscoverInvoker { tool_paths }),
    }
}

pub struct WorkspaceToolCacheService {
    sources: Arc<dyn ToolSourceRepository>,
    compiler: Arc<ToolCompilerService>,
    store: Arc<dyn WorkspaceToolCacheStore>,
    base_tools: Vec<ToolDefinition>,
}

impl WorkspaceToolCacheService {
    pub fn new(
        sources: Arc<dyn ToolSourceRepository>,
        compiler: Arc<ToolCompilerService>,
        store: Arc<dyn WorkspaceToolCacheStore>,
        base_tools: Vec<ToolDefinition>,
    ) -> Self {
        Self { sources, compiler, store, base_tools }
    }

    /// Returns the live, invocable tool map for `workspace`, keyed by path,
    /// including `discover` and every base and compiled-source tool.
    pub async fn tools_for_workspace(&self, workspace: &str) -> anyhow::Result<HashMap<String, ToolDefinition>> {
        let sources = self.sources.list_enabled_in_workspace(workspace).await?;
        let mut sorted_sources = sources;
        sorted_sources.sort_by_key(|s| s.id.0);

        let id_strings: Vec<String> = sorted_sources.iter().map(|s| s.id.0.to_string()).collect();
        let signature_inputs: Vec<SourceSignatureInput> = sorted_sources
            .iter()
            .zip(&id_strings)
            .map(|(s, id_str)| SourceSignatureInput {
                source_id: id_str,
                updated_at: s.updated_at,
                enabled: s.enabled,
            })
            .collect();
        let signature = compute_signature(workspace, &signature_inputs);

        if let Some(snapshot) = self.store.get(workspace, &signature).await {
            return Ok(self.assemble(snapshot.artifacts.into_iter().map(|a| self.compiler.rehydrate(&a)).collect()));
        }

        let outcomes = self.compiler.compile_all(&sorted_sources).await;
        let mut artifacts = Vec::new();
        let mut compiled_tools: Vec<ToolDefinition> = Vec::new();
        for outcome in outcomes {
            if let Some(warning) = &outcome.warning {
                warn!(source = %outcome.source_name, %warning, "tool source rebuild warning");
            }
            for (definition, artifact) in outcome.tools {
                compiled_tools.push(definition);
                artifacts.push(artifact);
            }
        }

        self.store
            .put(
                workspace,
                CachedSnapshot {
                    signature,
                    artifacts,
                    dts_storage_ids: HashMap::new(),
                },
                HashMap::new(),
            )
            .await;

        Ok(self.assemble(compiled_tools))
    }

    /// Merges base tools with compiled tools (later entries win on path
    /// conflict, §4.5 step 2d) and adds `discover` over the resulting set.
    fn assemble(&self, compiled_tools: Vec<ToolDefinition>) -> HashMap<String, ToolDefinition> {
        let mut map = HashMap::new();
        for tool in self.base_tools.iter().cloned() {
            map.insert(tool.path.clone(), tool);
        }
        for tool in compiled_tools {
            map.insert(tool.path.clone(), tool);
        }
        let mut paths: Vec<String> = map.keys().cloned().collect();
        paths.sort();
        map.insert(DISCOVER_TOOL_PATH.to_string(), discover_tool(paths));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tool_compiler_service::ToolCompilerService;
    use crate::domain::tool_source::{SourceConfig, SourceType, ToolSource};
    use crate::infrastructure::prepared_spec_cache::InMemoryPreparedSpecCache;
    use crate::infrastructure::repositories::in_memory::InMemoryToolSourceRepository;
    use crate::infrastructure::tool_sources::graphql::GraphqlCompiler;
    use crate::infrastructure::tool_sources::mcp::McpCompiler;
    use crate::infrastructure::tool_sources::openapi::OpenApiCompiler;
    use crate::infrastructure::workspace_tool_cache::InMemoryWorkspaceToolCacheStore;

    async fn service_with_source() -> (WorkspaceToolCacheService, Arc<InMemoryToolSourceRepository>) {
        let sources = Arc::new(InMemoryToolSourceRepository::new());
        sources
            .save(&ToolSource::new(
                "ws_1".to_string(),
                "notion".to_string(),
                SourceType::Mcp,
                SourceConfig(serde_json::json!({
                    "url": "https://mcp.example.com",
                    "tools": [{"name": "search"}],
                })),
            ))
            .await
            .unwrap();
        let compiler = Arc::new(ToolCompilerService::new(
            Arc::new(OpenApiCompiler::new(Arc::new(InMemoryPreparedSpecCache::new()), 300_000)),
            Arc::new(GraphqlCompiler::new()),
            Arc::new(McpCompiler::new()),
        ));
        let store = Arc::new(InMemoryWorkspaceToolCacheStore::new());
        let service = WorkspaceToolCacheService::new(sources.clone(), compiler, store, Vec::new());
        (service, sources)
    }

    #[tokio::test]
    async fn rebuild_includes_compiled_tools_and_discover() {
        let (service, _sources) = service_with_source().await;
        let tools = service.tools_for_workspace("ws_1").await.unwrap();
        assert!(tools.contains_key("notion.search"));
        assert!(tools.contains_key(DISCOVER_TOOL_PATH));
    }

    #[tokio::test]
    async fn second_call_with_unchanged_sources_hits_the_cache() {
        let (service, _sources) = service_with_source().await;
        let first = service.tools_for_workspace("ws_1").await.unwrap();
        let second = service.tools_for_workspace("ws_1").await.unwrap();
        assert_eq!(first.len(), second.len());
        assert!(second.contains_key("notion.search"));
    }

    #[tokio::test]
    async fn discover_filters_by_is_tool_allowed() {
        let (service, _sources) = service_with_source().await;
        let tools = service.tools_for_workspace("ws_1").await.unwrap();
        let discover = tools.get(DISCOVER_TOOL_PATH).unwrap();
        let ctx = InvocationContext {
            task_id: crate::domain::task::TaskId::new(),
            workspace: "ws_1".to_string(),
            actor: "actor_1".to_string(),
            client: None,
            credential_headers: None,
            is_tool_allowed: Arc::new(|path: &str| path == "notion.search"),
        };
        let result = discover.invoker.invoke(serde_json::json!({}), &ctx).await.unwrap();
        let visible = result["tools"].as_array().unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0], "notion.search");
    }
}
