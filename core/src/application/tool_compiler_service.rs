// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Tool-Source Compiler dispatch (§4.4): routes a `ToolSource` to its
//! per-type compiler and isolates per-source failures so one misconfigured
//! source never fails an entire workspace rebuild. Grounded in the
//! teacher's `ToolServerManager::start_all` "log and continue" pattern.

use crate::domain::tool::{CompiledArtifact, ToolDefinition};
use crate::domain::tool_source::{SourceType, ToolSource};
use crate::infrastructure::tool_sources::graphql::GraphqlCompiler;
use crate::infrastructure::tool_sources::mcp::McpCompiler;
use crate::infrastructure::tool_sources::openapi::OpenApiCompiler;
use crate::infrastructure::tool_sources::{CompileError, SourceCompiler};
use std::sync::Arc;
use tracing::warn;

/// One compiled source's outcome: either its tools, or the warning the
/// caller should surface without failing the whole rebuild.
pub struct SourceCompileOutcome {
    pub source_name: String,
    pub tools: Vec<(ToolDefinition, CompiledArtifact)>,
    pub warning: Option<String>,
}

pub struct ToolCompilerService {
    openapi: Arc<OpenApiCompiler>,
    graphql: Arc<GraphqlCompiler>,
    mcp: Arc<McpCompiler>,
}

impl ToolCompilerService {
    pub fn new(openapi: Arc<OpenApiCompiler>, graphql: Arc<GraphqlCompiler>, mcp: Arc<McpCompiler>) -> Self {
        Self { openapi, graphql, mcp }
    }

    fn compiler_for(&self, source_type: SourceType) -> &(dyn SourceCompiler) {
        match source_type {
            SourceType::Openapi => self.openapi.as_ref(),
            SourceType::Graphql => self.graphql.as_ref(),
            SourceType::Mcp => self.mcp.as_ref(),
        }
    }

    async fn compile_one(&self, source: &ToolSource) -> Result<Vec<(ToolDefinition, CompiledArtifact)>, CompileError> {
        self.compiler_for(source.source_type).compile(source).await
    }

    pub fn rehydrate(&self, artifact: &CompiledArtifact) -> ToolDefinition {
        self.compiler_for(artifact.source_type).rehydrate(artifact)
    }

    /// Compiles every enabled source, isolating failures per source (§4.4,
    /// §4.5 step 2b-c): a bad source contributes a warning and zero tools,
    /// never a hard error for the whole workspace.
    pub async fn compile_all(&self, sources: &[ToolSource]) -> Vec<SourceCompileOutcome> {
        let mut outcomes = Vec::with_capacity(sources.len());
        for source in sources {
            match self.compile_one(source).await {
                Ok(tools) => outcomes.push(SourceCompileOutcome {
                    source_name: source.name.clone(),
                    tools,
                    warning: None,
                }),
                Err(err) => {
                    warn!(source = %source.name, error = %err, "tool source failed to compile");
                    outcomes.push(SourceCompileOutcome {
                        source_name: source.name.clone(),
                        tools: Vec::new(),
                        warning: Some(err.to_string()),
                    });
                }
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tool_source::SourceConfig;
    use crate::infrastructure::prepared_spec_cache::InMemoryPreparedSpecCache;

    fn service() -> ToolCompilerService {
        ToolCompilerService::new(
            Arc::new(OpenApiCompiler::new(Arc::new(InMemoryPreparedSpecCache::new()), 300_000)),
            Arc::new(GraphqlCompiler::new()),
            Arc::new(McpCompiler::new()),
        )
    }

    #[tokio::test]
    async fn a_malformed_source_yields_a_warning_not_a_panic() {
        let service = service();
        let bad_source = ToolSource::new(
            "ws_1".to_string(),
            "broken".to_string(),
            SourceType::Openapi,
            SourceConfig(serde_json::json!({ "spec": { "paths": {} } })),
        );
        let good_source = ToolSource::new(
            "ws_1".to_string(),
            "notion".to_string(),
            SourceType::Mcp,
            SourceConfig(serde_json::json!({
                "url": "https://mcp.example.com",
                "tools": [{"name": "search"}],
            })),
        );
        let outcomes = service.compile_all(&[bad_source, good_source]).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].warning.is_some());
        assert!(outcomes[0].tools.is_empty());
        assert!(outcomes[1].warning.is_none());
        assert_eq!(outcomes[1].tools.len(), 1);
    }
}
