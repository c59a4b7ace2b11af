// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Per-type tool-source compilers (§4.4). Each submodule turns a
//! `SourceConfig` into `ToolDefinition`s and knows how to re-materialize an
//! invoker from a previously-compiled `CompiledArtifact` on a Workspace Tool
//! Cache rehydrate (§9 "Closures across caches").

pub mod graphql;
pub mod mcp;
pub mod openapi;

use crate::domain::tool::{CompiledArtifact, ToolDefinition};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to load {source_type} source '{source_name}': {message}")]
    Failed {
        source_type: &'static str,
        source_name: String,
        message: String,
    },
}

impl CompileError {
    pub fn failed(source_type: &'static str, source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            source_type,
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Implemented by each per-type compiler (OpenAPI, GraphQL, MCP).
#[async_trait::async_trait]
pub trait SourceCompiler: Send + Sync {
    /// Fresh compile from a `ToolSource`'s config: fetch/parse/normalize and
    /// produce live, invocable `ToolDefinition`s paired with the
    /// `CompiledArtifact` the Workspace Tool Cache persists for each one.
    /// The pairing happens inside the compiler because only it knows the
    /// type-specific data (HTTP method/path, remote tool name, ...) needed
    /// to rebuild an invoker later — that data never appears on
    /// `ToolDefinition` itself (§9 "closures across caches").
    async fn compile(
        &self,
        source: &crate::domain::tool_source::ToolSource,
    ) -> Result<Vec<(ToolDefinition, CompiledArtifact)>, CompileError>;

    /// Re-materializes a live `ToolDefinition` from a previously-compiled
    /// artifact, without repeating network I/O — used on a Workspace Tool
    /// Cache hit.
    fn rehydrate(&self, artifact: &CompiledArtifact) -> ToolDefinition;
}
