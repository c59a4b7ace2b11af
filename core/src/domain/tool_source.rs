// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Openapi,
    Graphql,
    Mcp,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceType::Openapi => "openapi",
            SourceType::Graphql => "graphql",
            SourceType::Mcp => "mcp",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum ToolSourceError {
    #[error("a tool source named '{0}' already exists in this workspace")]
    DuplicateName(String),
    #[error("invalid source config: {0}")]
    InvalidConfig(String),
}

/// Opaque, type-specific configuration. Required-field validation happens at
/// compile time (§4.4), not at row insert — per spec §3's "Tool Source"
/// invariants, an ill-formed `config` is only surfaced when the compiler
/// processes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig(pub serde_json::Value);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSource {
    pub id: SourceId,
    pub workspace: String,
    pub name: String,
    pub source_type: SourceType,
    pub enabled: bool,
    pub config: SourceConfig,
    pub updated_at: DateTime<Utc>,
}

impl ToolSource {
    pub fn new(
        workspace: String,
        name: String,
        source_type: SourceType,
        config: SourceConfig,
    ) -> Self {
        Self {
            id: SourceId::new(),
            workspace,
            name,
            source_type,
            enabled: true,
            config,
            updated_at: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.enabled = enabled;
            self.touch();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_src_prefix() {
        let id = SourceId::new();
        assert!(id.to_string().starts_with("src_"));
    }

    #[test]
    fn toggling_enabled_bumps_updated_at() {
        let mut source = ToolSource::new(
            "ws_1".to_string(),
            "billing-api".to_string(),
            SourceType::Openapi,
            SourceConfig(serde_json::json!({"spec": "https://example.com/openapi.yaml"})),
        );
        let before = source.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        source.set_enabled(false);
        assert!(source.updated_at > before);
    }
}
