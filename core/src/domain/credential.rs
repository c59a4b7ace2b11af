// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialId(pub Uuid);

impl CredentialId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CredentialId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialScope {
    Workspace,
    Actor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialProvider {
    Managed,
    WorkosVault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthKind {
    Bearer,
    ApiKey,
    Basic,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("actor scope credentials require an actorId")]
    MissingActorId,
    #[error("no credential found for source '{0}'")]
    NotFound(String),
    #[error("credential payload could not be resolved: {0}")]
    ResolutionFailed(String),
}

/// Declared on a `ToolDefinition` (§4.8); describes how to materialize
/// headers for a call, not the secret itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSpec {
    pub source_key: String,
    pub scope: CredentialScope,
    pub auth_kind: AuthKind,
    pub header_name: Option<String>,
    pub static_fallback: Option<serde_json::Value>,
}

/// A stored credential row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub workspace: String,
    pub source_key: String,
    pub scope: CredentialScope,
    pub actor_id: Option<String>,
    pub provider: CredentialProvider,
    /// Opaque secret payload: for `managed`, the materialized secret value;
    /// for `workos-vault`, an object id to dereference through the vault
    /// reader.
    pub payload: serde_json::Value,
}

impl Credential {
    pub fn new(
        workspace: String,
        source_key: String,
        scope: CredentialScope,
        actor_id: Option<String>,
        provider: CredentialProvider,
        payload: serde_json::Value,
    ) -> Result<Self, CredentialError> {
        if scope == CredentialScope::Actor && actor_id.is_none() {
            return Err(CredentialError::MissingActorId);
        }
        Ok(Self {
            id: CredentialId::new(),
            workspace,
            source_key,
            scope,
            actor_id,
            provider,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_scope_requires_actor_id() {
        let err = Credential::new(
            "ws_1".to_string(),
            "github".to_string(),
            CredentialScope::Actor,
            None,
            CredentialProvider::Managed,
            serde_json::json!({"token": "abc"}),
        )
        .unwrap_err();
        assert!(matches!(err, CredentialError::MissingActorId));
    }

    #[test]
    fn workspace_scope_allows_missing_actor_id() {
        let cred = Credential::new(
            "ws_1".to_string(),
            "github".to_string(),
            CredentialScope::Workspace,
            None,
            CredentialProvider::Managed,
            serde_json::json!({"token": "abc"}),
        )
        .unwrap();
        assert!(cred.actor_id.is_none());
    }
}
