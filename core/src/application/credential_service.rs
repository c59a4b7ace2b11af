// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Credential Resolver (§4.8): materializes a tool's `CredentialSpec` into
//! request headers. Grounded on `infrastructure::llm::registry::generate`'s
//! retry/exponential-backoff loop, adapted from "retry LLM generation" to
//! "retry a vault dereference until the object is ready".

use crate::domain::credential::{AuthKind, CredentialError, CredentialProvider, CredentialScope, CredentialSpec};
use crate::domain::repository::{CredentialRepository, RepositoryError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CredentialResolutionError {
    #[error(transparent)]
    Domain(#[from] CredentialError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("vault dereference failed after {attempts} attempts: {message}")]
    VaultExhausted { attempts: u32, message: String },
}

/// Dereferences a `workos-vault` object id to its secret payload. The HTTP
/// implementation lives in `infrastructure::credential_resolver`; this trait
/// keeps the retry policy testable without a live vault.
#[async_trait]
pub trait VaultReader: Send + Sync {
    async fn read(&self, object_id: &str) -> Result<serde_json::Value, VaultReadError>;
}

#[derive(Debug, Error)]
pub enum VaultReadError {
    #[error("object not yet ready")]
    NotReady,
    #[error("vault error: {0}")]
    Other(String),
}

pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 200,
        }
    }
}

#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// `None` means no credential was found and none is required — the tool
    /// is callable without one. `Some` is the header bag to merge into the
    /// outbound request.
    async fn resolve(
        &self,
        workspace: &str,
        actor: &str,
        spec: Option<&CredentialSpec>,
    ) -> Result<Option<HashMap<String, String>>, CredentialResolutionError>;
}

pub struct StandardCredentialResolver {
    credentials: Arc<dyn CredentialRepository>,
    vault: Arc<dyn VaultReader>,
    retry: RetryPolicy,
}

impl StandardCredentialResolver {
    pub fn new(credentials: Arc<dyn CredentialRepository>, vault: Arc<dyn VaultReader>) -> Self {
        Self {
            credentials,
            vault,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn resolve_payload(
        &self,
        provider: CredentialProvider,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, CredentialResolutionError> {
        match provider {
            CredentialProvider::Managed => Ok(payload.clone()),
            CredentialProvider::WorkosVault => {
                let object_id = payload
                    .as_str()
                    .ok_or_else(|| {
                        CredentialResolutionError::VaultExhausted {
                            attempts: 0,
                            message: "vault payload is not an object id string".to_string(),
                        }
                    })?;
                let mut last_err = String::new();
                for attempt in 0..self.retry.max_attempts {
                    match self.vault.read(object_id).await {
                        Ok(value) => return Ok(value),
                        Err(VaultReadError::NotReady) => {
                            last_err = "object not yet ready".to_string();
                            if attempt + 1 < self.retry.max_attempts {
                                let delay = self.retry.base_delay_ms * 2u64.pow(attempt);
                                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                            }
                        }
                        Err(VaultReadError::Other(msg)) => {
                            warn!(error = %msg, "vault dereference failed");
                            last_err = msg;
                            break;
                        }
                    }
                }
                Err(CredentialResolutionError::VaultExhausted {
                    attempts: self.retry.max_attempts,
                    message: last_err,
                })
            }
        }
    }

    fn headers_from_payload(
        &self,
        auth_kind: AuthKind,
        header_name: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<HashMap<String, String>, CredentialResolutionError> {
        let value = payload
            .as_str()
            .map(|s| s.to_string())
            .or_else(|| payload.get("token").and_then(|v| v.as_str()).map(|s| s.to_string()))
            .or_else(|| payload.get("value").and_then(|v| v.as_str()).map(|s| s.to_string()));

        let mut headers = HashMap::new();
        match auth_kind {
            AuthKind::Bearer => {
                let token = value.ok_or_else(|| {
                    CredentialError::ResolutionFailed("bearer credential payload has no token".to_string())
                })?;
                headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            }
            AuthKind::ApiKey => {
                let name = header_name.unwrap_or("X-Api-Key");
                let key = value.ok_or_else(|| {
                    CredentialError::ResolutionFailed("api-key credential payload has no value".to_string())
                })?;
                headers.insert(name.to_string(), key);
            }
            AuthKind::Basic => {
                let username = payload
                    .get("username")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let password = payload
                    .get("password")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let encoded = crate::infrastructure::credential_resolver::basic_auth_value(username, password);
                headers.insert("Authorization".to_string(), encoded);
            }
        }
        Ok(headers)
    }
}

#[async_trait]
impl CredentialResolver for StandardCredentialResolver {
    async fn resolve(
        &self,
        workspace: &str,
        actor: &str,
        spec: Option<&CredentialSpec>,
    ) -> Result<Option<HashMap<String, String>>, CredentialResolutionError> {
        let Some(spec) = spec else {
            return Ok(None);
        };

        let actor_id = match spec.scope {
            CredentialScope::Actor => Some(actor),
            CredentialScope::Workspace => None,
        };

        let found = self
            .credentials
            .find(workspace, &spec.source_key, spec.scope, actor_id)
            .await?;

        let (provider, payload) = match found {
            Some(credential) => (credential.provider, credential.payload),
            None => match &spec.static_fallback {
                Some(fallback) => (CredentialProvider::Managed, fallback.clone()),
                None => {
                    return Err(CredentialResolutionError::Domain(CredentialError::NotFound(
                        spec.source_key.clone(),
                    )))
                }
            },
        };

        let resolved_payload = self.resolve_payload(provider, &payload).await?;
        let headers = self.headers_from_payload(spec.auth_kind, spec.header_name.as_deref(), &resolved_payload)?;
        Ok(Some(headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credential::Credential;
    use crate::infrastructure::repositories::in_memory::InMemoryCredentialRepository;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysReady;
    #[async_trait]
    impl VaultReader for AlwaysReady {
        async fn read(&self, _object_id: &str) -> Result<serde_json::Value, VaultReadError> {
            Ok(serde_json::json!({"token": "vaulted-secret"}))
        }
    }

    struct NotReadyThenOk {
        attempts: AtomicU32,
        ready_after: u32,
    }
    #[async_trait]
    impl VaultReader for NotReadyThenOk {
        async fn read(&self, _object_id: &str) -> Result<serde_json::Value, VaultReadError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.ready_after {
                Err(VaultReadError::NotReady)
            } else {
                Ok(serde_json::json!({"token": "vaulted-secret"}))
            }
        }
    }

    fn resolver_with(vault: Arc<dyn VaultReader>) -> StandardCredentialResolver {
        StandardCredentialResolver::new(Arc::new(InMemoryCredentialRepository::new()), vault)
            .with_retry_policy(RetryPolicy {
                max_attempts: 4,
                base_delay_ms: 1,
            })
    }

    #[tokio::test]
    async fn no_spec_returns_none() {
        let resolver = resolver_with(Arc::new(AlwaysReady));
        let result = resolver.resolve("ws_1", "actor_1", None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn managed_bearer_credential_resolves_to_authorization_header() {
        let credentials = Arc::new(InMemoryCredentialRepository::new());
        credentials
            .save(
                &Credential::new(
                    "ws_1".to_string(),
                    "github".to_string(),
                    CredentialScope::Workspace,
                    None,
                    CredentialProvider::Managed,
                    serde_json::json!({"token": "abc123"}),
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let resolver = StandardCredentialResolver::new(credentials, Arc::new(AlwaysReady));
        let spec = CredentialSpec {
            source_key: "github".to_string(),
            scope: CredentialScope::Workspace,
            auth_kind: AuthKind::Bearer,
            header_name: None,
            static_fallback: None,
        };
        let headers = resolver.resolve("ws_1", "actor_1", Some(&spec)).await.unwrap().unwrap();
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer abc123");
    }

    #[tokio::test]
    async fn missing_credential_without_fallback_is_an_error() {
        let resolver = resolver_with(Arc::new(AlwaysReady));
        let spec = CredentialSpec {
            source_key: "missing".to_string(),
            scope: CredentialScope::Workspace,
            auth_kind: AuthKind::Bearer,
            header_name: None,
            static_fallback: None,
        };
        let err = resolver.resolve("ws_1", "actor_1", Some(&spec)).await.unwrap_err();
        assert!(matches!(err, CredentialResolutionError::Domain(CredentialError::NotFound(_))));
    }

    #[tokio::test]
    async fn vault_retry_succeeds_once_object_becomes_ready() {
        let credentials = Arc::new(InMemoryCredentialRepository::new());
        credentials
            .save(
                &Credential::new(
                    "ws_1".to_string(),
                    "stripe".to_string(),
                    CredentialScope::Workspace,
                    None,
                    CredentialProvider::WorkosVault,
                    serde_json::json!("vault_obj_1"),
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let vault = Arc::new(NotReadyThenOk {
            attempts: AtomicU32::new(0),
            ready_after: 2,
        });
        let resolver = StandardCredentialResolver::new(credentials, vault).with_retry_policy(RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 1,
        });
        let spec = CredentialSpec {
            source_key: "stripe".to_string(),
            scope: CredentialScope::Workspace,
            auth_kind: AuthKind::Bearer,
            header_name: None,
            static_fallback: None,
        };
        let headers = resolver.resolve("ws_1", "actor_1", Some(&spec)).await.unwrap().unwrap();
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer vaulted-secret");
    }

    #[tokio::test]
    async fn vault_retry_is_bounded() {
        struct NeverReady;
        #[async_trait]
        impl VaultReader for NeverReady {
            async fn read(&self, _object_id: &str) -> Result<serde_json::Value, VaultReadError> {
                Err(VaultReadError::NotReady)
            }
        }
        let credentials = Arc::new(InMemoryCredentialRepository::new());
        credentials
            .save(
                &Credential::new(
                    "ws_1".to_string(),
                    "stripe".to_string(),
                    CredentialScope::Workspace,
                    None,
                    CredentialProvider::WorkosVault,
                    serde_json::json!("vault_obj_1"),
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let resolver = StandardCredentialResolver::new(credentials, Arc::new(NeverReady)).with_retry_policy(
            RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
            },
        );
        let spec = CredentialSpec {
            source_key: "stripe".to_string(),
            scope: CredentialScope::Workspace,
            auth_kind: AuthKind::Bearer,
            header_name: None,
            static_fallback: None,
        };
        let err = resolver.resolve("ws_1", "actor_1", Some(&spec)).await.unwrap_err();
        assert!(matches!(
            err,
            CredentialResolutionError::VaultExhausted { attempts: 3, .. }
        ));
    }
}
