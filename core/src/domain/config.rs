// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Ambient configuration. Grounded on the teacher's `domain::node_config`
//! (a plain deserializable config struct loaded by the CLI) adapted to this
//! gateway's concerns.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    InMemory,
    Postgres,
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::InMemory
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub issuer: String,
    /// When `true`, the self-issued anonymous OAuth endpoints (§6) are
    /// mounted alongside the `issuer`-backed verification path.
    #[serde(default)]
    pub allow_anonymous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub oauth: Option<OAuthConfig>,
    /// Shared secret internal run callbacks must present as a bearer token
    /// (§6 "Internal run callbacks").
    pub internal_callback_secret: String,
    #[serde(default = "default_prepared_spec_max_age_ms")]
    pub prepared_spec_max_age_ms: u64,
    /// Base URL of the `workos-vault`-style credential dereference service
    /// (§4.8). Only required when a tool source resolves credentials
    /// through the `workos-vault` provider.
    #[serde(default)]
    pub vault_url: Option<String>,
    #[serde(default)]
    pub vault_bearer_token: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_prepared_spec_max_age_ms() -> u64 {
    5 * 60 * 60 * 1000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            storage_backend: StorageBackend::InMemory,
            database_url: None,
            oauth: None,
            internal_callback_secret: "dev-secret-change-me".to_string(),
            prepared_spec_max_age_ms: default_prepared_spec_max_age_ms(),
            vault_url: None,
            vault_bearer_token: None,
        }
    }
}

impl GatewayConfig {
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_yaml_omits_fields() {
        let cfg = GatewayConfig::from_yaml("internal_callback_secret: s3cr3t\n").unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.prepared_spec_max_age_ms, 5 * 60 * 60 * 1000);
        assert!(matches!(cfg.storage_backend, StorageBackend::InMemory));
    }
}
