// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! HTTP-backed `VaultReader` for the `workos-vault` credential provider
//! (§4.8). Grounded on `infrastructure::llm::registry`'s HTTP-client-per-
//! provider construction.

use crate::application::credential_service::{VaultReadError, VaultReader};
use async_trait::async_trait;
use base64::Engine;

pub struct HttpVaultReader {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpVaultReader {
    pub fn new(base_url: String, bearer_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            bearer_token,
        }
    }
}

#[async_trait]
impl VaultReader for HttpVaultReader {
    async fn read(&self, object_id: &str) -> Result<serde_json::Value, VaultReadError> {
        let url = format!("{}/v1/objects/{object_id}", self.base_url.trim_end_matches('/'));
        let mut req = self.client.get(&url);
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| VaultReadError::Other(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::CONFLICT || resp.status() == reqwest::StatusCode::ACCEPTED {
            // "not yet ready" is surfaced by the vault as 202/409 depending
            // on deployment; both are treated as not-yet-ready.
            return Err(VaultReadError::NotReady);
        }
        if !resp.status().is_success() {
            return Err(VaultReadError::Other(format!("vault returned {}", resp.status())));
        }
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| VaultReadError::Other(e.to_string()))
    }
}

/// Renders an HTTP `Basic` authorization header value.
pub fn basic_auth_value(username: &str, password: &str) -> String {
    let raw = format!("{username}:{password}");
    let encoded = base64::engine::general_purpose::STANDARD.encode(raw);
    format!("Basic {encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_encodes_username_password() {
        let value = basic_auth_value("alice", "s3cret");
        assert!(value.starts_with("Basic "));
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(value.trim_start_matches("Basic "))
            .unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "alice:s3cret");
    }
}
