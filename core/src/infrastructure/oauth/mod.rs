// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! OAuth surfaces for the `/mcp` endpoint (§6): bearer verification against
//! an upstream issuer's JWKS, and an optional minimal self-issued
//! authorization server for anonymous/guest clients. Grounded on the
//! teacher's `jsonwebtoken` dependency; the RFC 8414/7591 flow itself is
//! new (no server-side OAuth issuer exists in the retrieved corpus).

pub mod anon;
pub mod jwks;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    pub bearer_methods_supported: Vec<String>,
}

impl ProtectedResourceMetadata {
    pub fn new(resource: String, authorization_servers: Vec<String>) -> Self {
        Self {
            resource,
            authorization_servers,
            bearer_methods_supported: vec!["header".to_string()],
        }
    }
}
