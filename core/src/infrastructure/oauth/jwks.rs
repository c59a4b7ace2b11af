// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Bearer JWT verification against a remote issuer's JWKS (§6 "MCP
//! endpoint"). Tokens are verified against `<issuer>/oauth2/jwks`, `iss`
//! must equal the configured issuer, and `sub` must be non-empty.

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum JwksAuthError {
    #[error("missing or malformed Authorization header")]
    MissingBearer,
    #[error("failed to fetch JWKS from issuer: {0}")]
    FetchFailed(String),
    #[error("no matching JWKS key for token")]
    NoMatchingKey,
    #[error("token verification failed: {0}")]
    InvalidToken(String),
    #[error("token issuer does not match the configured issuer")]
    IssuerMismatch,
    #[error("token has an empty subject claim")]
    EmptySubject,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize, Clone)]
struct Jwk {
    kid: Option<String>,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Time the fetched JWKS document is trusted before a refetch, matching the
/// Prepared-Spec Cache's freshness-window idiom (§4.3).
const JWKS_CACHE_TTL: Duration = Duration::from_secs(600);

struct CachedJwks {
    fetched_at: Instant,
    keys: HashMap<String, Jwk>,
}

pub struct JwksVerifier {
    client: reqwest::Client,
    issuer: String,
    cache: RwLock<Option<CachedJwks>>,
}

impl JwksVerifier {
    pub fn new(issuer: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            issuer,
            cache: RwLock::new(None),
        }
    }

    fn jwks_url(&self) -> String {
        format!("{}/oauth2/jwks", self.issuer.trim_end_matches('/'))
    }

    async fn fetch_keys(&self) -> Result<HashMap<String, Jwk>, JwksAuthError> {
        {
            let cache = self.cache.read().unwrap();
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let resp = self
            .client
            .get(self.jwks_url())
            .send()
            .await
            .map_err(|e| JwksAuthError::FetchFailed(e.to_string()))?;
        let jwk_set: JwkSet = resp
            .json()
            .await
            .map_err(|e| JwksAuthError::FetchFailed(e.to_string()))?;

        let keys: HashMap<String, Jwk> = jwk_set
            .keys
            .into_iter()
            .map(|k| (k.kid.clone().unwrap_or_default(), k))
            .collect();

        *self.cache.write().unwrap() = Some(CachedJwks {
            fetched_at: Instant::now(),
            keys: keys.clone(),
        });
        Ok(keys)
    }

    /// Extracts `Bearer <token>` from an `Authorization` header value,
    /// verifies it against this issuer's JWKS, and returns the decoded
    /// claims, enforcing `iss == self.issuer` and a non-empty `sub`.
    pub async fn authenticate(&self, authorization_header: Option<&str>) -> Result<Claims, JwksAuthError> {
        let header = authorization_header.ok_or(JwksAuthError::MissingBearer)?;
        let token = header.strip_prefix("Bearer ").ok_or(JwksAuthError::MissingBearer)?;

        let header = decode_header(token).map_err(|e| JwksAuthError::InvalidToken(e.to_string()))?;
        let keys = self.fetch_keys().await?;
        let kid = header.kid.unwrap_or_default();
        let jwk = keys.get(&kid).or_else(|| keys.values().next()).ok_or(JwksAuthError::NoMatchingKey)?;

        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| JwksAuthError::InvalidToken(e.to_string()))?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &decoding_key, &validation)
            .map_err(|e| JwksAuthError::InvalidToken(e.to_string()))?;

        if data.claims.iss != self.issuer {
            return Err(JwksAuthError::IssuerMismatch);
        }
        if data.claims.sub.trim().is_empty() {
            return Err(JwksAuthError::EmptySubject);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_authorization_header_is_rejected() {
        let verifier = JwksVerifier::new("https://issuer.example.com".to_string());
        let err = verifier.authenticate(None).await.unwrap_err();
        assert!(matches!(err, JwksAuthError::MissingBearer));
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let verifier = JwksVerifier::new("https://issuer.example.com".to_string());
        let err = verifier.authenticate(Some("Basic abc123")).await.unwrap_err();
        assert!(matches!(err, JwksAuthError::MissingBearer));
    }
}
