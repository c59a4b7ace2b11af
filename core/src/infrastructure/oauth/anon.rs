// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Minimal self-issued RFC 8414 (authorization server metadata) + RFC 7591
//! (dynamic client registration) surface for anonymous/guest MCP clients
//! (§6). New: no server-side OAuth issuer exists anywhere in the retrieved
//! corpus, so this is hand-rolled against the RFCs, reusing the teacher's
//! `jsonwebtoken` dependency for the signed access tokens it issues.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Authorization-code lifetime (§6 "Anonymous OAuth").
const AUTH_CODE_TTL: Duration = Duration::from_secs(120);
/// Issued-token lifetime (§6 "Anonymous OAuth").
const ACCESS_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum AnonOAuthError {
    #[error("failed to read signing key at '{path}': {source}")]
    KeyRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write signing key at '{path}': {source}")]
    KeyWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to generate or encode RSA signing key: {0}")]
    KeyGeneration(String),
    #[error("unknown client_id")]
    UnknownClient,
    #[error("redirect_uri does not match the registered client")]
    RedirectUriMismatch,
    #[error("unsupported code_challenge_method; only S256 is accepted")]
    UnsupportedChallengeMethod,
    #[error("unknown or expired authorization code")]
    InvalidCode,
    #[error("authorization code expired")]
    ExpiredCode,
    #[error("PKCE verification failed")]
    PkceMismatch,
    #[error("failed to sign access token: {0}")]
    SigningFailed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientRegistration {
    pub client_id: String,
    pub redirect_uris: Vec<String>,
    pub token_endpoint_auth_method: String,
}

struct AuthorizationCode {
    client_id: String,
    redirect_uri: String,
    code_challenge: String,
    issued_at: Instant,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessTokenClaims {
    sub: String,
    iss: String,
    iat: i64,
    exp: i64,
}

pub struct AnonOAuthState {
    issuer: String,
    encoding_key: EncodingKey,
    kid: String,
    jwk_n: String,
    jwk_e: String,
    clients: RwLock<HashMap<String, ClientRegistration>>,
    codes: RwLock<HashMap<String, AuthorizationCode>>,
}

impl AnonOAuthState {
    /// Loads the RS256 signing key from `signing_key_path`, generating and
    /// persisting a fresh 2048-bit key on first run (§6 "Signing key is
    /// RS256 and persisted").
    pub fn new(issuer: String, signing_key_path: &Path) -> Result<Self, AnonOAuthError> {
        let private_key = if signing_key_path.exists() {
            let pem = std::fs::read_to_string(signing_key_path).map_err(|source| AnonOAuthError::KeyRead {
                path: signing_key_path.display().to_string(),
                source,
            })?;
            use rsa::pkcs1::DecodeRsaPrivateKey;
            RsaPrivateKey::from_pkcs1_pem(&pem).map_err(|e| AnonOAuthError::KeyGeneration(e.to_string()))?
        } else {
            let mut rng = rand_core::OsRng;
            let private_key =
                RsaPrivateKey::new(&mut rng, 2048).map_err(|e| AnonOAuthError::KeyGeneration(e.to_string()))?;
            use rsa::pkcs1::EncodeRsaPrivateKey;
            let pem = private_key
                .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
                .map_err(|e| AnonOAuthError::KeyGeneration(e.to_string()))?;
            if let Some(parent) = signing_key_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            std::fs::write(signing_key_path, pem.as_bytes()).map_err(|source| AnonOAuthError::KeyWrite {
                path: signing_key_path.display().to_string(),
                source,
            })?;
            private_key
        };

        let public_key: RsaPublicKey = private_key.to_public_key();
        let jwk_n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
        let jwk_e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());

        use rsa::pkcs1::EncodeRsaPrivateKey;
        let pem = private_key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .map_err(|e| AnonOAuthError::KeyGeneration(e.to_string()))?;
        let encoding_key =
            EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| AnonOAuthError::KeyGeneration(e.to_string()))?;

        Ok(Self {
            issuer,
            encoding_key,
            kid: "anon-1".to_string(),
            jwk_n,
            jwk_e,
            clients: RwLock::new(HashMap::new()),
            codes: RwLock::new(HashMap::new()),
        })
    }

    pub fn authorization_server_metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "issuer": self.issuer,
            "authorization_endpoint": format!("{}/authorize", self.issuer),
            "token_endpoint": format!("{}/token", self.issuer),
            "jwks_uri": format!("{}/oauth2/jwks", self.issuer),
            "registration_endpoint": format!("{}/register", self.issuer),
            "response_types_supported": ["code"],
            "grant_types_supported": ["authorization_code"],
            "code_challenge_methods_supported": ["S256"],
            "token_endpoint_auth_methods_supported": ["none"],
        })
    }

    pub fn jwks(&self) -> serde_json::Value {
        serde_json::json!({
            "keys": [{
                "kty": "RSA",
                "use": "sig",
                "alg": "RS256",
                "kid": self.kid,
                "n": self.jwk_n,
                "e": self.jwk_e,
            }]
        })
    }

    /// RFC 7591 dynamic client registration; every anonymous caller gets its
    /// own `client_<uuid>`.
    pub fn register(&self, redirect_uris: Vec<String>) -> ClientRegistration {
        let registration = ClientRegistration {
            client_id: format!("client_{}", Uuid::new_v4()),
            redirect_uris,
            token_endpoint_auth_method: "none".to_string(),
        };
        self.clients
            .write()
            .unwrap()
            .insert(registration.client_id.clone(), registration.clone());
        registration
    }

    /// Auto-approves the authorization request (no interactive consent
    /// screen, §6) and mints a one-time code bound to the PKCE challenge.
    pub fn authorize(
        &self,
        client_id: &str,
        redirect_uri: &str,
        code_challenge: &str,
        code_challenge_method: &str,
    ) -> Result<String, AnonOAuthError> {
        if code_challenge_method != "S256" {
            return Err(AnonOAuthError::UnsupportedChallengeMethod);
        }
        let clients = self.clients.read().unwrap();
        let client = clients.get(client_id).ok_or(AnonOAuthError::UnknownClient)?;
        if !client.redirect_uris.iter().any(|u| u == redirect_uri) {
            return Err(AnonOAuthError::RedirectUriMismatch);
        }
        drop(clients);

        let code = format!("code_{}", Uuid::new_v4());
        self.codes.write().unwrap().insert(
            code.clone(),
            AuthorizationCode {
                client_id: client_id.to_string(),
                redirect_uri: redirect_uri.to_string(),
                code_challenge: code_challenge.to_string(),
                issued_at: Instant::now(),
            },
        );
        Ok(code)
    }

    /// Authorization-code grant: verifies the PKCE `code_verifier` against
    /// the challenge minted at `authorize` time, then issues a self-signed
    /// `sub = anon_<uuid>` access token.
    pub fn token(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AnonOAuthError> {
        let entry = {
            let mut codes = self.codes.write().unwrap();
            codes.remove(code).ok_or(AnonOAuthError::InvalidCode)?
        };
        if entry.issued_at.elapsed() > AUTH_CODE_TTL {
            return Err(AnonOAuthError::ExpiredCode);
        }
        if entry.redirect_uri != redirect_uri {
            return Err(AnonOAuthError::RedirectUriMismatch);
        }

        let mut hasher = Sha256::new();
        hasher.update(code_verifier.as_bytes());
        let computed_challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());
        if computed_challenge.as_bytes().ct_eq(entry.code_challenge.as_bytes()).unwrap_u8() != 1 {
            return Err(AnonOAuthError::PkceMismatch);
        }

        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: format!("anon_{}", Uuid::new_v4()),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + ChronoDuration::seconds(ACCESS_TOKEN_TTL_SECONDS)).timestamp(),
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        let access_token = jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AnonOAuthError::SigningFailed(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: ACCESS_TOKEN_TTL_SECONDS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AnonOAuthState {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("anon-signing-key.pem");
        let state = AnonOAuthState::new("https://gateway.example.com".to_string(), &key_path).unwrap();
        std::mem::forget(dir);
        state
    }

    #[test]
    fn register_then_authorize_then_token_round_trips() {
        let state = state();
        let reg = state.register(vec!["http://localhost:9000/callback".to_string()]);

        let verifier = "a-verifier-that-is-long-enough-for-pkce";
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

        let code = state
            .authorize(&reg.client_id, "http://localhost:9000/callback", &challenge, "S256")
            .unwrap();

        let token = state.token(&code, verifier, "http://localhost:9000/callback").unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert!(token.access_token.split('.').count() == 3);
    }

    #[test]
    fn wrong_code_verifier_is_rejected() {
        let state = state();
        let reg = state.register(vec!["http://localhost:9000/callback".to_string()]);
        let mut hasher = Sha256::new();
        hasher.update(b"real-verifier-value-long-enough");
        let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());
        let code = state
            .authorize(&reg.client_id, "http://localhost:9000/callback", &challenge, "S256")
            .unwrap();

        let err = state
            .token(&code, "wrong-verifier-value-long-enough", "http://localhost:9000/callback")
            .unwrap_err();
        assert!(matches!(err, AnonOAuthError::PkceMismatch));
    }

    #[test]
    fn reusing_a_code_fails() {
        let state = state();
        let reg = state.register(vec!["http://localhost:9000/callback".to_string()]);
        let verifier = "verifier-value-long-enough-for-pkce";
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());
        let code = state
            .authorize(&reg.client_id, "http://localhost:9000/callback", &challenge, "S256")
            .unwrap();

        state.token(&code, verifier, "http://localhost:9000/callback").unwrap();
        let err = state
            .token(&code, verifier, "http://localhost:9000/callback")
            .unwrap_err();
        assert!(matches!(err, AnonOAuthError::InvalidCode));
    }

    #[test]
    fn unregistered_redirect_uri_is_rejected() {
        let state = state();
        let reg = state.register(vec!["http://localhost:9000/callback".to_string()]);
        let err = state
            .authorize(&reg.client_id, "http://evil.example.com/cb", "challenge", "S256")
            .unwrap_err();
        assert!(matches!(err, AnonOAuthError::RedirectUriMismatch));
    }
}
