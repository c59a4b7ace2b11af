// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Config loading: YAML file plus environment-variable overrides. Grounded
//! on the teacher's `domain::node_config` + `cli/src/main.rs` pattern of
//! layering env vars (`AEGIS_*`-style) over a parsed file. The
//! deserializable shape itself (`GatewayConfig`) lives in
//! `crate::domain::config` since it is a plain value object, not an
//! infrastructure concern.

use crate::domain::config::GatewayConfig;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Loads `GatewayConfig` from an optional YAML file, then overlays
/// `GATEWAY_*` environment variables. Missing file is not an error — the
/// defaults apply, same as a teacher deployment with no mounted config.
pub fn load(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            GatewayConfig::from_yaml(&contents).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        }
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut GatewayConfig) {
    if let Ok(host) = std::env::var("GATEWAY_HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("GATEWAY_PORT") {
        if let Ok(port) = port.parse() {
            config.port = port;
        }
    }
    if let Ok(database_url) = std::env::var("GATEWAY_DATABASE_URL") {
        config.database_url = Some(database_url);
    }
    if let Ok(secret) = std::env::var("GATEWAY_INTERNAL_CALLBACK_SECRET") {
        config.internal_callback_secret = secret;
    }
    if let Ok(issuer) = std::env::var("GATEWAY_OAUTH_ISSUER") {
        let allow_anonymous = std::env::var("GATEWAY_OAUTH_ALLOW_ANONYMOUS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        config.oauth = Some(crate::domain::config::OAuthConfig { issuer, allow_anonymous });
    }
    if let Ok(vault_url) = std::env::var("GATEWAY_VAULT_URL") {
        config.vault_url = Some(vault_url);
    }
    if let Ok(vault_bearer_token) = std::env::var("GATEWAY_VAULT_BEARER_TOKEN") {
        config.vault_bearer_token = Some(vault_bearer_token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_path_falls_back_to_defaults() {
        let config = load(None).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn env_override_wins_over_file_default() {
        std::env::set_var("GATEWAY_PORT", "9999");
        let config = load(None).unwrap();
        std::env::remove_var("GATEWAY_PORT");
        assert_eq!(config.port, 9999);
    }
}
