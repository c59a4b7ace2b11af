// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `CredentialRepository`.

use crate::domain::credential::{Credential, CredentialId, CredentialProvider, CredentialScope};
use crate::domain::repository::{CredentialRepository, RepositoryError};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

pub struct PostgresCredentialRepository {
    pool: PgPool,
}

impl PostgresCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn scope_str(s: CredentialScope) -> &'static str {
    match s {
        CredentialScope::Workspace => "workspace",
        CredentialScope::Actor => "actor",
    }
}

fn parse_scope(s: &str) -> CredentialScope {
    match s {
        "actor" => CredentialScope::Actor,
        _ => CredentialScope::Workspace,
    }
}

fn provider_str(p: CredentialProvider) -> &'static str {
    match p {
        CredentialProvider::Managed => "managed",
        CredentialProvider::WorkosVault => "workos-vault",
    }
}

fn parse_provider(s: &str) -> CredentialProvider {
    match s {
        "workos-vault" => CredentialProvider::WorkosVault,
        _ => CredentialProvider::Managed,
    }
}

fn row_to_credential(row: sqlx::postgres::PgRow) -> Result<Credential, RepositoryError> {
    let id: uuid::Uuid = row.try_get("id")?;
    let scope_raw: String = row.try_get("scope")?;
    let provider_raw: String = row.try_get("provider")?;
    Ok(Credential {
        id: CredentialId(id),
        workspace: row.try_get("workspace")?,
        source_key: row.try_get("source_key")?,
        scope: parse_scope(&scope_raw),
        actor_id: row.try_get("actor_id")?,
        provider: parse_provider(&provider_raw),
        payload: row.try_get("payload")?,
    })
}

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn save(&self, credential: &Credential) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO credentials (id, workspace, source_key, scope, actor_id, provider, payload)
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            ON CONFLICT (workspace, source_key, scope, actor_id) DO UPDATE SET
                provider = EXCLUDED.provider,
                payload = EXCLUDED.payload
            "#,
        )
        .bind(credential.id.0)
        .bind(&credential.workspace)
        .bind(&credential.source_key)
        .bind(scope_str(credential.scope))
        .bind(&credential.actor_id)
        .bind(provider_str(credential.provider))
        .bind(&credential.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find(
        &self,
        workspace: &str,
        source_key: &str,
        scope: CredentialScope,
        actor_id: Option<&str>,
    ) -> Result<Option<Credential>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM credentials
            WHERE workspace = $1 AND source_key = $2 AND scope = $3
              AND actor_id IS NOT DISTINCT FROM $4
            "#,
        )
        .bind(workspace)
        .bind(source_key)
        .bind(scope_str(scope))
        .bind(actor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
        row.map(row_to_credential).transpose()
    }

    async fn delete(&self, id: CredentialId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM credentials WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(())
    }
}
