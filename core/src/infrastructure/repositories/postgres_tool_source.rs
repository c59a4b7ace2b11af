// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `ToolSourceRepository`.

use crate::domain::repository::{RepositoryError, ToolSourceRepository};
use crate::domain::tool_source::{SourceConfig, SourceId, SourceType, ToolSource};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

pub struct PostgresToolSourceRepository {
    pool: PgPool,
}

impl PostgresToolSourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn type_str(t: SourceType) -> &'static str {
    match t {
        SourceType::Openapi => "openapi",
        SourceType::Graphql => "graphql",
        SourceType::Mcp => "mcp",
    }
}

fn parse_type(s: &str) -> SourceType {
    match s {
        "graphql" => SourceType::Graphql,
        "mcp" => SourceType::Mcp,
        _ => SourceType::Openapi,
    }
}

fn row_to_source(row: sqlx::postgres::PgRow) -> Result<ToolSource, RepositoryError> {
    let id: uuid::Uuid = row.try_get("id")?;
    let type_raw: String = row.try_get("source_type")?;
    let config: serde_json::Value = row.try_get("config")?;
    Ok(ToolSource {
        id: SourceId(id),
        workspace: row.try_get("workspace")?,
        name: row.try_get("name")?,
        source_type: parse_type(&type_raw),
        enabled: row.try_get("enabled")?,
        config: SourceConfig(config),
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ToolSourceRepository for PostgresToolSourceRepository {
    async fn save(&self, source: &ToolSource) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO tool_sources (id, workspace, name, source_type, enabled, config, updated_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            ON CONFLICT (id) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                config = EXCLUDED.config,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(source.id.0)
        .bind(&source.workspace)
        .bind(&source.name)
        .bind(type_str(source.source_type))
        .bind(source.enabled)
        .bind(&source.config.0)
        .bind(source.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_by_id(&self, id: SourceId) -> Result<Option<ToolSource>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM tool_sources WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        row.map(row_to_source).transpose()
    }

    async fn find_by_name(&self, workspace: &str, name: &str) -> Result<Option<ToolSource>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM tool_sources WHERE workspace = $1 AND name = $2")
            .bind(workspace)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        row.map(row_to_source).transpose()
    }

    async fn list_enabled_in_workspace(&self, workspace: &str) -> Result<Vec<ToolSource>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM tool_sources WHERE workspace = $1 AND enabled = true ORDER BY id")
            .bind(workspace)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        rows.into_iter().map(row_to_source).collect()
    }

    async fn delete(&self, id: SourceId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM tool_sources WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(())
    }
}
