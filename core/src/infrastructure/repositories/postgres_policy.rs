// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `PolicyRepository`.

use crate::domain::policy::{AccessPolicy, Decision, PolicyId};
use crate::domain::repository::{PolicyRepository, RepositoryError};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

pub struct PostgresPolicyRepository {
    pool: PgPool,
}

impl PostgresPolicyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decision_str(d: Decision) -> &'static str {
    match d {
        Decision::Allow => "allow",
        Decision::RequireApproval => "require_approval",
        Decision::Deny => "deny",
    }
}

fn parse_decision(s: &str) -> Decision {
    match s {
        "deny" => Decision::Deny,
        "require_approval" => Decision::RequireApproval,
        _ => Decision::Allow,
    }
}

fn row_to_policy(row: sqlx::postgres::PgRow) -> Result<AccessPolicy, RepositoryError> {
    let id: uuid::Uuid = row.try_get("id")?;
    let decision_raw: String = row.try_get("decision")?;
    Ok(AccessPolicy {
        id: PolicyId(id),
        workspace: row.try_get("workspace")?,
        actor: row.try_get("actor")?,
        client: row.try_get("client")?,
        pattern: row.try_get("pattern")?,
        decision: parse_decision(&decision_raw),
        priority: row.try_get("priority")?,
    })
}

#[async_trait]
impl PolicyRepository for PostgresPolicyRepository {
    async fn save(&self, policy: &AccessPolicy) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO access_policies (id, workspace, actor, client, pattern, decision, priority)
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            ON CONFLICT (id) DO UPDATE SET
                actor = EXCLUDED.actor,
                client = EXCLUDED.client,
                pattern = EXCLUDED.pattern,
                decision = EXCLUDED.decision,
                priority = EXCLUDED.priority
            "#,
        )
        .bind(policy.id.0)
        .bind(&policy.workspace)
        .bind(&policy.actor)
        .bind(&policy.client)
        .bind(&policy.pattern)
        .bind(decision_str(policy.decision))
        .bind(policy.priority)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_in_workspace(&self, workspace: &str) -> Result<Vec<AccessPolicy>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM access_policies WHERE workspace = $1 ORDER BY id")
            .bind(workspace)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        rows.into_iter().map(row_to_policy).collect()
    }

    async fn delete(&self, id: PolicyId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM access_policies WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(())
    }
}
