// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `ApprovalRepository`.

use crate::domain::approval::{Approval, ApprovalId, ApprovalStatus};
use crate::domain::repository::{ApprovalRepository, RepositoryError};
use crate::domain::task::TaskId;
use async_trait::async_trait;
use sqlx::{PgPool, Row};

pub struct PostgresApprovalRepository {
    pool: PgPool,
}

impl PostgresApprovalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_str(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Pending => "pending",
        ApprovalStatus::Approved => "approved",
        ApprovalStatus::Denied => "denied",
    }
}

fn parse_status(s: &str) -> ApprovalStatus {
    match s {
        "approved" => ApprovalStatus::Approved,
        "denied" => ApprovalStatus::Denied,
        _ => ApprovalStatus::Pending,
    }
}

fn row_to_approval(row: sqlx::postgres::PgRow) -> Result<Approval, RepositoryError> {
    let id: uuid::Uuid = row.try_get("id")?;
    let task_id: uuid::Uuid = row.try_get("task_id")?;
    let status_raw: String = row.try_get("status")?;
    Ok(Approval {
        id: ApprovalId(id),
        task_id: TaskId(task_id),
        workspace: row.try_get("workspace")?,
        tool_path: row.try_get("tool_path")?,
        input: row.try_get("input")?,
        status: parse_status(&status_raw),
        reviewer_id: row.try_get("reviewer_id")?,
        reason: row.try_get("reason")?,
        created_at: row.try_get("created_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

#[async_trait]
impl ApprovalRepository for PostgresApprovalRepository {
    async fn save(&self, approval: &Approval) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO approvals (
                id, task_id, workspace, tool_path, input, status,
                reviewer_id, reason, created_at, resolved_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                reviewer_id = EXCLUDED.reviewer_id,
                reason = EXCLUDED.reason,
                resolved_at = EXCLUDED.resolved_at
            "#,
        )
        .bind(approval.id.0)
        .bind(approval.task_id.0)
        .bind(&approval.workspace)
        .bind(&approval.tool_path)
        .bind(&approval.input)
        .bind(status_str(approval.status))
        .bind(&approval.reviewer_id)
        .bind(&approval.reason)
        .bind(approval.created_at)
        .bind(approval.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_by_id(&self, id: ApprovalId) -> Result<Option<Approval>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM approvals WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        row.map(row_to_approval).transpose()
    }

    async fn find_in_workspace(&self, id: ApprovalId, workspace: &str) -> Result<Option<Approval>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM approvals WHERE id = $1 AND workspace = $2")
            .bind(id.0)
            .bind(workspace)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        row.map(row_to_approval).transpose()
    }

    async fn list_pending_in_workspace(&self, workspace: &str) -> Result<Vec<Approval>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM approvals WHERE workspace = $1 AND status = 'pending' ORDER BY created_at")
            .bind(workspace)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        rows.into_iter().map(row_to_approval).collect()
    }

    async fn list_in_workspace(
        &self,
        workspace: &str,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<Approval>, RepositoryError> {
        let rows = match status {
            Some(status) => {
                sqlx::query("SELECT * FROM approvals WHERE workspace = $1 AND status = $2 ORDER BY created_at")
                    .bind(workspace)
                    .bind(status_str(status))
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM approvals WHERE workspace = $1 ORDER BY created_at")
                    .bind(workspace)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
        rows.into_iter().map(row_to_approval).collect()
    }

    async fn resolve(
        &self,
        id: ApprovalId,
        approved: bool,
        reviewer: Option<String>,
        reason: Option<String>,
    ) -> Result<Option<Approval>, RepositoryError> {
        let status = if approved { "approved" } else { "denied" };
        let row = sqlx::query(
            r#"
            UPDATE approvals SET status = $2, reviewer_id = $3, reason = $4, resolved_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id.0)
        .bind(status)
        .bind(reviewer)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
        row.map(row_to_approval).transpose()
    }
}
