// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `TaskRepository`. Grounded on
//! `infrastructure::repositories::postgres_execution` (manual row mapping,
//! `ON CONFLICT` upsert, JSONB columns for variable-shaped fields).

use crate::domain::repository::{RepositoryError, TaskRepository};
use crate::domain::task::{Task, TaskId, TaskOutcome, TaskStatus};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Queued => "queued",
        TaskStatus::Running => "running",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::TimedOut => "timed_out",
        TaskStatus::Denied => "denied",
    }
}

fn parse_status(s: &str) -> TaskStatus {
    match s {
        "running" => TaskStatus::Running,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "timed_out" => TaskStatus::TimedOut,
        "denied" => TaskStatus::Denied,
        _ => TaskStatus::Queued,
    }
}

fn row_to_task(row: sqlx::postgres::PgRow) -> Result<Task, RepositoryError> {
    let id: uuid::Uuid = row.try_get("id")?;
    let status_raw: String = row.try_get("status")?;
    let metadata: serde_json::Value = row.try_get("metadata")?;
    Ok(Task {
        id: TaskId(id),
        code: row.try_get("code")?,
        runtime_id: row.try_get("runtime_id")?,
        timeout_ms: row.try_get::<i64, _>("timeout_ms")? as u64,
        metadata,
        workspace: row.try_get("workspace")?,
        actor: row.try_get("actor")?,
        client: row.try_get("client")?,
        status: parse_status(&status_raw),
        outcome: TaskOutcome {
            stdout: row.try_get("stdout")?,
            stderr: row.try_get("stderr")?,
            exit_code: row.try_get("exit_code")?,
            error: row.try_get("error")?,
        },
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, code, runtime_id, timeout_ms, metadata, workspace, actor, client,
                status, stdout, stderr, exit_code, error, created_at, started_at, completed_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                stdout = EXCLUDED.stdout,
                stderr = EXCLUDED.stderr,
                exit_code = EXCLUDED.exit_code,
                error = EXCLUDED.error,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(task.id.0)
        .bind(&task.code)
        .bind(&task.runtime_id)
        .bind(task.timeout_ms as i64)
        .bind(&task.metadata)
        .bind(&task.workspace)
        .bind(&task.actor)
        .bind(&task.client)
        .bind(status_str(task.status))
        .bind(&task.outcome.stdout)
        .bind(&task.outcome.stderr)
        .bind(task.outcome.exit_code)
        .bind(&task.outcome.error)
        .bind(task.created_at)
        .bind(task.started_at)
        .bind(task.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        row.map(row_to_task).transpose()
    }

    async fn find_in_workspace(&self, id: TaskId, workspace: &str) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = $1 AND workspace = $2")
            .bind(id.0)
            .bind(workspace)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        row.map(row_to_task).transpose()
    }

    async fn list_in_workspace(&self, workspace: &str) -> Result<Vec<Task>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE workspace = $1 ORDER BY created_at")
            .bind(workspace)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        rows.into_iter().map(row_to_task).collect()
    }

    async fn list_queued_ids(&self, limit: usize) -> Result<Vec<TaskId>, RepositoryError> {
        let rows = sqlx::query("SELECT id FROM tasks WHERE status = 'queued' ORDER BY created_at LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        rows.into_iter()
            .map(|row| row.try_get::<uuid::Uuid, _>("id").map(TaskId).map_err(RepositoryError::from))
            .collect()
    }

    async fn mark_running(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query(
            r#"
            UPDATE tasks SET status = 'running', started_at = now()
            WHERE id = $1 AND status = 'queued'
            RETURNING *
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
        row.map(row_to_task).transpose()
    }

    async fn mark_finished(
        &self,
        id: TaskId,
        status: TaskStatus,
        outcome: TaskOutcome,
    ) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query(
            r#"
            UPDATE tasks SET
                status = $2, stdout = $3, stderr = $4, exit_code = $5, error = $6, completed_at = now()
            WHERE id = $1
              AND status NOT IN ('completed', 'failed', 'timed_out', 'denied')
            RETURNING *
            "#,
        )
        .bind(id.0)
        .bind(status_str(status))
        .bind(outcome.stdout)
        .bind(outcome.stderr)
        .bind(outcome.exit_code)
        .bind(outcome.error)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
        row.map(row_to_task).transpose()
    }
}
