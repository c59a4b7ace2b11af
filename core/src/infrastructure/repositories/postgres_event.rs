// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Postgres-backed `EventRepository`. Sequence numbers are assigned by a
//! per-task monotonic counter maintained in the `task_event_sequences`
//! table; §4.1 only requires per-task monotonicity, not a global ordering
//! (§9 Open Questions), so a single global sequence is not used here.

use crate::domain::event::{Event, EventCategory};
use crate::domain::repository::{EventRepository, RepositoryError};
use crate::domain::task::TaskId;
use async_trait::async_trait;
use sqlx::{PgPool, Row};

pub struct PostgresEventRepository {
    pool: PgPool,
}

impl PostgresEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn category_str(c: EventCategory) -> &'static str {
    match c {
        EventCategory::Task => "task",
        EventCategory::Approval => "approval",
    }
}

fn parse_category(s: &str) -> EventCategory {
    match s {
        "approval" => EventCategory::Approval,
        _ => EventCategory::Task,
    }
}

#[async_trait]
impl EventRepository for PostgresEventRepository {
    async fn append(&self, mut event: Event) -> Result<Event, RepositoryError> {
        let row = sqlx::query(
            r#"
            WITH next_seq AS (
                INSERT INTO task_event_sequences (task_id, next_sequence)
                VALUES ($1, 1)
                ON CONFLICT (task_id) DO UPDATE SET next_sequence = task_event_sequences.next_sequence + 1
                RETURNING next_sequence - 1 AS sequence
            )
            INSERT INTO events (task_id, sequence, category, event_type, payload, created_at)
            SELECT $1, sequence, $2, $3, $4, now() FROM next_seq
            RETURNING sequence, created_at
            "#,
        )
        .bind(event.task_id.0)
        .bind(category_str(event.category))
        .bind(&event.event_type)
        .bind(&event.payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        event.sequence = row.try_get::<i64, _>("sequence")? as u64;
        event.created_at = row.try_get("created_at")?;
        Ok(event)
    }

    async fn list_by_task(&self, task_id: TaskId) -> Result<Vec<Event>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM events WHERE task_id = $1 ORDER BY sequence")
            .bind(task_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let category_raw: String = row.try_get("category")?;
                Ok(Event {
                    sequence: row.try_get::<i64, _>("sequence")? as u64,
                    task_id,
                    category: parse_category(&category_raw),
                    event_type: row.try_get("event_type")?,
                    payload: row.try_get("payload")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
