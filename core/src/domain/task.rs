// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Default task timeout, enforced by the sandbox runtime (§5 of the spec).
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses the spec's `task_<uuid>` string form.
    pub fn parse(s: &str) -> Result<Self, TaskError> {
        let raw = s
            .strip_prefix("task_")
            .ok_or_else(|| TaskError::InvalidId(s.to_string()))?;
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| TaskError::InvalidId(s.to_string()))
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    TimedOut,
    Denied,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::TimedOut | TaskStatus::Denied
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::TimedOut => "timed_out",
            TaskStatus::Denied => "denied",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid task id: {0}")]
    InvalidId(String),
    #[error("task code must not be empty")]
    EmptyCode,
    #[error("task is not in a state that allows this transition")]
    InvalidTransition,
}

/// Terminal outcome fields. Populated only once the task reaches a terminal
/// status; all fields are optional because a `timed_out`/`denied` task may
/// carry no stdout/stderr/exitCode at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub code: String,
    pub runtime_id: String,
    pub timeout_ms: u64,
    pub metadata: serde_json::Value,
    pub workspace: String,
    pub actor: String,
    pub client: Option<String>,
    pub status: TaskStatus,
    pub outcome: TaskOutcome,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: TaskId,
        code: String,
        runtime_id: String,
        timeout_ms: u64,
        metadata: serde_json::Value,
        workspace: String,
        actor: String,
        client: Option<String>,
    ) -> Result<Self, TaskError> {
        if code.trim().is_empty() {
            return Err(TaskError::EmptyCode);
        }
        Ok(Self {
            id,
            code,
            runtime_id,
            timeout_ms,
            metadata,
            workspace,
            actor,
            client,
            status: TaskStatus::Queued,
            outcome: TaskOutcome::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        })
    }

    /// `queued -> running`. Returns `Err` if the task already advanced past
    /// `queued`; callers treat this as a no-op, matching `markRunning`'s
    /// idempotent-for-concurrent-workers contract.
    pub fn start(&mut self) -> Result<(), TaskError> {
        if self.status != TaskStatus::Queued {
            return Err(TaskError::InvalidTransition);
        }
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Any non-terminal state -> a terminal state. Returns `Err` if the task
    /// is already terminal (terminal states are absorbing).
    pub fn finish(&mut self, status: TaskStatus, outcome: TaskOutcome) -> Result<(), TaskError> {
        if self.status.is_terminal() {
            return Err(TaskError::InvalidTransition);
        }
        if !status.is_terminal() {
            return Err(TaskError::InvalidTransition);
        }
        self.status = status;
        self.outcome = outcome;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task() -> Task {
        Task::new(
            TaskId::new(),
            "return 1".to_string(),
            "python3.11".to_string(),
            DEFAULT_TIMEOUT_MS,
            serde_json::json!({}),
            "ws_1".to_string(),
            "actor_1".to_string(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn task_id_round_trips_through_display() {
        let id = TaskId::new();
        let rendered = id.to_string();
        assert!(rendered.starts_with("task_"));
        assert_eq!(TaskId::parse(&rendered).unwrap(), id);
    }

    #[test]
    fn rejects_empty_code() {
        let err = Task::new(
            TaskId::new(),
            "   ".to_string(),
            "python3.11".to_string(),
            DEFAULT_TIMEOUT_MS,
            serde_json::json!({}),
            "ws_1".to_string(),
            "actor_1".to_string(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, TaskError::EmptyCode));
    }

    #[test]
    fn queued_to_running_to_completed() {
        let mut task = new_task();
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.started_at.is_none());

        task.start().unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.started_at.is_some());

        task.finish(
            TaskStatus::Completed,
            TaskOutcome {
                stdout: Some("hi".to_string()),
                exit_code: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
        assert!(task.is_terminal());
    }

    #[test]
    fn start_is_idempotent_no_op_once_running() {
        let mut task = new_task();
        task.start().unwrap();
        assert!(matches!(task.start(), Err(TaskError::InvalidTransition)));
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let mut task = new_task();
        task.start().unwrap();
        task.finish(TaskStatus::Failed, TaskOutcome::default()).unwrap();
        let err = task
            .finish(TaskStatus::Completed, TaskOutcome::default())
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidTransition));
    }

    #[test]
    fn finish_rejects_non_terminal_target_status() {
        let mut task = new_task();
        task.start().unwrap();
        let err = task.finish(TaskStatus::Running, TaskOutcome::default()).unwrap_err();
        assert!(matches!(err, TaskError::InvalidTransition));
    }

    #[test]
    fn can_finish_directly_from_queued_on_denial() {
        // A call denied during approval can terminate a task that never
        // reached `running` in the runner's own bookkeeping in degenerate
        // cases (e.g. denial surfaced before the runner marks running).
        let mut task = new_task();
        task.finish(TaskStatus::Denied, TaskOutcome::default()).unwrap();
        assert_eq!(task.status, TaskStatus::Denied);
        assert!(task.started_at.is_none());
    }
}
