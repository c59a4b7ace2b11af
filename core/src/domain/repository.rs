// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Repository pattern — pluggable storage backend abstraction. In-memory for
//! development/testing, PostgreSQL for production persistence.

use crate::domain::approval::{Approval, ApprovalId, ApprovalStatus};
use crate::domain::credential::{Credential, CredentialId, CredentialScope};
use crate::domain::event::Event;
use crate::domain::policy::{AccessPolicy, PolicyId};
use crate::domain::task::{Task, TaskId};
use crate::domain::tool_source::{SourceId, ToolSource};
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        RepositoryError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        RepositoryError::Serialization(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn save(&self, task: &Task) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, RepositoryError>;
    async fn find_in_workspace(&self, id: TaskId, workspace: &str) -> Result<Option<Task>, RepositoryError>;
    async fn list_in_workspace(&self, workspace: &str) -> Result<Vec<Task>, RepositoryError>;
    async fn list_queued_ids(&self, limit: usize) -> Result<Vec<TaskId>, RepositoryError>;
    /// Atomically transitions `queued -> running`, returning `None` if the
    /// task was already advanced past `queued` by a concurrent worker.
    async fn mark_running(&self, id: TaskId) -> Result<Option<Task>, RepositoryError>;
    /// Atomically transitions any non-terminal status to a terminal one,
    /// returning `None` if the task was already terminal.
    async fn mark_finished(
        &self,
        id: TaskId,
        status: crate::domain::task::TaskStatus,
        outcome: crate::domain::task::TaskOutcome,
    ) -> Result<Option<Task>, RepositoryError>;
}

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn save(&self, approval: &Approval) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: ApprovalId) -> Result<Option<Approval>, RepositoryError>;
    async fn find_in_workspace(&self, id: ApprovalId, workspace: &str) -> Result<Option<Approval>, RepositoryError>;
    async fn list_pending_in_workspace(&self, workspace: &str) -> Result<Vec<Approval>, RepositoryError>;
    async fn list_in_workspace(
        &self,
        workspace: &str,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<Approval>, RepositoryError>;
    /// Atomically transitions `pending -> {approved, denied}`, returning
    /// `None` if already resolved.
    async fn resolve(
        &self,
        id: ApprovalId,
        approved: bool,
        reviewer: Option<String>,
        reason: Option<String>,
    ) -> Result<Option<Approval>, RepositoryError>;
}

#[async_trait]
pub trait ToolSourceRepository: Send + Sync {
    async fn save(&self, source: &ToolSource) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: SourceId) -> Result<Option<ToolSource>, RepositoryError>;
    async fn find_by_name(&self, workspace: &str, name: &str) -> Result<Option<ToolSource>, RepositoryError>;
    async fn list_enabled_in_workspace(&self, workspace: &str) -> Result<Vec<ToolSource>, RepositoryError>;
    async fn delete(&self, id: SourceId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn save(&self, policy: &AccessPolicy) -> Result<(), RepositoryError>;
    async fn list_in_workspace(&self, workspace: &str) -> Result<Vec<AccessPolicy>, RepositoryError>;
    async fn delete(&self, id: PolicyId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn save(&self, credential: &Credential) -> Result<(), RepositoryError>;
    async fn find(
        &self,
        workspace: &str,
        source_key: &str,
        scope: CredentialScope,
        actor_id: Option<&str>,
    ) -> Result<Option<Credential>, RepositoryError>;
    async fn delete(&self, id: CredentialId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Assigns the next per-task sequence number and appends durably.
    async fn append(&self, event: Event) -> Result<Event, RepositoryError>;
    async fn list_by_task(&self, task_id: TaskId) -> Result<Vec<Event>, RepositoryError>;
}

#[derive(Clone)]
pub enum StorageBackend {
    InMemory,
    Postgres(PostgresConfig),
}

pub fn create_task_repository(
    backend: &StorageBackend,
    pool: Option<PgPool>,
) -> std::sync::Arc<dyn TaskRepository> {
    match backend {
        StorageBackend::InMemory => {
            std::sync::Arc::new(crate::infrastructure::repositories::in_memory::InMemoryTaskRepository::new())
        }
        StorageBackend::Postgres(_) => std::sync::Arc::new(
            crate::infrastructure::repositories::postgres_task::PostgresTaskRepository::new(
                pool.expect("postgres backend requires a pool"),
            ),
        ),
    }
}

pub fn create_approval_repository(
    backend: &StorageBackend,
    pool: Option<PgPool>,
) -> std::sync::Arc<dyn ApprovalRepository> {
    match backend {
        StorageBackend::InMemory => std::sync::Arc::new(
            crate::infrastructure::repositories::in_memory::InMemoryApprovalRepository::new(),
        ),
        StorageBackend::Postgres(_) => std::sync::Arc::new(
            crate::infrastructure::repositories::postgres_approval::PostgresApprovalRepository::new(
                pool.expect("postgres backend requires a pool"),
            ),
        ),
    }
}

pub fn create_tool_source_repository(
    backend: &StorageBackend,
    pool: Option<PgPool>,
) -> std::sync::Arc<dyn ToolSourceRepository> {
    match backend {
        StorageBackend::InMemory => std::sync::Arc::new(
            crate::infrastructure::repositories::in_memory::InMemoryToolSourceRepository::new(),
        ),
        StorageBackend::Postgres(_) => std::sync::Arc::new(
            crate::infrastructure::repositories::postgres_tool_source::PostgresToolSourceRepository::new(
                pool.expect("postgres backend requires a pool"),
            ),
        ),
    }
}

pub fn create_policy_repository(
    backend: &StorageBackend,
    pool: Option<PgPool>,
) -> std::sync::Arc<dyn PolicyRepository> {
    match backend {
        StorageBackend::InMemory => {
            std::sync::Arc::new(crate::infrastructure::repositories::in_memory::InMemoryPolicyRepository::new())
        }
        StorageBackend::Postgres(_) => std::sync::Arc::new(
            crate::infrastructure::repositories::postgres_policy::PostgresPolicyRepository::new(
                pool.expect("postgres backend requires a pool"),
            ),
        ),
    }
}

pub fn create_credential_repository(
    backend: &StorageBackend,
    pool: Option<PgPool>,
) -> std::sync::Arc<dyn CredentialRepository> {
    match backend {
        StorageBackend::InMemory => std::sync::Arc::new(
            crate::infrastructure::repositories::in_memory::InMemoryCredentialRepository::new(),
        ),
        StorageBackend::Postgres(_) => std::sync::Arc::new(
            crate::infrastructure::repositories::postgres_credential::PostgresCredentialRepository::new(
                pool.expect("postgres backend requires a pool"),
            ),
        ),
    }
}

pub fn create_event_repository(
    backend: &StorageBackend,
    pool: Option<PgPool>,
) -> std::sync::Arc<dyn EventRepository> {
    match backend {
        StorageBackend::InMemory => {
            std::sync::Arc::new(crate::infrastructure::repositories::in_memory::InMemoryEventRepository::new())
        }
        StorageBackend::Postgres(_) => std::sync::Arc::new(
            crate::infrastructure::repositories::postgres_event::PostgresEventRepository::new(
                pool.expect("postgres backend requires a pool"),
            ),
        ),
    }
}
