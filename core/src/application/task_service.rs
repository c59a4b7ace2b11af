// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Task Store (§4.2): CRUD + state-machine guards for Task and Approval
//! rows. Grounded on `application::lifecycle`'s CRUD-service shape, wired to
//! the `TaskRepository`/`ApprovalRepository` traits instead of an
//! agent-manifest repository.

use crate::domain::approval::{Approval, ApprovalId, ApprovalStatus};
use crate::domain::repository::{ApprovalRepository, RepositoryError, TaskRepository};
use crate::domain::task::{Task, TaskId, TaskOutcome, TaskStatus};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait TaskService: Send + Sync {
    async fn create_task(
        &self,
        id: TaskId,
        code: String,
        runtime_id: String,
        timeout_ms: u64,
        metadata: serde_json::Value,
        workspace: String,
        actor: String,
        client: Option<String>,
    ) -> Result<Task>;

    async fn mark_running(&self, id: TaskId) -> Result<Option<Task>>;

    async fn mark_finished(
        &self,
        id: TaskId,
        status: TaskStatus,
        outcome: TaskOutcome,
    ) -> Result<Option<Task>>;

    async fn get_task_in_workspace(&self, id: TaskId, workspace: &str) -> Result<Option<Task>>;

    async fn list_tasks(&self, workspace: &str) -> Result<Vec<Task>>;

    async fn list_queued_task_ids(&self, limit: usize) -> Result<Vec<TaskId>>;

    async fn create_approval(
        &self,
        task_id: TaskId,
        workspace: String,
        tool_path: String,
        input: serde_json::Value,
    ) -> Result<Approval>;

    async fn get_approval(&self, id: ApprovalId) -> Result<Option<Approval>>;

    async fn resolve_approval(
        &self,
        id: ApprovalId,
        approved: bool,
        reviewer: Option<String>,
        reason: Option<String>,
    ) -> Result<Option<Approval>>;

    async fn list_pending_approvals(&self, workspace: &str) -> Result<Vec<Approval>>;

    async fn list_approvals(
        &self,
        workspace: &str,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<Approval>>;
}

pub struct StandardTaskService {
    tasks: Arc<dyn TaskRepository>,
    approvals: Arc<dyn ApprovalRepository>,
}

impl StandardTaskService {
    pub fn new(tasks: Arc<dyn TaskRepository>, approvals: Arc<dyn ApprovalRepository>) -> Self {
        Self { tasks, approvals }
    }
}

fn map_repo_err(e: RepositoryError) -> anyhow::Error {
    anyhow!(e)
}

#[async_trait]
impl TaskService for StandardTaskService {
    async fn create_task(
        &self,
        id: TaskId,
        code: String,
        runtime_id: String,
        timeout_ms: u64,
        metadata: serde_json::Value,
        workspace: String,
        actor: String,
        client: Option<String>,
    ) -> Result<Task> {
        if let Some(existing) = self.tasks.find_by_id(id).await.map_err(map_repo_err)? {
            let _ = existing;
            return Err(anyhow!("task '{}' already exists", id));
        }
        let task = Task::new(id, code, runtime_id, timeout_ms, metadata, workspace, actor, client)?;
        self.tasks.save(&task).await.map_err(map_repo_err)?;
        Ok(task)
    }

    async fn mark_running(&self, id: TaskId) -> Result<Option<Task>> {
        self.tasks.mark_running(id).await.map_err(map_repo_err)
    }

    async fn mark_finished(
        &self,
        id: TaskId,
        status: TaskStatus,
        outcome: TaskOutcome,
    ) -> Result<Option<Task>> {
        self.tasks
            .mark_finished(id, status, outcome)
            .await
            .map_err(map_repo_err)
    }

    async fn get_task_in_workspace(&self, id: TaskId, workspace: &str) -> Result<Option<Task>> {
        self.tasks
            .find_in_workspace(id, workspace)
            .await
            .map_err(map_repo_err)
    }

    async fn list_tasks(&self, workspace: &str) -> Result<Vec<Task>> {
        self.tasks.list_in_workspace(workspace).await.map_err(map_repo_err)
    }

    async fn list_queued_task_ids(&self, limit: usize) -> Result<Vec<TaskId>> {
        self.tasks.list_queued_ids(limit).await.map_err(map_repo_err)
    }

    async fn create_approval(
        &self,
        task_id: TaskId,
        workspace: String,
        tool_path: String,
        input: serde_json::Value,
    ) -> Result<Approval> {
        let approval = Approval::new(task_id, workspace, tool_path, input);
        self.approvals.save(&approval).await.map_err(map_repo_err)?;
        Ok(approval)
    }

    async fn get_approval(&self, id: ApprovalId) -> Result<Option<Approval>> {
        self.approvals.find_by_id(id).await.map_err(map_repo_err)
    }

    async fn resolve_approval(
        &self,
        id: ApprovalId,
        approved: bool,
        reviewer: Option<String>,
        reason: Option<String>,
    ) -> Result<Option<Approval>> {
        self.approvals
            .resolve(id, approved, reviewer, reason)
            .await
            .map_err(map_repo_err)
    }

    async fn list_pending_approvals(&self, workspace: &str) -> Result<Vec<Approval>> {
        self.approvals
            .list_pending_in_workspace(workspace)
            .await
            .map_err(map_repo_err)
    }

    async fn list_approvals(
        &self,
        workspace: &str,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<Approval>> {
        self.approvals
            .list_in_workspace(workspace, status)
            .await
            .map_err(map_repo_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::in_memory::{InMemoryApprovalRepository, InMemoryTaskRepository};

    fn service() -> StandardTaskService {
        StandardTaskService::new(
            Arc::new(InMemoryTaskRepository::new()),
            Arc::new(InMemoryApprovalRepository::new()),
        )
    }

    #[tokio::test]
    async fn create_task_rejects_duplicate_id() {
        let svc = service();
        let id = TaskId::new();
        svc.create_task(
            id,
            "return 1".to_string(),
            "python3.11".to_string(),
            300_000,
            serde_json::json!({}),
            "ws_1".to_string(),
            "actor_1".to_string(),
            None,
        )
        .await
        .unwrap();

        let err = svc
            .create_task(
                id,
                "return 2".to_string(),
                "python3.11".to_string(),
                300_000,
                serde_json::json!({}),
                "ws_1".to_string(),
                "actor_1".to_string(),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn concurrent_mark_running_promotes_exactly_once() {
        let svc = Arc::new(service());
        let id = TaskId::new();
        svc.create_task(
            id,
            "return 1".to_string(),
            "python3.11".to_string(),
            300_000,
            serde_json::json!({}),
            "ws_1".to_string(),
            "actor_1".to_string(),
            None,
        )
        .await
        .unwrap();

        let a = svc.clone();
        let b = svc.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { a.mark_running(id).await.unwrap() }),
            tokio::spawn(async move { b.mark_running(id).await.unwrap() }),
        );
        let (r1, r2) = (r1.unwrap(), r2.unwrap());
        let successes = [r1.is_some(), r2.is_some()].iter().filter(|x| **x).count();
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn get_task_in_workspace_is_scoped() {
        let svc = service();
        let id = TaskId::new();
        svc.create_task(
            id,
            "return 1".to_string(),
            "python3.11".to_string(),
            300_000,
            serde_json::json!({}),
            "ws_a".to_string(),
            "actor_1".to_string(),
            None,
        )
        .await
        .unwrap();

        assert!(svc.get_task_in_workspace(id, "ws_a").await.unwrap().is_some());
        assert!(svc.get_task_in_workspace(id, "ws_b").await.unwrap().is_none());
    }
}
