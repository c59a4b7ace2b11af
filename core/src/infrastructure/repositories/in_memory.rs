// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Thread-safe in-memory repositories for development and the test suite.
//! Grounded on the teacher's `InMemoryAgentRepository`/
//! `InMemoryExecutionRepository` (`Arc<RwLock<HashMap<..>>>`), generalized
//! to this gateway's six aggregate roots.

use crate::domain::approval::{Approval, ApprovalId, ApprovalStatus};
use crate::domain::credential::{Credential, CredentialId, CredentialScope};
use crate::domain::event::Event;
use crate::domain::policy::{AccessPolicy, PolicyId};
use crate::domain::repository::{
    ApprovalRepository, CredentialRepository, EventRepository, PolicyRepository, RepositoryError,
    TaskRepository, ToolSourceRepository,
};
use crate::domain::task::{Task, TaskId, TaskOutcome, TaskStatus};
use crate::domain::tool_source::{SourceId, ToolSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Clone, Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        self.tasks.write().unwrap().insert(task.id, task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        Ok(self.tasks.read().unwrap().get(&id).cloned())
    }

    async fn find_in_workspace(&self, id: TaskId, workspace: &str) -> Result<Option<Task>, RepositoryError> {
        Ok(self
            .tasks
            .read()
            .unwrap()
            .get(&id)
            .filter(|t| t.workspace == workspace)
            .cloned())
    }

    async fn list_in_workspace(&self, workspace: &str) -> Result<Vec<Task>, RepositoryError> {
        Ok(self
            .tasks
            .read()
            .unwrap()
            .values()
            .filter(|t| t.workspace == workspace)
            .cloned()
            .collect())
    }

    async fn list_queued_ids(&self, limit: usize) -> Result<Vec<TaskId>, RepositoryError> {
        let mut queued: Vec<(TaskId, chrono::DateTime<chrono::Utc>)> = self
            .tasks
            .read()
            .unwrap()
            .values()
            .filter(|t| t.status == TaskStatus::Queued)
            .map(|t| (t.id, t.created_at))
            .collect();
        queued.sort_by_key(|(_, created_at)| *created_at);
        Ok(queued.into_iter().take(limit).map(|(id, _)| id).collect())
    }

    async fn mark_running(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        // Single write-lock acquisition spans the check and the write, so
        // concurrent callers serialize and exactly one observes `Queued`.
        let mut tasks = self.tasks.write().unwrap();
        match tasks.get_mut(&id) {
            Some(task) if task.start().is_ok() => Ok(Some(task.clone())),
            Some(_) => Ok(None),
            None => Err(RepositoryError::NotFound(id.to_string())),
        }
    }

    async fn mark_finished(
        &self,
        id: TaskId,
        status: TaskStatus,
        outcome: TaskOutcome,
    ) -> Result<Option<Task>, RepositoryError> {
        let mut tasks = self.tasks.write().unwrap();
        match tasks.get_mut(&id) {
            Some(task) if task.finish(status, outcome).is_ok() => Ok(Some(task.clone())),
            Some(_) => Ok(None),
            None => Err(RepositoryError::NotFound(id.to_string())),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryApprovalRepository {
    approvals: Arc<RwLock<HashMap<ApprovalId, Approval>>>,
}

impl InMemoryApprovalRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn save(&self, approval: &Approval) -> Result<(), RepositoryError> {
        self.approvals.write().unwrap().insert(approval.id, approval.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ApprovalId) -> Result<Option<Approval>, RepositoryError> {
        Ok(self.approvals.read().unwrap().get(&id).cloned())
    }

    async fn find_in_workspace(&self, id: ApprovalId, workspace: &str) -> Result<Option<Approval>, RepositoryError> {
        Ok(self
            .approvals
            .read()
            .unwrap()
            .get(&id)
            .filter(|a| a.workspace == workspace)
            .cloned())
    }

    async fn list_pending_in_workspace(&self, workspace: &str) -> Result<Vec<Approval>, RepositoryError> {
        Ok(self
            .approvals
            .read()
            .unwrap()
            .values()
            .filter(|a| a.workspace == workspace && a.status == ApprovalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn list_in_workspace(
        &self,
        workspace: &str,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<Approval>, RepositoryError> {
        Ok(self
            .approvals
            .read()
            .unwrap()
            .values()
            .filter(|a| a.workspace == workspace && status.map(|s| s == a.status).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn resolve(
        &self,
        id: ApprovalId,
        approved: bool,
        reviewer: Option<String>,
        reason: Option<String>,
    ) -> Result<Option<Approval>, RepositoryError> {
        let mut approvals = self.approvals.write().unwrap();
        match approvals.get_mut(&id) {
            Some(approval) if approval.resolve(approved, reviewer, reason).is_ok() => Ok(Some(approval.clone())),
            Some(_) => Ok(None),
            None => Err(RepositoryError::NotFound(id.to_string())),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryToolSourceRepository {
    sources: Arc<RwLock<HashMap<SourceId, ToolSource>>>,
}

impl InMemoryToolSourceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolSourceRepository for InMemoryToolSourceRepository {
    async fn save(&self, source: &ToolSource) -> Result<(), RepositoryError> {
        self.sources.write().unwrap().insert(source.id, source.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: SourceId) -> Result<Option<ToolSource>, RepositoryError> {
        Ok(self.sources.read().unwrap().get(&id).cloned())
    }

    async fn find_by_name(&self, workspace: &str, name: &str) -> Result<Option<ToolSource>, RepositoryError> {
        Ok(self
            .sources
            .read()
            .unwrap()
            .values()
            .find(|s| s.workspace == workspace && s.name == name)
            .cloned())
    }

    async fn list_enabled_in_workspace(&self, workspace: &str) -> Result<Vec<ToolSource>, RepositoryError> {
        let mut sources: Vec<ToolSource> = self
            .sources
            .read()
            .unwrap()
            .values()
            .filter(|s| s.workspace == workspace && s.enabled)
            .cloned()
            .collect();
        sources.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(sources)
    }

    async fn delete(&self, id: SourceId) -> Result<(), RepositoryError> {
        self.sources.write().unwrap().remove(&id);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPolicyRepository {
    policies: Arc<RwLock<HashMap<PolicyId, AccessPolicy>>>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn save(&self, policy: &AccessPolicy) -> Result<(), RepositoryError> {
        self.policies.write().unwrap().insert(policy.id, policy.clone());
        Ok(())
    }

    async fn list_in_workspace(&self, workspace: &str) -> Result<Vec<AccessPolicy>, RepositoryError> {
        Ok(self
            .policies
            .read()
            .unwrap()
            .values()
            .filter(|p| p.workspace == workspace)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: PolicyId) -> Result<(), RepositoryError> {
        self.policies.write().unwrap().remove(&id);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCredentialRepository {
    credentials: Arc<RwLock<HashMap<CredentialId, Credential>>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn save(&self, credential: &Credential) -> Result<(), RepositoryError> {
        self.credentials
            .write()
            .unwrap()
            .insert(credential.id, credential.clone());
        Ok(())
    }

    async fn find(
        &self,
        workspace: &str,
        source_key: &str,
        scope: CredentialScope,
        actor_id: Option<&str>,
    ) -> Result<Option<Credential>, RepositoryError> {
        Ok(self
            .credentials
            .read()
            .unwrap()
            .values()
            .find(|c| {
                c.workspace == workspace
                    && c.source_key == source_key
                    && c.scope == scope
                    && c.actor_id.as_deref() == actor_id
            })
            .cloned())
    }

    async fn delete(&self, id: CredentialId) -> Result<(), RepositoryError> {
        self.credentials.write().unwrap().remove(&id);
        Ok(())
    }
}

#[derive(Clone)]
pub struct InMemoryEventRepository {
    events: Arc<RwLock<Vec<Event>>>,
    next_sequence: Arc<AtomicU64>,
}

impl Default for InMemoryEventRepository {
    fn default() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            // Sequences start at 1; 0 is reserved as the "not yet appended"
            // placeholder on a freshly-constructed `Event`.
            next_sequence: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn append(&self, mut event: Event) -> Result<Event, RepositoryError> {
        event.sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.events.write().unwrap().push(event.clone());
        Ok(event)
    }

    async fn list_by_task(&self, task_id: TaskId) -> Result<Vec<Event>, RepositoryError> {
        let mut events: Vec<Event> = self
            .events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_sequence_is_strictly_increasing_per_task() {
        let repo = InMemoryEventRepository::new();
        let task_id = TaskId::new();
        let e1 = repo
            .append(Event::task_created(task_id, "queued", "python3.11", 1000, "ws", "a", None))
            .await
            .unwrap();
        let e2 = repo
            .append(Event::task_status(task_id, "running", serde_json::json!({})))
            .await
            .unwrap();
        assert!(e2.sequence > e1.sequence);

        let listed = repo.list_by_task(task_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].event_type, "task.created");
        assert_eq!(listed[1].event_type, "task.running");
    }

    #[tokio::test]
    async fn tool_source_unique_name_lookup() {
        let repo = InMemoryToolSourceRepository::new();
        let source = ToolSource::new(
            "ws_1".to_string(),
            "billing".to_string(),
            crate::domain::tool_source::SourceType::Openapi,
            crate::domain::tool_source::SourceConfig(serde_json::json!({})),
        );
        repo.save(&source).await.unwrap();
        assert!(repo.find_by_name("ws_1", "billing").await.unwrap().is_some());
        assert!(repo.find_by_name("ws_2", "billing").await.unwrap().is_none());
    }
}
