// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Approval Coordinator (§4.10): a thin layer over the Task Store that (a)
//! scopes every read/write to a caller-supplied workspace, (b) enforces that
//! resolution mutations only fire on `pending` approvals, (c) emits
//! `approval.resolved` events, and (d) guarantees the reviewer id, if
//! supplied, matches the authenticated actor. Grounded on
//! `infrastructure::human_input_service`'s request/resolve bookkeeping
//! shape, restructured around the Approval aggregate instead of a
//! oneshot-channel wakeup.

use crate::application::task_service::TaskService;
use crate::domain::approval::{Approval, ApprovalId, ApprovalStatus};
use crate::domain::event::{Event, EventCategory};
use crate::domain::repository::EventRepository;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ApprovalCoordinator: Send + Sync {
    /// Resolves a pending approval scoped to `workspace`. A mismatched
    /// workspace, or an approval that does not exist, both yield the same
    /// "not found" outcome (§3 "Approval" invariants) so callers cannot
    /// probe for the existence of approvals outside their workspace.
    async fn resolve(
        &self,
        id: ApprovalId,
        workspace: &str,
        approved: bool,
        authenticated_actor: Option<&str>,
        reviewer: Option<String>,
        reason: Option<String>,
    ) -> Result<Approval>;

    async fn get_in_workspace(&self, id: ApprovalId, workspace: &str) -> Result<Approval>;

    async fn list_pending(&self, workspace: &str) -> Result<Vec<Approval>>;

    async fn list(&self, workspace: &str, status: Option<ApprovalStatus>) -> Result<Vec<Approval>>;
}

pub struct StandardApprovalCoordinator {
    tasks: Arc<dyn TaskService>,
    events: Arc<dyn EventRepository>,
}

impl StandardApprovalCoordinator {
    pub fn new(tasks: Arc<dyn TaskService>, events: Arc<dyn EventRepository>) -> Self {
        Self { tasks, events }
    }

    async fn scoped(&self, id: ApprovalId, workspace: &str) -> Result<Approval> {
        let approval = self
            .tasks
            .get_approval(id)
            .await?
            .ok_or_else(|| anyhow!("approval '{id}' not found"))?;
        if approval.workspace != workspace {
            // Cross-workspace lookups yield the identical "not found" error a
            // nonexistent id would — §3's workspace-scoping invariant.
            return Err(anyhow!("approval '{id}' not found"));
        }
        Ok(approval)
    }
}

#[async_trait]
impl ApprovalCoordinator for StandardApprovalCoordinator {
    async fn resolve(
        &self,
        id: ApprovalId,
        workspace: &str,
        approved: bool,
        authenticated_actor: Option<&str>,
        reviewer: Option<String>,
        reason: Option<String>,
    ) -> Result<Approval> {
        let existing = self.scoped(id, workspace).await?;
        if existing.status != ApprovalStatus::Pending {
            return Err(anyhow!("approval '{id}' is no longer pending"));
        }
        if let (Some(expected), Some(claimed)) = (authenticated_actor, reviewer.as_deref()) {
            if expected != claimed {
                return Err(anyhow!("reviewer does not match the authenticated caller"));
            }
        }
        let resolved = self
            .tasks
            .resolve_approval(id, approved, reviewer.clone(), reason.clone())
            .await?
            .ok_or_else(|| anyhow!("approval '{id}' is no longer pending"))?;

        let decision = if approved { "approved" } else { "denied" };
        let event = Event::approval_resolved(
            resolved.task_id,
            resolved.id,
            &resolved.tool_path,
            decision,
            resolved.reviewer_id.as_deref(),
            resolved.reason.as_deref(),
        );
        let _ = event.category == EventCategory::Approval;
        self.events.append(event).await?;

        Ok(resolved)
    }

    async fn get_in_workspace(&self, id: ApprovalId, workspace: &str) -> Result<Approval> {
        self.scoped(id, workspace).await
    }

    async fn list_pending(&self, workspace: &str) -> Result<Vec<Approval>> {
        self.tasks.list_pending_approvals(workspace).await
    }

    async fn list(&self, workspace: &str, status: Option<ApprovalStatus>) -> Result<Vec<Approval>> {
        self.tasks.list_approvals(workspace, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::task_service::StandardTaskService;
    use crate::domain::task::TaskId;
    use crate::infrastructure::repositories::in_memory::{
        InMemoryApprovalRepository, InMemoryEventRepository, InMemoryTaskRepository,
    };

    async fn setup() -> (StandardApprovalCoordinator, Arc<dyn TaskService>, Approval) {
        let tasks: Arc<dyn TaskService> = Arc::new(StandardTaskService::new(
            Arc::new(InMemoryTaskRepository::new()),
            Arc::new(InMemoryApprovalRepository::new()),
        ));
        let events: Arc<dyn EventRepository> = Arc::new(InMemoryEventRepository::new());
        let approval = tasks
            .create_approval(
                TaskId::new(),
                "ws_a".to_string(),
                "admin.send_announcement".to_string(),
                serde_json::json!({"channel": "general"}),
            )
            .await
            .unwrap();
        let coordinator = StandardApprovalCoordinator::new(tasks.clone(), events);
        (coordinator, tasks, approval)
    }

    #[tokio::test]
    async fn cross_workspace_resolution_is_rejected_as_not_found() {
        let (coordinator, _tasks, approval) = setup().await;
        let err = coordinator
            .resolve(approval.id, "ws_b", true, None, None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn same_workspace_resolution_succeeds_once() {
        let (coordinator, _tasks, approval) = setup().await;
        let resolved = coordinator
            .resolve(approval.id, "ws_a", true, Some("rev_1"), Some("rev_1".to_string()), None)
            .await
            .unwrap();
        assert_eq!(resolved.status, ApprovalStatus::Approved);

        let err = coordinator
            .resolve(approval.id, "ws_a", false, None, None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no longer pending"));
    }

    #[tokio::test]
    async fn reviewer_mismatch_is_rejected() {
        let (coordinator, _tasks, approval) = setup().await;
        let err = coordinator
            .resolve(
                approval.id,
                "ws_a",
                true,
                Some("rev_1"),
                Some("rev_2".to_string()),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[tokio::test]
    async fn list_pending_never_leaks_across_workspaces() {
        let (coordinator, tasks, _approval) = setup().await;
        tasks
            .create_approval(
                TaskId::new(),
                "ws_b".to_string(),
                "admin.delete_data".to_string(),
                serde_json::json!({}),
            )
            .await
            .unwrap();

        let pending_a = coordinator.list_pending("ws_a").await.unwrap();
        assert_eq!(pending_a.len(), 1);
        assert_eq!(pending_a[0].workspace, "ws_a");
    }
}
