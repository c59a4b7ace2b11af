// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(pub Uuid);

impl ApprovalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, ApprovalError> {
        let raw = s
            .strip_prefix("approval_")
            .ok_or_else(|| ApprovalError::InvalidId(s.to_string()))?;
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| ApprovalError::InvalidId(s.to_string()))
    }
}

impl Default for ApprovalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "approval_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::Denied)
    }
}

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("invalid approval id: {0}")]
    InvalidId(String),
    #[error("approval is no longer pending")]
    NotPending,
    #[error("approval belongs to a different workspace")]
    WorkspaceMismatch,
    #[error("reviewer does not match the authenticated caller")]
    ReviewerMismatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: ApprovalId,
    pub task_id: TaskId,
    pub workspace: String,
    /// Tool path, or comma-joined GraphQL field paths (§4.7).
    pub tool_path: String,
    pub input: serde_json::Value,
    pub status: ApprovalStatus,
    pub reviewer_id: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Approval {
    pub fn new(
        task_id: TaskId,
        workspace: String,
        tool_path: String,
        input: serde_json::Value,
    ) -> Self {
        Self {
            id: ApprovalId::new(),
            task_id,
            workspace,
            tool_path,
            input,
            status: ApprovalStatus::Pending,
            reviewer_id: None,
            reason: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// `pending -> {approved, denied}`. `reviewer`, if supplied, must match
    /// the already-authenticated caller at the application layer; this
    /// method only enforces the state-machine half of the invariant.
    pub fn resolve(
        &mut self,
        approved: bool,
        reviewer: Option<String>,
        reason: Option<String>,
    ) -> Result<(), ApprovalError> {
        if self.status != ApprovalStatus::Pending {
            return Err(ApprovalError::NotPending);
        }
        self.status = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Denied
        };
        self.reviewer_id = reviewer;
        self.reason = reason;
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_id_round_trips() {
        let id = ApprovalId::new();
        assert_eq!(ApprovalId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn resolve_transitions_out_of_pending_exactly_once() {
        let mut approval = Approval::new(
            TaskId::new(),
            "ws_1".to_string(),
            "admin.send_announcement".to_string(),
            serde_json::json!({}),
        );
        approval
            .resolve(true, Some("reviewer_1".to_string()), None)
            .unwrap();
        assert_eq!(approval.status, ApprovalStatus::Approved);
        assert!(approval.resolved_at.is_some());

        let err = approval.resolve(false, None, None).unwrap_err();
        assert!(matches!(err, ApprovalError::NotPending));
    }

    #[test]
    fn denial_records_reason() {
        let mut approval = Approval::new(
            TaskId::new(),
            "ws_1".to_string(),
            "admin.delete_data".to_string(),
            serde_json::json!({"key": "important"}),
        );
        approval
            .resolve(false, Some("reviewer_1".to_string()), Some("too risky".to_string()))
            .unwrap();
        assert_eq!(approval.status, ApprovalStatus::Denied);
        assert_eq!(approval.reason.as_deref(), Some("too risky"));
    }
}
