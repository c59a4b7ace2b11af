// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! The Event Log's entity. A single envelope struct (not a per-context Rust
//! enum) so the stable payload shapes in spec §6 map directly onto wire
//! JSON; typed constructors below keep call sites from hand-building
//! `serde_json::Value` payloads ad hoc.

use crate::domain::approval::ApprovalId;
use crate::domain::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Task,
    Approval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub sequence: u64,
    pub task_id: TaskId,
    pub category: EventCategory,
    /// Dotted type, e.g. `task.running`, `tool.call.started`.
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Event {
    fn new(task_id: TaskId, category: EventCategory, event_type: &str, payload: serde_json::Value) -> Self {
        Self {
            // Sequence is assigned by the Event Log on append, not here;
            // zero is a placeholder overwritten before the event is
            // considered appended.
            sequence: 0,
            task_id,
            category,
            event_type: event_type.to_string(),
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn task_created(
        task_id: TaskId,
        status: &str,
        runtime_id: &str,
        timeout_ms: u64,
        workspace: &str,
        actor: &str,
        client: Option<&str>,
    ) -> Self {
        Self::new(
            task_id,
            EventCategory::Task,
            "task.created",
            json!({
                "taskId": task_id.to_string(),
                "status": status,
                "runtimeId": runtime_id,
                "timeoutMs": timeout_ms,
                "workspace": workspace,
                "actor": actor,
                "client": client,
                "createdAt": Utc::now(),
            }),
        )
    }

    pub fn task_status(task_id: TaskId, status: &str, extra: serde_json::Value) -> Self {
        let event_type = format!("task.{status}");
        let mut payload = json!({ "taskId": task_id.to_string(), "status": status });
        if let (Some(payload_obj), Some(extra_obj)) = (payload.as_object_mut(), extra.as_object()) {
            for (k, v) in extra_obj {
                payload_obj.insert(k.clone(), v.clone());
            }
        }
        Self::new(task_id, EventCategory::Task, &event_type, payload)
    }

    pub fn task_output(task_id: TaskId, stream: &str, line: &str) -> Self {
        let event_type = format!("task.{stream}");
        Self::new(
            task_id,
            EventCategory::Task,
            &event_type,
            json!({ "taskId": task_id.to_string(), "line": line, "timestamp": Utc::now() }),
        )
    }

    pub fn tool_call(
        task_id: TaskId,
        suffix: &str,
        call_id: &str,
        tool_path: &str,
        extra: serde_json::Value,
    ) -> Self {
        let event_type = format!("tool.call.{suffix}");
        let mut payload = json!({
            "taskId": task_id.to_string(),
            "callId": call_id,
            "toolPath": tool_path,
        });
        if let (Some(payload_obj), Some(extra_obj)) = (payload.as_object_mut(), extra.as_object()) {
            for (k, v) in extra_obj {
                payload_obj.insert(k.clone(), v.clone());
            }
        }
        Self::new(task_id, EventCategory::Task, &event_type, payload)
    }

    pub fn approval_requested(
        task_id: TaskId,
        approval_id: ApprovalId,
        tool_path: &str,
        input: &serde_json::Value,
    ) -> Self {
        Self::new(
            task_id,
            EventCategory::Approval,
            "approval.requested",
            json!({
                "approvalId": approval_id.to_string(),
                "taskId": task_id.to_string(),
                "toolPath": tool_path,
                "input": input,
                "createdAt": Utc::now(),
            }),
        )
    }

    pub fn approval_resolved(
        task_id: TaskId,
        approval_id: ApprovalId,
        tool_path: &str,
        decision: &str,
        reviewer_id: Option<&str>,
        reason: Option<&str>,
    ) -> Self {
        Self::new(
            task_id,
            EventCategory::Approval,
            "approval.resolved",
            json!({
                "approvalId": approval_id.to_string(),
                "taskId": task_id.to_string(),
                "toolPath": tool_path,
                "decision": decision,
                "reviewerId": reviewer_id,
                "reason": reason,
                "resolvedAt": Utc::now(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_created_payload_carries_spec_fields() {
        let task_id = TaskId::new();
        let event = Event::task_created(task_id, "queued", "python3.11", 300_000, "ws_1", "actor_1", None);
        assert_eq!(event.event_type, "task.created");
        assert_eq!(event.payload["status"], "queued");
        assert_eq!(event.payload["timeoutMs"], 300_000);
    }

    #[test]
    fn tool_call_denied_carries_reason() {
        let task_id = TaskId::new();
        let event = Event::tool_call(
            task_id,
            "denied",
            "call_1",
            "admin.delete_data",
            json!({ "reason": "policy_deny" }),
        );
        assert_eq!(event.event_type, "tool.call.denied");
        assert_eq!(event.payload["reason"], "policy_deny");
    }
}
