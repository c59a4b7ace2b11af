// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! The sandboxed runtime collaborator (§1 "Non-goals": the core does not
//! execute untrusted code directly — it delegates here). Grounded in the
//! teacher's `domain::runtime`/`domain::supervisor` instance-lifecycle
//! abstraction, narrowed to the one operation the Task Runner needs:
//! "run this code, calling back into the dispatcher for every tool call".
//!
//! `ProcessSandbox` is a development-only implementation recognizing a
//! single statement shape
//! (`return await tools.<dotted.path>(<json-object>)`), sufficient to drive
//! the integration scenarios in spec §8. Production deployments supply
//! their own `SandboxRuntime` (Firecracker, gVisor, Docker, ...).

use crate::domain::task::TaskId;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub tool_path: String,
    pub input: Value,
}

/// Mirrors the `{ok: true, value}` / `{ok: false, denied?, error}` shape the
/// Task Runner's execution adapter normalizes dispatcher errors into
/// (§4.11).
#[derive(Debug, Clone)]
pub enum ToolCallResult {
    Ok(Value),
    Err { denied: bool, error: String },
}

/// What the sandbox runtime is handed to reach back into the gateway
/// (§4.11's "execution adapter").
#[async_trait]
pub trait SandboxAdapter: Send + Sync {
    async fn invoke_tool(&self, call: ToolCallRequest) -> ToolCallResult;
    async fn emit_output(&self, stream: &str, line: &str);
}

#[derive(Debug)]
pub struct SandboxRequest {
    pub task_id: TaskId,
    pub code: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub enum SandboxOutcome {
    Completed {
        stdout: Option<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },
    Failed {
        error: String,
    },
    TimedOut,
    /// The runtime surfaced the approval-denial sentinel (§6) from a tool
    /// call; the Task Runner maps this straight to the `denied` terminal
    /// state.
    Denied {
        error: String,
    },
}

#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    async fn execute(&self, request: SandboxRequest, adapter: Arc<dyn SandboxAdapter>) -> SandboxOutcome;
}

/// Recognizes exactly one statement shape:
/// `return await tools.<dotted.path>(<json object literal>)`, optionally
/// with trailing whitespace/semicolon. Anything else is treated as a
/// literal expression whose JSON parse becomes the task's stdout value, with
/// the code running without ever invoking a tool (useful for
/// `return 1`-style smoke tests).
pub struct ProcessSandbox {
    timeout_grace: Duration,
}

impl Default for ProcessSandbox {
    fn default() -> Self {
        Self {
            timeout_grace: Duration::from_millis(0),
        }
    }
}

impl ProcessSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_tool_call(code: &str) -> Option<(String, Value)> {
        let trimmed = code.trim().trim_end_matches(';').trim();
        let rest = trimmed
            .strip_prefix("return await tools.")
            .or_else(|| trimmed.strip_prefix("await tools."))
            .or_else(|| trimmed.strip_prefix("return tools."))?;
        let open = rest.find('(')?;
        let path = rest[..open].to_string();
        let close = rest.rfind(')')?;
        let args_src = &rest[open + 1..close];
        let input: Value = if args_src.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(args_src).ok()?
        };
        Some((path, input))
    }
}

#[async_trait]
impl SandboxRuntime for ProcessSandbox {
    async fn execute(&self, request: SandboxRequest, adapter: Arc<dyn SandboxAdapter>) -> SandboxOutcome {
        if request.timeout_ms == 0 {
            return SandboxOutcome::TimedOut;
        }
        tokio::time::sleep(self.timeout_grace).await;

        if let Some((tool_path, input)) = Self::parse_tool_call(&request.code) {
            let call_id = format!("call_{}", uuid::Uuid::new_v4());
            let result = adapter
                .invoke_tool(ToolCallRequest {
                    call_id,
                    tool_path,
                    input,
                })
                .await;
            return match result {
                ToolCallResult::Ok(value) => {
                    let stdout = serde_json::to_string(&value).unwrap_or_default();
                    adapter.emit_output("stdout", &stdout).await;
                    SandboxOutcome::Completed {
                        stdout: Some(stdout),
                        stderr: None,
                        exit_code: Some(0),
                    }
                }
                ToolCallResult::Err { denied: true, error } => SandboxOutcome::Denied { error },
                ToolCallResult::Err { denied: false, error } => SandboxOutcome::Failed { error },
            };
        }

        let trimmed = request.code.trim();
        let literal = trimmed.strip_prefix("return ").unwrap_or(trimmed);
        match serde_json::from_str::<Value>(literal) {
            Ok(value) => {
                let stdout = serde_json::to_string(&value).unwrap_or_default();
                adapter.emit_output("stdout", &stdout).await;
                SandboxOutcome::Completed {
                    stdout: Some(stdout),
                    stderr: None,
                    exit_code: Some(0),
                }
            }
            Err(_) => SandboxOutcome::Completed {
                stdout: Some(String::new()),
                stderr: None,
                exit_code: Some(0),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingAdapter {
        outputs: Mutex<Vec<(String, String)>>,
        response: ToolCallResult,
    }

    #[async_trait]
    impl SandboxAdapter for RecordingAdapter {
        async fn invoke_tool(&self, _call: ToolCallRequest) -> ToolCallResult {
            match &self.response {
                ToolCallResult::Ok(v) => ToolCallResult::Ok(v.clone()),
                ToolCallResult::Err { denied, error } => ToolCallResult::Err {
                    denied: *denied,
                    error: error.clone(),
                },
            }
        }

        async fn emit_output(&self, stream: &str, line: &str) {
            self.outputs.lock().unwrap().push((stream.to_string(), line.to_string()));
        }
    }

    #[tokio::test]
    async fn parses_and_invokes_a_tool_call_statement() {
        let sandbox = ProcessSandbox::new();
        let adapter = Arc::new(RecordingAdapter {
            outputs: Mutex::new(Vec::new()),
            response: ToolCallResult::Ok(serde_json::json!({"ok": true})),
        });
        let outcome = sandbox
            .execute(
                SandboxRequest {
                    task_id: TaskId::new(),
                    code: "return await tools.admin.send_announcement({\"channel\": \"general\"})".to_string(),
                    timeout_ms: 300_000,
                },
                adapter.clone(),
            )
            .await;
        match outcome {
            SandboxOutcome::Completed { stdout, exit_code, .. } => {
                assert_eq!(exit_code, Some(0));
                assert!(stdout.unwrap().contains("ok"));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        assert_eq!(adapter.outputs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn denied_tool_call_maps_to_denied_outcome() {
        let sandbox = ProcessSandbox::new();
        let adapter = Arc::new(RecordingAdapter {
            outputs: Mutex::new(Vec::new()),
            response: ToolCallResult::Err {
                denied: true,
                error: "APPROVAL_DENIED:admin.delete_data (approval_1)".to_string(),
            },
        });
        let outcome = sandbox
            .execute(
                SandboxRequest {
                    task_id: TaskId::new(),
                    code: "return await tools.admin.delete_data({\"key\": \"important\"})".to_string(),
                    timeout_ms: 300_000,
                },
                adapter,
            )
            .await;
        assert!(matches!(outcome, SandboxOutcome::Denied { .. }));
    }

    #[tokio::test]
    async fn zero_timeout_is_an_immediate_timeout() {
        let sandbox = ProcessSandbox::new();
        let adapter = Arc::new(RecordingAdapter {
            outputs: Mutex::new(Vec::new()),
            response: ToolCallResult::Ok(Value::Null),
        });
        let outcome = sandbox
            .execute(
                SandboxRequest {
                    task_id: TaskId::new(),
                    code: "return 1".to_string(),
                    timeout_ms: 0,
                },
                adapter,
            )
            .await;
        assert!(matches!(outcome, SandboxOutcome::TimedOut));
    }

    #[test]
    fn parses_bare_await_without_return() {
        let (path, input) = ProcessSandbox::parse_tool_call("await tools.x.y({\"a\": 1});").unwrap();
        assert_eq!(path, "x.y");
        assert_eq!(input["a"], 1);
    }
}
