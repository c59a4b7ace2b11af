// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Task Runner (§4.11): drives a single queued task to a terminal state.
//! Grounded on `application::execution::StandardExecutionService::start_execution`'s
//! shape — mark running, publish a started event, spawn the work, refetch
//! and mutate on completion, publish the terminal event.

use crate::application::dispatcher::{Dispatcher, ToolCallRequest};
use crate::application::task_service::TaskService;
use crate::domain::errors::GatewayError;
use crate::domain::event::Event;
use crate::domain::task::{Task, TaskId, TaskOutcome, TaskStatus};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::sandbox::{
    SandboxAdapter, SandboxOutcome, SandboxRequest, SandboxRuntime, ToolCallRequest as SandboxToolCallRequest,
    ToolCallResult,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Bridges the sandbox runtime's `invokeTool`/`emitOutput` surface (§4.11)
/// onto the Dispatcher and the Event Log, normalizing dispatcher errors into
/// the `ToolCallResult` shape the sandbox expects rather than propagating a
/// Rust error across that boundary.
struct RunnerAdapter {
    task: Task,
    dispatcher: Arc<Dispatcher>,
    events: Arc<dyn crate::domain::repository::EventRepository>,
    bus: Arc<EventBus>,
}

#[async_trait]
impl SandboxAdapter for RunnerAdapter {
    async fn invoke_tool(&self, call: SandboxToolCallRequest) -> ToolCallResult {
        let result = self
            .dispatcher
            .invoke(
                &self.task,
                ToolCallRequest {
                    call_id: call.call_id,
                    tool_path: call.tool_path,
                    input: call.input,
                },
            )
            .await;
        match result {
            Ok(value) => ToolCallResult::Ok(value),
            Err(err) => ToolCallResult::Err {
                denied: GatewayError::is_approval_denial(&err),
                error: err.to_string(),
            },
        }
    }

    async fn emit_output(&self, stream: &str, line: &str) {
        let event = Event::task_output(self.task.id, stream, line);
        if let Ok(appended) = self.events.append(event).await {
            self.bus.publish(appended);
        }
    }
}

pub struct TaskRunner {
    tasks: Arc<dyn TaskService>,
    dispatcher: Arc<Dispatcher>,
    sandbox: Arc<dyn SandboxRuntime>,
    events: Arc<dyn crate::domain::repository::EventRepository>,
    bus: Arc<EventBus>,
}

impl TaskRunner {
    pub fn new(
        tasks: Arc<dyn TaskService>,
        dispatcher: Arc<Dispatcher>,
        sandbox: Arc<dyn SandboxRuntime>,
        events: Arc<dyn crate::domain::repository::EventRepository>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            tasks,
            dispatcher,
            sandbox,
            events,
            bus,
        }
    }

    async fn publish(&self, event: Event) {
        if let Ok(appended) = self.events.append(event).await {
            self.bus.publish(appended);
        }
    }

    /// Drives `task_id` from `queued` to a terminal state. Idempotent: a
    /// task already advanced past `queued` by a concurrent caller is a
    /// silent no-op (§4.11 step 1-2).
    pub async fn run(&self, task_id: TaskId) -> Result<()> {
        let Some(task) = self.tasks.mark_running(task_id).await? else {
            return Ok(());
        };

        self.publish(Event::task_status(task_id, "running", serde_json::json!({
            "startedAt": task.started_at,
        })))
        .await;

        let adapter: Arc<dyn SandboxAdapter> = Arc::new(RunnerAdapter {
            task: task.clone(),
            dispatcher: self.dispatcher.clone(),
            events: self.events.clone(),
            bus: self.bus.clone(),
        });

        let outcome = self
            .sandbox
            .execute(
                SandboxRequest {
                    task_id,
                    code: task.code.clone(),
                    timeout_ms: task.timeout_ms,
                },
                adapter,
            )
            .await;

        let (status, task_outcome) = Self::terminal_state(outcome);
        let started_at = task.started_at.unwrap_or(task.created_at);
        let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0);

        self.tasks.mark_finished(task_id, status, task_outcome.clone()).await?;

        let event_suffix = status.to_string();
        self.publish(Event::task_status(
            task_id,
            &event_suffix,
            serde_json::json!({
                "exitCode": task_outcome.exit_code,
                "durationMs": duration_ms,
                "error": task_outcome.error,
                "completedAt": Utc::now(),
            }),
        ))
        .await;

        Ok(())
    }

    /// Maps a sandbox outcome to the terminal `TaskStatus` + `TaskOutcome`
    /// pair (§4.11 step 6): an uncaught failure whose message carries the
    /// approval-denial sentinel is recorded as `denied`, not `failed`.
    fn terminal_state(outcome: SandboxOutcome) -> (TaskStatus, TaskOutcome) {
        match outcome {
            SandboxOutcome::Completed { stdout, stderr, exit_code } => (
                TaskStatus::Completed,
                TaskOutcome {
                    stdout,
                    stderr,
                    exit_code,
                    error: None,
                },
            ),
            SandboxOutcome::TimedOut => (
                TaskStatus::TimedOut,
                TaskOutcome {
                    error: Some("task exceeded its timeout".to_string()),
                    ..Default::default()
                },
            ),
            SandboxOutcome::Denied { error } => (
                TaskStatus::Denied,
                TaskOutcome {
                    error: Some(error),
                    ..Default::default()
                },
            ),
            SandboxOutcome::Failed { error } => {
                let denied = error.contains(crate::domain::errors::APPROVAL_DENIED_SENTINEL);
                let status = if denied { TaskStatus::Denied } else { TaskStatus::Failed };
                (status, TaskOutcome { error: Some(error), ..Default::default() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::credential_service::StandardCredentialResolver;
    use crate::application::policy_service::StandardPolicyEvaluator;
    use crate::application::task_service::StandardTaskService;
    use crate::application::tool_compiler_service::ToolCompilerService;
    use crate::application::workspace_tool_cache_service::WorkspaceToolCacheService;
    use crate::domain::repository::PolicyRepository;
    use crate::domain::tool::{ApprovalMode, InvocationContext, InvokeError, ToolDefinition, ToolInvoker};
    use crate::infrastructure::credential_resolver::HttpVaultReader;
    use crate::infrastructure::prepared_spec_cache::InMemoryPreparedSpecCache;
    use crate::infrastructure::repositories::in_memory::{
        InMemoryApprovalRepository, InMemoryCredentialRepository, InMemoryEventRepository,
        InMemoryPolicyRepository, InMemoryTaskRepository, InMemoryToolSourceRepository,
    };
    use crate::infrastructure::sandbox::ProcessSandbox;
    use crate::infrastructure::tool_sources::graphql::GraphqlCompiler;
    use crate::infrastructure::tool_sources::mcp::McpCompiler;
    use crate::infrastructure::tool_sources::openapi::OpenApiCompiler;
    use crate::infrastructure::workspace_tool_cache::InMemoryWorkspaceToolCacheStore;
    use std::collections::HashMap;

    struct EchoInvoker;
    #[async_trait]
    impl ToolInvoker for EchoInvoker {
        async fn invoke(&self, input: serde_json::Value, _ctx: &InvocationContext) -> Result<serde_json::Value, InvokeError> {
            Ok(input)
        }
    }

    fn echo_tool(path: &str) -> ToolDefinition {
        ToolDefinition {
            path: path.to_string(),
            description: "echo".to_string(),
            approval_mode: ApprovalMode::Auto,
            origin_source: None,
            credential_spec: None,
            args_schema: serde_json::json!({}),
            returns_schema: serde_json::json!({}),
            is_graphql_source: false,
            invoker: Arc::new(EchoInvoker),
        }
    }

    fn runner() -> (TaskRunner, Arc<dyn TaskService>) {
        let task_repo = Arc::new(InMemoryTaskRepository::new());
        let approval_repo = Arc::new(InMemoryApprovalRepository::new());
        let tasks: Arc<dyn TaskService> = Arc::new(StandardTaskService::new(task_repo, approval_repo));
        let events: Arc<dyn crate::domain::repository::EventRepository> = Arc::new(InMemoryEventRepository::new());
        let bus = Arc::new(EventBus::new());

        let mut base = HashMap::new();
        base.insert("echo.ping".to_string(), echo_tool("echo.ping"));

        let policies: Arc<dyn PolicyRepository> = Arc::new(InMemoryPolicyRepository::new());
        let sources = Arc::new(InMemoryToolSourceRepository::new());
        let compiler = Arc::new(ToolCompilerService::new(
            Arc::new(OpenApiCompiler::new(Arc::new(InMemoryPreparedSpecCache::new()), 300_000)),
            Arc::new(GraphqlCompiler::new()),
            Arc::new(McpCompiler::new()),
        ));
        let workspace_tools = Arc::new(WorkspaceToolCacheService::new(
            sources,
            compiler,
            Arc::new(InMemoryWorkspaceToolCacheStore::new()),
            Vec::new(),
        ));
        let credentials = Arc::new(StandardCredentialResolver::new(
            Arc::new(InMemoryCredentialRepository::new()),
            Arc::new(HttpVaultReader::new("https://vault.example.com".to_string(), None)),
        ));

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(base),
            workspace_tools,
            policies,
            Arc::new(StandardPolicyEvaluator::new()),
            credentials,
            tasks.clone(),
            events.clone(),
            bus.clone(),
        ));
        let sandbox: Arc<dyn SandboxRuntime> = Arc::new(ProcessSandbox::new());

        (TaskRunner::new(tasks.clone(), dispatcher, sandbox, events, bus), tasks)
    }

    #[tokio::test]
    async fn completed_task_records_stdout_and_exit_code() {
        let (runner, tasks) = runner();
        let id = TaskId::new();
        tasks
            .create_task(
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

        runner.run(id).await.unwrap();

        let task = tasks.get_task_in_workspace(id, "ws_1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
    }

    #[tokio::test]
    async fn tool_call_result_is_surfaced_through_the_adapter() {
        let (runner, tasks) = runner();
        let id = TaskId::new();
        tasks
            .create_task(
                id,
                "return await tools.echo.ping({\"hello\": \"world\"})".to_string(),
                "python3.11".to_string(),
                300_000,
                serde_json::json!({}),
                "ws_1".to_string(),
                "actor_1".to_string(),
                None,
            )
            .await
            .unwrap();

        runner.run(id).await.unwrap();

        let task = tasks.get_task_in_workspace(id, "ws_1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.outcome.stdout.unwrap().contains("world"));
    }

    #[tokio::test]
    async fn already_running_task_is_a_no_op() {
        let (runner, tasks) = runner();
        let id = TaskId::new();
        tasks
            .create_task(
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
        tasks.mark_running(id).await.unwrap();

        runner.run(id).await.unwrap();

        let task = tasks.get_task_in_workspace(id, "ws_1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Running);
    }

    #[test]
    fn failed_outcome_with_sentinel_maps_to_denied() {
        let outcome = SandboxOutcome::Failed {
            error: format!("{}admin.delete_data (approval_deadbeef)", crate::domain::errors::APPROVAL_DENIED_SENTINEL),
        };
        let (status, task_outcome) = TaskRunner::terminal_state(outcome);
        assert_eq!(status, TaskStatus::Denied);
        assert!(task_outcome.error.unwrap().contains("admin.delete_data"));
    }

    #[test]
    fn failed_outcome_without_sentinel_maps_to_failed() {
        let outcome = SandboxOutcome::Failed {
            error: "boom".to_string(),
        };
        let (status, _) = TaskRunner::terminal_state(outcome);
        assert_eq!(status, TaskStatus::Failed);
    }
}
