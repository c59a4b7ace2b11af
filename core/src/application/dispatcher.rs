// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Tool Dispatcher (§4.9): orchestrates one tool call end to end —
//! resolution, policy, credentials, approval gating, invocation, and event
//! publication. Grounded on `application::tool_invocation_service`'s
//! resolve -> verify -> route -> dispatch pipeline shape, generalized from
//! an SMCP envelope to a plain `{callId, toolPath, input}` request.

use crate::application::credential_service::CredentialResolver;
use crate::application::policy_service::{EvalContext, PolicyEvaluator};
use crate::application::task_service::TaskService;
use crate::application::workspace_tool_cache_service::WorkspaceToolCacheService;
use crate::domain::approval::ApprovalStatus;
use crate::domain::errors::GatewayError;
use crate::domain::policy::Decision;
use crate::domain::repository::{EventRepository, PolicyRepository};
use crate::domain::task::{Task, TaskId};
use crate::domain::tool::{ApprovalMode, InvocationContext, ToolDefinition, DISCOVER_TOOL_PATH};
use crate::domain::event::Event;
use crate::infrastructure::alias_resolver::{resolve_alias, suggest};
use crate::infrastructure::event_bus::EventBus;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct ToolCallRequest {
    pub call_id: String,
    pub tool_path: String,
    pub input: serde_json::Value,
}

/// Interval between approval-status polls (§4.9 step 5). No hard timeout is
/// enforced here; the task-level `timeoutMs` bounds total runtime.
const APPROVAL_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct Dispatcher {
    base_tools: Arc<HashMap<String, ToolDefinition>>,
    workspace_tools: Arc<WorkspaceToolCacheService>,
    policies: Arc<dyn PolicyRepository>,
    policy_evaluator: Arc<dyn PolicyEvaluator>,
    credentials: Arc<dyn CredentialResolver>,
    tasks: Arc<dyn TaskService>,
    events: Arc<dyn EventRepository>,
    bus: Arc<EventBus>,
}

impl Dispatcher {
    pub fn new(
        base_tools: Arc<HashMap<String, ToolDefinition>>,
        workspace_tools: Arc<WorkspaceToolCacheService>,
        policies: Arc<dyn PolicyRepository>,
        policy_evaluator: Arc<dyn PolicyEvaluator>,
        credentials: Arc<dyn CredentialResolver>,
        tasks: Arc<dyn TaskService>,
        events: Arc<dyn EventRepository>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            base_tools,
            workspace_tools,
            policies,
            policy_evaluator,
            credentials,
            tasks,
            events,
            bus,
        }
    }

    async fn publish(&self, event: Event) -> Result<()> {
        let appended = self.events.append(event).await?;
        self.bus.publish(appended);
        Ok(())
    }

    /// §4.9 step 1: base tools first, then the workspace set, then a fuzzy
    /// alias match; a miss produces an "Unknown tool" error augmented with
    /// up to three suggestions.
    async fn resolve_tool(
        &self,
        workspace: &str,
        tool_path: &str,
    ) -> Result<(ToolDefinition, HashMap<String, ToolDefinition>)> {
        let workspace_tools = self.workspace_tools.tools_for_workspace(workspace).await?;

        if let Some(tool) = self.base_tools.get(tool_path) {
            return Ok((tool.clone(), workspace_tools));
        }
        if let Some(tool) = workspace_tools.get(tool_path) {
            return Ok((tool.clone(), workspace_tools));
        }

        let known_paths: Vec<&str> = self
            .base_tools
            .keys()
            .chain(workspace_tools.keys())
            .map(|s| s.as_str())
            .collect();

        if let Some(resolved) = resolve_alias(tool_path, &known_paths) {
            let tool = self
                .base_tools
                .get(resolved)
                .or_else(|| workspace_tools.get(resolved))
                .expect("resolved alias must name a known tool")
                .clone();
            return Ok((tool, workspace_tools));
        }

        let suggestions = suggest(tool_path, &known_paths, 3);
        let message = if suggestions.is_empty() {
            format!("Unknown tool '{tool_path}'")
        } else {
            format!(
                "Unknown tool '{tool_path}'. Did you mean: {}",
                suggestions.join(", ")
            )
        };
        Err(GatewayError::Validation(message).into())
    }

    pub async fn invoke(&self, task: &Task, call: ToolCallRequest) -> Result<serde_json::Value> {
        let (tool, workspace_tools) = self.resolve_tool(&task.workspace, &call.tool_path).await?;

        let eval_ctx = EvalContext {
            workspace: &task.workspace,
            actor: Some(&task.actor),
            client: task.client.as_deref(),
        };

        // §4.9 step 2: GraphQL sources decompose into pseudo-tool paths;
        // everything else is a single-path evaluation.
        let (decision, effective_tool_path) = if tool.is_graphql_source {
            let policies = self.policies.list_in_workspace(&task.workspace).await?;
            let operation = call
                .input
                .get("query")
                .and_then(|v| v.as_str())
                .ok_or_else(|| GatewayError::Validation("GraphQL tool call requires a 'query' string".to_string()))?;
            let (decision, fields) = self
                .policy_evaluator
                .evaluate_graphql(&tool.path, operation, &eval_ctx, &policies);
            (decision, fields.join(","))
        } else {
            let (decision, path) = self.evaluate_policy_direct(&tool, &eval_ctx).await?;
            (decision, path)
        };

        if decision == Decision::Deny {
            self.publish(Event::tool_call(
                task.id,
                "denied",
                &call.call_id,
                &effective_tool_path,
                serde_json::json!({ "reason": "policy_deny" }),
            ))
            .await?;
            return Err(GatewayError::PolicyDenied {
                tool_path: effective_tool_path,
            }
            .into());
        }

        // §4.9 step 3: credential resolution. Missing + required is fatal.
        let credential_headers = self
            .credentials
            .resolve(&task.workspace, &task.actor, tool.credential_spec.as_ref())
            .await
            .map_err(|e| GatewayError::MissingCredential(e.to_string()))?;

        // §4.9 step 4.
        self.publish(Event::tool_call(
            task.id,
            "started",
            &call.call_id,
            &effective_tool_path,
            serde_json::json!({
                "approval": matches!(tool.approval_mode, ApprovalMode::Required) || decision == Decision::RequireApproval,
                "input": call.input,
            }),
        ))
        .await?;

        // §4.9 step 5: approval gate.
        if decision == Decision::RequireApproval {
            let approval = self
                .tasks
                .create_approval(
                    task.id,
                    task.workspace.clone(),
                    effective_tool_path.clone(),
                    call.input.clone(),
                )
                .await?;
            self.publish(Event::approval_requested(
                task.id,
                approval.id,
                &effective_tool_path,
                &call.input,
            ))
            .await?;

            loop {
                let current = self
                    .tasks
                    .get_approval(approval.id)
                    .await?
                    .ok_or_else(|| anyhow!("approval '{}' vanished while polling", approval.id))?;
                match current.status {
                    ApprovalStatus::Pending => {
                        tokio::time::sleep(APPROVAL_POLL_INTERVAL).await;
                        continue;
                    }
                    ApprovalStatus::Approved => break,
                    ApprovalStatus::Denied => {
                        self.publish(Event::tool_call(
                            task.id,
                            "denied",
                            &call.call_id,
                            &effective_tool_path,
                            serde_json::json!({ "reason": "approval_denied", "approvalId": approval.id.to_string() }),
                        ))
                        .await?;
                        return Err(GatewayError::ApprovalDenied {
                            tool_path: effective_tool_path,
                            approval_id: approval.id,
                        }
                        .into());
                    }
                }
            }
        }

        // §4.9 step 6: execution.
        let workspace_tools_snapshot = Arc::new(workspace_tools);
        let base_tools = self.base_tools.clone();
        let is_tool_allowed = {
            let workspace_tools_snapshot = workspace_tools_snapshot.clone();
            let base_tools = base_tools.clone();
            Arc::new(move |path: &str| {
                path == DISCOVER_TOOL_PATH || base_tools.contains_key(path) || workspace_tools_snapshot.contains_key(path)
            }) as Arc<dyn Fn(&str) -> bool + Send + Sync>
        };
        let invocation_ctx = InvocationContext {
            task_id: task.id,
            workspace: task.workspace.clone(),
            actor: task.actor.clone(),
            client: task.client.clone(),
            credential_headers,
            is_tool_allowed,
        };

        let result = tool.invoker.invoke(call.input, &invocation_ctx).await;

        // §4.9 step 7.
        match result {
            Ok(value) => {
                self.publish(Event::tool_call(
                    task.id,
                    "completed",
                    &call.call_id,
                    &effective_tool_path,
                    serde_json::json!({ "output": value }),
                ))
                .await?;
                Ok(value)
            }
            Err(err) => {
                self.publish(Event::tool_call(
                    task.id,
                    "failed",
                    &call.call_id,
                    &effective_tool_path,
                    serde_json::json!({ "error": err.to_string() }),
                ))
                .await?;
                Err(GatewayError::ToolInvocation(err.to_string()).into())
            }
        }
    }

    async fn evaluate_policy_direct(
        &self,
        tool: &ToolDefinition,
        ctx: &EvalContext<'_>,
    ) -> Result<(Decision, String)> {
        let policies = self.policies.list_in_workspace(ctx.workspace).await?;
        let decision = self
            .policy_evaluator
            .evaluate(&tool.path, tool.approval_mode, ctx, &policies);
        Ok((decision, tool.path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::credential_service::StandardCredentialResolver;
    use crate::application::policy_service::StandardPolicyEvaluator;
    use crate::application::task_service::StandardTaskService;
    use crate::application::tool_compiler_service::ToolCompilerService;
    use crate::domain::tool::{InvokeError, ToolInvoker};
    use crate::infrastructure::credential_resolver::HttpVaultReader;
    use crate::infrastructure::prepared_spec_cache::InMemoryPreparedSpecCache;
    use crate::infrastructure::repositories::in_memory::{
        InMemoryApprovalRepository, InMemoryCredentialRepository, InMemoryEventRepository,
        InMemoryPolicyRepository, InMemoryTaskRepository, InMemoryToolSourceRepository,
    };
    use crate::infrastructure::tool_sources::graphql::GraphqlCompiler;
    use crate::infrastructure::tool_sources::mcp::McpCompiler;
    use crate::infrastructure::tool_sources::openapi::OpenApiCompiler;
    use crate::infrastructure::workspace_tool_cache::InMemoryWorkspaceToolCacheStore;
    use async_trait::async_trait;

    struct EchoInvoker;
    #[async_trait]
    impl ToolInvoker for EchoInvoker {
        async fn invoke(&self, input: serde_json::Value, _ctx: &InvocationContext) -> Result<serde_json::Value, InvokeError> {
            Ok(input)
        }
    }

    fn echo_tool(path: &str, mode: ApprovalMode) -> ToolDefinition {
        ToolDefinition {
            path: path.to_string(),
            description: "echo".to_string(),
            approval_mode: mode,
            origin_source: None,
            credential_spec: None,
            args_schema: serde_json::json!({}),
            returns_schema: serde_json::json!({}),
            is_graphql_source: false,
            invoker: Arc::new(EchoInvoker),
        }
    }

    async fn make_dispatcher(base: HashMap<String, ToolDefinition>) -> (Dispatcher, Arc<dyn TaskService>, Arc<InMemoryPolicyRepository>) {
        let tasks: Arc<dyn TaskService> = Arc::new(StandardTaskService::new(
            Arc::new(InMemoryTaskRepository::new()),
            Arc::new(InMemoryApprovalRepository::new()),
        ));
        let events: Arc<dyn EventRepository> = Arc::new(InMemoryEventRepository::new());
        let bus = Arc::new(EventBus::new());
        let policies = Arc::new(InMemoryPolicyRepository::new());
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
        let credentials: Arc<dyn CredentialResolver> = Arc::new(StandardCredentialResolver::new(
            Arc::new(InMemoryCredentialRepository::new()),
            Arc::new(HttpVaultReader::new("https://vault.example.com".to_string(), None)),
        ));
        let dispatcher = Dispatcher::new(
            Arc::new(base),
            workspace_tools,
            policies.clone(),
            Arc::new(StandardPolicyEvaluator::new()),
            credentials,
            tasks.clone(),
            events,
            bus,
        );
        (dispatcher, tasks, policies)
    }

    fn task_for(workspace: &str, actor: &str) -> Task {
        Task::new(
            TaskId::new(),
            "return 1".to_string(),
            "python3.11".to_string(),
            300_000,
            serde_json::json!({}),
            workspace.to_string(),
            actor.to_string(),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn auto_approved_tool_invokes_and_returns_output() {
        let mut base = HashMap::new();
        base.insert("echo.ping".to_string(), echo_tool("echo.ping", ApprovalMode::Auto));
        let (dispatcher, _tasks, _policies) = make_dispatcher(base).await;
        let task = task_for("ws_1", "actor_1");
        let result = dispatcher
            .invoke(
                &task,
                ToolCallRequest {
                    call_id: "call_1".to_string(),
                    tool_path: "echo.ping".to_string(),
                    input: serde_json::json!({"hello": "world"}),
                },
            )
            .await
            .unwrap();
        assert_eq!(result["hello"], "world");
    }

    #[tokio::test]
    async fn unknown_tool_path_surfaces_suggestions() {
        let mut base = HashMap::new();
        base.insert("admin.delete_data".to_string(), echo_tool("admin.delete_data", ApprovalMode::Auto));
        let (dispatcher, _tasks, _policies) = make_dispatcher(base).await;
        let task = task_for("ws_1", "actor_1");
        let err = dispatcher
            .invoke(
                &task,
                ToolCallRequest {
                    call_id: "call_1".to_string(),
                    tool_path: "admn.delete_data".to_string(),
                    input: serde_json::json!({}),
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Did you mean"));
        assert!(err.to_string().contains("admin.delete_data"));
    }

    #[tokio::test]
    async fn deny_policy_short_circuits_with_sentinel_error() {
        use crate::domain::policy::{AccessPolicy, Decision};
        let mut base = HashMap::new();
        base.insert("admin.delete_data".to_string(), echo_tool("admin.delete_data", ApprovalMode::Auto));
        let (dispatcher, _tasks, policies) = make_dispatcher(base).await;
        policies
            .save(&AccessPolicy::new(
                "ws_1".to_string(),
                None,
                None,
                "admin.*".to_string(),
                Decision::Deny,
                0,
            ))
            .await
            .unwrap();
        let task = task_for("ws_1", "actor_1");
        let err = dispatcher
            .invoke(
                &task,
                ToolCallRequest {
                    call_id: "call_1".to_string(),
                    tool_path: "admin.delete_data".to_string(),
                    input: serde_json::json!({}),
                },
            )
            .await
            .unwrap_err();
        assert!(GatewayError::is_approval_denial(&err));
    }

    #[tokio::test]
    async fn require_approval_blocks_until_resolved() {
        let mut base = HashMap::new();
        base.insert("admin.send_announcement".to_string(), echo_tool("admin.send_announcement", ApprovalMode::Required));
        let (dispatcher, tasks, _policies) = make_dispatcher(base).await;
        let task = task_for("ws_1", "actor_1");

        let dispatch_fut = dispatcher.invoke(
            &task,
            ToolCallRequest {
                call_id: "call_1".to_string(),
                tool_path: "admin.send_announcement".to_string(),
                input: serde_json::json!({"channel": "general"}),
            },
        );
        tokio::pin!(dispatch_fut);

        // Give the dispatcher a moment to create the approval and enter the
        // poll loop before resolving it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let pending = tasks.list_pending_approvals("ws_1").await.unwrap();
        assert_eq!(pending.len(), 1);
        tasks
            .resolve_approval(pending[0].id, true, Some("actor_1".to_string()), None)
            .await
            .unwrap();

        let result = dispatch_fut.await.unwrap();
        assert_eq!(result["channel"], "general");
    }
}
