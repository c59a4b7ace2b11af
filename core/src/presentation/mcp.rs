// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! The `/mcp` endpoint (§6): MCP wire protocol over Streamable HTTP
//! (POST/GET/DELETE). New: no server-side MCP crate exists anywhere in the
//! retrieved corpus, so the JSON-RPC envelope and session bookkeeping are
//! hand-rolled over `axum`, following the same thin-handler-over-Arc<State>
//! shape as `presentation::http`.

use crate::application::dispatcher::{Dispatcher, ToolCallRequest};
use crate::application::workspace_tool_cache_service::WorkspaceToolCacheService;
use crate::domain::task::{Task, TaskId, DEFAULT_TIMEOUT_MS};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::oauth::jwks::JwksVerifier;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::RwLock;
use uuid::Uuid;

const SESSION_HEADER: &str = "Mcp-Session-Id";

pub struct McpState {
    pub workspace_tools: Arc<WorkspaceToolCacheService>,
    pub dispatcher: Arc<Dispatcher>,
    pub bus: Arc<EventBus>,
    pub jwks_verifier: Option<Arc<JwksVerifier>>,
    sessions: RwLock<HashMap<String, SessionContext>>,
}

struct SessionContext {
    workspace: String,
    client: Option<String>,
}

impl McpState {
    pub fn new(
        workspace_tools: Arc<WorkspaceToolCacheService>,
        dispatcher: Arc<Dispatcher>,
        bus: Arc<EventBus>,
        jwks_verifier: Option<Arc<JwksVerifier>>,
    ) -> Self {
        Self {
            workspace_tools,
            dispatcher,
            bus,
            jwks_verifier,
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

pub fn router(state: Arc<McpState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_post).get(handle_get).delete(handle_delete))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct McpQuery {
    #[serde(rename = "workspaceId")]
    workspace_id: Option<String>,
    #[serde(rename = "clientId")]
    client_id: Option<String>,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

fn ok_response(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: Some(result),
        error: None,
    }
}

fn error_response(id: Value, code: i64, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.into(),
        }),
    }
}

/// 401 + `WWW-Authenticate: Bearer` challenge (§6 "unauthenticated requests
/// receive 401 ... pointing to `/.well-known/oauth-protected-resource`").
fn unauthorized_challenge() -> axum::response::Response {
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    response.headers_mut().insert(
        axum::http::header::WWW_AUTHENTICATE,
        HeaderValue::from_static(r#"Bearer resource_metadata="/.well-known/oauth-protected-resource""#),
    );
    response
}

async fn authenticate(state: &McpState, headers: &HeaderMap) -> Result<Option<String>, axum::response::Response> {
    let Some(verifier) = &state.jwks_verifier else {
        return Ok(None);
    };
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    match verifier.authenticate(header).await {
        Ok(claims) => Ok(Some(claims.sub)),
        Err(_) => Err(unauthorized_challenge()),
    }
}

async fn handle_post(
    State(state): State<Arc<McpState>>,
    Query(query): Query<McpQuery>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> axum::response::Response {
    let actor = match authenticate(&state, &headers).await {
        Ok(actor) => actor,
        Err(challenge) => return challenge,
    };

    let session_id = query
        .session_id
        .clone()
        .or_else(|| headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string));

    let workspace = match resolve_workspace(&state, &query, session_id.as_deref()) {
        Ok(workspace) => workspace,
        Err(message) => {
            let body = error_response(request.id, -32602, message);
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let id = request.id.clone();
    let response = match request.method.as_str() {
        "initialize" => handle_initialize(&state, &workspace, query.client_id.clone(), id),
        "tools/list" => handle_tools_list(&state, &workspace, id).await,
        "tools/call" => handle_tools_call(&state, &workspace, query.client_id.clone(), actor, request.params, id).await,
        other => error_response(id, -32601, format!("method not found: {other}")),
    };

    let session_id = session_id.unwrap_or_else(new_session_id);
    if !state.sessions.read().unwrap().contains_key(&session_id) {
        state.sessions.write().unwrap().insert(
            session_id.clone(),
            SessionContext {
                workspace,
                client: query.client_id,
            },
        );
    }

    let mut http_response = Json(response).into_response();
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        http_response.headers_mut().insert(SESSION_HEADER, value);
    }
    http_response
}

fn new_session_id() -> String {
    format!("mcp_{}", Uuid::new_v4())
}

fn resolve_workspace(state: &McpState, query: &McpQuery, session_id: Option<&str>) -> Result<String, String> {
    if let Some(workspace) = &query.workspace_id {
        return Ok(workspace.clone());
    }
    if let Some(session_id) = session_id {
        if let Some(session) = state.sessions.read().unwrap().get(session_id) {
            return Ok(session.workspace.clone());
        }
    }
    if state.jwks_verifier.is_some() {
        return Err("workspaceId is required when OAuth is enabled".to_string());
    }
    Ok("default".to_string())
}

fn handle_initialize(_state: &McpState, _workspace: &str, _client: Option<String>, id: Value) -> JsonRpcResponse {
    ok_response(
        id,
        json!({
            "protocolVersion": "2025-06-18",
            "capabilities": { "tools": { "listChanged": true } },
            "serverInfo": { "name": "sandbox-gateway", "version": env!("CARGO_PKG_VERSION") },
        }),
    )
}

async fn handle_tools_list(state: &McpState, workspace: &str, id: Value) -> JsonRpcResponse {
    match state.workspace_tools.tools_for_workspace(workspace).await {
        Ok(tools) => {
            let mut list: Vec<Value> = tools
                .values()
                .map(|tool| {
                    json!({
                        "name": tool.path,
                        "description": tool.description,
                        "inputSchema": tool.args_schema,
                        "outputSchema": tool.returns_schema,
                    })
                })
                .collect();
            list.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
            ok_response(id, json!({ "tools": list }))
        }
        Err(err) => error_response(id, -32000, err.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ToolsCallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

async fn handle_tools_call(
    state: &McpState,
    workspace: &str,
    client: Option<String>,
    actor: Option<String>,
    params: Value,
    id: Value,
) -> JsonRpcResponse {
    let params: ToolsCallParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(err) => return error_response(id, -32602, format!("invalid params: {err}")),
    };

    // A call over `/mcp` has no enclosing sandbox Task; this ephemeral,
    // never-persisted Task only supplies the identity fields the
    // Dispatcher needs (workspace/actor/client/id) to evaluate policy and
    // publish events against.
    let pseudo_task = match Task::new(
        TaskId::new(),
        "<mcp-tool-call>".to_string(),
        "mcp".to_string(),
        DEFAULT_TIMEOUT_MS,
        Value::Null,
        workspace.to_string(),
        actor.unwrap_or_else(|| "anonymous".to_string()),
        client,
    ) {
        Ok(task) => task,
        Err(err) => return error_response(id, -32000, err.to_string()),
    };

    let call_id = format!("call_{}", Uuid::new_v4());
    let result = state
        .dispatcher
        .invoke(
            &pseudo_task,
            ToolCallRequest {
                call_id,
                tool_path: params.name,
                input: params.arguments,
            },
        )
        .await;

    match result {
        Ok(value) => ok_response(
            id,
            json!({ "content": [{ "type": "text", "text": serde_json::to_string(&value).unwrap_or_default() }] }),
        ),
        Err(err) if crate::domain::errors::GatewayError::is_approval_denial(&err) => {
            // §8 scenario 2: a denied tool call is a successful MCP result
            // carrying `isError: true`, not a JSON-RPC protocol error — the
            // call reached the tool, it was the approval that was refused.
            ok_response(
                id,
                json!({
                    "content": [{ "type": "text", "text": format!("status: denied\n{err}") }],
                    "isError": true,
                }),
            )
        }
        Err(err) => error_response(id, -32000, err.to_string()),
    }
}

async fn handle_get(
    State(state): State<Arc<McpState>>,
    Query(_query): Query<McpQuery>,
    headers: HeaderMap,
) -> axum::response::Response {
    if let Err(challenge) = authenticate(&state, &headers).await {
        return challenge;
    }

    // Server-initiated notifications are not yet scoped per workspace:
    // every tool-call event on the bus is forwarded, same as a client
    // subscribing to the whole event bus. Workspace isolation for the
    // calls themselves is already enforced at dispatch time.
    let receiver = state.bus.subscribe();
    let stream: Pin<Box<dyn Stream<Item = Result<SseEvent, axum::Error>> + Send>> =
        Box::pin(tokio_stream::wrappers::BroadcastStream::new(receiver).filter_map(|item| async move {
            let event = item.ok()?;
            Some(Ok(SseEvent::default()
                .event(event.event_type.clone())
                .data(serde_json::to_string(&event).unwrap_or_default())))
        }));

    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

async fn handle_delete(State(state): State<Arc<McpState>>, Query(query): Query<McpQuery>, headers: HeaderMap) -> StatusCode {
    if authenticate(&state, &headers).await.is_err() {
        return StatusCode::UNAUTHORIZED;
    }
    let session_id = query
        .session_id
        .or_else(|| headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string));
    if let Some(session_id) = session_id {
        state.sessions.write().unwrap().remove(&session_id);
    }
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_workspace_requires_explicit_workspace_when_oauth_is_not_configured_defaults() {
        let state = McpState::new(
            Arc::new(unreachable_workspace_tools()),
            unreachable_dispatcher(),
            Arc::new(EventBus::new()),
            None,
        );
        let query = McpQuery {
            workspace_id: None,
            client_id: None,
            session_id: None,
        };
        assert_eq!(resolve_workspace(&state, &query, None).unwrap(), "default");
    }

    fn unreachable_workspace_tools() -> WorkspaceToolCacheService {
        use crate::infrastructure::prepared_spec_cache::InMemoryPreparedSpecCache;
        use crate::infrastructure::repositories::in_memory::InMemoryToolSourceRepository;
        use crate::infrastructure::tool_sources::{graphql::GraphqlCompiler, mcp::McpCompiler, openapi::OpenApiCompiler};
        use crate::infrastructure::workspace_tool_cache::InMemoryWorkspaceToolCacheStore;
        use crate::application::tool_compiler_service::ToolCompilerService;

        WorkspaceToolCacheService::new(
            Arc::new(InMemoryToolSourceRepository::new()),
            Arc::new(ToolCompilerService::new(
                Arc::new(OpenApiCompiler::new(Arc::new(InMemoryPreparedSpecCache::new()), 300_000)),
                Arc::new(GraphqlCompiler::new()),
                Arc::new(McpCompiler::new()),
            )),
            Arc::new(InMemoryWorkspaceToolCacheStore::new()),
            Vec::new(),
        )
    }

    fn unreachable_dispatcher() -> Arc<Dispatcher> {
        use crate::application::credential_service::StandardCredentialResolver;
        use crate::application::policy_service::StandardPolicyEvaluator;
        use crate::application::task_service::StandardTaskService;
        use crate::infrastructure::credential_resolver::HttpVaultReader;
        use crate::infrastructure::repositories::in_memory::{
            InMemoryApprovalRepository, InMemoryCredentialRepository, InMemoryEventRepository,
            InMemoryPolicyRepository, InMemoryTaskRepository,
        };

        let tasks = Arc::new(StandardTaskService::new(
            Arc::new(InMemoryTaskRepository::new()),
            Arc::new(InMemoryApprovalRepository::new()),
        ));
        Arc::new(Dispatcher::new(
            Arc::new(HashMap::new()),
            Arc::new(unreachable_workspace_tools()),
            Arc::new(InMemoryPolicyRepository::new()),
            Arc::new(StandardPolicyEvaluator::new()),
            Arc::new(StandardCredentialResolver::new(
                Arc::new(InMemoryCredentialRepository::new()),
                Arc::new(HttpVaultReader::new("https://vault.example.com".to_string(), None)),
            )),
            tasks,
            Arc::new(InMemoryEventRepository::new()),
            Arc::new(EventBus::new()),
        ))
    }
}
