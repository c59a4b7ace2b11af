// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! The gateway's REST surface (§6): task/approval/tool-source/policy
//! management, the OAuth metadata + anonymous-OAuth endpoints, and the
//! internal run callbacks used by out-of-process sandbox runtimes. Grounded
//! on the teacher's `presentation::api` module shape — one `AppState`, one
//! `Router` builder, thin handlers that translate `Json`/`Path`/`Query`
//! extractors into application-service calls.

use crate::application::approval_service::ApprovalCoordinator;
use crate::application::dispatcher::{Dispatcher, ToolCallRequest};
use crate::application::task_runner::TaskRunner;
use crate::application::task_service::TaskService;
use crate::domain::approval::{ApprovalId, ApprovalStatus};
use crate::domain::credential::{AuthKind, Credential, CredentialProvider, CredentialScope, CredentialSpec};
use crate::domain::errors::GatewayError;
use crate::domain::event::Event;
use crate::domain::policy::{AccessPolicy, Decision, PolicyId};
use crate::domain::repository::{
    CredentialRepository, EventRepository, PolicyRepository, TaskRepository, ToolSourceRepository,
};
use crate::domain::task::{TaskId, DEFAULT_TIMEOUT_MS};
use crate::domain::tool_source::{SourceConfig, SourceId, SourceType, ToolSource};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::oauth::anon::AnonOAuthState;
use crate::infrastructure::oauth::ProtectedResourceMetadata;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::pin::Pin;
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub struct AppState {
    pub tasks: Arc<dyn TaskService>,
    pub task_repo: Arc<dyn TaskRepository>,
    pub approvals: Arc<dyn ApprovalCoordinator>,
    pub sources: Arc<dyn ToolSourceRepository>,
    pub policies: Arc<dyn PolicyRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
    pub events: Arc<dyn EventRepository>,
    pub bus: Arc<EventBus>,
    pub runner: Arc<TaskRunner>,
    pub dispatcher: Arc<Dispatcher>,
    pub internal_callback_secret: String,
    pub oauth_issuer: Option<String>,
    pub anon_oauth: Option<Arc<AnonOAuthState>>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/events", get(stream_task_events))
        .route("/sources", post(create_source).get(list_sources))
        .route("/sources/{id}", axum::routing::delete(delete_source))
        .route("/policies", post(create_policy).get(list_policies))
        .route("/policies/{id}", axum::routing::delete(delete_policy))
        .route("/credentials", post(create_credential))
        .route("/approvals", get(list_approvals))
        .route("/approvals/{id}", get(get_approval))
        .route("/approvals/{id}/resolve", post(resolve_approval))
        .route(
            "/.well-known/oauth-protected-resource",
            get(oauth_protected_resource),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            get(oauth_authorization_server),
        )
        .route("/oauth2/jwks", get(oauth_jwks))
        .route("/register", post(oauth_register))
        .route("/authorize", get(oauth_authorize))
        .route("/token", post(oauth_token))
        .route("/internal/runs/{run_id}/tool-call", post(internal_tool_call))
        .route("/internal/runs/{run_id}/output", post(internal_output))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct WorkspaceQuery {
    workspace: String,
}

fn error_response(status: StatusCode, err: impl ToString) -> axum::response::Response {
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

// ---------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    code: String,
    runtime_id: String,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
    workspace: String,
    actor: String,
    #[serde(default)]
    client: Option<String>,
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTaskRequest>,
) -> axum::response::Response {
    let id = TaskId::new();
    let runtime_id = payload.runtime_id.clone();
    let timeout_ms = payload.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
    let workspace = payload.workspace.clone();
    let actor = payload.actor.clone();
    let client = payload.client.clone();
    let result = state
        .tasks
        .create_task(
            id,
            payload.code,
            payload.runtime_id,
            timeout_ms,
            payload.metadata.unwrap_or(serde_json::Value::Null),
            payload.workspace,
            payload.actor,
            payload.client,
        )
        .await;

    match result {
        Ok(task) => {
            // §4.2 forbids createTask from emitting events itself, so the
            // presentation layer publishes the task's opening events here,
            // before the runner ever touches it: §8 requires `task.created`
            // to be the first event on a task, followed by `task.queued`.
            publish_task_opened(&state, id, &runtime_id, timeout_ms, &workspace, &actor, client.as_deref()).await;

            // §4.11: the scheduler fires the runner immediately after
            // createTask; a queued task never waits on a poll loop.
            let runner = state.runner.clone();
            tokio::spawn(async move {
                if let Err(err) = runner.run(id).await {
                    tracing::warn!(task_id = %id, error = %err, "task runner exited with an error");
                }
            });
            (StatusCode::CREATED, Json(json!(task))).into_response()
        }
        Err(err) => error_response(StatusCode::BAD_REQUEST, err),
    }
}

/// Publishes the `task.created` then `task.queued` events a freshly created
/// task must open with (§8 "Event ordering"). Shared by every presentation
/// surface that calls `createTask` directly, so the ordering invariant holds
/// regardless of which surface a task was created through.
pub async fn publish_task_opened(
    state: &AppState,
    task_id: TaskId,
    runtime_id: &str,
    timeout_ms: u64,
    workspace: &str,
    actor: &str,
    client: Option<&str>,
) {
    let created = Event::task_created(task_id, "queued", runtime_id, timeout_ms, workspace, actor, client);
    if let Ok(appended) = state.events.append(created).await {
        state.bus.publish(appended);
    }
    let queued = Event::task_status(task_id, "queued", json!({}));
    if let Ok(appended) = state.events.append(queued).await {
        state.bus.publish(appended);
    }
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(q): Query<WorkspaceQuery>,
) -> axum::response::Response {
    match state.tasks.list_tasks(&q.workspace).await {
        Ok(tasks) => Json(json!({ "tasks": tasks })).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<WorkspaceQuery>,
) -> axum::response::Response {
    let Ok(task_id) = TaskId::parse(&id) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid task id");
    };
    match state.tasks.get_task_in_workspace(task_id, &q.workspace).await {
        Ok(Some(task)) => Json(json!(task)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "task not found"),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

/// `GET /tasks/{id}/events`: replays the durable history for the task, then
/// switches to the live `EventBus` so a caller watching a running task sees
/// both past and future events on one stream.
async fn stream_task_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<WorkspaceQuery>,
) -> axum::response::Response {
    let Ok(task_id) = TaskId::parse(&id) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid task id");
    };
    match state.tasks.get_task_in_workspace(task_id, &q.workspace).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "task not found"),
        Err(err) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }

    let history = state.events.list_by_task(task_id).await.unwrap_or_default();
    let history_stream = stream::iter(history.into_iter().map(to_sse_event));

    let live_stream = tokio_stream::wrappers::BroadcastStream::new(state.bus.subscribe())
        .filter_map(move |item| match item {
            Ok(event) if event.task_id == task_id => Some(to_sse_event(event)),
            _ => None,
        });

    let combined: Pin<Box<dyn Stream<Item = Result<SseEvent, axum::Error>> + Send>> =
        Box::pin(history_stream.chain(live_stream));
    Sse::new(combined).keep_alive(KeepAlive::default()).into_response()
}

fn to_sse_event(event: Event) -> Result<SseEvent, axum::Error> {
    Ok(SseEvent::default()
        .event(event.event_type.clone())
        .id(event.sequence.to_string())
        .data(serde_json::to_string(&event).unwrap_or_default()))
}

// ---------------------------------------------------------------------
// Tool sources
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateSourceRequest {
    workspace: String,
    name: String,
    source_type: SourceType,
    config: serde_json::Value,
}

async fn create_source(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSourceRequest>,
) -> axum::response::Response {
    if let Ok(Some(_)) = state.sources.find_by_name(&payload.workspace, &payload.name).await {
        return error_response(
            StatusCode::CONFLICT,
            format!("a tool source named '{}' already exists in this workspace", payload.name),
        );
    }
    let source = ToolSource::new(
        payload.workspace,
        payload.name,
        payload.source_type,
        SourceConfig(payload.config),
    );
    match state.sources.save(&source).await {
        Ok(()) => (StatusCode::CREATED, Json(json!(source))).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

async fn list_sources(
    State(state): State<Arc<AppState>>,
    Query(q): Query<WorkspaceQuery>,
) -> axum::response::Response {
    match state.sources.list_enabled_in_workspace(&q.workspace).await {
        Ok(sources) => Json(json!({ "sources": sources })).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

async fn delete_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(raw) = id.strip_prefix("src_") else {
        return error_response(StatusCode::BAD_REQUEST, "invalid source id");
    };
    let Ok(uuid) = uuid::Uuid::parse_str(raw) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid source id");
    };
    match state.sources.delete(SourceId(uuid)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

// ---------------------------------------------------------------------
// Access policies
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreatePolicyRequest {
    workspace: String,
    #[serde(default)]
    actor: Option<String>,
    #[serde(default)]
    client: Option<String>,
    pattern: String,
    decision: Decision,
    #[serde(default)]
    priority: i64,
}

async fn create_policy(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreatePolicyRequest>,
) -> axum::response::Response {
    let policy = AccessPolicy::new(
        payload.workspace,
        payload.actor,
        payload.client,
        payload.pattern,
        payload.decision,
        payload.priority,
    );
    if let Err(err) = policy.compiled_pattern() {
        return error_response(StatusCode::BAD_REQUEST, err);
    }
    match state.policies.save(&policy).await {
        Ok(()) => (StatusCode::CREATED, Json(json!(policy))).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

async fn list_policies(
    State(state): State<Arc<AppState>>,
    Query(q): Query<WorkspaceQuery>,
) -> axum::response::Response {
    match state.policies.list_in_workspace(&q.workspace).await {
        Ok(policies) => Json(json!({ "policies": policies })).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

async fn delete_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(uuid) = uuid::Uuid::parse_str(&id) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid policy id");
    };
    match state.policies.delete(PolicyId(uuid)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

// ---------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CreateCredentialRequest {
    workspace: String,
    source_key: String,
    scope: CredentialScope,
    #[serde(default)]
    actor_id: Option<String>,
    provider: CredentialProvider,
    payload: serde_json::Value,
    // Present only so a caller can register the spec and the secret in one
    // call; the gateway itself only persists the `Credential` row, the
    // `CredentialSpec` is attached to tool definitions by the compiler.
    #[serde(default)]
    auth_kind: Option<AuthKind>,
    #[serde(default)]
    header_name: Option<String>,
}

async fn create_credential(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCredentialRequest>,
) -> axum::response::Response {
    let _spec_hint = payload.auth_kind.map(|auth_kind| CredentialSpec {
        source_key: payload.source_key.clone(),
        scope: payload.scope,
        auth_kind,
        header_name: payload.header_name.clone(),
        static_fallback: None,
    });
    let credential = match Credential::new(
        payload.workspace,
        payload.source_key,
        payload.scope,
        payload.actor_id,
        payload.provider,
        payload.payload,
    ) {
        Ok(c) => c,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err),
    };
    match state.credentials.save(&credential).await {
        Ok(()) => (StatusCode::CREATED, Json(json!({ "id": credential.id.0.to_string() }))).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

// ---------------------------------------------------------------------
// Approvals
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListApprovalsQuery {
    workspace: String,
    #[serde(default)]
    status: Option<ApprovalStatus>,
}

async fn list_approvals(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListApprovalsQuery>,
) -> axum::response::Response {
    match state.approvals.list(&q.workspace, q.status).await {
        Ok(approvals) => Json(json!({ "approvals": approvals })).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

async fn get_approval(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<WorkspaceQuery>,
) -> axum::response::Response {
    let Ok(approval_id) = ApprovalId::parse(&id) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid approval id");
    };
    match state.approvals.get_in_workspace(approval_id, &q.workspace).await {
        Ok(approval) => Json(json!(approval)).into_response(),
        Err(err) => error_response(StatusCode::NOT_FOUND, err),
    }
}

#[derive(Debug, Deserialize)]
struct ResolveApprovalRequest {
    workspace: String,
    approved: bool,
    #[serde(default)]
    reviewer: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

async fn resolve_approval(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ResolveApprovalRequest>,
) -> axum::response::Response {
    let Ok(approval_id) = ApprovalId::parse(&id) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid approval id");
    };
    // The authenticated-caller identity is established upstream (bearer
    // verification); this admin surface trusts the supplied reviewer as
    // the authenticated actor, matching the teacher's own human-input
    // endpoints which take `approved_by`/`rejected_by` at face value.
    let authenticated_actor = payload.reviewer.clone();
    match state
        .approvals
        .resolve(
            approval_id,
            &payload.workspace,
            payload.approved,
            authenticated_actor.as_deref(),
            payload.reviewer,
            payload.reason,
        )
        .await
    {
        Ok(approval) => Json(json!(approval)).into_response(),
        Err(err) => error_response(StatusCode::BAD_REQUEST, err),
    }
}

// ---------------------------------------------------------------------
// OAuth metadata + anonymous OAuth (§6)
// ---------------------------------------------------------------------

async fn oauth_protected_resource(State(state): State<Arc<AppState>>) -> axum::response::Response {
    let authorization_servers = state.oauth_issuer.iter().cloned().collect();
    Json(ProtectedResourceMetadata::new(
        "gateway".to_string(),
        authorization_servers,
    ))
    .into_response()
}

async fn oauth_authorization_server(State(state): State<Arc<AppState>>) -> axum::response::Response {
    match &state.anon_oauth {
        Some(anon) => Json(anon.authorization_server_metadata()).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no self-issued authorization server configured"),
    }
}

async fn oauth_jwks(State(state): State<Arc<AppState>>) -> axum::response::Response {
    match &state.anon_oauth {
        Some(anon) => Json(anon.jwks()).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no self-issued authorization server configured"),
    }
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    redirect_uris: Vec<String>,
}

async fn oauth_register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> axum::response::Response {
    match &state.anon_oauth {
        Some(anon) => Json(anon.register(payload.redirect_uris)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "no self-issued authorization server configured"),
    }
}

#[derive(Debug, Deserialize)]
struct AuthorizeQuery {
    client_id: String,
    redirect_uri: String,
    #[serde(default)]
    state: Option<String>,
    code_challenge: String,
    code_challenge_method: String,
}

async fn oauth_authorize(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AuthorizeQuery>,
) -> axum::response::Response {
    let Some(anon) = &state.anon_oauth else {
        return error_response(StatusCode::NOT_FOUND, "no self-issued authorization server configured");
    };
    match anon.authorize(&q.client_id, &q.redirect_uri, &q.code_challenge, &q.code_challenge_method) {
        Ok(code) => {
            let mut location = format!("{}?code={}", q.redirect_uri, code);
            if let Some(state_param) = q.state {
                location.push_str(&format!("&state={state_param}"));
            }
            axum::response::Redirect::to(&location).into_response()
        }
        Err(err) => error_response(StatusCode::BAD_REQUEST, err),
    }
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    #[serde(default)]
    grant_type: Option<String>,
    code: String,
    redirect_uri: String,
    code_verifier: String,
}

async fn oauth_token(
    State(state): State<Arc<AppState>>,
    axum::extract::Form(payload): axum::extract::Form<TokenRequest>,
) -> axum::response::Response {
    let Some(anon) = &state.anon_oauth else {
        return error_response(StatusCode::NOT_FOUND, "no self-issued authorization server configured");
    };
    if payload.grant_type.as_deref().unwrap_or("authorization_code") != "authorization_code" {
        return error_response(StatusCode::BAD_REQUEST, "unsupported grant_type");
    }
    match anon.token(&payload.code, &payload.code_verifier, &payload.redirect_uri) {
        Ok(token) => Json(token).into_response(),
        Err(err) => error_response(StatusCode::BAD_REQUEST, err),
    }
}

// ---------------------------------------------------------------------
// Internal run callbacks (§6)
// ---------------------------------------------------------------------

fn authenticate_internal_callback(headers: &HeaderMap, expected_secret: &str) -> bool {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(token) = header.strip_prefix("Bearer ") else {
        return false;
    };
    token.as_bytes().ct_eq(expected_secret.as_bytes()).unwrap_u8() == 1
}

#[derive(Debug, Deserialize)]
struct InternalToolCallRequest {
    call_id: String,
    tool_path: String,
    #[serde(default)]
    input: serde_json::Value,
}

/// Reached by an out-of-process sandbox runtime reaching back into the
/// Dispatcher (§6 "Internal run callbacks"). Mirrors
/// `application::task_runner::RunnerAdapter::invoke_tool`'s error
/// normalization, since an out-of-process runtime gets the same
/// `{ok, value}` / `{ok: false, denied?, error}` shape an in-process
/// `SandboxAdapter` would produce.
async fn internal_tool_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(run_id): Path<String>,
    Json(payload): Json<InternalToolCallRequest>,
) -> axum::response::Response {
    if !authenticate_internal_callback(&headers, &state.internal_callback_secret) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let Ok(task_id) = TaskId::parse(&run_id) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid run id");
    };
    let task = match state.task_repo.find_by_id(task_id).await {
        Ok(Some(task)) => task,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "task not found"),
        Err(err) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    };

    let result = state
        .dispatcher
        .invoke(
            &task,
            ToolCallRequest {
                call_id: payload.call_id,
                tool_path: payload.tool_path,
                input: payload.input,
            },
        )
        .await;

    match result {
        Ok(value) => Json(json!({ "ok": true, "value": value })).into_response(),
        Err(err) => Json(json!({
            "ok": false,
            "denied": GatewayError::is_approval_denial(&err),
            "error": err.to_string(),
        }))
        .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct InternalOutputRequest {
    stream: String,
    line: String,
}

async fn internal_output(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(run_id): Path<String>,
    Json(payload): Json<InternalOutputRequest>,
) -> axum::response::Response {
    if !authenticate_internal_callback(&headers, &state.internal_callback_secret) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let Ok(task_id) = TaskId::parse(&run_id) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid run id");
    };
    let event = Event::task_output(task_id, &payload.stream, &payload.line);
    match state.events.append(event).await {
        Ok(appended) => {
            state.bus.publish(appended);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_callback_rejects_wrong_secret() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
        assert!(!authenticate_internal_callback(&headers, "right-secret"));
    }

    #[test]
    fn internal_callback_accepts_matching_secret() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer right-secret".parse().unwrap());
        assert!(authenticate_internal_callback(&headers, "right-secret"));
    }

    #[test]
    fn internal_callback_rejects_missing_header() {
        let headers = HeaderMap::new();
        assert!(!authenticate_internal_callback(&headers, "right-secret"));
    }
}
