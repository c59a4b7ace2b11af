// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! `gateway serve`: wires the full application stack — repositories,
//! compilers, dispatcher, task runner — and exposes it over HTTP. Grounded
//! on `gateway_core::application::task_runner`'s own test harness
//! (`runner()`), the single place in the corpus that constructs every
//! service end to end.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use gateway_core::application::credential_service::StandardCredentialResolver;
use gateway_core::application::dispatcher::Dispatcher;
use gateway_core::application::policy_service::StandardPolicyEvaluator;
use gateway_core::application::task_runner::TaskRunner;
use gateway_core::application::task_service::StandardTaskService;
use gateway_core::application::tool_compiler_service::ToolCompilerService;
use gateway_core::application::workspace_tool_cache_service::WorkspaceToolCacheService;
use gateway_core::domain::config::{GatewayConfig, StorageBackend as ConfigStorageBackend};
use gateway_core::domain::repository::{
    create_approval_repository, create_credential_repository, create_event_repository,
    create_policy_repository, create_task_repository, create_tool_source_repository,
    PostgresConfig, StorageBackend,
};
use gateway_core::infrastructure::credential_resolver::HttpVaultReader;
use gateway_core::infrastructure::event_bus::EventBus;
use gateway_core::infrastructure::oauth::anon::AnonOAuthState;
use gateway_core::infrastructure::oauth::jwks::JwksVerifier;
use gateway_core::infrastructure::prepared_spec_cache::InMemoryPreparedSpecCache;
use gateway_core::infrastructure::sandbox::ProcessSandbox;
use gateway_core::infrastructure::tool_sources::graphql::GraphqlCompiler;
use gateway_core::infrastructure::tool_sources::mcp::McpCompiler;
use gateway_core::infrastructure::tool_sources::openapi::OpenApiCompiler;
use gateway_core::infrastructure::workspace_tool_cache::InMemoryWorkspaceToolCacheStore;
use gateway_core::presentation::http::{self, AppState};
use gateway_core::presentation::mcp::{self, McpState};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to a YAML config file (overrides discovery).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bind host (overrides the config file).
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides the config file).
    #[arg(long)]
    port: Option<u16>,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let mut config = gateway_core::infrastructure::config::load(args.config.as_deref())
        .context("failed to load gateway configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let pool = match config.storage_backend {
        ConfigStorageBackend::Postgres => {
            let database_url = config
                .database_url
                .clone()
                .context("storage-backend postgres requires database_url to be set")?;
            Some(
                sqlx::postgres::PgPoolOptions::new()
                    .connect(&database_url)
                    .await
                    .context("failed to connect to the configured Postgres database")?,
            )
        }
        ConfigStorageBackend::InMemory => None,
    };

    let backend = match (&config.storage_backend, &pool) {
        (ConfigStorageBackend::Postgres, Some(_)) => StorageBackend::Postgres(PostgresConfig {
            connection_string: config.database_url.clone().unwrap_or_default(),
        }),
        _ => StorageBackend::InMemory,
    };

    let task_repo = create_task_repository(&backend, pool.clone());
    let approval_repo = create_approval_repository(&backend, pool.clone());
    let source_repo = create_tool_source_repository(&backend, pool.clone());
    let policy_repo = create_policy_repository(&backend, pool.clone());
    let credential_repo = create_credential_repository(&backend, pool.clone());
    let event_repo = create_event_repository(&backend, pool.clone());

    let tasks = Arc::new(StandardTaskService::new(task_repo.clone(), approval_repo.clone()));
    let approvals = Arc::new(gateway_core::application::approval_service::StandardApprovalCoordinator::new(
        tasks.clone(),
        event_repo.clone(),
    ));

    let compiler = Arc::new(ToolCompilerService::new(
        Arc::new(OpenApiCompiler::new(
            Arc::new(InMemoryPreparedSpecCache::new()),
            config.prepared_spec_max_age_ms as i64,
        )),
        Arc::new(GraphqlCompiler::new()),
        Arc::new(McpCompiler::new()),
    ));
    let workspace_tools = Arc::new(WorkspaceToolCacheService::new(
        source_repo.clone(),
        compiler,
        Arc::new(InMemoryWorkspaceToolCacheStore::new()),
        Vec::new(),
    ));

    let vault = Arc::new(HttpVaultReader::new(
        config.vault_url.clone().unwrap_or_else(|| "https://vault.invalid".to_string()),
        config.vault_bearer_token.clone(),
    ));
    let credentials = Arc::new(StandardCredentialResolver::new(credential_repo.clone(), vault));

    let bus = Arc::new(EventBus::new());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(HashMap::new()),
        workspace_tools.clone(),
        policy_repo.clone(),
        Arc::new(StandardPolicyEvaluator::new()),
        credentials,
        tasks.clone(),
        event_repo.clone(),
        bus.clone(),
    ));
    let sandbox = Arc::new(ProcessSandbox::new());
    let runner = Arc::new(TaskRunner::new(
        tasks.clone(),
        dispatcher.clone(),
        sandbox,
        event_repo.clone(),
        bus.clone(),
    ));

    let oauth_issuer = config.oauth.as_ref().map(|o| o.issuer.clone());
    let jwks_verifier = oauth_issuer
        .clone()
        .map(|issuer| Arc::new(JwksVerifier::new(issuer)));
    let anon_oauth = match &config.oauth {
        Some(oauth) if oauth.allow_anonymous => {
            let key_path = oauth_signing_key_path();
            Some(Arc::new(
                AnonOAuthState::new(oauth.issuer.clone(), &key_path).context("failed to initialize the anonymous OAuth signing key")?,
            ))
        }
        _ => None,
    };

    let app_state = Arc::new(AppState {
        tasks: tasks.clone(),
        task_repo,
        approvals,
        sources: source_repo,
        policies: policy_repo,
        credentials: credential_repo,
        events: event_repo,
        bus: bus.clone(),
        runner,
        dispatcher: dispatcher.clone(),
        internal_callback_secret: config.internal_callback_secret.clone(),
        oauth_issuer,
        anon_oauth,
    });
    let mcp_state = Arc::new(McpState::new(workspace_tools, dispatcher, bus, jwks_verifier));

    let app = http::router(app_state)
        .merge(mcp::router(mcp_state))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    println!("{}", format!("gateway listening on http://{addr}").green());
    tracing::info!(%addr, backend = ?config.storage_backend, "gateway starting");
    axum::serve(listener, app).await.context("gateway server exited")?;
    Ok(())
}

fn oauth_signing_key_path() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("gateway")
        .join("oauth_signing_key.pem")
}
