// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! # gateway-core
//!
//! Core of a sandboxed code-execution gateway with human-in-the-loop tool
//! approvals. Clients submit short code snippets that call named tools;
//! tools are sourced from a built-in set or compiled from registered
//! external sources (OpenAPI, GraphQL, MCP). Every tool call passes through
//! an access-policy evaluation that can allow, deny, or suspend the call
//! pending reviewer approval.
//!
//! ## Layer Structure
//!
//! ```text
//! presentation/   axum HTTP surface: task/approval/source/policy REST API,
//!                 MCP Streamable HTTP endpoint, OAuth metadata + anonymous
//!                 OAuth, internal run callbacks
//!     |
//! application/    use-cases: Task Store ops, Tool Dispatcher, Task Runner,
//!                 Approval Coordinator, Policy Evaluator, Credential
//!                 Resolver, Tool-Source Compiler, Workspace Tool Cache
//!     |
//! domain/         aggregates, value objects, repository traits, errors
//!     |
//! infrastructure/ Postgres + in-memory repositories, event bus, per-source
//!                 compilers and invokers, credential/JWKS HTTP clients,
//!                 sandbox runtime adapter
//! ```

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::errors::GatewayError;
