// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer
//!
//! HTTP surface that translates external requests into application service
//! calls. **No business logic lives here** — all real work is delegated to
//! application services in `crate::application`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`http`] | HTTP/SSE (Axum) | Task/approval/source/policy/credential REST API, OAuth metadata, internal run callbacks |
//! | [`mcp`] | HTTP/SSE (Axum) | MCP Streamable HTTP endpoint (`/mcp`) |

pub mod http;
pub mod mcp;
