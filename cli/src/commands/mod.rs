// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the gateway CLI.

pub mod approval;
pub mod config;
pub mod credential;
pub mod policy;
pub mod serve;
pub mod source;
pub mod task;

pub use self::approval::ApprovalCommand;
pub use self::config::ConfigCommand;
pub use self::credential::CredentialCommand;
pub use self::policy::PolicyCommand;
pub use self::serve::ServeArgs;
pub use self::source::SourceCommand;
pub use self::task::TaskCommand;

/// Parses a CLI argument that is either an inline JSON string or an
/// `@path/to/file.json` reference, matching the teacher's `@file` input
/// convention for task payloads.
pub fn read_json_arg(arg: &str) -> anyhow::Result<serde_json::Value> {
    use anyhow::Context;
    if let Some(path) = arg.strip_prefix('@') {
        let contents = std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
        serde_json::from_str(&contents).context("failed to parse JSON file")
    } else {
        serde_json::from_str(arg).context("failed to parse JSON argument")
    }
}
