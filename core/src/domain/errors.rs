// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::approval::ApprovalId;
use thiserror::Error;

/// Fixed ASCII prefix marking denial-terminal failures (§6 "Approval denial
/// sentinel"). The Task Runner checks for this prefix to select the
/// `denied` terminal state over a generic `failed` one.
pub const APPROVAL_DENIED_SENTINEL: &str = "APPROVAL_DENIED:";

/// One variant per error kind named in spec §7.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authorization error: {0}")]
    Authorization(String),

    /// §4.9 step 2: `deny` decision. Carries the same sentinel prefix as
    /// reviewer denial — the Task Runner does not distinguish "a human
    /// denied this" from "policy denied this outright" when choosing the
    /// `denied` terminal state, only "was this call denied at all".
    #[error("{}{tool_path}", APPROVAL_DENIED_SENTINEL)]
    PolicyDenied { tool_path: String },

    /// §4.9 step 5 / §6: reviewer denied an approval. `Display` emits the
    /// sentinel-prefixed string the spec's §6 describes.
    #[error("{}{tool_path} ({approval_id})", APPROVAL_DENIED_SENTINEL)]
    ApprovalDenied {
        tool_path: String,
        approval_id: ApprovalId,
    },

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("tool invocation failed: {0}")]
    ToolInvocation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl GatewayError {
    /// True for `ApprovalDenied`, and for any opaque error whose message
    /// carries the sentinel prefix (e.g. one that crossed an
    /// `anyhow::Error`-erased boundary). See SPEC_FULL.md §7.
    pub fn is_approval_denial(err: &anyhow::Error) -> bool {
        if let Some(gw) = err.downcast_ref::<GatewayError>() {
            if matches!(
                gw,
                GatewayError::ApprovalDenied { .. } | GatewayError::PolicyDenied { .. }
            ) {
                return true;
            }
        }
        err.to_string().contains(APPROVAL_DENIED_SENTINEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_denied_display_carries_sentinel() {
        let err = GatewayError::ApprovalDenied {
            tool_path: "admin.delete_data".to_string(),
            approval_id: ApprovalId::new(),
        };
        let rendered = err.to_string();
        assert!(rendered.starts_with(APPROVAL_DENIED_SENTINEL));
        assert!(rendered.contains("admin.delete_data"));
    }

    #[test]
    fn policy_denied_display_also_carries_sentinel() {
        let err: anyhow::Error = GatewayError::PolicyDenied {
            tool_path: "admin.write".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with(APPROVAL_DENIED_SENTINEL));
        assert!(GatewayError::is_approval_denial(&err));
    }

    #[test]
    fn is_approval_denial_detects_typed_and_stringly_errors() {
        let typed: anyhow::Error = GatewayError::ApprovalDenied {
            tool_path: "x".to_string(),
            approval_id: ApprovalId::new(),
        }
        .into();
        assert!(GatewayError::is_approval_denial(&typed));

        let stringly = anyhow::anyhow!("{}x.y (approval_deadbeef)", APPROVAL_DENIED_SENTINEL);
        assert!(GatewayError::is_approval_denial(&stringly));

        let unrelated = anyhow::anyhow!("connection refused");
        assert!(!GatewayError::is_approval_denial(&unrelated));
    }
}
