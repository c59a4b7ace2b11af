// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    RequireApproval,
    Deny,
}

impl Decision {
    /// Combines two decisions per §4.7's "worst across fields" rule:
    /// `deny > require_approval > allow`.
    pub fn worst(self, other: Decision) -> Decision {
        std::cmp::max(self, other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub Uuid);

impl PolicyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PolicyId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub id: PolicyId,
    pub workspace: String,
    pub actor: Option<String>,
    pub client: Option<String>,
    /// `*` is a greedy wildcard; every other regex metacharacter in the
    /// pattern is matched literally (§4.6 step 3).
    pub pattern: String,
    pub decision: Decision,
    pub priority: i64,
}

impl AccessPolicy {
    pub fn new(
        workspace: String,
        actor: Option<String>,
        client: Option<String>,
        pattern: String,
        decision: Decision,
        priority: i64,
    ) -> Self {
        Self {
            id: PolicyId::new(),
            workspace,
            actor,
            client,
            pattern,
            decision,
            priority,
        }
    }

    /// Compiles `pattern` to a regex that anchors the full tool path,
    /// escaping everything except `*`, which becomes `.*`.
    pub fn compiled_pattern(&self) -> Result<regex::Regex, PolicyError> {
        compile_wildcard_pattern(&self.pattern)
    }
}

/// Escapes regex metacharacters in `pattern` except `*`, which becomes a
/// greedy `.*`, then anchors the result to match the whole tool path.
pub fn compile_wildcard_pattern(pattern: &str) -> Result<regex::Regex, PolicyError> {
    let mut anchored = String::from("^");
    for part in pattern.split('*') {
        anchored.push_str(&regex::escape(part));
        anchored.push_str(".*");
    }
    if !pattern.ends_with('*') {
        anchored.truncate(anchored.len() - 2);
    }
    anchored.push('$');
    regex::Regex::new(&anchored).map_err(|e| PolicyError::InvalidPattern(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_worst_orders_deny_highest() {
        assert_eq!(Decision::Allow.worst(Decision::Deny), Decision::Deny);
        assert_eq!(
            Decision::Allow.worst(Decision::RequireApproval),
            Decision::RequireApproval
        );
        assert_eq!(
            Decision::RequireApproval.worst(Decision::Deny),
            Decision::Deny
        );
        assert_eq!(Decision::Allow.worst(Decision::Allow), Decision::Allow);
    }

    #[test]
    fn wildcard_pattern_matches_prefix_family() {
        let re = compile_wildcard_pattern("x.*").unwrap();
        assert!(re.is_match("x.read"));
        assert!(re.is_match("x.write"));
        assert!(!re.is_match("y.read"));
    }

    #[test]
    fn exact_pattern_does_not_match_siblings() {
        let re = compile_wildcard_pattern("x.read").unwrap();
        assert!(re.is_match("x.read"));
        assert!(!re.is_match("x.readmore"));
    }

    #[test]
    fn pattern_escapes_other_regex_metacharacters() {
        let re = compile_wildcard_pattern("admin.send+announcement").unwrap();
        assert!(re.is_match("admin.send+announcement"));
        assert!(!re.is_match("admin.sendXannouncement"));
    }
}
