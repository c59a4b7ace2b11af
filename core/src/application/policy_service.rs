// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Policy Evaluator (§4.6) and GraphQL sub-operation decomposition (§4.7).
//! Grounded on `domain::policy`'s pattern-matching primitives; the
//! specificity-ranking algorithm and GraphQL decomposition are new domain
//! logic layered on top, following the teacher's convention of keeping
//! evaluation logic in `application/` over the raw aggregate.

use crate::domain::policy::{AccessPolicy, Decision};
use crate::domain::tool::{ApprovalMode, ToolDefinition};
use async_trait::async_trait;

pub struct EvalContext<'a> {
    pub workspace: &'a str,
    pub actor: Option<&'a str>,
    pub client: Option<&'a str>,
}

#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// §4.6: evaluate a single tool path against the workspace's policies.
    fn evaluate(&self, tool_path: &str, default_mode: ApprovalMode, ctx: &EvalContext, policies: &[AccessPolicy]) -> Decision;

    /// §4.7: decompose a GraphQL operation string into pseudo-tool paths and
    /// return the worst decision across all top-level selections, with
    /// short-circuit on `deny`. Returns the evaluated field paths alongside
    /// the combined decision so callers can build the comma-joined
    /// effective tool path for approvals/events.
    fn evaluate_graphql(
        &self,
        source_name: &str,
        operation: &str,
        ctx: &EvalContext,
        policies: &[AccessPolicy],
    ) -> (Decision, Vec<String>);
}

#[derive(Default)]
pub struct StandardPolicyEvaluator;

impl StandardPolicyEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// §4.6 step 4: `+4` if actor set and matches, `+2` if client set and
    /// matches, `+ max(1, len(pattern with '*' removed))`, `+ priority`.
    fn specificity(policy: &AccessPolicy) -> i64 {
        let mut score = 0i64;
        if policy.actor.is_some() {
            score += 4;
        }
        if policy.client.is_some() {
            score += 2;
        }
        let stripped_len = policy.pattern.chars().filter(|c| *c != '*').count() as i64;
        score += stripped_len.max(1);
        score += policy.priority;
        score
    }
}

#[async_trait]
impl PolicyEvaluator for StandardPolicyEvaluator {
    fn evaluate(
        &self,
        tool_path: &str,
        default_mode: ApprovalMode,
        ctx: &EvalContext,
        policies: &[AccessPolicy],
    ) -> Decision {
        // §4.6 step 1: the discover tool is always allowed.
        if tool_path == crate::domain::tool::DISCOVER_TOOL_PATH {
            return Decision::Allow;
        }

        let default_decision = match default_mode {
            ApprovalMode::Auto => Decision::Allow,
            ApprovalMode::Required => Decision::RequireApproval,
        };

        let mut best: Option<(i64, usize, Decision)> = None;
        for (idx, policy) in policies.iter().enumerate() {
            if policy.workspace != ctx.workspace {
                continue;
            }
            if let Some(policy_actor) = &policy.actor {
                if Some(policy_actor.as_str()) != ctx.actor {
                    continue;
                }
            }
            if let Some(policy_client) = &policy.client {
                if Some(policy_client.as_str()) != ctx.client {
                    continue;
                }
            }
            let compiled = match policy.compiled_pattern() {
                Ok(re) => re,
                Err(_) => continue,
            };
            if !compiled.is_match(tool_path) {
                continue;
            }
            let score = Self::specificity(policy);
            // Stable ordering on ties: earlier (lower index) candidates keep
            // priority since we only replace on strictly greater score.
            let replace = match &best {
                None => true,
                Some((best_score, _, _)) => score > *best_score,
            };
            if replace {
                best = Some((score, idx, policy.decision));
            }
        }

        best.map(|(_, _, decision)| decision).unwrap_or(default_decision)
    }

    fn evaluate_graphql(
        &self,
        source_name: &str,
        operation: &str,
        ctx: &EvalContext,
        policies: &[AccessPolicy],
    ) -> (Decision, Vec<String>) {
        let fields = extract_top_level_fields(operation);
        let mut worst = Decision::Allow;
        let mut evaluated_paths = Vec::with_capacity(fields.len());

        for (kind, field_name) in fields {
            let pseudo_path = format!("{source_name}.{kind}.{field_name}");
            evaluated_paths.push(pseudo_path.clone());
            // Mutation fields default to `required`; query fields default to
            // `auto`, per §4.7.
            let default = if kind == "mutation" {
                ApprovalMode::Required
            } else {
                ApprovalMode::Auto
            };
            let decision = self.evaluate(&pseudo_path, default, ctx, policies);
            worst = worst.worst(decision);
            if worst == Decision::Deny {
                break;
            }
        }

        (worst, evaluated_paths)
    }
}

/// Extracts `(operationKind, fieldName)` pairs for every top-level selection
/// in a GraphQL operation string. This is a lightweight scanner, not a full
/// GraphQL parser: it locates the `query`/`mutation` keyword (or treats an
/// anonymous/shorthand operation as `query`), then walks the top-level
/// selection set brace-depth-aware so nested selections on sub-fields don't
/// get mistaken for siblings. A top-level field is flushed as soon as its
/// boundary is known — at a `(`-free whitespace/comma separator, when its
/// own sub-selection opens, or at the closing brace of the selection set —
/// so a leaf field with no sub-selection (e.g. `mutation { deleteUser }`)
/// is recorded just as reliably as one with a nested selection set.
fn extract_top_level_fields(operation: &str) -> Vec<(&'static str, String)> {
    let trimmed = operation.trim_start();
    let (kind, rest) = if let Some(rest) = trimmed.strip_prefix("mutation") {
        ("mutation", rest)
    } else if let Some(rest) = trimmed.strip_prefix("query") {
        ("query", rest)
    } else {
        ("query", trimmed)
    };

    let Some(open) = rest.find('{') else {
        return Vec::new();
    };
    let body = &rest[open + 1..];

    let mut fields = Vec::new();
    let mut depth = 0i32;
    let mut paren_depth = 0i32;
    let mut token = String::new();

    let flush = |token: &mut String, fields: &mut Vec<String>| {
        if !token.trim().is_empty() {
            fields.push(first_identifier(token));
        }
        token.clear();
    };

    for ch in body.chars() {
        match ch {
            '(' if depth == 0 => {
                paren_depth += 1;
                token.push(ch);
            }
            ')' if depth == 0 => {
                paren_depth -= 1;
                token.push(ch);
            }
            '{' => {
                if depth == 0 {
                    flush(&mut token, &mut fields);
                }
                depth += 1;
            }
            '}' => {
                if depth == 0 {
                    // Closing brace of the top-level selection set itself.
                    flush(&mut token, &mut fields);
                    break;
                }
                depth -= 1;
                if depth == 0 {
                    token.clear();
                }
            }
            c if depth == 0 && paren_depth == 0 && (c.is_whitespace() || c == ',') => {
                flush(&mut token, &mut fields);
            }
            c if depth == 0 => {
                token.push(c);
            }
            _ => {}
        }
    }
    // Malformed input with no closing brace: flush whatever was pending.
    flush(&mut token, &mut fields);

    fields
        .into_iter()
        .filter(|name| !name.is_empty())
        .map(|name| (kind, name))
        .collect()
}

fn first_identifier(token: &str) -> String {
    token
        .split(|c: char| c.is_whitespace() || c == '(' || c == ':')
        .find(|s| !s.is_empty())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::AccessPolicy;

    fn ctx<'a>(workspace: &'a str) -> EvalContext<'a> {
        EvalContext {
            workspace,
            actor: None,
            client: None,
        }
    }

    #[test]
    fn narrower_allow_wins_over_broader_require_approval() {
        let eval = StandardPolicyEvaluator::new();
        let policies = vec![
            AccessPolicy::new(
                "ws_1".to_string(),
                None,
                None,
                "x.*".to_string(),
                Decision::RequireApproval,
                0,
            ),
            AccessPolicy::new(
                "ws_1".to_string(),
                None,
                None,
                "x.read".to_string(),
                Decision::Allow,
                0,
            ),
        ];
        assert_eq!(
            eval.evaluate("x.read", ApprovalMode::Required, &ctx("ws_1"), &policies),
            Decision::Allow
        );
        assert_eq!(
            eval.evaluate("x.write", ApprovalMode::Required, &ctx("ws_1"), &policies),
            Decision::RequireApproval
        );
    }

    #[test]
    fn discover_is_always_allowed() {
        let eval = StandardPolicyEvaluator::new();
        let policies = vec![AccessPolicy::new(
            "ws_1".to_string(),
            None,
            None,
            "*".to_string(),
            Decision::Deny,
            100,
        )];
        assert_eq!(
            eval.evaluate("discover", ApprovalMode::Required, &ctx("ws_1"), &policies),
            Decision::Allow
        );
    }

    #[test]
    fn no_matching_policy_falls_back_to_default() {
        let eval = StandardPolicyEvaluator::new();
        assert_eq!(
            eval.evaluate("y.read", ApprovalMode::Auto, &ctx("ws_1"), &[]),
            Decision::Allow
        );
        assert_eq!(
            eval.evaluate("y.read", ApprovalMode::Required, &ctx("ws_1"), &[]),
            Decision::RequireApproval
        );
    }

    #[test]
    fn graphql_decomposition_requires_approval_for_mutation_field() {
        let eval = StandardPolicyEvaluator::new();
        let operation = "mutation { deleteUser(id: 1) { id } createWidget(name: \"a\") { id } }";
        let (decision, paths) = eval.evaluate_graphql("gh", operation, &ctx("ws_1"), &[]);
        assert_eq!(decision, Decision::RequireApproval);
        assert_eq!(paths, vec!["gh.mutation.deleteUser", "gh.mutation.createWidget"]);
    }

    #[test]
    fn graphql_query_fields_default_to_allow() {
        let eval = StandardPolicyEvaluator::new();
        let operation = "query { viewer { id } }";
        let (decision, paths) = eval.evaluate_graphql("gh", operation, &ctx("ws_1"), &[]);
        assert_eq!(decision, Decision::Allow);
        assert_eq!(paths, vec!["gh.query.viewer"]);
    }

    #[test]
    fn graphql_decomposition_short_circuits_on_deny() {
        let eval = StandardPolicyEvaluator::new();
        let policies = vec![AccessPolicy::new(
            "ws_1".to_string(),
            None,
            None,
            "gh.mutation.deleteUser".to_string(),
            Decision::Deny,
            0,
        )];
        let operation = "mutation { deleteUser createWidget }";
        let (decision, _paths) = eval.evaluate_graphql("gh", operation, &ctx("ws_1"), &policies);
        assert_eq!(decision, Decision::Deny);
    }
}
