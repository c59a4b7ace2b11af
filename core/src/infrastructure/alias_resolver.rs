// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Fuzzy alias resolution and suggestion scoring for the Tool Dispatcher
//! (§4.9 step 1). Grounded stylistically in
//! `infrastructure::tool_router::route_tool`'s exact-then-fallback shape,
//! extended with a segment-normalizing alias pass and a Levenshtein-distance
//! suggestion pass.

/// Normalizes an entire path to lowercase `a-z0-9`, matching the spec's
/// "case/punctuation-insensitive alias match" (§4.9 step 1): `.`, `_`, `-`
/// and any other non-alphanumeric separator are dropped, so segment
/// boundaries collapse along with case and punctuation. `admin.send_announcement`
/// and `ADMIN_Send-Announcement` both reduce to `adminsendannouncement` even
/// though one has two dotted segments and the other has none — comparing
/// segment-by-segment would require the two paths to agree on where the
/// dots fall, which fuzzy client input makes no promises about.
fn normalize_flat(path: &str) -> String {
    path.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Strips a leading `tools.` namespace prefix some clients send, before
/// flattening for comparison against known tool paths.
fn strip_known_prefix(path: &str) -> &str {
    path.strip_prefix("tools.").unwrap_or(path)
}

/// Attempts an exact match first, then a case/punctuation-insensitive alias
/// match across `known_paths`. Returns the resolved path if a unique alias
/// match is found; when ambiguous, prefers the shortest path (§4.9 step 1).
pub fn resolve_alias<'a>(requested: &str, known_paths: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = known_paths.iter().find(|p| **p == requested) {
        return Some(exact);
    }

    let candidate = strip_known_prefix(requested);
    let candidate_norm = normalize_flat(candidate);

    let mut matches: Vec<&'a str> = known_paths
        .iter()
        .copied()
        .filter(|known| normalize_flat(known) == candidate_norm)
        .collect();

    if matches.is_empty() {
        return None;
    }
    if matches.len() == 1 {
        return Some(matches[0]);
    }

    // Ambiguous: prefer the shortest path, per §4.9 step 1.
    matches.sort_by_key(|p| p.len());
    Some(matches[0])
}

/// Classic O(nm) edit-distance DP table.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    let mut row: Vec<usize> = (0..=m).collect();
    for i in 1..=n {
        let mut prev_diag = row[0];
        row[0] = i;
        for j in 1..=m {
            let temp = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev_diag
            } else {
                1 + row[j].min(row[j - 1]).min(prev_diag)
            };
            prev_diag = temp;
        }
    }
    row[m]
}

/// Scores a known path's similarity to `requested` for the fuzzy-suggestion
/// pass: edit distance on the full path, with a bonus (i.e. a reduced
/// effective distance) when the two paths share a namespace prefix (the
/// segment before the first `.`), per §4.9's "Levenshtein + namespace-prefix
/// scoring".
fn suggestion_score(requested: &str, known: &str) -> usize {
    let distance = levenshtein(requested, known);
    let requested_prefix = requested.split('.').next().unwrap_or(requested);
    let known_prefix = known.split('.').next().unwrap_or(known);
    if requested_prefix.eq_ignore_ascii_case(known_prefix) {
        distance.saturating_sub(2)
    } else {
        distance
    }
}

/// Returns up to `limit` suggestions for an unknown tool path, closest
/// first. Used to augment the "Unknown tool" error per §4.9 step 1 / §7.
pub fn suggest<'a>(requested: &str, known_paths: &[&'a str], limit: usize) -> Vec<&'a str> {
    let mut scored: Vec<(usize, &'a str)> = known_paths
        .iter()
        .map(|known| (suggestion_score(requested, known), *known))
        .collect();
    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().take(limit).map(|(_, path)| path).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[&str] = &["admin.send_announcement", "admin.delete_data", "billing.charge_card"];

    #[test]
    fn exact_match_short_circuits() {
        assert_eq!(resolve_alias("admin.delete_data", KNOWN), Some("admin.delete_data"));
    }

    #[test]
    fn dotted_tools_prefix_resolves_to_bare_path() {
        assert_eq!(
            resolve_alias("tools.admin.send_announcement", KNOWN),
            Some("admin.send_announcement")
        );
    }

    #[test]
    fn case_and_punctuation_insensitive_alias_resolves() {
        assert_eq!(
            resolve_alias("tools.ADMIN_Send-Announcement", KNOWN),
            Some("admin.send_announcement")
        );
    }

    #[test]
    fn ambiguous_alias_prefers_shortest_path() {
        let known = &["ns.admin.send_announcement", "admin.send_announcement"];
        assert_eq!(
            resolve_alias("ADMIN.SEND.ANNOUNCEMENT", known),
            Some("admin.send_announcement")
        );
    }

    #[test]
    fn unknown_path_with_no_alias_match_returns_none() {
        assert_eq!(resolve_alias("totally.unknown.path", KNOWN), None);
    }

    #[test]
    fn suggestions_favor_shared_namespace_prefix() {
        let suggestions = suggest("admn.delete_data", KNOWN, 3);
        assert_eq!(suggestions[0], "admin.delete_data");
    }

    #[test]
    fn suggestions_are_bounded_by_limit() {
        let suggestions = suggest("x", KNOWN, 1);
        assert_eq!(suggestions.len(), 1);
    }

    #[test]
    fn levenshtein_identical_strings_is_zero() {
        assert_eq!(levenshtein("abc", "abc"), 0);
    }
}
