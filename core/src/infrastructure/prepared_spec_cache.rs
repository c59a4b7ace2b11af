// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Prepared-Spec Cache (§4.3): avoids re-parsing large OpenAPI documents.
//! Keyed by `(specUrl, schemaVersion)`; entries older than `maxAgeMs` are
//! treated as misses. New domain logic — pattern (lookup-by-key + max-age +
//! best-effort replace) grounded in the teacher's general repository CRUD
//! idiom (`Arc<RwLock<HashMap<..>>>` over a trait, as in
//! `infrastructure::repositories::in_memory`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Bumped whenever the prepared-spec record shape changes; a stored entry
/// whose `schema_version` no longer matches `CURRENT_SCHEMA_VERSION` is
/// treated as a miss (§4.3, §9 "Cache signature version tag").
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_MAX_AGE_MS: i64 = 5 * 60 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct PreparedSpecMetadata {
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PreparedSpecHandle {
    pub blob: Arc<serde_json::Value>,
    pub metadata: PreparedSpecMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    spec_url: String,
    schema_version: u32,
}

#[async_trait]
pub trait PreparedSpecCache: Send + Sync {
    async fn get(&self, spec_url: &str, max_age_ms: i64) -> Option<PreparedSpecHandle>;
    async fn put(&self, spec_url: &str, prepared: serde_json::Value);
    /// Deletes entries older than `max_age_ms`, bounded by `limit` per call.
    async fn prune(&self, max_age_ms: i64, limit: usize) -> usize;
}

#[derive(Default)]
pub struct InMemoryPreparedSpecCache {
    entries: Arc<RwLock<HashMap<CacheKey, PreparedSpecHandle>>>,
}

impl InMemoryPreparedSpecCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreparedSpecCache for InMemoryPreparedSpecCache {
    async fn get(&self, spec_url: &str, max_age_ms: i64) -> Option<PreparedSpecHandle> {
        let key = CacheKey {
            spec_url: spec_url.to_string(),
            schema_version: CURRENT_SCHEMA_VERSION,
        };
        let entries = self.entries.read().unwrap();
        let handle = entries.get(&key)?;
        let age_ms = (Utc::now() - handle.metadata.created_at).num_milliseconds();
        if age_ms <= max_age_ms {
            Some(handle.clone())
        } else {
            None
        }
    }

    async fn put(&self, spec_url: &str, prepared: serde_json::Value) {
        let key = CacheKey {
            spec_url: spec_url.to_string(),
            schema_version: CURRENT_SCHEMA_VERSION,
        };
        let size_bytes = prepared.to_string().len();
        let handle = PreparedSpecHandle {
            blob: Arc::new(prepared),
            metadata: PreparedSpecMetadata {
                size_bytes,
                created_at: Utc::now(),
            },
        };
        // Last writer wins; a displaced blob is simply dropped (Arc
        // refcounted, so in-flight readers of the old blob keep it alive
        // until they finish — "best-effort delete" in process memory).
        self.entries.write().unwrap().insert(key, handle);
    }

    async fn prune(&self, max_age_ms: i64, limit: usize) -> usize {
        let mut entries = self.entries.write().unwrap();
        let now = Utc::now();
        let stale: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, handle)| (now - handle.metadata.created_at).num_milliseconds() > max_age_ms)
            .take(limit)
            .map(|(k, _)| k.clone())
            .collect();
        let removed = stale.len();
        for key in stale {
            entries.remove(&key);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_on_empty_cache() {
        let cache = InMemoryPreparedSpecCache::new();
        assert!(cache.get("https://example.com/a.yaml", DEFAULT_MAX_AGE_MS).await.is_none());
    }

    #[tokio::test]
    async fn hit_within_max_age() {
        let cache = InMemoryPreparedSpecCache::new();
        cache.put("https://example.com/a.yaml", serde_json::json!({"ok": true})).await;
        let handle = cache.get("https://example.com/a.yaml", DEFAULT_MAX_AGE_MS).await.unwrap();
        assert_eq!(handle.blob["ok"], true);
    }

    #[tokio::test]
    async fn miss_once_older_than_max_age() {
        let cache = InMemoryPreparedSpecCache::new();
        cache.put("https://example.com/a.yaml", serde_json::json!({"ok": true})).await;
        assert!(cache.get("https://example.com/a.yaml", -1).await.is_none());
    }

    #[tokio::test]
    async fn last_writer_wins_on_racing_put() {
        let cache = InMemoryPreparedSpecCache::new();
        cache.put("https://example.com/a.yaml", serde_json::json!({"v": 1})).await;
        cache.put("https://example.com/a.yaml", serde_json::json!({"v": 2})).await;
        let handle = cache.get("https://example.com/a.yaml", DEFAULT_MAX_AGE_MS).await.unwrap();
        assert_eq!(handle.blob["v"], 2);
    }

    #[tokio::test]
    async fn prune_removes_only_stale_entries_bounded_by_limit() {
        let cache = InMemoryPreparedSpecCache::new();
        cache.put("https://example.com/a.yaml", serde_json::json!({})).await;
        cache.put("https://example.com/b.yaml", serde_json::json!({})).await;
        let removed = cache.prune(-1, 1).await;
        assert_eq!(removed, 1);
    }
}
