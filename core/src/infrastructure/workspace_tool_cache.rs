// Copyright (c) 2026 Aperture Labs
// SPDX-License-Identifier: AGPL-3.0
//! Workspace Tool Cache storage (§4.5): a signature-keyed snapshot of
//! compiled tool artifacts per workspace, plus out-of-band storage for large
//! per-source typedef blobs. Grounded on
//! `infrastructure::tool_router::rebuild_index`'s rebuild-on-change pattern,
//! adapted from an in-process capability index to a durable, signature-
//! invalidated snapshot.
//!
//! The snapshot never stores invoker closures (§9 "Closures across
//! caches") — only the serializable `CompiledArtifact` list. Rehydrating a
//! live `ToolDefinition` set from a snapshot is `application::
//! workspace_tool_cache_service`'s job, since it requires re-applying the
//! compiler's artifact-to-invoker step.

use crate::domain::tool::CompiledArtifact;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Bumped whenever the cache entry shape changes; folded into the signature
/// so a version bump invalidates every existing entry at once (§4.5, §9).
pub const CACHE_VERSION_TAG: &str = "v1";

#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub signature: String,
    pub artifacts: Vec<CompiledArtifact>,
    pub dts_storage_ids: HashMap<String, String>,
}

/// One row per enabled `ToolSource`, used to compute the signature.
pub struct SourceSignatureInput<'a> {
    pub source_id: &'a str,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub enabled: bool,
}

/// `versionTag | workspaceId | sorted(sourceId:updatedAt:enabledFlag)` (§4.5).
pub fn compute_signature(workspace_id: &str, sources: &[SourceSignatureInput<'_>]) -> String {
    let mut parts: Vec<String> = sources
        .iter()
        .map(|s| format!("{}:{}:{}", s.source_id, s.updated_at.timestamp_millis(), s.enabled))
        .collect();
    parts.sort();
    let joined = format!("{CACHE_VERSION_TAG}|{workspace_id}|{}", parts.join(","));
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
pub trait WorkspaceToolCacheStore: Send + Sync {
    async fn get(&self, workspace: &str, signature: &str) -> Option<CachedSnapshot>;

    /// Best-effort write (§4.5 step 2e): failures are logged by the caller
    /// and never prevent returning the freshly built tool map.
    async fn put(&self, workspace: &str, snapshot: CachedSnapshot, typedef_blobs: HashMap<String, String>);

    async fn get_typedef_blob(&self, storage_id: &str) -> Option<String>;
}

#[derive(Default)]
pub struct InMemoryWorkspaceToolCacheStore {
    snapshots: Arc<RwLock<HashMap<String, CachedSnapshot>>>,
    typedef_blobs: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryWorkspaceToolCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkspaceToolCacheStore for InMemoryWorkspaceToolCacheStore {
    async fn get(&self, workspace: &str, signature: &str) -> Option<CachedSnapshot> {
        let snapshots = self.snapshots.read().unwrap();
        let snapshot = snapshots.get(workspace)?;
        if snapshot.signature == signature {
            Some(snapshot.clone())
        } else {
            None
        }
    }

    async fn put(&self, workspace: &str, snapshot: CachedSnapshot, typedef_blobs: HashMap<String, String>) {
        {
            let mut blobs = self.typedef_blobs.write().unwrap();
            for (storage_id, contents) in typedef_blobs {
                blobs.insert(storage_id, contents);
            }
        }
        self.snapshots.write().unwrap().insert(workspace.to_string(), snapshot);
    }

    async fn get_typedef_blob(&self, storage_id: &str) -> Option<String> {
        self.typedef_blobs.read().unwrap().get(storage_id).cloned()
    }
}
