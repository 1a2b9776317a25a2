//! Ancestor path resolution
//!
//! Turns an item's raw ancestor-id path into display-name folder segments.
//! Names come from a run-wide [`NameCache`]; ids missing from the cache are
//! fetched in one batched title lookup per item.

use crate::source::ContentSource;
use crate::types::{ContentItem, NodeId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Leading structural segments (site and root markers) on every raw path
const LEADING_STRUCTURAL_SEGMENTS: usize = 2;

/// Display name of the root sentinel
const ROOT_NAME: &str = "Root";

/// Run-wide node id → display name cache.
///
/// Append-only: entries are never evicted. Concurrent inserts of the same id
/// converge because titles are deterministic.
#[derive(Debug)]
pub struct NameCache {
    names: RwLock<HashMap<NodeId, String>>,
}

impl Default for NameCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NameCache {
    /// Create a cache seeded with the root sentinel
    pub fn new() -> Self {
        let mut names = HashMap::new();
        names.insert(NodeId::ROOT, ROOT_NAME.to_string());
        Self {
            names: RwLock::new(names),
        }
    }

    /// Cached name for `id`
    pub async fn get(&self, id: NodeId) -> Option<String> {
        self.names.read().await.get(&id).cloned()
    }

    /// Number of cached names (including the root sentinel)
    pub async fn len(&self) -> usize {
        self.names.read().await.len()
    }

    /// Whether the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.names.read().await.is_empty()
    }

    /// Resolve `ids` against the cache in one read.
    ///
    /// Returns one entry per id (in order, `None` when missing) plus the
    /// distinct missing ids.
    async fn lookup(&self, ids: &[NodeId]) -> (Vec<Option<String>>, Vec<NodeId>) {
        let names = self.names.read().await;
        let mut missing = Vec::new();
        let resolved = ids
            .iter()
            .map(|id| {
                let name = names.get(id).cloned();
                if name.is_none() && !missing.contains(id) {
                    missing.push(*id);
                }
                name
            })
            .collect();
        (resolved, missing)
    }

    /// Insert fetched names
    async fn merge(&self, fetched: HashMap<NodeId, String>) {
        if fetched.is_empty() {
            return;
        }
        self.names.write().await.extend(fetched);
    }
}

/// Numeric ancestor folder ids of `item`.
///
/// Drops the two leading structural segments and the trailing segment (the
/// item itself); non-numeric segments contribute nothing.
pub fn ancestor_ids(item: &ContentItem) -> Vec<NodeId> {
    let path = &item.path;
    if path.len() <= LEADING_STRUCTURAL_SEGMENTS {
        return Vec::new();
    }
    path[LEADING_STRUCTURAL_SEGMENTS..path.len() - 1]
        .iter()
        .filter_map(|segment| segment.parse::<NodeId>().ok())
        .collect()
}

/// Resolve the folder names for `item`.
///
/// Issues at most one title lookup, and only when some ancestor id is not
/// cached. Ids still unknown afterwards are dropped from the result.
pub async fn resolve_path_names(
    item: &ContentItem,
    cache: &NameCache,
    source: &dyn ContentSource,
) -> Vec<String> {
    let ids = ancestor_ids(item);
    if ids.is_empty() {
        return Vec::new();
    }

    let (resolved, missing) = cache.lookup(&ids).await;
    if missing.is_empty() {
        tracing::debug!(item_id = %item.id, "Ancestor names served from cache");
        return non_empty(resolved);
    }

    tracing::debug!(
        item_id = %item.id,
        missing = missing.len(),
        "Fetching ancestor titles"
    );
    let fetched = source.fetch_titles(&missing).await;
    if fetched.len() < missing.len() {
        tracing::warn!(
            item_id = %item.id,
            requested = missing.len(),
            received = fetched.len(),
            "Some ancestor titles could not be resolved; their folders are skipped"
        );
    }
    cache.merge(fetched).await;

    let (resolved, _) = cache.lookup(&ids).await;
    non_empty(resolved)
}

fn non_empty(names: Vec<Option<String>>) -> Vec<String> {
    names
        .into_iter()
        .flatten()
        .filter(|name| !name.is_empty())
        .collect()
}
