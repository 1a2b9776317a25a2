//! Core types for content-export

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Property key recognized as a media reference
pub const MEDIA_URL_KEY: &str = "mediaUrl";

/// Sibling key injected next to a media reference once it has been downloaded
pub const LOCAL_MEDIA_PATH_KEY: &str = "localMediaPath";

/// Identifier of a content node (items and their ancestors share one id space)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl NodeId {
    /// Sentinel id of the content root
    pub const ROOT: NodeId = NodeId(-1);

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Ordered property mapping, kept in source order
pub type PropertyMap = IndexMap<String, PropertyValue>;

/// One node of an item's dynamic property tree
///
/// Serializes as plain JSON: a scalar is a string, an object is an object and
/// an array is an array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Leaf value, stringified
    Scalar(String),
    /// Nested object
    Object(PropertyMap),
    /// Ordered list of values
    Array(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Scalar text, if this is a scalar
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            PropertyValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Nested map, if this is an object
    pub fn as_object(&self) -> Option<&PropertyMap> {
        match self {
            PropertyValue::Object(map) => Some(map),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Scalar(s.to_string())
    }
}

/// A single exported content item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Item id
    pub id: NodeId,
    /// Display name of the item
    pub node_name: String,
    /// Ancestor path segments, root to leaf; the last segment is the item itself
    pub path: Vec<String>,
    /// Dynamic property tree
    pub properties: PropertyMap,
}

/// Descending pagination watermark for one node type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cursor(i64);

impl Cursor {
    /// Start a cursor at the configured upper bound
    pub fn new(upper_limit: i64) -> Self {
        Self(upper_limit)
    }

    /// Current value substituted into page queries
    pub fn last_id(&self) -> i64 {
        self.0
    }

    /// Move the cursor below the smallest id in `page`.
    ///
    /// Returns `false` if the cursor could not move down (empty page, or a
    /// page whose ids are not below the current watermark); the cursor never
    /// increases.
    pub fn advance_past(&mut self, page: &[ContentItem]) -> bool {
        let Some(min_id) = page.iter().map(|item| item.id.0).min() else {
            return false;
        };
        let next = min_id.saturating_sub(1);
        if next < self.0 {
            self.0 = next;
            true
        } else {
            false
        }
    }
}

/// Run-wide counters, updated concurrently by workers
#[derive(Debug, Default)]
pub struct ExportStats {
    pages_fetched: AtomicU64,
    items_exported: AtomicU64,
    items_failed: AtomicU64,
    media_downloaded: AtomicU64,
    media_failed: AtomicU64,
}

impl ExportStats {
    pub(crate) fn page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn item_exported(&self) {
        self.items_exported.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn item_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn media_downloaded(&self) {
        self.media_downloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn media_failed(&self) {
        self.media_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> ExportSummary {
        ExportSummary {
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            items_exported: self.items_exported.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            media_downloaded: self.media_downloaded.load(Ordering::Relaxed),
            media_failed: self.media_failed.load(Ordering::Relaxed),
        }
    }
}

/// Totals reported at the end of a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Non-empty pages fetched across all node types
    pub pages_fetched: u64,
    /// Items written to disk
    pub items_exported: u64,
    /// Items that failed at the worker boundary
    pub items_failed: u64,
    /// Media files written to disk
    pub media_downloaded: u64,
    /// Media downloads that failed
    pub media_failed: u64,
}
