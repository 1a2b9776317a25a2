//! Media references: finding them in an item's property tree, downloading
//! them at most once per item, and pointing the item at the local copy.

use crate::source::ContentSource;
use crate::types::{
    ContentItem, LOCAL_MEDIA_PATH_KEY, MEDIA_URL_KEY, NodeId, PropertyMap, PropertyValue,
};
use crate::utils;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Collect every media URL in `properties`, pre-order.
///
/// Only object levels are walked: arrays are never searched for media
/// references. Duplicates are kept.
pub fn extract_media_urls(properties: &PropertyMap) -> Vec<String> {
    let mut urls = Vec::new();
    collect_media_urls(properties, &mut urls);
    urls
}

fn collect_media_urls(properties: &PropertyMap, urls: &mut Vec<String>) {
    for (key, value) in properties {
        match value {
            PropertyValue::Object(nested) => collect_media_urls(nested, urls),
            PropertyValue::Scalar(url) if key == MEDIA_URL_KEY => urls.push(url.clone()),
            PropertyValue::Scalar(_) | PropertyValue::Array(_) => {}
        }
    }
}

/// Set `localMediaPath` next to every `mediaUrl` equal to `matched_url`, at
/// any object depth. Re-running with the same arguments changes nothing.
pub fn rewrite_media_reference(properties: &mut PropertyMap, matched_url: &str, local_path: &str) {
    for value in properties.values_mut() {
        if let PropertyValue::Object(nested) = value {
            rewrite_media_reference(nested, matched_url, local_path);
        }
    }

    let is_match = properties
        .get(MEDIA_URL_KEY)
        .and_then(PropertyValue::as_scalar)
        .is_some_and(|url| url == matched_url);
    if is_match {
        properties.insert(
            LOCAL_MEDIA_PATH_KEY.to_string(),
            PropertyValue::Scalar(local_path.to_string()),
        );
    }
}

/// Result of asking the [`MediaCache`] for an item's media
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaOutcome {
    /// This call downloaded the file to the path
    Downloaded(PathBuf),
    /// The item already had a reserved path; nothing was downloaded
    Cached(PathBuf),
    /// This call reserved the path but the download or write failed
    Failed(PathBuf),
    /// An earlier download for the item failed; nothing to reference
    Unavailable(PathBuf),
}

impl MediaOutcome {
    /// Local path to reference from the item, if one should be referenced
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            MediaOutcome::Downloaded(path) | MediaOutcome::Cached(path) => Some(path),
            MediaOutcome::Failed(_) | MediaOutcome::Unavailable(_) => None,
        }
    }
}

/// Run-wide item id → local media path cache.
///
/// The whole check, reserve, download and write sequence runs under one
/// lock, so media downloads are serialized and at most one download is ever
/// attempted per item id. Entries are never removed, including after a
/// failed download.
#[derive(Debug, Default)]
pub struct MediaCache {
    entries: Mutex<HashMap<NodeId, MediaEntry>>,
}

#[derive(Debug, Clone)]
struct MediaEntry {
    path: PathBuf,
    downloaded: bool,
}

impl MediaCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserved path for `item_id`, if any
    pub async fn get(&self, item_id: NodeId) -> Option<PathBuf> {
        self.entries
            .lock()
            .await
            .get(&item_id)
            .map(|entry| entry.path.clone())
    }

    /// Number of reserved items
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether nothing has been reserved yet
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Whether the media reserved for `item_id` made it to disk
    pub async fn is_downloaded(&self, item_id: NodeId) -> bool {
        self.entries
            .lock()
            .await
            .get(&item_id)
            .is_some_and(|entry| entry.downloaded)
    }

    /// Make sure the media for `item_id` is on disk.
    ///
    /// If the item has no entry yet, reserves `<media_folder>/<url file name>`,
    /// then downloads `url` and writes it there. Failures are logged and
    /// reported as [`MediaOutcome::Failed`]; the reservation stays, and later
    /// calls for the item get [`MediaOutcome::Unavailable`].
    pub async fn ensure_downloaded(
        &self,
        item_id: NodeId,
        url: &str,
        media_folder: &Path,
        source: &dyn ContentSource,
    ) -> MediaOutcome {
        let mut entries = self.entries.lock().await;

        if let Some(existing) = entries.get(&item_id) {
            tracing::debug!(
                item_id = %item_id,
                path = %existing.path.display(),
                downloaded = existing.downloaded,
                "Media already reserved"
            );
            return if existing.downloaded {
                MediaOutcome::Cached(existing.path.clone())
            } else {
                MediaOutcome::Unavailable(existing.path.clone())
            };
        }

        let target = media_folder.join(utils::media_file_name(url));
        let entry = entries.entry(item_id).or_insert(MediaEntry {
            path: target.clone(),
            downloaded: false,
        });

        match download_to(source, url, &target).await {
            Ok(bytes) => {
                entry.downloaded = true;
                tracing::info!(
                    item_id = %item_id,
                    url,
                    path = %target.display(),
                    bytes,
                    "Downloaded media"
                );
                MediaOutcome::Downloaded(target)
            }
            Err(e) => {
                tracing::error!(item_id = %item_id, url, error = %e, "Error downloading media");
                MediaOutcome::Failed(target)
            }
        }
    }
}

async fn download_to(
    source: &dyn ContentSource,
    url: &str,
    target: &Path,
) -> crate::error::Result<usize> {
    let bytes = source.download_file(url).await?;
    if let Some(parent) = target.parent() {
        utils::ensure_dir(parent).await?;
    }
    tokio::fs::write(target, &bytes).await?;
    Ok(bytes.len())
}

/// Download every media reference of `item` and rewrite the references that
/// now have a local copy. Returns one outcome per reference found.
pub async fn localize_media(
    item: &mut ContentItem,
    cache: &MediaCache,
    media_folder: &Path,
    source: &dyn ContentSource,
) -> Vec<MediaOutcome> {
    let urls = extract_media_urls(&item.properties);
    let mut outcomes = Vec::with_capacity(urls.len());

    for url in urls {
        let outcome = cache
            .ensure_downloaded(item.id, &url, media_folder, source)
            .await;
        if let Some(local) = outcome.local_path() {
            let local = local.to_string_lossy();
            rewrite_media_reference(&mut item.properties, &url, &local);
        }
        outcomes.push(outcome);
    }

    outcomes
}
