//! Per-item processing: folder resolution, media localization, JSON write.

use super::Exporter;
use crate::error::Result;
use crate::media::{MediaOutcome, localize_media};
use crate::paths::resolve_path_names;
use crate::types::ContentItem;
use crate::utils::{ensure_dir, sanitize_file_name, sanitize_path_segment, truncate_file_name};
use std::path::PathBuf;

/// File name of an exported item: `<id>_<sanitized, truncated node name>.json`
pub fn item_file_name(item: &ContentItem, max_name_len: usize) -> String {
    let name = sanitize_file_name(&item.node_name);
    format!("{}_{}.json", item.id, truncate_file_name(&name, max_name_len))
}

impl Exporter {
    /// Export one item and return the path of the written JSON file
    pub(crate) async fn export_item(&self, node_type: &str, mut item: ContentItem) -> Result<PathBuf> {
        tracing::info!(node_type, item_id = %item.id, node_name = %item.node_name, "Processing item");

        let node_folder = sanitize_path_segment(node_type);

        let mut folder = self.settings.export_path.join(&node_folder);
        for name in resolve_path_names(&item, &self.names, self.source.as_ref()).await {
            let segment = sanitize_path_segment(&name);
            if !segment.is_empty() {
                folder.push(segment);
            }
        }
        ensure_dir(&folder).await?;

        let media_folder = self.settings.media_path.join(&node_folder);
        ensure_dir(&media_folder).await?;

        for outcome in localize_media(&mut item, &self.media, &media_folder, self.source.as_ref()).await {
            match outcome {
                MediaOutcome::Downloaded(_) => self.stats.media_downloaded(),
                MediaOutcome::Failed(_) => self.stats.media_failed(),
                MediaOutcome::Cached(_) | MediaOutcome::Unavailable(_) => {}
            }
        }

        let file = folder.join(item_file_name(&item, self.settings.file_name_max_len));
        let json = serde_json::to_vec_pretty(&item)?;
        tokio::fs::write(&file, json).await?;

        Ok(file)
    }
}
