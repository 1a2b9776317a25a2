//! Export pipeline split into focused submodules.
//!
//! The `Exporter` struct and its methods are organized by stage:
//! - [`ingest`] - Per node type pagination loop driving the cursor
//! - [`pool`] - Bounded concurrent processing of one page
//! - [`item`] - Path resolution, media localization and file write for one item

mod ingest;
mod item;
mod pool;

pub use ingest::build_page_query;
pub use item::item_file_name;

use crate::config::ExportConfig;
use crate::media::MediaCache;
use crate::paths::NameCache;
use crate::source::ContentSource;
use crate::types::{ExportStats, ExportSummary};
use std::sync::Arc;

/// Exporter instance (cloneable - all fields are Arc-wrapped)
///
/// One exporter corresponds to one run: the name and media caches live as
/// long as it does and are shared by every worker.
#[derive(Clone)]
pub struct Exporter {
    /// Remote content API
    pub(crate) source: Arc<dyn ContentSource>,
    /// Destinations, paging and queries
    pub(crate) settings: Arc<ExportConfig>,
    /// Node id → display name, shared across workers
    pub(crate) names: Arc<NameCache>,
    /// Item id → local media path, shared across workers
    pub(crate) media: Arc<MediaCache>,
    /// Run-wide counters
    pub(crate) stats: Arc<ExportStats>,
}

impl Exporter {
    /// Create an exporter with fresh caches
    pub fn new(source: Arc<dyn ContentSource>, settings: ExportConfig) -> Self {
        Self {
            source,
            settings: Arc::new(settings),
            names: Arc::new(NameCache::new()),
            media: Arc::new(MediaCache::new()),
            stats: Arc::new(ExportStats::default()),
        }
    }

    /// Shared name cache
    pub fn name_cache(&self) -> &NameCache {
        &self.names
    }

    /// Shared media cache
    pub fn media_cache(&self) -> &MediaCache {
        &self.media
    }

    /// Counters accumulated so far
    pub fn summary(&self) -> ExportSummary {
        self.stats.snapshot()
    }

    /// Export every configured node type, one after the other
    pub async fn run(&self) -> ExportSummary {
        for (node_type, template) in self.settings.queries.iter() {
            self.export_node_type(node_type, template).await;
        }

        let summary = self.summary();
        tracing::info!(
            pages = summary.pages_fetched,
            exported = summary.items_exported,
            failed = summary.items_failed,
            media_downloaded = summary.media_downloaded,
            media_failed = summary.media_failed,
            "Export finished"
        );
        summary
    }
}
