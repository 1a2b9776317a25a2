//! Ingestion loop: pages through one node type with a descending cursor.

use super::Exporter;
use crate::config::{LAST_ID_PLACEHOLDER, TAKE_PLACEHOLDER};
use crate::types::Cursor;

/// Substitute the cursor and page size into a query template
pub fn build_page_query(template: &str, last_id: i64, take: usize) -> String {
    template
        .replace(LAST_ID_PLACEHOLDER, &last_id.to_string())
        .replace(TAKE_PLACEHOLDER, &take.to_string())
}

impl Exporter {
    /// Page through `node_type` until a page comes back empty or fails.
    ///
    /// Each page is fully processed before the next query is issued, so the
    /// cursor only moves past ids whose items are done. Returns the final
    /// cursor value.
    pub async fn export_node_type(&self, node_type: &str, template: &str) -> i64 {
        let mut cursor = Cursor::new(self.settings.upper_limit_id);

        loop {
            let query = build_page_query(template, cursor.last_id(), self.settings.batch_size);

            tracing::info!(node_type, last_id = cursor.last_id(), "Fetching items");
            let page = match self.source.fetch_page(&query).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(node_type, error = %e, "Page fetch failed, stopping node type");
                    break;
                }
            };

            if page.is_empty() {
                tracing::info!(node_type, "No more data");
                break;
            }
            self.stats.page_fetched();

            let advanced = cursor.advance_past(&page);
            tracing::info!(node_type, last_id = cursor.last_id(), "Updated cursor");

            self.process_page(node_type, page).await;

            if !advanced {
                tracing::error!(
                    node_type,
                    last_id = cursor.last_id(),
                    "Page held no ids below the cursor, stopping node type"
                );
                break;
            }
        }

        cursor.last_id()
    }
}
