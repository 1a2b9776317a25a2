//! Worker pool: processes one page with at most `parallel_tasks` items in flight.

use super::Exporter;
use crate::error::Error;
use crate::types::{ContentItem, NodeId};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

impl Exporter {
    /// Process every item of `page` concurrently and wait for all of them.
    ///
    /// Each task holds a semaphore permit for its whole run; the permit is
    /// released when the task ends, however it ends. A failing or panicking
    /// item is logged and counted but never affects its siblings.
    pub(crate) async fn process_page(&self, node_type: &str, page: Vec<ContentItem>) {
        let limit = Arc::new(Semaphore::new(self.settings.parallel_tasks));
        let node_type: Arc<str> = Arc::from(node_type);
        let mut tasks = JoinSet::new();

        for item in page {
            let exporter = self.clone();
            let limit = limit.clone();
            let node_type = node_type.clone();
            let id = item.id;
            let name = item.node_name.clone();

            tasks.spawn(async move {
                let _permit = limit
                    .acquire_owned()
                    .await
                    .map_err(|e| (id, name.clone(), Error::Task(e.to_string())))?;
                exporter
                    .export_item(&node_type, item)
                    .await
                    .map_err(|e| (id, name, e))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(path)) => {
                    self.stats.item_exported();
                    tracing::debug!(node_type = %node_type, path = %path.display(), "Item written");
                }
                Ok(Err((id, name, e))) => {
                    self.stats.item_failed();
                    log_item_failure(&node_type, id, &name, &e);
                }
                Err(join_error) => {
                    self.stats.item_failed();
                    tracing::error!(
                        node_type = %node_type,
                        error = %join_error,
                        "Item task panicked or was cancelled"
                    );
                }
            }
        }
    }
}

fn log_item_failure(node_type: &str, id: NodeId, name: &str, error: &Error) {
    tracing::error!(
        node_type,
        item_id = %id,
        node_name = name,
        error = %error,
        "Error processing item"
    );
}
