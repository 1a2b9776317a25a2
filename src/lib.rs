//! # content-export
//!
//! Incrementally exports content items from a paginated GraphQL content API
//! into a local file tree.
//!
//! ## How a run works
//!
//! - Each configured node type is paged through with a descending id cursor
//!   until the API returns an empty page.
//! - Every page is processed by a bounded pool of concurrent workers and fully
//!   drained before the next page is requested.
//! - Workers resolve the item's ancestor ids to folder names (through a shared
//!   name cache), download referenced media at most once per item (through a
//!   shared media cache), and write the item as JSON.
//! - Transient API statuses (404, 429) are retried with exponential backoff.
//!
//! ## Quick Start
//!
//! ```no_run
//! use content_export::{Config, Exporter, GraphQlSource};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(
//!         Path::new("appsettings.json"),
//!         Some(Path::new("appsettings.local.json")),
//!     )?;
//!
//!     let source = Arc::new(GraphQlSource::new(&config)?);
//!     let exporter = Exporter::new(source, config.export.clone());
//!
//!     let summary = exporter.run().await;
//!     println!("exported {} items", summary.items_exported);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// OAuth2 bearer token provider
pub mod auth;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Pagination loop, worker pool and per-item export
pub mod exporter;
/// Media reference extraction, rewriting and download cache
pub mod media;
/// Ancestor path resolution and name cache
pub mod paths;
/// Retry logic with exponential backoff
pub mod retry;
/// GraphQL content source
pub mod source;
/// Core types
pub mod types;
/// File naming and directory helpers
pub mod utils;

// Re-export commonly used types
pub use config::{Config, ExportConfig, LogConfig, RetryConfig};
pub use error::{Error, Result};
pub use exporter::Exporter;
pub use media::{MediaCache, MediaOutcome};
pub use paths::NameCache;
pub use retry::RetryPolicy;
pub use source::{ContentSource, GraphQlSource};
pub use types::{ContentItem, Cursor, ExportSummary, NodeId, PropertyMap, PropertyValue};
