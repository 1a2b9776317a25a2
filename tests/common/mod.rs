//! Common test utilities for content-export pipeline tests

#![allow(dead_code)]

use async_trait::async_trait;
use content_export::types::PropertyMap;
use content_export::{ContentItem, ContentSource, Error, ExportConfig, NodeId, Result};
use indexmap::IndexMap;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Query template used by the fake node types
pub const TEMPLATE: &str = "lastId={lastId} take={take}";

/// Something the fake source was asked to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    /// A page query, with the number of item files on disk at that moment
    Page { query: String, files_on_disk: usize },
    /// A title batch
    Titles(Vec<NodeId>),
    /// A media download
    Download(String),
}

/// In-memory [`ContentSource`] serving scripted pages
pub struct FakeSource {
    export_root: PathBuf,
    pages: Mutex<VecDeque<Result<Vec<ContentItem>>>>,
    titles: HashMap<NodeId, String>,
    failing_downloads: Vec<String>,
    panic_on_title: Option<NodeId>,
    title_delay: Duration,
    calls: Mutex<Vec<Call>>,
    titles_in_flight: AtomicUsize,
    max_titles_in_flight: AtomicUsize,
}

impl FakeSource {
    /// New source; `export_root` is inspected on every page query
    pub fn new(export_root: &Path) -> Self {
        Self {
            export_root: export_root.to_path_buf(),
            pages: Mutex::new(VecDeque::new()),
            titles: HashMap::new(),
            failing_downloads: Vec::new(),
            panic_on_title: None,
            title_delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            titles_in_flight: AtomicUsize::new(0),
            max_titles_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue a page response; once the queue is drained pages are empty
    pub fn page(self, items: Vec<ContentItem>) -> Self {
        self.pages.lock().unwrap().push_back(Ok(items));
        self
    }

    /// Queue a failing page response
    pub fn failing_page(self) -> Self {
        self.pages.lock().unwrap().push_back(Err(Error::Api {
            status: 500,
            message: "GraphQL query failed".to_string(),
        }));
        self
    }

    /// Known title for an ancestor id
    pub fn title(mut self, id: i64, name: &str) -> Self {
        self.titles.insert(NodeId(id), name.to_string());
        self
    }

    /// Make downloads of `url` fail
    pub fn failing_download(mut self, url: &str) -> Self {
        self.failing_downloads.push(url.to_string());
        self
    }

    /// Panic when a title lookup includes `id`
    pub fn panic_on_title(mut self, id: i64) -> Self {
        self.panic_on_title = Some(NodeId(id));
        self
    }

    /// Slow down title lookups so concurrent workers overlap
    pub fn title_delay(mut self, delay: Duration) -> Self {
        self.title_delay = delay;
        self
    }

    /// Everything the source was asked to do, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Page queries issued
    pub fn page_calls(&self) -> Vec<(String, usize)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Page {
                    query,
                    files_on_disk,
                } => Some((query, files_on_disk)),
                _ => None,
            })
            .collect()
    }

    /// Title batches requested
    pub fn title_calls(&self) -> Vec<Vec<NodeId>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Titles(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }

    /// Downloads requested
    pub fn download_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Download(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    /// Highest number of title lookups observed running at once
    pub fn max_concurrent_title_lookups(&self) -> usize {
        self.max_titles_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch_page(&self, query: &str) -> Result<Vec<ContentItem>> {
        self.record(Call::Page {
            query: query.to_string(),
            files_on_disk: count_json_files(&self.export_root),
        });
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn fetch_titles(&self, ids: &[NodeId]) -> HashMap<NodeId, String> {
        self.record(Call::Titles(ids.to_vec()));
        if let Some(id) = self.panic_on_title
            && ids.contains(&id)
        {
            panic!("title lookup exploded for {id}");
        }

        let now = self.titles_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_titles_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.title_delay.is_zero() {
            tokio::time::sleep(self.title_delay).await;
        }
        self.titles_in_flight.fetch_sub(1, Ordering::SeqCst);

        ids.iter()
            .filter_map(|id| self.titles.get(id).map(|name| (*id, name.clone())))
            .collect()
    }

    async fn download_file(&self, url: &str) -> Result<Vec<u8>> {
        self.record(Call::Download(url.to_string()));
        if self.failing_downloads.iter().any(|u| u == url) {
            return Err(Error::Api {
                status: 404,
                message: format!("downloading {url}"),
            });
        }
        Ok(format!("bytes of {url}").into_bytes())
    }
}

/// Build an item with a `["x", "y", ancestors..., id]` path
pub fn item(id: i64, name: &str, ancestors: &[i64], properties: PropertyMap) -> ContentItem {
    let mut path = vec!["x".to_string(), "y".to_string()];
    path.extend(ancestors.iter().map(|a| a.to_string()));
    path.push(id.to_string());
    ContentItem {
        id: NodeId(id),
        node_name: name.to_string(),
        path,
        properties,
    }
}

/// Properties with a single nested media reference
pub fn media_props(url: &str) -> PropertyMap {
    let value = serde_json::json!({ "image": { "mediaUrl": url, "alt": "picture" } });
    content_export::source::lower_properties(&value)
}

/// Export settings rooted in `root` with one node type per alias
pub fn export_config(root: &Path, aliases: &[&str], batch_size: usize, parallel: usize) -> ExportConfig {
    let mut queries = IndexMap::new();
    for alias in aliases {
        queries.insert(alias.to_string(), TEMPLATE.to_string());
    }
    ExportConfig {
        export_path: root.join("export"),
        media_path: root.join("media"),
        batch_size,
        parallel_tasks: parallel,
        upper_limit_id: 100,
        file_name_max_len: 50,
        queries,
    }
}

/// Count `.json` files below `dir`
pub fn count_json_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_json_files(&path)
            } else if path.extension().is_some_and(|ext| ext == "json") {
                1
            } else {
                0
            }
        })
        .sum()
}
