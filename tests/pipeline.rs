//! End-to-end tests of the export pipeline against an in-memory content source.

mod common;

use common::{FakeSource, TEMPLATE, count_json_files, export_config, item, media_props};
use content_export::types::PropertyMap;
use content_export::{Exporter, NodeId};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn read_json(path: &std::path::Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_single_page_scenario() {
    let dir = TempDir::new().unwrap();
    let export_root = dir.path().join("export");
    let fake = Arc::new(
        FakeSource::new(&export_root)
            .page(vec![
                item(100, "A", &[50], PropertyMap::new()),
                item(98, "B", &[50], PropertyMap::new()),
            ])
            .title(50, "Fifty"),
    );
    let exporter = Exporter::new(fake.clone(), export_config(dir.path(), &["news"], 2, 1));

    let last_id = exporter.export_node_type("news", TEMPLATE).await;

    assert_eq!(last_id, 97);
    let queries: Vec<String> = fake.page_calls().into_iter().map(|(q, _)| q).collect();
    assert_eq!(queries, vec!["lastId=100 take=2", "lastId=97 take=2"]);
    assert_eq!(fake.title_calls(), vec![vec![NodeId(50)]]);

    let folder = export_root.join("news").join("Fifty");
    assert!(folder.join("100_A.json").is_file());
    assert!(folder.join("98_B.json").is_file());
    assert_eq!(exporter.name_cache().get(NodeId(50)).await.as_deref(), Some("Fifty"));

    let summary = exporter.summary();
    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.items_exported, 2);
    assert_eq!(summary.items_failed, 0);
}

#[tokio::test]
async fn test_empty_first_page_stops_immediately() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(FakeSource::new(&dir.path().join("export")));
    let exporter = Exporter::new(fake.clone(), export_config(dir.path(), &["news"], 10, 3));

    let last_id = exporter.export_node_type("news", TEMPLATE).await;

    assert_eq!(last_id, 100);
    assert_eq!(fake.page_calls().len(), 1);
    assert!(fake.title_calls().is_empty());
    assert_eq!(count_json_files(dir.path()), 0);
    assert_eq!(exporter.summary().pages_fetched, 0);
}

#[tokio::test]
async fn test_page_fetch_error_ends_node_type() {
    let dir = TempDir::new().unwrap();
    let fake = Arc::new(
        FakeSource::new(&dir.path().join("export"))
            .failing_page()
            .page(vec![item(90, "never", &[], PropertyMap::new())]),
    );
    let exporter = Exporter::new(fake.clone(), export_config(dir.path(), &["news"], 10, 3));

    let last_id = exporter.export_node_type("news", TEMPLATE).await;

    assert_eq!(last_id, 100);
    assert_eq!(fake.page_calls().len(), 1);
    assert_eq!(count_json_files(dir.path()), 0);
}

#[tokio::test]
async fn test_page_is_drained_before_next_fetch() {
    let dir = TempDir::new().unwrap();
    let export_root = dir.path().join("export");
    let fake = Arc::new(
        FakeSource::new(&export_root)
            .page(vec![
                item(99, "one", &[], PropertyMap::new()),
                item(98, "two", &[], PropertyMap::new()),
                item(97, "three", &[], PropertyMap::new()),
            ])
            .page(vec![
                item(90, "four", &[], PropertyMap::new()),
                item(80, "five", &[], PropertyMap::new()),
            ])
            .title_delay(Duration::from_millis(5)),
    );
    let exporter = Exporter::new(fake.clone(), export_config(dir.path(), &["news"], 3, 2));

    let last_id = exporter.export_node_type("news", TEMPLATE).await;

    assert_eq!(last_id, 79);
    let calls = fake.page_calls();
    assert_eq!(
        calls,
        vec![
            ("lastId=100 take=3".to_string(), 0),
            ("lastId=96 take=3".to_string(), 3),
            ("lastId=79 take=3".to_string(), 5),
        ]
    );
}

#[tokio::test]
async fn test_worker_concurrency_is_bounded() {
    let dir = TempDir::new().unwrap();
    let page = (0..6)
        .map(|i| item(90 - i, &format!("item{i}"), &[10 + i], PropertyMap::new()))
        .collect();
    let fake = Arc::new(
        FakeSource::new(&dir.path().join("export"))
            .page(page)
            .title_delay(Duration::from_millis(20)),
    );
    let exporter = Exporter::new(fake.clone(), export_config(dir.path(), &["news"], 6, 2));

    exporter.export_node_type("news", TEMPLATE).await;

    assert_eq!(fake.title_calls().len(), 6);
    assert_eq!(fake.max_concurrent_title_lookups(), 2);
    assert_eq!(exporter.summary().items_exported, 6);
}

#[tokio::test]
async fn test_failing_items_do_not_affect_siblings() {
    let dir = TempDir::new().unwrap();
    let export_root = dir.path().join("export");

    // A regular file where the item's folder should go
    std::fs::create_dir_all(export_root.join("news")).unwrap();
    std::fs::write(export_root.join("news").join("Blocked"), b"not a folder").unwrap();

    let fake = Arc::new(
        FakeSource::new(&export_root)
            .page(vec![
                item(99, "blocked", &[40], PropertyMap::new()),
                item(98, "exploding", &[666], PropertyMap::new()),
                item(97, "fine", &[], PropertyMap::new()),
            ])
            .title(40, "Blocked")
            .panic_on_title(666),
    );
    let exporter = Exporter::new(fake.clone(), export_config(dir.path(), &["news"], 3, 3));

    let last_id = exporter.export_node_type("news", TEMPLATE).await;

    assert_eq!(last_id, 96);
    assert!(export_root.join("news").join("97_fine.json").is_file());
    assert_eq!(fake.page_calls().len(), 2);

    let summary = exporter.summary();
    assert_eq!(summary.items_exported, 1);
    assert_eq!(summary.items_failed, 2);
}

#[tokio::test]
async fn test_media_is_downloaded_and_referenced() {
    let dir = TempDir::new().unwrap();
    let export_root = dir.path().join("export");
    let url = "https://cdn.example.com/media/7/photo%20one.jpg";
    let fake = Arc::new(
        FakeSource::new(&export_root)
            .page(vec![item(42, "With picture", &[], media_props(url))]),
    );
    let exporter = Exporter::new(fake.clone(), export_config(dir.path(), &["news"], 10, 3));

    exporter.export_node_type("news", TEMPLATE).await;

    let local = dir.path().join("media").join("news").join("photo one.jpg");
    assert_eq!(std::fs::read(&local).unwrap(), format!("bytes of {url}").into_bytes());
    assert_eq!(fake.download_calls(), vec![url.to_string()]);
    assert_eq!(exporter.media_cache().get(NodeId(42)).await, Some(local.clone()));

    let written = read_json(&export_root.join("news").join("42_With picture.json"));
    assert_eq!(written["id"], 42);
    assert_eq!(written["nodeName"], "With picture");
    assert_eq!(written["properties"]["image"]["mediaUrl"], url);
    assert_eq!(written["properties"]["image"]["alt"], "picture");
    assert_eq!(
        written["properties"]["image"]["localMediaPath"],
        &*local.to_string_lossy()
    );

    let summary = exporter.summary();
    assert_eq!(summary.media_downloaded, 1);
    assert_eq!(summary.media_failed, 0);
}

#[tokio::test]
async fn test_failed_media_leaves_reference_untouched() {
    let dir = TempDir::new().unwrap();
    let export_root = dir.path().join("export");
    let url = "https://cdn.example.com/media/gone.png";
    let fake = Arc::new(
        FakeSource::new(&export_root)
            .page(vec![item(42, "Broken", &[], media_props(url))])
            .failing_download(url),
    );
    let exporter = Exporter::new(fake.clone(), export_config(dir.path(), &["news"], 10, 3));

    exporter.export_node_type("news", TEMPLATE).await;

    let written = read_json(&export_root.join("news").join("42_Broken.json"));
    assert_eq!(written["properties"]["image"]["mediaUrl"], url);
    assert!(written["properties"]["image"].get("localMediaPath").is_none());

    let summary = exporter.summary();
    assert_eq!(summary.items_exported, 1);
    assert_eq!(summary.media_failed, 1);
    assert_eq!(summary.media_downloaded, 0);
}

#[tokio::test]
async fn test_repeated_failed_media_is_never_referenced() {
    let dir = TempDir::new().unwrap();
    let export_root = dir.path().join("export");
    let url = "https://cdn.example.com/media/gone.png";
    let mut properties = media_props(url);
    properties.extend(
        content_export::source::lower_properties(
            &serde_json::json!({ "thumb": { "mediaUrl": url } }),
        ),
    );
    let fake = Arc::new(
        FakeSource::new(&export_root)
            .page(vec![item(43, "Twice broken", &[], properties)])
            .failing_download(url),
    );
    let exporter = Exporter::new(fake.clone(), export_config(dir.path(), &["news"], 10, 3));

    exporter.export_node_type("news", TEMPLATE).await;

    let written = read_json(&export_root.join("news").join("43_Twice broken.json"));
    for key in ["image", "thumb"] {
        assert_eq!(written["properties"][key]["mediaUrl"], url);
        assert!(written["properties"][key].get("localMediaPath").is_none());
    }
    assert_eq!(fake.download_calls(), vec![url.to_string()]);
    assert!(!dir.path().join("media").join("news").join("gone.png").exists());

    let summary = exporter.summary();
    assert_eq!(summary.items_exported, 1);
    assert_eq!(summary.media_failed, 1);
}

#[tokio::test]
async fn test_run_exports_node_types_in_order() {
    let dir = TempDir::new().unwrap();
    let export_root = dir.path().join("export");
    let fake = Arc::new(
        FakeSource::new(&export_root)
            .page(vec![item(99, "news item", &[], PropertyMap::new())])
            .page(vec![])
            .page(vec![item(50, "blog item", &[], PropertyMap::new())]),
    );
    let exporter = Exporter::new(
        fake.clone(),
        export_config(dir.path(), &["news", "blogs"], 10, 3),
    );

    let summary = exporter.run().await;

    let queries: Vec<String> = fake.page_calls().into_iter().map(|(q, _)| q).collect();
    assert_eq!(
        queries,
        vec![
            "lastId=100 take=10",
            "lastId=98 take=10",
            "lastId=100 take=10",
            "lastId=49 take=10",
        ]
    );
    assert!(export_root.join("news").join("99_news item.json").is_file());
    assert!(export_root.join("blogs").join("50_blog item.json").is_file());
    assert_eq!(summary.pages_fetched, 2);
    assert_eq!(summary.items_exported, 2);
}
