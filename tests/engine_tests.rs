//! Association engine tests against the service API

use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

use recordbook_server::models::{Record, TableId};
use recordbook_server::{open_database, AppError, ChangeFeed, ServiceRegistry};

fn registry(temp_dir: &TempDir) -> ServiceRegistry {
    let db = open_database(temp_dir.path().join("engine.db")).expect("Failed to open database");
    ServiceRegistry::new(db, ChangeFeed::new(64))
}

fn last_child_id(parent: &Record) -> Option<&str> {
    parent.last_child.as_deref().map(|child| child.id.as_str())
}

/// Newest non-locked child, ties going to the greatest id
fn expected_last_child(children: &[Record]) -> Option<String> {
    children
        .iter()
        .filter(|c| !c.is_locked())
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
        .map(|c| c.id.clone())
}

#[tokio::test]
async fn test_cache_matches_children_after_every_step() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);
    let parents = registry.service(TableId::Measurements);
    let children = registry.service(TableId::MeasurementResults);

    parents
        .add(json!({ "id": "mea-1", "name": "Weight" }))
        .await
        .unwrap();

    let steps = vec![
        json!({ "id": "mer-a", "createdAt": 300, "parentId": "mea-1" }),
        json!({ "id": "mer-b", "createdAt": 500, "parentId": "mea-1", "status": ["locked"] }),
        json!({ "id": "mer-c", "createdAt": 300, "parentId": "mea-1" }),
        json!({ "id": "mer-d", "createdAt": 100, "parentId": "mea-1" }),
    ];

    for step in steps {
        children.add(step).await.unwrap();
        let parent = parents.get("mea-1").await.unwrap();
        let expected = expected_last_child(&children.children_of("mea-1").await.unwrap());
        assert_eq!(last_child_id(&parent), expected.as_deref());
    }

    // Equal createdAt resolves to the lexically greatest id
    let parent = parents.get("mea-1").await.unwrap();
    assert_eq!(last_child_id(&parent), Some("mer-c"));

    children.toggle_lock("mer-b").await.unwrap();
    let parent = parents.get("mea-1").await.unwrap();
    assert_eq!(last_child_id(&parent), Some("mer-b"));

    children.remove("mer-b").await.unwrap();
    children.remove("mer-c").await.unwrap();
    let parent = parents.get("mea-1").await.unwrap();
    assert_eq!(last_child_id(&parent), Some("mer-a"));

    children
        .update("mer-a", json!({ "status": ["locked"] }))
        .await
        .unwrap();
    let parent = parents.get("mea-1").await.unwrap();
    assert_eq!(last_child_id(&parent), Some("mer-d"));
}

#[tokio::test]
async fn test_update_last_child_reports_missing_parent() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);
    let parents = registry.service(TableId::Examples);

    parents
        .add(json!({ "id": "exa-1", "name": "Bench" }))
        .await
        .unwrap();

    assert!(parents.update_last_child("exa-1").await.unwrap());
    assert!(!parents.update_last_child("exa-2").await.unwrap());
}

#[tokio::test]
async fn test_remove_missing_record_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);

    let result = registry.remove_record("exr-404").await;

    assert!(matches!(result, Err(AppError::NotFound { .. })));
}

#[tokio::test]
async fn test_clear_parent_table_takes_children() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);
    let parents = registry.service(TableId::Examples);
    let children = registry.service(TableId::ExampleResults);

    parents
        .add(json!({ "id": "exa-1", "name": "Bench" }))
        .await
        .unwrap();
    children
        .add(json!({ "id": "exr-1", "parentId": "exa-1" }))
        .await
        .unwrap();

    parents.clear().await.unwrap();

    assert_eq!(parents.count().await.unwrap(), 0);
    assert_eq!(children.count().await.unwrap(), 0);
    assert!(children.children_of("exa-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_export_strips_cache() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);
    let parents = registry.service(TableId::Examples);

    parents
        .add(json!({ "id": "exa-1", "name": "Bench" }))
        .await
        .unwrap();
    registry
        .service(TableId::ExampleResults)
        .add(json!({ "id": "exr-1", "parentId": "exa-1" }))
        .await
        .unwrap();

    assert!(parents.get("exa-1").await.unwrap().last_child.is_some());
    let exported = parents.export().await.unwrap();
    assert!(exported[0].last_child.is_none());
}

#[tokio::test]
async fn test_child_write_publishes_both_tables() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);
    registry
        .service(TableId::Examples)
        .add(json!({ "id": "exa-1", "name": "Bench" }))
        .await
        .unwrap();

    let mut changes = registry.feed().subscribe();
    registry
        .service(TableId::ExampleResults)
        .add(json!({ "id": "exr-1", "parentId": "exa-1" }))
        .await
        .unwrap();

    let first = changes.recv().await.unwrap();
    let second = changes.recv().await.unwrap();
    assert_eq!(first.table, TableId::ExampleResults);
    assert_eq!(second.table, TableId::Examples);
}

#[tokio::test]
async fn test_failed_write_publishes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);
    let mut changes = registry.feed().subscribe();

    let result = registry
        .service(TableId::ExampleResults)
        .add(json!({ "id": "exr-1", "parentId": "exa-missing" }))
        .await;

    assert!(matches!(result, Err(AppError::ParentNotFound(_))));
    assert!(changes.try_recv().is_err());
}

#[tokio::test]
async fn test_live_dashboard_follows_child_writes() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);
    let parents = registry.service(TableId::Examples);
    parents
        .add(json!({ "id": "exa-1", "name": "Bench" }))
        .await
        .unwrap();

    let mut live = parents.live_dashboard();
    let initial = live.next().await.unwrap();
    assert!(initial[0].last_child.is_none());

    registry
        .service(TableId::ExampleResults)
        .add(json!({ "id": "exr-1", "parentId": "exa-1" }))
        .await
        .unwrap();

    let updated = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = live.next().await.unwrap();
            if snapshot[0].last_child.is_some() {
                return snapshot;
            }
        }
    })
    .await
    .expect("live dashboard never saw the new child");

    assert_eq!(last_child_id(&updated[0]), Some("exr-1"));
    live.teardown();
}

#[tokio::test]
async fn test_bulk_import_runs_one_recompute_per_parent() {
    let temp_dir = TempDir::new().unwrap();
    let registry = registry(&temp_dir);
    let parents = registry.service(TableId::Examples);
    for id in ["exa-1", "exa-2"] {
        parents
            .add(json!({ "id": id, "name": "Bench" }))
            .await
            .unwrap();
    }

    let candidates = (1..=6)
        .map(|i| {
            let parent = if i % 2 == 0 { "exa-2" } else { "exa-1" };
            json!({ "id": format!("exr-{}", i), "createdAt": i, "parentId": parent })
        })
        .collect();
    let report = registry
        .service(TableId::ExampleResults)
        .bulk_import(candidates)
        .await
        .unwrap();

    assert_eq!(report.imported_count, 6);
    assert_eq!(report.recompute_calls, 2);
    assert_eq!(report.recomputed_parents, vec!["exa-1", "exa-2"]);

    let parent = parents.get("exa-2").await.unwrap();
    assert_eq!(last_child_id(&parent), Some("exr-6"));
}
