//! Integration test for hot reload.

mod common;

use common::{resolver, write};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use tierconf::{ConfigChangeEvent, ConfigRequest, WatchOptions, watch_config};

#[tokio::test]
async fn test_edit_triggers_reload() {
    let project = TempDir::new().unwrap();
    let file = write(project.path(), "myapp.config.json", r#"{"port": 1}"#);
    let request = ConfigRequest::new("myapp", json!({"port": 0, "host": "h"})).cwd(project.path());

    let mut live = watch_config(
        resolver(&[], None),
        request,
        WatchOptions {
            debounce: Duration::from_millis(100),
        },
    )
    .await
    .unwrap();
    assert_eq!(*live.get(), json!({"port": 1, "host": "h"}));
    assert!(live.watched_dirs().contains(&project.path().to_path_buf()));

    std::fs::write(&file, r#"{"port": 2000}"#).unwrap();

    // A write can surface as truncate-then-fill; the empty file in between fails to load.
    let reloaded = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match live.wait_for_change().await {
                Some(ConfigChangeEvent::Reloaded(paths)) => return paths,
                Some(ConfigChangeEvent::ReloadFailed { .. }) => continue,
                other => panic!("unexpected event: {other:?}"),
            }
        }
    })
    .await
    .expect("no reload within timeout");

    assert!(reloaded.iter().any(|p| p.ends_with("myapp.config.json")));
    assert_eq!(*live.get(), json!({"port": 2000, "host": "h"}));
}

#[tokio::test]
async fn test_broken_edit_keeps_previous_config() {
    let project = TempDir::new().unwrap();
    let file = write(project.path(), "myapp.config.json", r#"{"port": 1}"#);
    let request = ConfigRequest::new("myapp", json!({"port": 0})).cwd(project.path());

    let mut live = watch_config(
        resolver(&[], None),
        request,
        WatchOptions {
            debounce: Duration::from_millis(100),
        },
    )
    .await
    .unwrap();

    std::fs::write(&file, "{ not json").unwrap();

    let event = tokio::time::timeout(Duration::from_secs(10), live.wait_for_change())
        .await
        .expect("no event within timeout");
    assert!(matches!(event, Some(ConfigChangeEvent::ReloadFailed { .. })));
    assert_eq!(*live.get(), json!({"port": 1}));
}
