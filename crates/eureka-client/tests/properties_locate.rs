//! Tests for locating configuration resources on disk

use eureka_client::{ConfigProperties, Error};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_locates_first_matching_extension() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(
        dir.path().join("eureka-client.yaml"),
        "hazelcast:\n  name: from-yaml\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("eureka-client.properties"),
        "hazelcast.name=from-properties\n",
    )
    .unwrap();

    let properties =
        ConfigProperties::locate_in("eureka-client", &[dir.path().to_path_buf()]).unwrap();
    assert_eq!(properties.get("hazelcast.name"), Some("from-properties"));
}

#[test]
fn test_later_directories_are_searched() {
    let empty = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("custom.json"),
        r#"{"hazelcast": {"serviceUrl": {"default": "http://a/eureka/v2/"}}}"#,
    )
    .unwrap();

    let properties = ConfigProperties::locate_in(
        "custom",
        &[empty.path().to_path_buf(), dir.path().to_path_buf()],
    )
    .unwrap();
    assert_eq!(
        properties.get("hazelcast.serviceUrl.default"),
        Some("http://a/eureka/v2/")
    );
}

#[test]
fn test_missing_resource_reports_search_path() {
    let dir = TempDir::new().unwrap();

    let err = ConfigProperties::locate_in("absent", &[dir.path().to_path_buf()]).unwrap_err();
    match err {
        Error::MissingResource { name, searched } => {
            assert!(name.starts_with("absent."));
            assert_eq!(searched, vec![dir.path().to_path_buf()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}
