//! Integration tests for loading routing tables from inline JSON and files

use siteroute::config::RoutingSource;
use siteroute::error::ConfigLoadError;
use siteroute::routing::RoutingTable;
use std::error::Error as _;
use std::io::Write;
use tempfile::NamedTempFile;

fn routing_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("should create temp file");
    file.write_all(content.as_bytes())
        .expect("should write routing file");
    file
}

#[test]
fn test_file_source_loads_entries() {
    let file = routing_file(
        r#"{
            "42": {"model": "gpt-35-turbo", "api_key": "sk-station"},
            "DEFAULT": {"temperature": 0.4, "comment": "ignored"}
        }"#,
    );

    let table = RoutingTable::load(&RoutingSource::File(file.path().to_path_buf()))
        .expect("valid routing file");

    assert_eq!(table.len(), 2);
    assert_eq!(table.wildcard_key(), Some("DEFAULT"));
    let entry = table.entry("42").expect("entry for station 42");
    assert_eq!(entry.model.as_deref(), Some("gpt-35-turbo"));
    assert_eq!(
        entry.api_key.as_ref().map(|k| k.expose_secret()),
        Some("sk-station")
    );
}

#[test]
fn test_invalid_json_file_fails_load() {
    let file = routing_file(r#"{"42": {"model": "gpt-35-turbo""#);

    let err = RoutingTable::from_file(file.path()).unwrap_err();
    match &err {
        ConfigLoadError::RoutingParse { origin, .. } => {
            assert_eq!(origin, &file.path().display().to_string());
        }
        other => panic!("expected RoutingParse, got {:?}", other),
    }
    assert!(
        err.source()
            .is_some_and(|s| s.downcast_ref::<serde_json::Error>().is_some())
    );
}

#[test]
fn test_missing_file_fails_load_with_io_source() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let missing = dir.path().join("routing.json");

    let err = RoutingTable::load(&RoutingSource::File(missing.clone())).unwrap_err();
    assert!(matches!(err, ConfigLoadError::RoutingFileRead { .. }));
    assert!(err.to_string().contains(&missing.display().to_string()));

    let io = err
        .source()
        .and_then(|s| s.downcast_ref::<std::io::Error>())
        .expect("io error source");
    assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
}

#[test]
fn test_empty_file_is_a_parse_error_not_an_empty_table() {
    let file = routing_file("");
    assert!(matches!(
        RoutingTable::from_file(file.path()),
        Err(ConfigLoadError::RoutingParse { .. })
    ));
}

#[test]
fn test_type_mismatch_fails_whole_load() {
    let err = RoutingTable::from_json_str(
        r#"{"1": {"model": "ok"}, "2": {"temperature": "warm"}}"#,
        "inline",
    )
    .unwrap_err();

    match err {
        ConfigLoadError::InvalidRoutingEntry { key, .. } => assert_eq!(key, "2"),
        other => panic!("expected InvalidRoutingEntry, got {:?}", other),
    }
}

#[test]
fn test_non_object_entry_fails_load() {
    let err = RoutingTable::from_json_str(r#"{"1": "gpt-4o"}"#, "inline").unwrap_err();
    assert!(matches!(err, ConfigLoadError::InvalidRoutingEntry { ref key, .. } if key == "1"));
    assert!(err.to_string().contains("expected a JSON object"));
}

#[test]
fn test_out_of_range_values_fail_load() {
    for json in [
        r#"{"1": {"timeout": 0}}"#,
        r#"{"1": {"timeout": 301}}"#,
        r#"{"1": {"temperature": 2.5}}"#,
        r#"{"1": {"base_url": "ftp://example.com"}}"#,
        r#"{"1": {"model": "  "}}"#,
        r#"{"1": {"api_key": ""}}"#,
    ] {
        assert!(
            matches!(
                RoutingTable::from_json_str(json, "inline"),
                Err(ConfigLoadError::InvalidRoutingEntry { .. })
            ),
            "expected rejection for {}",
            json
        );
    }
}

#[test]
fn test_both_wildcard_keys_are_ambiguous() {
    let err = RoutingTable::from_json_str(
        r#"{"*": {"model": "a"}, "default": {"model": "b"}}"#,
        "inline",
    )
    .unwrap_err();

    match err {
        ConfigLoadError::AmbiguousWildcard { keys } => {
            assert_eq!(keys, vec!["*".to_string(), "default".to_string()]);
        }
        other => panic!("expected AmbiguousWildcard, got {:?}", other),
    }
}

#[test]
fn test_duplicate_keys_fail_load() {
    let err = RoutingTable::from_json_str(
        r#"{"42": {"model": "a"}, "42": {"model": "b"}}"#,
        "inline",
    )
    .unwrap_err();
    assert!(matches!(err, ConfigLoadError::DuplicateRoutingKey { ref key } if key == "42"));
}

#[test]
fn test_null_fields_count_as_absent() {
    let table = RoutingTable::from_json_str(
        r#"{"42": {"model": null, "temperature": 0.9}}"#,
        "inline",
    )
    .expect("valid table");
    let entry = table.entry("42").expect("entry");
    assert_eq!(entry.model, None);
    assert_eq!(entry.temperature, Some(0.9));
}

#[test]
fn test_no_source_is_an_empty_table() {
    let table = RoutingTable::load(&RoutingSource::None).expect("empty table");
    assert!(table.is_empty());
    assert!(table.wildcard().is_none());
}
