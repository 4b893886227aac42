//! Integration tests for startup configuration
//!
//! Uses `Settings::from_lookup` so tests never touch the process environment.

use siteroute::config::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, ENV_API_KEY, ENV_FORCE_JSON, ENV_LOG_LEVEL, ENV_MODEL,
    ENV_OPENAI_API_KEY, ENV_ROUTING_FILE, ENV_ROUTING_TABLE, ENV_TEMPERATURE, ENV_TIMEOUT,
    RoutingSource, Settings,
};
use siteroute::error::{AppError, ConfigLoadError};
use std::collections::HashMap;
use std::io::Write;

fn settings(vars: &[(&str, &str)]) -> Settings {
    let env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Settings::from_lookup(move |key| env.get(key).cloned())
}

#[test]
fn test_empty_environment_uses_literal_defaults() {
    let settings = settings(&[]);
    let defaults = &settings.defaults;

    assert!(!defaults.has_credential());
    assert_eq!(defaults.base_url, DEFAULT_BASE_URL);
    assert_eq!(defaults.model, DEFAULT_MODEL);
    assert_eq!(defaults.timeout_seconds, 30.0);
    assert_eq!(defaults.temperature, 0.3);
    assert!(defaults.force_json);
    assert_eq!(settings.routing_source, RoutingSource::None);
}

#[test]
fn test_openai_key_is_a_fallback_credential() {
    let only_openai = settings(&[(ENV_OPENAI_API_KEY, "sk-openai")]);
    assert_eq!(
        only_openai
            .defaults
            .api_key
            .as_ref()
            .map(|k| k.expose_secret()),
        Some("sk-openai")
    );

    let both = settings(&[(ENV_API_KEY, "sk-llm"), (ENV_OPENAI_API_KEY, "sk-openai")]);
    assert_eq!(
        both.defaults.api_key.as_ref().map(|k| k.expose_secret()),
        Some("sk-llm")
    );
}

#[test]
fn test_blank_values_count_as_unset() {
    let settings = settings(&[(ENV_API_KEY, "   "), (ENV_MODEL, "")]);
    assert!(!settings.defaults.has_credential());
    assert_eq!(settings.defaults.model, DEFAULT_MODEL);
}

#[test]
fn test_unparseable_or_out_of_range_numbers_use_defaults() {
    let invalid = settings(&[(ENV_TIMEOUT, "soon"), (ENV_TEMPERATURE, "9.5")]);
    assert_eq!(invalid.defaults.timeout_seconds, 30.0);
    assert_eq!(invalid.defaults.temperature, 0.3);

    let out_of_range = settings(&[(ENV_TIMEOUT, "301")]);
    assert_eq!(out_of_range.defaults.timeout_seconds, 30.0);

    let valid = settings(&[(ENV_TIMEOUT, "12.5"), (ENV_TEMPERATURE, "0")]);
    assert_eq!(valid.defaults.timeout_seconds, 12.5);
    assert_eq!(valid.defaults.temperature, 0.0);
}

#[test]
fn test_force_json_flag_values() {
    for (raw, expected) in [
        ("false", false),
        ("FALSE", false),
        ("0", false),
        ("no", false),
        ("true", true),
        ("1", true),
        ("yes", true),
    ] {
        assert_eq!(
            settings(&[(ENV_FORCE_JSON, raw)]).defaults.force_json,
            expected,
            "for {}",
            raw
        );
    }
}

#[test]
fn test_inline_table_wins_over_file() {
    let settings = settings(&[
        (ENV_ROUTING_TABLE, r#"{"42": {"model": "inline"}}"#),
        (ENV_ROUTING_FILE, "/nonexistent/routing.json"),
    ]);
    assert!(matches!(settings.routing_source, RoutingSource::Inline(_)));

    let resolver = settings
        .build_resolver()
        .expect("inline table should load without reading the file");
    assert_eq!(resolver.resolve("42").model(), "inline");
}

#[test]
fn test_build_resolver_from_routing_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(br#"{"default": {"model": "routed"}}"#)
        .expect("write routing file");
    let path = file.path().display().to_string();

    let resolver = settings(&[(ENV_API_KEY, "sk-test"), (ENV_ROUTING_FILE, &path)])
        .build_resolver()
        .expect("valid routing file");

    let resolved = resolver.resolve("anything");
    assert_eq!(resolved.model(), "routed");
    assert!(resolved.has_credential());
}

#[test]
fn test_invalid_routing_file_aborts_startup() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(b"{ not json").expect("write routing file");
    let path = file.path().display().to_string();

    let err = settings(&[(ENV_ROUTING_FILE, &path)])
        .build_resolver()
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::ConfigLoad(ConfigLoadError::RoutingParse { .. })
    ));
}

#[test]
fn test_tilde_in_routing_file_is_expanded() {
    let settings = settings(&[(ENV_ROUTING_FILE, "~/routing.json")]);
    match settings.routing_source {
        RoutingSource::File(path) => assert!(!path.starts_with("~")),
        other => panic!("expected file source, got {:?}", other),
    }
}

#[test]
fn test_log_level_drives_telemetry_init() {
    let settings = settings(&[(ENV_LOG_LEVEL, "debug")]);
    assert_eq!(
        siteroute::telemetry::default_directive(&settings.observability.log_level),
        "siteroute=debug,reqwest=warn"
    );

    settings.init_telemetry();
    settings.init_telemetry();
    tracing::debug!("telemetry initialised from settings");
}
