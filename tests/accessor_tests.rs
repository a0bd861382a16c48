//! Dot-notation get/set over the public API.

use ddx_config::config::{Config, settable_keys};
use proptest::prelude::*;
use serde_json::{Value, json};

fn sample_value(key: &str) -> (&'static str, Value) {
    match key.rsplit('.').next().unwrap_or(key) {
        "auto_update" | "checksum" | "force_update" => ("true", json!(true)),
        "priority" | "timeout" | "retry_count" => ("42", json!(42)),
        "includes" => ("a, b", json!(["a", "b"])),
        _ => ("sample", json!("sample")),
    }
}

#[test]
fn test_every_settable_key_reads_back() {
    for key in settable_keys() {
        let mut config = Config::default();
        let (raw, expected) = sample_value(key);
        config
            .set_nested_value(key, raw)
            .unwrap_or_else(|e| panic!("set {} failed: {}", key, e));
        assert_eq!(config.get_nested_value(key).unwrap(), expected, "key {}", key);
    }
}

#[test]
fn test_set_creates_missing_sub_objects() {
    let mut config = Config::default();
    assert!(config.get_nested_value("repository.proxy.url").is_err());

    config
        .set_nested_value("repository.proxy.url", "http://proxy:8080")
        .unwrap();
    assert_eq!(
        config.repository.as_ref().unwrap().proxy.as_ref().unwrap().url,
        "http://proxy:8080"
    );
}

#[test]
fn test_non_string_values_are_formatted() {
    let mut config = Config::default();
    config.set_nested_value("variables.retries", 3).unwrap();
    config.set_nested_value("repository.branch", true).unwrap();
    assert_eq!(config.get_nested_value("variables.retries").unwrap(), "3");
    assert_eq!(config.get_nested_value("repository.branch").unwrap(), "true");
}

#[test]
fn test_bad_coercion_is_an_error() {
    let mut config = Config::default();
    let err = config
        .set_nested_value("repository.sync.timeout", "soon")
        .unwrap_err();
    assert_eq!(err.phase(), "accessor");
    assert!(config.set_nested_value("repository.nope", "x").is_err());
    assert!(config.set_nested_value("variables.", "x").is_err());
}

#[test]
fn test_overrides_and_persona_bindings() {
    let mut config = Config::default();
    config.set_nested_value("overrides.editor", "vim").unwrap();
    config
        .set_nested_value("persona_bindings.architect", "systems-architect")
        .unwrap();
    assert_eq!(config.overrides["editor"], "vim");
    assert_eq!(
        config.get_nested_value("persona_bindings.architect").unwrap(),
        "systems-architect"
    );
}

proptest! {
    #[test]
    fn prop_variable_set_then_get(
        name in "[A-Za-z_][A-Za-z0-9_]{0,20}",
        value in "[ -~]{0,64}",
    ) {
        let mut config = Config::defaults();
        let key = format!("variables.{}", name);
        config.set_nested_value(&key, value.as_str()).unwrap();
        prop_assert_eq!(config.get_nested_value(&key).unwrap(), Value::String(value));
    }

    #[test]
    fn prop_int_fields_accept_numeric_strings(timeout in 0i64..=3600) {
        let mut config = Config::default();
        config
            .set_nested_value("repository.sync.timeout", timeout.to_string())
            .unwrap();
        prop_assert_eq!(
            config.get_nested_value("repository.sync.timeout").unwrap(),
            json!(timeout)
        );
    }
}
