//! Dot-notation access to configuration fields.
//!
//! Known paths (`repository.url`, `repository.sync.timeout`, ...) go through a
//! static table of typed getters and setters. `variables.<name>`,
//! `overrides.<name>` and `persona_bindings.<name>` address map entries
//! directly. Reads of any other path walk the serialized tree, so nested
//! values like `repositories.extra.url` can be inspected but not written.
//!
//! Setters coerce: strings parse into integer and boolean fields, and any
//! value assigned to a string field is formatted as a string.

use super::types::{AuthConfig, Config, ProxyConfig, Repository, SyncConfig};
use super::validate::is_valid_variable_name;
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

type Getter = fn(&Config) -> Option<Value>;
type Setter = fn(&mut Config, &Value) -> std::result::Result<(), String>;

struct FieldAccessor {
    path: &'static str,
    get: Getter,
    set: Setter,
}

fn root(c: &Config) -> Option<&Config> {
    Some(c)
}
fn root_mut(c: &mut Config) -> &mut Config {
    c
}
fn repo(c: &Config) -> Option<&Repository> {
    c.repository.as_ref()
}
fn repo_mut(c: &mut Config) -> &mut Repository {
    c.repository.get_or_insert_with(Repository::default)
}
fn auth(c: &Config) -> Option<&AuthConfig> {
    repo(c)?.auth.as_ref()
}
fn auth_mut(c: &mut Config) -> &mut AuthConfig {
    repo_mut(c).auth.get_or_insert_with(AuthConfig::default)
}
fn proxy(c: &Config) -> Option<&ProxyConfig> {
    repo(c)?.proxy.as_ref()
}
fn proxy_mut(c: &mut Config) -> &mut ProxyConfig {
    repo_mut(c).proxy.get_or_insert_with(ProxyConfig::default)
}
fn sync(c: &Config) -> Option<&SyncConfig> {
    repo(c)?.sync.as_ref()
}
fn sync_mut(c: &mut Config) -> &mut SyncConfig {
    repo_mut(c).sync.get_or_insert_with(SyncConfig::default)
}

macro_rules! string_field {
    ($path:literal, $owner:ident, $owner_mut:ident, $field:ident) => {
        FieldAccessor {
            path: $path,
            get: |c| $owner(c).map(|o| Value::String(o.$field.clone())),
            set: |c, v| {
                $owner_mut(c).$field = coerce_string(v);
                Ok(())
            },
        }
    };
}

macro_rules! int_field {
    ($path:literal, $owner:ident, $owner_mut:ident, $field:ident) => {
        FieldAccessor {
            path: $path,
            get: |c| $owner(c).map(|o| Value::from(o.$field)),
            set: |c, v| {
                $owner_mut(c).$field = coerce_int(v)?;
                Ok(())
            },
        }
    };
}

macro_rules! bool_field {
    ($path:literal, $owner:ident, $owner_mut:ident, $field:ident) => {
        FieldAccessor {
            path: $path,
            get: |c| $owner(c).map(|o| Value::Bool(o.$field)),
            set: |c, v| {
                $owner_mut(c).$field = coerce_bool(v)?;
                Ok(())
            },
        }
    };
}

static FIELDS: &[FieldAccessor] = &[
    string_field!("version", root, root_mut, version),
    FieldAccessor {
        path: "library_path",
        get: |c| c.library_path.clone().map(Value::String),
        set: |c, v| {
            let path = coerce_string(v);
            c.library_path = (!path.is_empty()).then_some(path);
            Ok(())
        },
    },
    FieldAccessor {
        path: "includes",
        get: |c| Some(Value::from(c.includes.clone())),
        set: |c, v| {
            c.includes = coerce_list(v);
            Ok(())
        },
    },
    string_field!("repository.url", repo, repo_mut, url),
    string_field!("repository.branch", repo, repo_mut, branch),
    string_field!("repository.path", repo, repo_mut, path),
    string_field!("repository.remote", repo, repo_mut, remote),
    string_field!("repository.protocol", repo, repo_mut, protocol),
    int_field!("repository.priority", repo, repo_mut, priority),
    string_field!("repository.auth.method", auth, auth_mut, method),
    string_field!("repository.auth.key_path", auth, auth_mut, key_path),
    string_field!("repository.auth.token", auth, auth_mut, token),
    string_field!("repository.auth.username", auth, auth_mut, username),
    string_field!("repository.auth.password", auth, auth_mut, password),
    string_field!("repository.auth.token_file", auth, auth_mut, token_file),
    string_field!("repository.proxy.url", proxy, proxy_mut, url),
    string_field!("repository.proxy.auth", proxy, proxy_mut, auth),
    string_field!("repository.proxy.username", proxy, proxy_mut, username),
    string_field!("repository.proxy.password", proxy, proxy_mut, password),
    string_field!("repository.proxy.no_proxy", proxy, proxy_mut, no_proxy),
    string_field!("repository.sync.frequency", sync, sync_mut, frequency),
    bool_field!("repository.sync.auto_update", sync, sync_mut, auto_update),
    int_field!("repository.sync.timeout", sync, sync_mut, timeout),
    int_field!("repository.sync.retry_count", sync, sync_mut, retry_count),
    bool_field!("repository.sync.checksum", sync, sync_mut, checksum),
    bool_field!("repository.sync.force_update", sync, sync_mut, force_update),
];

/// Map sections addressed as `<section>.<key>`.
pub const MAP_SECTIONS: &[&str] = &["variables", "overrides", "persona_bindings"];

/// Every path [`Config::set_nested_value`] accepts besides map entries.
pub fn settable_keys() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().map(|f| f.path)
}

fn lookup(key: &str) -> Option<&'static FieldAccessor> {
    FIELDS.iter().find(|f| f.path == key)
}

fn split_map_key(key: &str) -> Option<(&str, &str)> {
    let (section, name) = key.split_once('.')?;
    MAP_SECTIONS.contains(&section).then_some((section, name))
}

impl Config {
    fn section(&self, section: &str) -> Option<&BTreeMap<String, String>> {
        match section {
            "variables" => Some(&self.variables),
            "overrides" => Some(&self.overrides),
            "persona_bindings" => Some(&self.persona_bindings),
            _ => None,
        }
    }

    fn section_mut(&mut self, section: &str) -> Option<&mut BTreeMap<String, String>> {
        match section {
            "variables" => Some(&mut self.variables),
            "overrides" => Some(&mut self.overrides),
            "persona_bindings" => Some(&mut self.persona_bindings),
            _ => None,
        }
    }

    /// Read the value at a dot-separated path.
    ///
    /// ```
    /// use ddx_config::config::Config;
    ///
    /// let config = Config::defaults();
    /// assert_eq!(config.get_nested_value("repository.branch").unwrap(), "main");
    /// assert!(config.get_nested_value("repository.nope").is_err());
    /// ```
    pub fn get_nested_value(&self, key: &str) -> Result<Value> {
        if key.is_empty() {
            return Err(Error::accessor(key, "key is empty"));
        }

        if let Some((section, name)) = split_map_key(key) {
            return self
                .section(section)
                .and_then(|map| map.get(name))
                .map(|v| Value::String(v.clone()))
                .ok_or_else(|| Error::accessor(key, format!("key '{}' not found in {}", name, section)));
        }

        if let Some(field) = lookup(key) {
            return (field.get)(self).ok_or_else(|| Error::accessor(key, "field is not set"));
        }

        let tree = serde_json::to_value(self)?;
        key.split('.')
            .try_fold(&tree, |node, segment| match node {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
            .cloned()
            .ok_or_else(|| Error::accessor(key, "field not found"))
    }

    /// Write `value` at a dot-separated path, creating parent objects as needed.
    pub fn set_nested_value(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if key.is_empty() {
            return Err(Error::accessor(key, "key is empty"));
        }

        if let Some((section, name)) = split_map_key(key) {
            if name.is_empty() {
                return Err(Error::accessor(key, format!("missing key after '{}.'", section)));
            }
            if name.contains('.') {
                return Err(Error::accessor(
                    key,
                    format!("{} entries are flat; '{}' cannot contain '.'", section, name),
                ));
            }
            if section != "persona_bindings" && !is_valid_variable_name(name) {
                return Err(Error::accessor(
                    key,
                    format!(
                        "invalid name '{}': use only letters, numbers, and underscores",
                        name
                    ),
                ));
            }
            if let Some(map) = self.section_mut(section) {
                map.insert(name.to_string(), coerce_string(&value));
            }
            return Ok(());
        }

        match lookup(key) {
            Some(field) => (field.set)(self, &value).map_err(|message| Error::accessor(key, message)),
            None => Err(Error::accessor(key, "field not found or not settable")),
        }
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn coerce_int(value: &Value) -> std::result::Result<i64, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("expected an integer, got {}", n)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("expected an integer, got '{}'", s)),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(format!("expected an integer, got {}", other)),
    }
}

fn coerce_bool(value: &Value) -> std::result::Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(format!("expected a boolean, got '{}'", s)),
        },
        Value::Number(n) => Ok(n.as_i64().is_some_and(|i| i != 0)),
        other => Err(format!("expected a boolean, got {}", other)),
    }
}

fn coerce_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(coerce_string).collect(),
        Value::Null => Vec::new(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        other => vec![coerce_string(other)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_typed_fields() {
        let config = Config::defaults();
        assert_eq!(config.get_nested_value("version").unwrap(), json!("1.0"));
        assert_eq!(
            config.get_nested_value("repository.url").unwrap(),
            json!("https://github.com/easel/ddx")
        );
        assert_eq!(config.get_nested_value("includes").unwrap().as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_get_map_entries() {
        let config = Config::defaults();
        assert_eq!(
            config.get_nested_value("variables.ai_model").unwrap(),
            json!("claude-3-opus")
        );
        let err = config.get_nested_value("variables.missing").unwrap_err();
        assert_eq!(err.phase(), "accessor");
    }

    #[test]
    fn test_get_unset_sub_object_fails() {
        let config = Config::defaults();
        assert!(config.get_nested_value("repository.auth.method").is_err());
        assert!(config.get_nested_value("").is_err());
        assert!(config.get_nested_value("nonexistent").is_err());
    }

    #[test]
    fn test_get_falls_back_to_tree() {
        let mut config = Config::defaults();
        config.repositories.insert(
            "extra".into(),
            Repository {
                url: "https://x".into(),
                ..Default::default()
            },
        );
        assert_eq!(
            config.get_nested_value("repositories.extra.url").unwrap(),
            json!("https://x")
        );
        assert_eq!(config.get_nested_value("includes.0").unwrap(), json!("prompts/claude"));
        assert!(config.get_nested_value("variables").unwrap().is_object());
    }

    #[test]
    fn test_set_creates_sub_objects() {
        let mut config = Config::default();
        config.set_nested_value("repository.sync.timeout", "30").unwrap();
        config.set_nested_value("repository.sync.auto_update", "true").unwrap();
        let sync = config.repository.as_ref().unwrap().sync.as_ref().unwrap();
        assert_eq!(sync.timeout, 30);
        assert!(sync.auto_update);
    }

    #[test]
    fn test_set_coerces_to_string() {
        let mut config = Config::default();
        config.set_nested_value("variables.count", 5).unwrap();
        config.set_nested_value("repository.branch", true).unwrap();
        assert_eq!(config.variables["count"], "5");
        assert_eq!(config.repository.unwrap().branch, "true");
    }

    #[test]
    fn test_set_rejects_bad_coercion_and_unknown_keys() {
        let mut config = Config::default();
        assert!(config.set_nested_value("repository.priority", "high").is_err());
        assert!(config.set_nested_value("repository.nope", "x").is_err());
        assert!(config.set_nested_value("variables.", "x").is_err());
        assert!(config.set_nested_value("", "x").is_err());
        assert!(config.set_nested_value("repositories.extra.url", "x").is_err());
    }

    #[test]
    fn test_set_rejects_invalid_map_keys() {
        let mut config = Config::default();
        for key in ["variables.a.b", "variables.123invalid", "overrides.bad-name"] {
            let err = config.set_nested_value(key, "x").unwrap_err();
            assert_eq!(err.phase(), "accessor");
            assert!(err.to_string().contains(key), "{key}: {err}");
        }
        assert!(config.set_nested_value("persona_bindings.a.b", "x").is_err());
        assert!(config.variables.is_empty());
        assert!(config.overrides.is_empty());

        config.set_nested_value("persona_bindings.code-reviewer", "strict").unwrap();
    }

    #[test]
    fn test_set_then_get_roundtrips() {
        let cases = [
            ("version", json!("2.0")),
            ("library_path", json!("./library")),
            ("repository.url", json!("https://example.com/r.git")),
            ("repository.priority", json!(7)),
            ("repository.auth.method", json!("token")),
            ("repository.proxy.url", json!("http://proxy:8080")),
            ("repository.sync.checksum", json!(true)),
            ("overrides.template", json!("custom")),
            ("persona_bindings.code_reviewer", json!("strict-reviewer")),
            ("includes", json!(["a", "b"])),
        ];
        for (key, value) in cases {
            let mut config = Config::default();
            config.set_nested_value(key, value.clone()).unwrap();
            assert_eq!(config.get_nested_value(key).unwrap(), value, "{key}");
        }
    }

    #[test]
    fn test_every_table_path_is_readable_after_set() {
        for key in settable_keys() {
            let mut config = Config::default();
            let value = match key {
                "repository.priority" | "repository.sync.timeout" | "repository.sync.retry_count" => json!(3),
                k if k.ends_with("auto_update") || k.ends_with("checksum") || k.ends_with("force_update") => {
                    json!(true)
                }
                "includes" => json!(["x"]),
                _ => json!("value"),
            };
            config.set_nested_value(key, value.clone()).unwrap();
            assert_eq!(config.get_nested_value(key).unwrap(), value, "{key}");
        }
    }
}
