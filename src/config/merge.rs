//! Layer merging.
//!
//! Combines partial configurations field-by-field, with the overlay taking
//! precedence over the base:
//! - Scalars: overlay wins if it is non-empty / non-zero
//! - Lists (`includes`): base entries, then overlay entries not already present
//! - Maps (`variables`, `overrides`, `persona_bindings`, `repositories`): union, overlay keys win
//! - Sub-objects (`repository.auth/proxy/sync`, each `resources.<kind>`): replaced
//!   wholesale when the overlay has one, never merged field-by-field

use super::resources::ResourceSelection;
use super::types::{Config, Repository};
use std::collections::BTreeMap;

impl Config {
    /// Merge `other` on top of `self`, returning a new configuration.
    ///
    /// # Example
    /// ```
    /// use ddx_config::config::Config;
    ///
    /// let base = Config {
    ///     version: "1.0".into(),
    ///     includes: vec!["a".into(), "b".into()],
    ///     ..Default::default()
    /// };
    /// let overlay = Config {
    ///     includes: vec!["b".into(), "c".into()],
    ///     ..Default::default()
    /// };
    /// let merged = base.merge(&overlay);
    /// assert_eq!(merged.version, "1.0");
    /// assert_eq!(merged.includes, vec!["a", "b", "c"]);
    /// ```
    pub fn merge(&self, other: &Config) -> Config {
        Config {
            version: merge_string(&self.version, &other.version),
            library_path: merge_option_string(&self.library_path, &other.library_path),
            repository: merge_repository(self.repository.as_ref(), other.repository.as_ref()),
            repositories: merge_map(&self.repositories, &other.repositories),
            includes: union_list(&self.includes, &other.includes),
            resources: merge_resources(self.resources.as_ref(), other.resources.as_ref()),
            overrides: merge_map(&self.overrides, &other.overrides),
            variables: merge_map(&self.variables, &other.variables),
            persona_bindings: merge_map(&self.persona_bindings, &other.persona_bindings),
        }
    }
}

/// Merge layers in order, later layers taking precedence.
///
/// Equivalent to folding [`Config::merge`] over the list.
pub fn merge_all<'a>(layers: impl IntoIterator<Item = &'a Config>) -> Config {
    layers
        .into_iter()
        .fold(Config::default(), |acc, layer| acc.merge(layer))
}

fn merge_string(base: &str, overlay: &str) -> String {
    if overlay.is_empty() {
        base.to_string()
    } else {
        overlay.to_string()
    }
}

fn merge_option_string(base: &Option<String>, overlay: &Option<String>) -> Option<String> {
    match overlay {
        Some(value) if !value.is_empty() => Some(value.clone()),
        _ => base.clone(),
    }
}

fn merge_int(base: i64, overlay: i64) -> i64 {
    if overlay != 0 { overlay } else { base }
}

fn replace_if_some<T: Clone>(base: &Option<T>, overlay: &Option<T>) -> Option<T> {
    overlay.clone().or_else(|| base.clone())
}

/// Base entries followed by unseen overlay entries; first occurrence wins.
pub fn union_list(base: &[String], overlay: &[String]) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(base.len() + overlay.len());
    for item in base.iter().chain(overlay) {
        if !result.contains(item) {
            result.push(item.clone());
        }
    }
    result
}

fn merge_map<V: Clone>(
    base: &BTreeMap<String, V>,
    overlay: &BTreeMap<String, V>,
) -> BTreeMap<String, V> {
    let mut result = base.clone();
    for (key, value) in overlay {
        result.insert(key.clone(), value.clone());
    }
    result
}

fn merge_repository(base: Option<&Repository>, overlay: Option<&Repository>) -> Option<Repository> {
    match (base, overlay) {
        (None, None) => None,
        (Some(base), None) => Some(base.clone()),
        (None, Some(overlay)) => Some(overlay.clone()),
        (Some(base), Some(overlay)) => Some(Repository {
            url: merge_string(&base.url, &overlay.url),
            branch: merge_string(&base.branch, &overlay.branch),
            path: merge_string(&base.path, &overlay.path),
            remote: merge_string(&base.remote, &overlay.remote),
            protocol: merge_string(&base.protocol, &overlay.protocol),
            priority: merge_int(base.priority, overlay.priority),
            auth: replace_if_some(&base.auth, &overlay.auth),
            proxy: replace_if_some(&base.proxy, &overlay.proxy),
            sync: replace_if_some(&base.sync, &overlay.sync),
        }),
    }
}

fn merge_resources(
    base: Option<&ResourceSelection>,
    overlay: Option<&ResourceSelection>,
) -> Option<ResourceSelection> {
    match (base, overlay) {
        (None, None) => None,
        (Some(base), None) => Some(base.clone()),
        (None, Some(overlay)) => Some(overlay.clone()),
        (Some(base), Some(overlay)) => Some(ResourceSelection {
            prompts: replace_if_some(&base.prompts, &overlay.prompts),
            templates: replace_if_some(&base.templates, &overlay.templates),
            patterns: replace_if_some(&base.patterns, &overlay.patterns),
            configs: replace_if_some(&base.configs, &overlay.configs),
            scripts: replace_if_some(&base.scripts, &overlay.scripts),
            workflows: replace_if_some(&base.workflows, &overlay.workflows),
        }),
    }
}
