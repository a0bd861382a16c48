//! Configuration types and built-in defaults.
//!
//! Every type here is a *partial* view: a layer file may set any subset of
//! fields, and an empty string / zero / `None` means "not specified" to the
//! merge engine.

use super::resources::ResourceSelection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Versions understood by the schema validator and the migration engine, in order.
pub const SUPPORTED_VERSIONS: &[&str] = &["1.0", "1.1", "2.0"];

/// Newest configuration version.
pub const CURRENT_VERSION: &str = "2.0";

/// Version assumed when nothing declares one.
pub const DEFAULT_VERSION: &str = "1.0";

/// Upstream library repository used when no layer names one.
pub const DEFAULT_REPOSITORY_URL: &str = "https://github.com/easel/ddx";

pub(crate) fn is_zero(value: &i64) -> bool {
    *value == 0
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

/// Root configuration aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Two-part version string ("1.0", "1.1", "2.0").
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Location of the template/pattern/prompt library.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_path: Option<String>,

    /// Primary upstream repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,

    /// Additional named upstreams.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub repositories: BTreeMap<String, Repository>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    /// Per-asset-type include/exclude filters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSelection>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    /// Role name to persona name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub persona_bindings: BTreeMap<String, String>,
}

/// Repository configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,

    /// Subtree path inside the project.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub remote: String,

    /// "ssh" or "https".
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,

    /// 0..=100, only meaningful for named repositories.
    #[serde(skip_serializing_if = "is_zero")]
    pub priority: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncConfig>,
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token_file: String,
}

/// Proxy configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub no_proxy: String,
}

/// Synchronization policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// never, manual, hourly, daily or weekly.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub frequency: String,
    #[serde(skip_serializing_if = "is_false")]
    pub auto_update: bool,
    /// Seconds, 0..=3600.
    #[serde(skip_serializing_if = "is_zero")]
    pub timeout: i64,
    /// 0..=10.
    #[serde(skip_serializing_if = "is_zero")]
    pub retry_count: i64,
    #[serde(skip_serializing_if = "is_false")]
    pub checksum: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub force_update: bool,
}

impl Config {
    /// Built-in defaults, the lowest-precedence layer.
    pub fn defaults() -> Self {
        let mut variables = BTreeMap::new();
        variables.insert("ai_model".to_string(), "claude-3-opus".to_string());
        // Populated from git config or the environment by callers.
        variables.insert("author".to_string(), String::new());
        variables.insert("email".to_string(), String::new());

        Self {
            version: DEFAULT_VERSION.to_string(),
            library_path: None,
            repository: Some(Repository {
                url: DEFAULT_REPOSITORY_URL.to_string(),
                branch: "main".to_string(),
                path: ".ddx/".to_string(),
                ..Default::default()
            }),
            repositories: BTreeMap::new(),
            includes: vec![
                "prompts/claude".to_string(),
                "scripts/hooks".to_string(),
                "templates/common".to_string(),
            ],
            resources: None,
            overrides: BTreeMap::new(),
            variables,
            persona_bindings: BTreeMap::new(),
        }
    }

    /// The repository, or an empty one if unset.
    pub fn repository_or_default(&self) -> Repository {
        self.repository.clone().unwrap_or_default()
    }
}

/// Whether `version` is one of [`SUPPORTED_VERSIONS`].
pub fn is_supported_version(version: &str) -> bool {
    SUPPORTED_VERSIONS.contains(&version)
}

/// Position of `version` in [`SUPPORTED_VERSIONS`].
pub fn version_index(version: &str) -> Option<usize> {
    SUPPORTED_VERSIONS.iter().position(|v| *v == version)
}
