//! Configuration loader with tier-based merging.
//!
//! Each tier that exists on disk is read, checked, normalized and typed on its
//! own, then merged field-by-field over the built-in defaults.

use super::cache::ConfigCache;
use super::library::LibraryLocator;
use super::merge::merge_all;
use super::normalize::normalize;
use super::schema::{ValidationMode, validate_content};
use super::security::{SecurityPolicy, sanitize_for_save};
use super::source::SourceReader;
use super::types::Config;
use crate::error::{Error, Result, SecurityViolation};
use chrono::Duration;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Global and legacy local file name.
pub const CONFIG_FILE: &str = ".ddx.yml";

/// Local file in the newer directory layout.
pub const CONFIG_DIR_FILE: &str = ".ddx/config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigTier {
    /// Built-in defaults (lowest priority)
    Defaults = 0,
    /// User-level config (~/.ddx.yml)
    Global = 1,
    /// Project-level config (.ddx/config.yaml or .ddx.yml)
    Local = 2,
    /// Environment-specific override (.ddx.<DDX_ENV>.yml)
    Environment = 3,
}

impl fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Global => write!(f, "global"),
            ConfigTier::Local => write!(f, "local"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Every ambient input the loader depends on.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project directory; local and environment files live here.
    pub working_dir: PathBuf,
    /// Home directory holding the global file.
    pub home_dir: Option<PathBuf>,
    /// Value of `DDX_ENV`.
    pub environment: Option<String>,
    /// Value of `DDX_LIBRARY_BASE_PATH`.
    pub library_base_path: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl ConfigPaths {
    /// Discover paths from the process environment and current directory.
    pub fn discover() -> Self {
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::for_working_dir(working_dir)
    }

    /// Like [`discover`](Self::discover) with an explicit working directory.
    pub fn for_working_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            home_dir: dirs::home_dir(),
            environment: non_empty_env("DDX_ENV"),
            library_base_path: non_empty_env("DDX_LIBRARY_BASE_PATH").map(PathBuf::from),
        }
    }

    /// Explicit directories and nothing from the environment.
    pub fn with_dirs(working_dir: impl Into<PathBuf>, home_dir: Option<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            home_dir,
            environment: None,
            library_base_path: None,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_library_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_base_path = Some(path.into());
        self
    }

    /// `~/.ddx.yml`, if the home directory is known.
    pub fn global_file(&self) -> Option<PathBuf> {
        self.home_dir.as_ref().map(|home| home.join(CONFIG_FILE))
    }

    /// The local file: `.ddx/config.yaml` when it exists, otherwise `.ddx.yml`.
    pub fn local_file(&self) -> PathBuf {
        let modern = self.working_dir.join(CONFIG_DIR_FILE);
        let legacy = self.working_dir.join(CONFIG_FILE);
        if modern.is_file() {
            if legacy.is_file() {
                warn!(
                    "both {} and {} exist; using {}",
                    modern.display(),
                    legacy.display(),
                    modern.display()
                );
            }
            modern
        } else {
            legacy
        }
    }

    /// `.ddx.<env>.yml` when `DDX_ENV` is set.
    pub fn environment_file(&self) -> Result<Option<PathBuf>> {
        let Some(ref env) = self.environment else {
            return Ok(None);
        };
        let valid = env
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::invalid_path(
                format!(".ddx.{}.yml", env),
                "DDX_ENV may only contain letters, digits, '-' and '_'",
            ));
        }
        Ok(Some(self.working_dir.join(format!(".ddx.{}.yml", env))))
    }

    /// Candidate file for each on-disk tier, in precedence order.
    pub fn layer_files(&self) -> Result<Vec<(ConfigTier, PathBuf)>> {
        let mut files = Vec::new();
        if let Some(global) = self.global_file() {
            files.push((ConfigTier::Global, global));
        }
        files.push((ConfigTier::Local, self.local_file()));
        if let Some(env) = self.environment_file()? {
            files.push((ConfigTier::Environment, env));
        }
        Ok(files)
    }

    fn allowed_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.working_dir.clone()];
        roots.extend(self.home_dir.clone());
        roots
    }
}

/// Where one tier came from and whether it contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSource {
    pub tier: ConfigTier,
    pub path: Option<PathBuf>,
    pub present: bool,
}

/// Builder for [`ConfigLoader`].
#[derive(Debug, Default)]
pub struct ConfigLoaderBuilder {
    paths: Option<ConfigPaths>,
    policy: SecurityPolicy,
    cache: Option<ConfigCache>,
}

impl ConfigLoaderBuilder {
    pub fn paths(mut self, paths: ConfigPaths) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn policy(mut self, policy: SecurityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Some(ConfigCache::new(ttl));
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.cache = Some(ConfigCache::disabled());
        self
    }

    /// A loader holding the built-in defaults; nothing is read yet.
    pub fn build(self) -> ConfigLoader {
        ConfigLoader {
            paths: self.paths.unwrap_or_default(),
            policy: self.policy,
            cache: self.cache.unwrap_or_default(),
            config: Config::defaults(),
            sources: Vec::new(),
            config_path: None,
        }
    }

    /// Build and load every tier.
    pub fn load(self) -> Result<ConfigLoader> {
        let mut loader = self.build();
        loader.reload()?;
        Ok(loader)
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Paths for each tier
    pub paths: ConfigPaths,
    policy: SecurityPolicy,
    cache: ConfigCache,
    /// Loaded configuration
    config: Config,
    sources: Vec<LayerSource>,
    /// Local file that contributed, if any
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit paths.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        Self::builder().paths(paths).load()
    }

    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::default()
    }

    /// Re-read every tier. Unchanged files come from the cache.
    pub fn reload(&mut self) -> Result<&Config> {
        let mut layers = vec![Config::defaults()];
        let mut sources = vec![LayerSource {
            tier: ConfigTier::Defaults,
            path: None,
            present: true,
        }];
        let mut config_path = None;

        for (tier, path) in self.paths.layer_files()? {
            let layer = self.read_layer(tier, &path)?;
            let present = layer.is_some();
            if let Some(layer) = layer {
                debug!("merging {} config from {}", tier, path.display());
                if tier == ConfigTier::Local {
                    config_path = Some(path.clone());
                }
                layers.push(layer);
            } else if tier == ConfigTier::Environment {
                debug!(
                    "no {} config at {}, skipping",
                    tier,
                    path.display()
                );
            }
            sources.push(LayerSource {
                tier,
                path: Some(path),
                present,
            });
        }

        let mut config = merge_all(&layers);
        self.apply_post_merge(&mut config);
        config.validate_with(&self.policy)?;

        self.config = config;
        self.sources = sources;
        self.config_path = config_path;
        Ok(&self.config)
    }

    fn apply_post_merge(&self, config: &mut Config) {
        let project_name_missing = config
            .variables
            .get("project_name")
            .is_none_or(|v| v.is_empty());
        if project_name_missing {
            if let Some(name) = self.paths.working_dir.file_name() {
                config
                    .variables
                    .insert("project_name".to_string(), name.to_string_lossy().into_owned());
            }
        }

        if let Some(ref library) = self.paths.library_base_path {
            info!(
                "DDX_LIBRARY_BASE_PATH overrides library_path: {}",
                library.display()
            );
            config.library_path = Some(library.to_string_lossy().into_owned());
        }
    }

    /// Read one tier's file. `Ok(None)` when it does not exist.
    pub fn read_layer(&self, tier: ConfigTier, path: &Path) -> Result<Option<Config>> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(Some(cached));
        }
        let reader =
            SourceReader::new(self.policy.clone()).with_allowed_roots(self.paths.allowed_roots());
        let result = reader
            .read(path)
            .and_then(|content| match content {
                Some(content) => self.parse(&content, ValidationMode::Layer).map(Some),
                None => Ok(None),
            })
            .map_err(|source| Error::Layer {
                tier,
                path: path.to_path_buf(),
                source: Box::new(source),
            })?;

        if let Some(ref config) = result {
            self.cache.put(path, config);
        }
        Ok(result)
    }

    /// Load a single complete document. Defaults are not merged in, so the
    /// document must pass semantic validation on its own.
    pub fn load_file(&self, path: &Path) -> Result<Config> {
        let content = SourceReader::new(self.policy.clone()).read_required(path)?;
        let config = self.parse(&content, ValidationMode::Document)?;
        config.validate_with(&self.policy)?;
        Ok(config)
    }

    fn parse(&self, content: &str, mode: ValidationMode) -> Result<Config> {
        self.policy.check_content(content)?;
        let mut tree = validate_content(content, mode)?;
        for note in normalize(&mut tree) {
            debug!("normalized legacy field {}", note);
        }
        let config: Config = serde_json::from_value(tree)?;
        self.policy.check_config(&config)?;
        Ok(config)
    }

    /// Write `config` to `path` with secrets redacted and owner-only permissions.
    pub fn save(&self, config: &Config, path: &Path) -> Result<()> {
        SourceReader::new(self.policy.clone()).check_path(path)?;
        self.policy.check_config(config)?;
        config.validate_with(&self.policy)?;

        let clean = sanitize_for_save(config);
        let is_json = path.extension().is_some_and(|e| e == "json");
        let data = if is_json {
            serde_json::to_string_pretty(&clean)? + "\n"
        } else {
            serde_yaml::to_string(&clean)?
        };

        let size = data.len() as u64;
        if size > self.policy.max_file_size {
            return Err(SecurityViolation::FileTooLarge {
                size,
                max: self.policy.max_file_size,
            }
            .into());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::fs::write(path, data).map_err(|e| Error::io(path, e))?;
        restrict_permissions(path)?;

        self.cache.invalidate(path);
        info!("saved configuration to {}", path.display());
        Ok(())
    }

    /// Save to the project's local file.
    pub fn save_local(&self, config: &Config) -> Result<PathBuf> {
        let path = self.paths.local_file();
        self.save(config, &path)?;
        Ok(path)
    }

    /// Save to `~/.ddx.yml`.
    pub fn save_global(&self, config: &Config) -> Result<PathBuf> {
        let path = self
            .paths
            .global_file()
            .ok_or_else(|| Error::invalid_path(CONFIG_FILE, "cannot determine home directory"))?;
        self.save(config, &path)?;
        Ok(path)
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Get the local config file that was used.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Every tier considered by the last load.
    pub fn sources(&self) -> &[LayerSource] {
        &self.sources
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    pub fn library(&self) -> LibraryLocator {
        LibraryLocator::new(&self.paths)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| Error::io(path, e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        work: TempDir,
        home: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                work: TempDir::new().unwrap(),
                home: TempDir::new().unwrap(),
            }
        }

        fn paths(&self) -> ConfigPaths {
            ConfigPaths::with_dirs(self.work.path(), Some(self.home.path().to_path_buf()))
        }

        fn write_local(&self, name: &str, content: &str) -> PathBuf {
            let path = self.work.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, content).unwrap();
            path
        }
    }

    #[test]
    fn test_load_defaults_only() {
        let fx = Fixture::new();
        let loader = ConfigLoader::load_with_paths(fx.paths()).unwrap();
        let config = loader.config();

        assert_eq!(config.version, "1.0");
        assert_eq!(config.repository_or_default().branch, "main");
        assert!(loader.config_path().is_none());
        let name = fx.work.path().file_name().unwrap().to_string_lossy();
        assert_eq!(config.variables["project_name"], name);
    }

    #[test]
    fn test_precedence() {
        let fx = Fixture::new();
        std::fs::write(
            fx.home.path().join(CONFIG_FILE),
            "variables:\n  log_level: info\n  api_url: X\n",
        )
        .unwrap();
        fx.write_local(CONFIG_FILE, "variables:\n  log_level: warn\n");
        fx.write_local(".ddx.dev.yml", "variables:\n  log_level: debug\n");

        let loader =
            ConfigLoader::load_with_paths(fx.paths().with_environment("dev")).unwrap();
        assert_eq!(loader.config().variables["log_level"], "debug");
        assert_eq!(loader.config().variables["api_url"], "X");
        assert_eq!(loader.sources().len(), 4);
        assert!(loader.sources().iter().all(|s| s.present));
    }

    #[test]
    fn test_prefers_directory_layout() {
        let fx = Fixture::new();
        fx.write_local(CONFIG_FILE, "variables:\n  which: legacy\n");
        let modern = fx.write_local(CONFIG_DIR_FILE, "variables:\n  which: modern\n");

        let loader = ConfigLoader::load_with_paths(fx.paths()).unwrap();
        assert_eq!(loader.config().variables["which"], "modern");
        assert_eq!(loader.config_path(), Some(modern.as_path()));
    }

    #[test]
    fn test_missing_env_file_is_fine() {
        let fx = Fixture::new();
        let loader =
            ConfigLoader::load_with_paths(fx.paths().with_environment("staging")).unwrap();
        let env = loader
            .sources()
            .iter()
            .find(|s| s.tier == ConfigTier::Environment)
            .unwrap();
        assert!(!env.present);
    }

    #[test]
    fn test_invalid_env_file_aborts() {
        let fx = Fixture::new();
        fx.write_local(".ddx.prod.yml", "variables: [unclosed\n");
        let err =
            ConfigLoader::load_with_paths(fx.paths().with_environment("prod")).unwrap_err();
        assert!(matches!(
            err,
            Error::Layer {
                tier: ConfigTier::Environment,
                ..
            }
        ));
        assert_eq!(err.phase(), "syntax");
    }

    #[test]
    fn test_env_name_rejected() {
        let fx = Fixture::new();
        let err =
            ConfigLoader::load_with_paths(fx.paths().with_environment("../x")).unwrap_err();
        assert_eq!(err.phase(), "path");
    }

    #[test]
    fn test_library_env_override_wins() {
        let fx = Fixture::new();
        fx.write_local(CONFIG_FILE, "library_base_path: ./from-file\n");
        let loader = ConfigLoader::load_with_paths(
            fx.paths().with_library_base_path("/opt/ddx-library"),
        )
        .unwrap();
        assert_eq!(
            loader.config().library_path.as_deref(),
            Some("/opt/ddx-library")
        );
    }

    #[test]
    fn test_post_merge_validation_fails_closed() {
        let fx = Fixture::new();
        fx.write_local(CONFIG_FILE, "repository:\n  path: \"\"\n");
        // An empty path does not override the default, so this loads.
        assert!(ConfigLoader::load_with_paths(fx.paths()).is_ok());

        fx.write_local(CONFIG_FILE, "version: \"9.9\"\n");
        let err = ConfigLoader::load_with_paths(fx.paths()).unwrap_err();
        assert!(err.validation_errors().unwrap().has_field("version"));
    }

    #[test]
    fn test_reload_uses_cache_until_file_changes() {
        let fx = Fixture::new();
        let path = fx.write_local(CONFIG_FILE, "variables:\n  a: one\n");
        let mut loader = ConfigLoader::load_with_paths(fx.paths()).unwrap();
        assert_eq!(loader.cache().len(), 1);

        std::fs::write(&path, "variables:\n  a: second\n").unwrap();
        assert_eq!(loader.reload().unwrap().variables["a"], "second");
    }

    #[test]
    fn test_no_cache() {
        let fx = Fixture::new();
        fx.write_local(CONFIG_FILE, "variables:\n  a: one\n");
        let loader = ConfigLoader::builder()
            .paths(fx.paths())
            .no_cache()
            .load()
            .unwrap();
        assert!(loader.cache().is_empty());
        assert_eq!(loader.config().variables["a"], "one");
    }

    #[test]
    fn test_load_file_requires_version() {
        let fx = Fixture::new();
        let path = fx.write_local("other.yml", "variables:\n  a: b\n");
        let loader = ConfigLoader::builder().paths(fx.paths()).build();
        let err = loader.load_file(&path).unwrap_err();
        assert_eq!(err.phase(), "schema");
    }

    #[test]
    fn test_save_redacts_and_restricts() {
        let fx = Fixture::new();
        let loader = ConfigLoader::builder().paths(fx.paths()).build();
        let mut config = Config::defaults();
        config.variables.insert("github_token".into(), "ghp_secret".into());

        let path = loader.save_local(&config).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[REDACTED]"));
        assert!(!written.contains("ghp_secret"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_tier_display_and_order() {
        assert_eq!(ConfigTier::Environment.to_string(), "environment");
        assert!(ConfigTier::Defaults < ConfigTier::Global);
        assert!(ConfigTier::Local < ConfigTier::Environment);
    }
}
