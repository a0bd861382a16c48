//! `ddx config` subcommands.
//!
//! Reads always go through the merged configuration. Writes touch exactly one
//! tier file (local by default, global with `--global`).

use super::migrate::{MigrateArgs, run_migrate};
use crate::config::{
    Config, ConfigLoader, ConfigPaths, ConfigTier, is_sensitive, sanitize_for_save,
};
use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ShowFormat {
    #[default]
    Yaml,
    Json,
}

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the merged configuration (secrets redacted)
    Show {
        #[arg(long, value_enum, default_value = "yaml")]
        format: ShowFormat,
    },

    /// Print one value by dot-separated key, e.g. repository.url
    Get { key: String },

    /// Set one value in the local (or global) config file
    Set(SetArgs),

    /// Validate the merged configuration or a single file
    Validate {
        /// Validate this file alone instead of the merged tiers
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Migrate the local config file to a newer version
    Migrate(MigrateArgs),

    /// List each tier's file and whether it exists
    Files,
}

/// Arguments for `config set`.
#[derive(Args, Debug)]
pub struct SetArgs {
    pub key: String,
    pub value: String,

    /// Write to ~/.ddx.yml instead of the project file
    #[arg(long)]
    pub global: bool,
}

/// Run a config subcommand and print its output.
pub fn run_config(args: &ConfigArgs, paths: ConfigPaths) -> Result<()> {
    match &args.command {
        ConfigCommand::Show { format } => print!("{}", show(paths, *format)?),
        ConfigCommand::Get { key } => println!("{}", get(paths, key)?),
        ConfigCommand::Set(set_args) => {
            let path = set(paths, set_args)?;
            println!("Set {} in {}", set_args.key, path.display());
        }
        ConfigCommand::Validate { file } => println!("{}", validate(paths, file.as_deref())?),
        ConfigCommand::Migrate(migrate_args) => run_migrate(migrate_args, paths)?,
        ConfigCommand::Files => print!("{}", files(&paths)?),
    }
    Ok(())
}

fn load(paths: ConfigPaths) -> Result<ConfigLoader> {
    ConfigLoader::load_with_paths(paths).context("failed to load configuration")
}

/// The merged configuration, rendered with secrets redacted.
pub fn show(paths: ConfigPaths, format: ShowFormat) -> Result<String> {
    let loader = load(paths)?;
    let redacted = sanitize_for_save(loader.config());
    Ok(match format {
        ShowFormat::Yaml => serde_yaml::to_string(&redacted)?,
        ShowFormat::Json => serde_json::to_string_pretty(&redacted)? + "\n",
    })
}

/// One merged value. Strings print bare, everything else as YAML.
pub fn get(paths: ConfigPaths, key: &str) -> Result<String> {
    let loader = load(paths)?;
    let value = loader.config().get_nested_value(key)?;
    Ok(match value {
        Value::String(s) => s,
        other => serde_yaml::to_string(&other)?.trim_end().to_string(),
    })
}

/// Set `key` in one tier file. The merged result must still validate.
pub fn set(paths: ConfigPaths, args: &SetArgs) -> Result<PathBuf> {
    let loader = load(paths)?;

    let mut preview = loader.config().clone();
    preview.set_nested_value(&args.key, args.value.as_str())?;
    preview
        .validate_with(loader.policy())
        .with_context(|| format!("setting {} would make the configuration invalid", args.key))?;

    let (tier, path) = if args.global {
        let path = loader
            .paths
            .global_file()
            .context("cannot determine home directory")?;
        (ConfigTier::Global, path)
    } else {
        (ConfigTier::Local, loader.paths.local_file())
    };

    let mut layer = loader.read_layer(tier, &path)?.unwrap_or_default();
    layer.set_nested_value(&args.key, args.value.as_str())?;
    fill_layer_requirements(&mut layer, loader.config());

    if args.key.split_once('.').is_some_and(|(_, name)| is_sensitive(name)) {
        warn!(
            "{} looks sensitive and will be saved redacted; prefer an environment variable",
            args.key
        );
    }

    loader.save(&layer, &path)?;
    info!("updated {} in {} config", args.key, tier);
    Ok(path)
}

/// Copy the fields every saved file must carry from the merged config when
/// the layer leaves them empty: `version`, and `repository.url`/`.branch`
/// once the layer has a repository of its own.
pub(crate) fn fill_layer_requirements(layer: &mut Config, merged: &Config) {
    if layer.version.is_empty() {
        layer.version = merged.version.clone();
    }
    let Some(repository) = layer.repository.as_mut() else {
        return;
    };
    let fallback = merged.repository_or_default();
    if repository.url.is_empty() {
        repository.url = fallback.url;
    }
    if repository.branch.is_empty() {
        repository.branch = fallback.branch;
    }
}

/// Validate the merged tiers, or `file` on its own.
pub fn validate(paths: ConfigPaths, file: Option<&std::path::Path>) -> Result<String> {
    match file {
        Some(file) => {
            let loader = ConfigLoader::builder().paths(paths).no_cache().build();
            let config = loader
                .load_file(file)
                .with_context(|| format!("{} is invalid", file.display()))?;
            Ok(format!("{} is valid (version {})", file.display(), config.version))
        }
        None => {
            let loader = load(paths)?;
            Ok(format!(
                "Configuration is valid (version {})",
                loader.config().version
            ))
        }
    }
}

/// Each tier's file and whether it is present.
pub fn files(paths: &ConfigPaths) -> Result<String> {
    let mut out = format!("{:<12} (built in)\n", ConfigTier::Defaults.to_string());
    for (tier, path) in paths.layer_files()? {
        let state = if path.is_file() { "present" } else { "missing" };
        out.push_str(&format!(
            "{:<12} {} ({})\n",
            tier.to_string(),
            path.display(),
            state
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TempDir, ConfigPaths) {
        let work = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(work.path(), Some(home.path().to_path_buf()));
        (work, home, paths)
    }

    #[test]
    fn test_get_merged_value() {
        let (work, _home, paths) = setup();
        fs::write(work.path().join(".ddx.yml"), "repository:\n  branch: develop\n").unwrap();
        assert_eq!(get(paths.clone(), "repository.branch").unwrap(), "develop");
        assert_eq!(
            get(paths, "repository.url").unwrap(),
            "https://github.com/easel/ddx"
        );
    }

    #[test]
    fn test_set_writes_only_local_layer() {
        let (work, home, paths) = setup();
        fs::write(home.path().join(".ddx.yml"), "variables:\n  editor: vim\n").unwrap();

        let args = SetArgs {
            key: "variables.log_level".into(),
            value: "debug".into(),
            global: false,
        };
        let path = set(paths.clone(), &args).unwrap();
        assert_eq!(path, work.path().join(".ddx.yml"));

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("log_level: debug"));
        // Values from other tiers are not copied into the layer.
        assert!(!written.contains("editor"));
        assert!(!written.contains("ai_model"));
        assert_eq!(get(paths, "variables.log_level").unwrap(), "debug");
    }

    #[test]
    fn test_set_global() {
        let (_work, home, paths) = setup();
        let args = SetArgs {
            key: "repository.branch".into(),
            value: "trunk".into(),
            global: true,
        };
        let path = set(paths, &args).unwrap();
        assert_eq!(path, home.path().join(".ddx.yml"));
        assert!(fs::read_to_string(path).unwrap().contains("branch: trunk"));
    }

    #[test]
    fn test_set_partial_layer_is_a_valid_document() {
        let (work, _home, paths) = setup();
        let args = SetArgs {
            key: "repository.sync.frequency".into(),
            value: "weekly".into(),
            global: false,
        };
        let path = set(paths, &args).unwrap();
        assert_eq!(path, work.path().join(".ddx.yml"));

        let layer = crate::config::load_from_file(&path).unwrap();
        assert_eq!(layer.version, "1.0");
        let repository = layer.repository.unwrap();
        assert_eq!(repository.url, "https://github.com/easel/ddx");
        assert_eq!(repository.branch, "main");
        assert_eq!(repository.sync.unwrap().frequency, "weekly");
    }

    #[test]
    fn test_set_rejects_invalid_result() {
        let (work, _home, paths) = setup();
        let args = SetArgs {
            key: "repository.protocol".into(),
            value: "ftp".into(),
            global: false,
        };
        assert!(set(paths, &args).is_err());
        assert!(!work.path().join(".ddx.yml").exists());
    }

    #[test]
    fn test_show_redacts() {
        let (work, _home, paths) = setup();
        fs::write(
            work.path().join(".ddx.yml"),
            "variables:\n  api_token: abc123\n",
        )
        .unwrap();
        let yaml = show(paths.clone(), ShowFormat::Yaml).unwrap();
        assert!(yaml.contains("[REDACTED]"));
        assert!(!yaml.contains("abc123"));

        let json: Value = serde_json::from_str(&show(paths, ShowFormat::Json).unwrap()).unwrap();
        assert_eq!(json["variables"]["api_token"], "[REDACTED]");
    }

    #[test]
    fn test_validate_single_file() {
        let (work, _home, paths) = setup();
        let file = work.path().join("candidate.yml");
        fs::write(&file, "version: \"2.0\"\nvariables:\n  a: b\n").unwrap();
        assert!(validate(paths.clone(), Some(file.as_path())).unwrap().contains("valid"));

        fs::write(&file, "variables:\n  123bad: x\n").unwrap();
        assert!(validate(paths, Some(file.as_path())).is_err());
    }

    #[test]
    fn test_files_lists_tiers() {
        let (work, _home, paths) = setup();
        fs::write(work.path().join(".ddx.yml"), "variables: {}\n").unwrap();
        let listing = files(&paths.with_environment("ci")).unwrap();
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("defaults"));
        assert!(lines[2].starts_with("local") && lines[2].ends_with("(present)"));
        assert!(lines[3].contains(".ddx.ci.yml") && lines[3].ends_with("(missing)"));
    }
}
