//! Integration tests for saving configuration and reading it back.

use ddx_config::config::{
    AuthConfig, Config, ConfigLoader, ConfigPaths, REDACTED, Repository, ResourceFilter,
    ResourceSelection, SyncConfig, load_from_file,
};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

fn loader(temp: &TempDir) -> ConfigLoader {
    ConfigLoader::builder()
        .paths(ConfigPaths::with_dirs(temp.path(), None))
        .build()
}

fn full_config() -> Config {
    let mut variables = BTreeMap::new();
    variables.insert("author".to_string(), "Jane Doe".to_string());
    variables.insert("github_token".to_string(), "ghp_1234567890".to_string());
    variables.insert("db_password".to_string(), "hunter2".to_string());
    variables.insert("notes".to_string(), "line one\nline two".to_string());

    let mut overrides = BTreeMap::new();
    overrides.insert("editor".to_string(), "nvim".to_string());

    let mut repositories = BTreeMap::new();
    repositories.insert(
        "mirror".to_string(),
        Repository {
            url: "git@github.com:example/mirror.git".to_string(),
            branch: "main".to_string(),
            priority: 10,
            ..Default::default()
        },
    );

    Config {
        version: "2.0".to_string(),
        library_path: Some(".ddx/library".to_string()),
        repository: Some(Repository {
            url: "https://github.com/easel/ddx".to_string(),
            branch: "main".to_string(),
            path: ".ddx/".to_string(),
            protocol: "https".to_string(),
            auth: Some(AuthConfig {
                method: "token".to_string(),
                token_file: "~/.config/ddx/token".to_string(),
                ..Default::default()
            }),
            sync: Some(SyncConfig {
                frequency: "daily".to_string(),
                timeout: 30,
                checksum: true,
                ..Default::default()
            }),
            ..Default::default()
        }),
        repositories,
        includes: vec!["prompts/claude".to_string(), "templates/common".to_string()],
        resources: Some(ResourceSelection {
            prompts: Some(ResourceFilter {
                include: vec!["claude/**".to_string()],
                exclude: vec!["**/draft-*".to_string()],
            }),
            ..Default::default()
        }),
        overrides,
        variables,
        persona_bindings: BTreeMap::from([("reviewer".to_string(), "strict-reviewer".to_string())]),
    }
}

#[test]
fn test_round_trip_preserves_non_sensitive_fields() {
    let temp = TempDir::new().unwrap();
    let loader = loader(&temp);
    let path = temp.path().join(".ddx.yml");
    let original = full_config();

    loader.save(&original, &path).unwrap();
    let reloaded = load_from_file(&path).unwrap();

    let mut expected = original.clone();
    for name in ["github_token", "db_password"] {
        expected.variables.insert(name.to_string(), REDACTED.to_string());
    }
    assert_eq!(reloaded, expected);
}

#[test]
fn test_save_of_load_is_byte_stable() {
    let temp = TempDir::new().unwrap();
    let loader = loader(&temp);
    let first = temp.path().join("first.yml");
    let second = temp.path().join("second.yml");

    loader.save(&full_config(), &first).unwrap();
    let reloaded = load_from_file(&first).unwrap();
    loader.save(&reloaded, &second).unwrap();

    assert_eq!(
        fs::read_to_string(&first).unwrap(),
        fs::read_to_string(&second).unwrap()
    );
}

#[test]
fn test_secrets_never_written() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".ddx.yml");
    loader(&temp).save(&full_config(), &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(!text.contains("ghp_1234567890"));
    assert!(!text.contains("hunter2"));
    assert!(text.contains("Jane Doe"));
}

#[test]
fn test_save_json() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.json");
    loader(&temp).save(&full_config(), &path).unwrap();

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["version"], "2.0");
    assert_eq!(value["variables"]["github_token"], REDACTED);
    assert_eq!(load_from_file(&path).unwrap().overrides["editor"], "nvim");
}

#[test]
fn test_save_creates_directory_layout() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".ddx/config.yaml");
    loader(&temp).save(&full_config(), &path).unwrap();
    assert!(path.is_file());

    // The new file now wins as the local tier.
    let merged = ConfigLoader::load_with_paths(ConfigPaths::with_dirs(temp.path(), None)).unwrap();
    assert_eq!(merged.config_path(), Some(path.as_path()));
    assert_eq!(merged.config().overrides["editor"], "nvim");
}

#[test]
fn test_save_rejects_unsafe_paths() {
    let temp = TempDir::new().unwrap();
    let loader = loader(&temp);
    let config = full_config();

    let err = loader.save(&config, &temp.path().join("../escape.yml")).unwrap_err();
    assert_eq!(err.phase(), "path");
    let err = loader.save(&config, &temp.path().join("config.txt")).unwrap_err();
    assert_eq!(err.phase(), "path");
}

#[test]
fn test_save_rejects_oversized_variables() {
    let temp = TempDir::new().unwrap();
    let mut config = full_config();
    config
        .variables
        .insert("huge".to_string(), "x".repeat(5000));

    let err = loader(&temp)
        .save(&config, &temp.path().join(".ddx.yml"))
        .unwrap_err();
    assert_eq!(err.phase(), "security");
    assert!(!temp.path().join(".ddx.yml").exists());
}

#[test]
fn test_save_rejects_semantically_invalid_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".ddx.yml");
    let config = Config {
        version: String::new(),
        repository: Some(Repository {
            path: "p".to_string(),
            ..Default::default()
        }),
        variables: BTreeMap::from([("123invalid".to_string(), "x".to_string())]),
        overrides: BTreeMap::from([("bad-name".to_string(), "y".to_string())]),
        ..Default::default()
    };

    let err = loader(&temp).save(&config, &path).unwrap_err();
    assert_eq!(err.phase(), "validation");
    let errors = err.validation_errors().unwrap();
    for field in [
        "version",
        "repository.url",
        "repository.branch",
        "variables.123invalid",
        "overrides.bad-name",
    ] {
        assert!(errors.has_field(field), "no error for {}", field);
    }
    assert!(!path.exists());
}

#[test]
fn test_save_rejects_control_characters_instead_of_stripping() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".ddx.yml");
    let mut config = full_config();
    config
        .variables
        .insert("banner".to_string(), "bell\u{7}".to_string());

    let err = loader(&temp).save(&config, &path).unwrap_err();
    assert_eq!(err.phase(), "security");
    assert!(!path.exists());
}
