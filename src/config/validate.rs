//! Semantic checks on a merged configuration.
//!
//! Every problem is collected before returning so users fix them in one pass.

use super::schema::is_valid_url;
use super::security::SecurityPolicy;
use super::types::{Config, Repository, SUPPORTED_VERSIONS, is_supported_version};
use crate::error::{ConfigError, ValidationError};
use regex_lite::Regex;
use std::sync::OnceLock;

pub const AUTH_METHODS: &[&str] = &["ssh-key", "token", "password", "oauth"];
pub const SYNC_FREQUENCIES: &[&str] = &["never", "manual", "hourly", "daily", "weekly"];
pub const PROTOCOLS: &[&str] = &["ssh", "https"];

/// `^[A-Za-z_][A-Za-z0-9_]*$`
pub fn is_valid_variable_name(name: &str) -> bool {
    static NAME: OnceLock<Option<Regex>> = OnceLock::new();
    match NAME
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
    {
        Some(re) => re.is_match(name),
        None => false,
    }
}

impl Config {
    /// Validate against the default limits.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_with(&SecurityPolicy::default())
    }

    /// Validate using the variable length limit from `policy`.
    pub fn validate_with(&self, policy: &SecurityPolicy) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();

        if self.version.is_empty() {
            errors.push(ConfigError::required(
                "version",
                "version",
                "add 'version: \"1.0\"' to your config",
            ));
        } else if !is_supported_version(&self.version) {
            errors.push(ConfigError::invalid(
                "version",
                &self.version,
                "unsupported version",
                &format!("use one of: {}", SUPPORTED_VERSIONS.join(", ")),
            ));
        }

        if let Some(ref repository) = self.repository {
            validate_repository(repository, &mut errors);
        }

        for (name, repository) in &self.repositories {
            let field = format!("repositories.{}", name);
            check_url(&repository.url, &format!("{}.url", field), &mut errors);
            if !(0..=100).contains(&repository.priority) {
                errors.push(ConfigError::invalid(
                    &format!("{}.priority", field),
                    &repository.priority.to_string(),
                    "invalid priority",
                    "use a value between 0 and 100",
                ));
            }
        }

        for (key, value) in &self.variables {
            let field = format!("variables.{}", key);
            if !is_valid_variable_name(key) {
                errors.push(ConfigError::invalid(
                    &field,
                    key,
                    "invalid variable name",
                    "use only letters, numbers, and underscores",
                ));
            }
            let length = value.chars().count();
            if length > policy.max_variable_value {
                errors.push(ConfigError::invalid(
                    &field,
                    &format!("{} characters", length),
                    "variable value too long",
                    &format!(
                        "limit variable values to {} characters",
                        policy.max_variable_value
                    ),
                ));
            }
        }

        for key in self.overrides.keys() {
            if !is_valid_variable_name(key) {
                errors.push(ConfigError::invalid(
                    &format!("overrides.{}", key),
                    key,
                    "invalid override name",
                    "use only letters, numbers, and underscores",
                ));
            }
        }

        errors.into_result()
    }
}

fn check_url(url: &str, field: &str, errors: &mut ValidationError) {
    if url.is_empty() {
        errors.push(ConfigError::required(
            field,
            "repository URL",
            "add a valid Git repository URL",
        ));
    } else if !is_valid_url(url) {
        errors.push(ConfigError::invalid(
            field,
            url,
            "invalid URL format",
            "use a valid URL like 'https://github.com/user/repo'",
        ));
    }
}

fn validate_repository(repository: &Repository, errors: &mut ValidationError) {
    check_url(&repository.url, "repository.url", errors);

    if repository.branch.is_empty() {
        errors.push(ConfigError::required(
            "repository.branch",
            "repository branch",
            "add 'branch: \"main\"' or another valid branch name",
        ));
    }

    if !repository.protocol.is_empty() && !PROTOCOLS.contains(&repository.protocol.as_str()) {
        errors.push(ConfigError::invalid(
            "repository.protocol",
            &repository.protocol,
            "invalid protocol",
            "use 'ssh' or 'https'",
        ));
    }

    if let Some(ref auth) = repository.auth {
        if !auth.method.is_empty() && !AUTH_METHODS.contains(&auth.method.as_str()) {
            errors.push(ConfigError::invalid(
                "repository.auth.method",
                &auth.method,
                "invalid authentication method",
                &format!("use one of: {}", AUTH_METHODS.join(", ")),
            ));
        }
        if auth.method == "ssh-key" && auth.key_path.is_empty() {
            errors.push(ConfigError::new(
                "repository.auth.key_path",
                "SSH key path is required when using ssh-key authentication",
            )
            .with_suggestion("add 'key_path: \"~/.ssh/id_rsa\"' or another valid key path"));
        }
        if auth.method == "token" && auth.token.is_empty() && auth.token_file.is_empty() {
            errors.push(ConfigError::new(
                "repository.auth.token",
                "token or token_file is required when using token authentication",
            )
            .with_suggestion("add 'token: \"your-token\"' or 'token_file: \"/path/to/token\"'"));
        }
    }

    if let Some(ref proxy) = repository.proxy {
        if !proxy.url.is_empty() && !is_valid_url(&proxy.url) {
            errors.push(ConfigError::invalid(
                "repository.proxy.url",
                &proxy.url,
                "invalid proxy URL format",
                "use a valid URL like 'http://proxy.company.com:8080'",
            ));
        }
    }

    if let Some(ref sync) = repository.sync {
        if !sync.frequency.is_empty() && !SYNC_FREQUENCIES.contains(&sync.frequency.as_str()) {
            errors.push(ConfigError::invalid(
                "repository.sync.frequency",
                &sync.frequency,
                "invalid sync frequency",
                &format!("use one of: {}", SYNC_FREQUENCIES.join(", ")),
            ));
        }
        if !(0..=3600).contains(&sync.timeout) {
            errors.push(ConfigError::invalid(
                "repository.sync.timeout",
                &sync.timeout.to_string(),
                "invalid sync timeout",
                "use a value between 0 and 3600 seconds",
            ));
        }
        if !(0..=10).contains(&sync.retry_count) {
            errors.push(ConfigError::invalid(
                "repository.sync.retry_count",
                &sync.retry_count.to_string(),
                "invalid retry count",
                "use a value between 0 and 10",
            ));
        }
    }
}
