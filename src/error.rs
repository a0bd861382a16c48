//! Error types for configuration loading, validation and access.

use crate::config::ConfigTier;
use crate::config::schema::SchemaReport;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single field-level configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigError {
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: None,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    // Convenience constructors

    pub fn required(field: &str, what: &str, suggestion: &str) -> Self {
        Self::new(field, format!("{} is required", what)).with_suggestion(suggestion)
    }

    pub fn invalid(field: &str, value: &str, message: &str, suggestion: &str) -> Self {
        Self::new(field, message)
            .with_value(value)
            .with_suggestion(suggestion)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "config validation error in '{}': {}",
            self.field, self.message
        )?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". Suggestion: {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

/// Every field-level problem found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub errors: Vec<ConfigError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ConfigError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True if any contained error is about `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> std::result::Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "configuration is invalid"),
            [single] => write!(f, "{}", single),
            many => {
                write!(f, "multiple validation errors:")?;
                for error in many {
                    write!(f, "\n- {}", error)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Malformed YAML, with the best location the parser could give.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[SYNTAX] Invalid YAML syntax")?;
        if let Some(line) = self.line {
            write!(f, " at line {}", line)?;
            if let Some(column) = self.column {
                write!(f, ", column {}", column)?;
            }
        }
        write!(f, "\n\nDetails: {}", self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// Which security rule rejected the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityViolation {
    #[error("potentially dangerous pattern detected in config ({0})")]
    DangerousPattern(&'static str),

    #[error("line {line} too long: {length} characters (max {max})")]
    LineTooLong {
        line: usize,
        length: usize,
        max: usize,
    },

    #[error("config structure too complex: {count} braces/brackets (max {max})")]
    TooComplex { count: usize, max: usize },

    #[error("config file too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("too many variables: {count} (max {max})")]
    TooManyVariables { count: usize, max: usize },

    #[error("variable name too long: {name} (max {max} characters)")]
    VariableNameTooLong { name: String, max: usize },

    #[error("variable value too long for {name}: {length} characters (max {max})")]
    VariableValueTooLong {
        name: String,
        length: usize,
        max: usize,
    },

    #[error("variable {name} contains invalid control characters")]
    ControlCharacters { name: String },

    #[error("include path too long: {path} (max {max} characters)")]
    IncludeTooLong { path: String, max: usize },

    #[error("path traversal not allowed in includes: {path}")]
    IncludeTraversal { path: String },
}

/// Errors produced by the configuration resolver.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Schema(#[from] SchemaReport),

    #[error("[SECURITY] {0}")]
    Security(#[from] SecurityViolation),

    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid config path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cannot access '{key}': {message}")]
    Accessor { key: String, message: String },

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("failed to load {tier} config from {}: {source}", path.display())]
    Layer {
        tier: ConfigTier,
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode or decode YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to convert configuration tree: {0}")]
    Json(#[from] serde_json::Error),

    #[error("embedded schema is invalid: {0}")]
    SchemaCompile(String),
}

impl Error {
    pub fn accessor(key: &str, message: impl Into<String>) -> Self {
        Error::Accessor {
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Name of the check that failed, as shown to users.
    pub fn phase(&self) -> &'static str {
        match self {
            Error::Syntax(_) => "syntax",
            Error::Schema(_) => "schema",
            Error::Security(_) => "security",
            Error::NotFound(_) => "not_found",
            Error::InvalidPath { .. } => "path",
            Error::Validation(_) => "validation",
            Error::Accessor { .. } => "accessor",
            Error::Migration(_) => "migration",
            Error::Layer { source, .. } => source.phase(),
            Error::Io { .. } => "io",
            Error::Yaml(_) | Error::Json(_) => "decode",
            Error::SchemaCompile(_) => "schema",
        }
    }

    /// True for a missing file, which optional layers treat as "no contribution".
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Layer { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// The aggregated field errors, if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(v) => Some(v),
            Error::Layer { source, .. } => source.validation_errors(),
            _ => None,
        }
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_with_suggestion() {
        let err = ConfigError::required("version", "version", "add 'version: \"1.0\"'");
        assert_eq!(
            err.to_string(),
            "config validation error in 'version': version is required. Suggestion: add 'version: \"1.0\"'"
        );
    }

    #[test]
    fn test_validation_error_lists_every_problem() {
        let mut v = ValidationError::new();
        v.push(ConfigError::new("repository.url", "repository URL is required"));
        v.push(ConfigError::new("variables.1x", "invalid variable name").with_value("1x"));

        let text = v.to_string();
        assert!(text.starts_with("multiple validation errors:"));
        assert_eq!(text.lines().count(), 3);
        assert!(v.has_field("variables.1x"));
        assert!(!v.has_field("version"));
    }

    #[test]
    fn test_syntax_error_location() {
        let err = SyntaxError {
            line: Some(3),
            column: Some(7),
            message: "did not find expected key".into(),
        };
        let text = err.to_string();
        assert!(text.contains("at line 3, column 7"));
    }

    #[test]
    fn test_layer_error_delegates_phase() {
        let err = Error::Layer {
            tier: ConfigTier::Local,
            path: PathBuf::from(".ddx.yml"),
            source: Box::new(Error::NotFound(PathBuf::from(".ddx.yml"))),
        };
        assert!(err.is_not_found());
        assert_eq!(err.phase(), "not_found");
    }
}
