//! Security checks for configuration content.
//!
//! Raw text is scanned before it reaches the YAML parser; decoded values are
//! checked again after parsing. Violations are never repaired silently.

use super::types::Config;
use crate::error::SecurityViolation;
use regex_lite::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Marker written in place of sensitive variable values on save.
pub const REDACTED: &str = "[REDACTED]";

/// Numeric limits applied by the security pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub max_file_size: u64,
    pub max_path_length: usize,
    pub max_line_length: usize,
    /// Combined `{` and `[` count allowed in one document.
    pub max_nesting: usize,
    pub max_variables: usize,
    pub max_variable_name: usize,
    pub max_variable_value: usize,
    pub max_include_path: usize,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024,
            max_path_length: 1024,
            max_line_length: 10_000,
            max_nesting: 1000,
            max_variables: 100,
            max_variable_name: 64,
            max_variable_value: 1024,
            max_include_path: 512,
        }
    }
}

impl SecurityPolicy {
    /// Same limits, but allows variable values up to 10000 characters.
    pub fn relaxed() -> Self {
        Self {
            max_variable_value: 10_000,
            ..Self::default()
        }
    }

    /// Scan raw file content before parsing.
    pub fn check_content(&self, content: &str) -> Result<(), SecurityViolation> {
        let size = content.len() as u64;
        if size > self.max_file_size {
            return Err(SecurityViolation::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        for (name, re) in &patterns().dangerous {
            if re.is_match(content) {
                return Err(SecurityViolation::DangerousPattern(*name));
            }
        }

        for (index, line) in content.lines().enumerate() {
            let length = line.chars().count();
            if length > self.max_line_length {
                return Err(SecurityViolation::LineTooLong {
                    line: index + 1,
                    length,
                    max: self.max_line_length,
                });
            }
        }

        let count = content.chars().filter(|c| matches!(c, '{' | '[')).count();
        if count > self.max_nesting {
            return Err(SecurityViolation::TooComplex {
                count,
                max: self.max_nesting,
            });
        }

        Ok(())
    }

    /// Check decoded values: variable limits and include paths.
    pub fn check_config(&self, config: &Config) -> Result<(), SecurityViolation> {
        self.check_variables(&config.variables)?;

        for include in &config.includes {
            if include.chars().count() > self.max_include_path {
                return Err(SecurityViolation::IncludeTooLong {
                    path: include.clone(),
                    max: self.max_include_path,
                });
            }
            if include.contains("..") {
                return Err(SecurityViolation::IncludeTraversal {
                    path: include.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn check_variables(
        &self,
        variables: &BTreeMap<String, String>,
    ) -> Result<(), SecurityViolation> {
        if variables.len() > self.max_variables {
            return Err(SecurityViolation::TooManyVariables {
                count: variables.len(),
                max: self.max_variables,
            });
        }

        for (name, value) in variables {
            if name.chars().count() > self.max_variable_name {
                return Err(SecurityViolation::VariableNameTooLong {
                    name: name.clone(),
                    max: self.max_variable_name,
                });
            }
            let length = value.chars().count();
            if length > self.max_variable_value {
                return Err(SecurityViolation::VariableValueTooLong {
                    name: name.clone(),
                    length,
                    max: self.max_variable_value,
                });
            }
            if has_control_characters(value) {
                return Err(SecurityViolation::ControlCharacters { name: name.clone() });
            }
        }
        Ok(())
    }
}

struct Patterns {
    dangerous: Vec<(&'static str, Regex)>,
    sensitive: Vec<Regex>,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| {
        let compile = |source: &str| Regex::new(source).ok();
        Patterns {
            dangerous: [
                ("script tag", r"(?is)<script[^>]*>.*?</script>"),
                ("code execution call", r"(?i)\b(eval|exec|system|shell_exec)\s*\("),
                ("nested substitution", r"\$\{[^}]*\$\{"),
            ]
            .into_iter()
            .filter_map(|(name, source)| compile(source).map(|re| (name, re)))
            .collect(),
            sensitive: [
                r"(?i)(password|secret|private_key|token|credential|auth)$",
                r"(?i)(api_key|apikey|access_token)$",
            ]
            .into_iter()
            .filter_map(compile)
            .collect(),
        }
    })
}

/// Whether a variable name looks like it holds a secret.
pub fn is_sensitive(name: &str) -> bool {
    patterns().sensitive.iter().any(|re| re.is_match(name))
}

fn has_control_characters(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_control() && c != '\n' && c != '\t')
}

/// Remove control characters other than newline and tab.
pub fn strip_control_characters(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Copy of `config` with sensitive variables redacted, for writing to disk
/// or display. Other values are untouched; control characters are rejected
/// by [`SecurityPolicy::check_config`], never repaired here.
pub fn sanitize_for_save(config: &Config) -> Config {
    let mut copy = config.clone();
    for (name, value) in copy.variables.iter_mut() {
        if is_sensitive(name) && !value.is_empty() {
            *value = REDACTED.to_string();
        }
    }
    copy
}
