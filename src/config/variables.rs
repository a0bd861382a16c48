//! Variable substitution in template content.
//!
//! Recognized tokens:
//! - `{{name}}` and `{{ name }}`: config variables only; unknown names are left as written
//! - `${NAME}` and `${NAME:-default}`: config variables (exact, then
//!   case-insensitive), then the process environment, then the default
//!
//! Substituted text is not scanned again, and at most
//! [`MAX_REPLACEMENTS`] tokens are replaced per call.

use super::security::strip_control_characters;
use super::types::Config;
use std::collections::BTreeMap;
use tracing::warn;

pub const MAX_REPLACEMENTS: usize = 1000;

impl Config {
    /// Copy of this config with `runtime` variables layered on top.
    pub fn with_runtime_variables(&self, runtime: &BTreeMap<String, String>) -> Self {
        let mut copy = self.clone();
        for (key, value) in runtime {
            copy.variables.insert(key.clone(), value.clone());
        }
        copy
    }

    /// Substitute variable tokens, falling back to the process environment.
    pub fn replace_variables(&self, content: &str) -> String {
        self.replace_variables_with(content, |name| std::env::var(name).ok())
    }

    /// Substitute variable tokens using `env` for names the config lacks.
    pub fn replace_variables_with<F>(&self, content: &str, env: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(content.len());
        let mut rest = content;
        let mut replacements = 0;

        while replacements < MAX_REPLACEMENTS {
            let next = match (rest.find("{{"), rest.find("${")) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => break,
            };
            out.push_str(&rest[..next]);
            rest = &rest[next..];

            let substituted = if rest.starts_with("{{") {
                self.mustache_token(rest)
            } else {
                self.dollar_token(rest, &env)
            };

            match substituted {
                Some((value, consumed)) => {
                    out.push_str(&value);
                    rest = &rest[consumed..];
                    replacements += 1;
                }
                None => {
                    // Not a token: keep the two opening characters literally.
                    out.push_str(&rest[..2]);
                    rest = &rest[2..];
                }
            }
        }

        if replacements >= MAX_REPLACEMENTS && !rest.is_empty() {
            warn!(
                "variable replacement stopped after {} substitutions",
                MAX_REPLACEMENTS
            );
        }
        out.push_str(rest);
        out
    }

    /// `{{ name }}` at the start of `text`. Returns the value and bytes consumed.
    fn mustache_token(&self, text: &str) -> Option<(String, usize)> {
        let end = text.find("}}")?;
        let name = text[2..end].trim();
        let value = self.variables.get(name)?;
        Some((strip_control_characters(value), end + 2))
    }

    /// `${NAME}` or `${NAME:-default}` at the start of `text`.
    fn dollar_token<F>(&self, text: &str, env: &F) -> Option<(String, usize)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let end = text.find('}')?;
        let expr = &text[2..end];
        let (name, default) = match expr.split_once(":-") {
            Some((name, default)) => (name, default),
            None => (expr, ""),
        };

        let value = self
            .lookup_variable(name)
            .filter(|v| !v.is_empty())
            .or_else(|| env(name).filter(|v| !v.is_empty()))
            .map(|v| strip_control_characters(&v))
            .unwrap_or_else(|| default.to_string());
        Some((value, end + 1))
    }

    fn lookup_variable(&self, name: &str) -> Option<String> {
        if let Some(value) = self.variables.get(name) {
            return Some(value.clone());
        }
        self.variables
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }
}
