//! Version migration.
//!
//! Transitions are data: each [`MigrationRule`] names the step it belongs to,
//! a transform, and the warning recorded when the transform changed
//! something. The engine walks steps in version order and never skips one.
//! Idempotent rules are tied to a version rather than a step and run on every
//! migration whose target is at or past that version, including a migration
//! to the version the config already has.

use super::types::{Config, DEFAULT_VERSION, SUPPORTED_VERSIONS, version_index};
use crate::error::{Error, Result};
use tracing::{debug, info};

/// A single version-transition rule.
pub struct MigrationRule {
    pub from: &'static str,
    pub to: &'static str,
    /// Returns true when it modified the config.
    pub transform: fn(&mut Config) -> bool,
    pub warning: &'static str,
}

/// A rule applied whenever the target has reached `version`.
pub struct IdempotentRule {
    pub version: &'static str,
    pub transform: fn(&mut Config) -> bool,
    pub warning: &'static str,
}

fn rename_model(config: &mut Config, from: &str, to: &str) -> bool {
    match config.variables.get_mut("ai_model") {
        Some(model) if model == from => {
            *model = to.to_string();
            true
        }
        _ => false,
    }
}

pub static RULES: &[MigrationRule] = &[
    MigrationRule {
        from: "1.0",
        to: "1.1",
        transform: |c| rename_model(c, "claude-3-opus", "claude-3-5-sonnet"),
        warning: "Updated ai_model from claude-3-opus to claude-3-5-sonnet",
    },
    MigrationRule {
        from: "1.1",
        to: "2.0",
        transform: |c| rename_model(c, "claude-3-sonnet", "claude-3-5-sonnet"),
        warning: "Updated ai_model from claude-3-sonnet to claude-3-5-sonnet",
    },
];

pub static IDEMPOTENT_RULES: &[IdempotentRule] = &[IdempotentRule {
    version: "2.0",
    transform: |c| {
        if c.variables.contains_key("security_scan") {
            return false;
        }
        c.variables
            .insert("security_scan".to_string(), "true".to_string());
        true
    },
    warning: "Added default security_scan setting",
}];

/// Steps between `from` and `to`, in order.
pub fn plan(from: &str, to: &str) -> Result<Vec<&'static MigrationRule>> {
    let Some(target) = version_index(to) else {
        return Err(Error::Migration(format!(
            "unsupported target version: {} (supported: {})",
            to,
            SUPPORTED_VERSIONS.join(", ")
        )));
    };
    let Some(source) = version_index(from) else {
        return Err(Error::Migration(format!(
            "unsupported source version: {}",
            from
        )));
    };
    if source > target {
        return Err(Error::Migration(format!(
            "cannot downgrade from {} to {}",
            from, to
        )));
    }

    Ok(SUPPORTED_VERSIONS[source..=target]
        .windows(2)
        .flat_map(|step| {
            RULES
                .iter()
                .filter(move |rule| rule.from == step[0] && rule.to == step[1])
        })
        .collect())
}

impl Config {
    /// Migrate to `target`, returning the new config and one warning per
    /// rule that changed something. `self` is left untouched.
    ///
    /// A config without a version is treated as 1.0.
    pub fn migrate_version(&self, target: &str) -> Result<(Config, Vec<String>)> {
        let source = if self.version.is_empty() {
            DEFAULT_VERSION
        } else {
            self.version.as_str()
        };
        let steps = plan(source, target)?;
        let target_index = version_index(target).unwrap_or_default();

        let mut migrated = self.clone();
        let mut warnings = Vec::new();

        for rule in steps {
            debug!("applying migration step {} -> {}", rule.from, rule.to);
            if (rule.transform)(&mut migrated) {
                warnings.push(rule.warning.to_string());
            }
        }

        for rule in IDEMPOTENT_RULES {
            let reached = version_index(rule.version).is_some_and(|i| i <= target_index);
            if reached && (rule.transform)(&mut migrated) {
                warnings.push(rule.warning.to_string());
            }
        }

        migrated.version = target.to_string();
        for warning in &warnings {
            info!("migration {} -> {}: {}", source, target, warning);
        }
        Ok((migrated, warnings))
    }
}
