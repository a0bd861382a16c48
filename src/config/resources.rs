//! Resource selection: include/exclude filters per library asset type.
//!
//! Patterns are shell-style wildcards matched against the resource path
//! relative to its type directory (`claude/review.md`, not `prompts/claude/review.md`):
//! - `**` matches anything, including `/`
//! - `*` matches anything except `/`
//! - `?` matches one character except `/`
//! - `[abc]` is a character class
//! - `{a,b}` matches either alternative

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Library asset types that can be filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Prompts,
    Templates,
    Patterns,
    Configs,
    Scripts,
    Workflows,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Prompts,
        ResourceKind::Templates,
        ResourceKind::Patterns,
        ResourceKind::Configs,
        ResourceKind::Scripts,
        ResourceKind::Workflows,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Prompts => "prompts",
            ResourceKind::Templates => "templates",
            ResourceKind::Patterns => "patterns",
            ResourceKind::Configs => "configs",
            ResourceKind::Scripts => "scripts",
            ResourceKind::Workflows => "workflows",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Include/exclude patterns for one resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceFilter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl ResourceFilter {
    /// A path is selected when it matches an include pattern (or there are
    /// none) and matches no exclude pattern.
    pub fn selects(&self, relative_path: &str) -> bool {
        self.is_included(relative_path) && !self.is_excluded(relative_path)
    }

    fn is_included(&self, path: &str) -> bool {
        self.include.is_empty() || self.include.iter().any(|p| matches_pattern(path, p))
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.exclude.iter().any(|p| matches_pattern(path, p))
    }
}

/// Filters for every resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSelection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<ResourceFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates: Option<ResourceFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<ResourceFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configs: Option<ResourceFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts: Option<ResourceFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflows: Option<ResourceFilter>,
}

/// Outcome of previewing a filter against a set of paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPreview {
    pub included: Vec<String>,
    pub excluded: Vec<String>,
}

impl ResourceSelection {
    pub fn filter(&self, kind: ResourceKind) -> Option<&ResourceFilter> {
        match kind {
            ResourceKind::Prompts => self.prompts.as_ref(),
            ResourceKind::Templates => self.templates.as_ref(),
            ResourceKind::Patterns => self.patterns.as_ref(),
            ResourceKind::Configs => self.configs.as_ref(),
            ResourceKind::Scripts => self.scripts.as_ref(),
            ResourceKind::Workflows => self.workflows.as_ref(),
        }
    }

    pub fn filter_mut(&mut self, kind: ResourceKind) -> &mut Option<ResourceFilter> {
        match kind {
            ResourceKind::Prompts => &mut self.prompts,
            ResourceKind::Templates => &mut self.templates,
            ResourceKind::Patterns => &mut self.patterns,
            ResourceKind::Configs => &mut self.configs,
            ResourceKind::Scripts => &mut self.scripts,
            ResourceKind::Workflows => &mut self.workflows,
        }
    }

    /// Keep the paths selected for `kind`. Kinds without a filter keep everything.
    ///
    /// Paths are taken relative to the type directory; a leading `<kind>/` is stripped.
    pub fn filter_resources<S: AsRef<str>>(&self, kind: ResourceKind, paths: &[S]) -> Vec<String> {
        let filter = self.filter(kind);
        paths
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| filter.is_none_or(|f| f.selects(relative_to_kind(p, kind))))
            .map(str::to_string)
            .collect()
    }

    /// Split `paths` into what the filter for `kind` includes and what it
    /// explicitly excludes. Paths matching no include pattern appear in neither.
    pub fn preview<S: AsRef<str>>(&self, kind: ResourceKind, paths: &[S]) -> SelectionPreview {
        let mut preview = SelectionPreview::default();
        let Some(filter) = self.filter(kind) else {
            preview.included = paths.iter().map(|p| p.as_ref().to_string()).collect();
            return preview;
        };

        for path in paths.iter().map(|p| p.as_ref()) {
            let rel = relative_to_kind(path, kind);
            if filter.is_excluded(rel) {
                preview.excluded.push(path.to_string());
            } else if filter.is_included(rel) {
                preview.included.push(path.to_string());
            }
        }
        preview
    }

    /// Warnings for include/exclude pairs that cancel each other out.
    pub fn conflict_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for kind in ResourceKind::ALL {
            let Some(filter) = self.filter(kind) else {
                continue;
            };
            for include in &filter.include {
                for exclude in &filter.exclude {
                    if include.contains(exclude.as_str()) {
                        warnings.push(format!(
                            "Conflicting patterns in {}: include '{}' conflicts with exclude '{}'",
                            kind, include, exclude
                        ));
                    }
                }
            }
        }
        warnings
    }
}

fn relative_to_kind(path: &str, kind: ResourceKind) -> &str {
    let path = path.trim_start_matches('/');
    path.strip_prefix(kind.as_str())
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(path)
}

/// Match `path` against a wildcard `pattern` (anchored, full match).
pub fn matches_pattern(path: &str, pattern: &str) -> bool {
    if path == pattern {
        return true;
    }
    match Regex::new(&wildcard_to_regex(pattern)) {
        Ok(re) => re.is_match(path),
        // Unbalanced classes and the like degrade to substring matching.
        Err(_) => path.contains(pattern),
    }
}

fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                // Class bodies are copied verbatim.
                out.push('[');
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == ']' {
                        break;
                    }
                }
            }
            '{' => {
                let mut body = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    body.push(inner);
                }
                if closed {
                    let options: Vec<String> = body
                        .split(',')
                        .map(|o| regex_lite::escape(o.trim()))
                        .collect();
                    out.push('(');
                    out.push_str(&options.join("|"));
                    out.push(')');
                } else {
                    out.push_str(&regex_lite::escape(&format!("{{{}", body)));
                }
            }
            other => out.push_str(&regex_lite::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    out
}
