//! Two-phase validation of raw configuration content.
//!
//! Phase one decodes YAML into a generic tree and reports the parser's line
//! and column. Phase two checks the tree against an embedded JSON Schema
//! chosen by the document's major version. Schema failures are kept as a
//! structured cause tree; each leaf becomes one readable line plus zero or
//! more suggestions.
//!
//! The interpreter covers the keyword subset the embedded schemas use:
//! `type`, `enum`, `required`, `properties`, `additionalProperties`,
//! `propertyNames`, `maxProperties`, `items`, `pattern`, `minLength`,
//! `maxLength`, `minimum`, `maximum`, `format: uri` and local `$ref`.

use crate::error::{Error, Result, SyntaxError};
use regex_lite::Regex;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

const V1_SCHEMA: &str = include_str!("schema/config.v1.schema.json");
const V2_SCHEMA: &str = include_str!("schema/config.v2.schema.json");

/// Which embedded schema a document is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// 1.x: unknown top-level keys are tolerated.
    V1,
    /// 2.x: closed object shapes throughout.
    V2,
}

impl SchemaVersion {
    /// Pick the schema for a declared version; anything not 2.x uses V1.
    pub fn for_version(version: Option<&str>) -> Self {
        match version.and_then(|v| v.split('.').next()) {
            Some("2") => SchemaVersion::V2,
            _ => SchemaVersion::V1,
        }
    }
}

/// How strictly `required` is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// A complete configuration document.
    Document,
    /// One layer of a merge; required fields may come from other layers.
    Layer,
}

/// What a single schema check found wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    /// Inner node grouping the failures of a sub-value.
    Invalid,
    Required { property: String },
    Type { expected: String, actual: &'static str },
    Enum { allowed: Vec<String> },
    Pattern { pattern: String },
    Format { format: String },
    AdditionalProperty { property: String },
    MinLength { limit: u64 },
    MaxLength { limit: u64 },
    Minimum { limit: f64 },
    Maximum { limit: f64 },
    MaxProperties { limit: u64 },
    /// Free-text message from a validator that has no structured form.
    Other { message: String },
}

/// One node of the cause tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    /// Instance location, one segment per key or array index.
    pub path: Vec<String>,
    pub kind: ViolationKind,
    pub causes: Vec<SchemaViolation>,
}

impl SchemaViolation {
    fn leaf(path: &[String], kind: ViolationKind) -> Self {
        Self {
            path: path.to_vec(),
            kind,
            causes: Vec::new(),
        }
    }

    fn group(path: &[String], causes: Vec<SchemaViolation>) -> Self {
        Self {
            path: path.to_vec(),
            kind: ViolationKind::Invalid,
            causes,
        }
    }

    /// Dotted instance path, empty for the document root.
    pub fn field_path(&self) -> String {
        self.path.join(".")
    }

    /// Every leaf below this node, depth first.
    pub fn leaves(&self) -> Vec<&SchemaViolation> {
        if self.causes.is_empty() {
            return vec![self];
        }
        self.causes.iter().flat_map(|c| c.leaves()).collect()
    }

    /// One human-readable line for a leaf.
    pub fn message(&self) -> String {
        let field = self.field_path();
        match &self.kind {
            ViolationKind::Required { property } if field.is_empty() => {
                format!("missing required field: {}", property)
            }
            ViolationKind::Required { property } => {
                format!("missing required field: {}.{}", field, property)
            }
            ViolationKind::Type { expected, .. } => format!("{}: must be {}", field, expected),
            ViolationKind::Pattern { .. } if field == "version" => {
                "version: must be in format 'X.Y' (e.g., '1.0', '2.1')".to_string()
            }
            ViolationKind::Pattern { .. } => format!("{}: format is invalid", field),
            ViolationKind::Format { format } if format == "uri" => format!(
                "{}: must be a valid URL (e.g., 'https://github.com/user/repo')",
                field
            ),
            ViolationKind::Format { .. } => format!("{}: invalid format", field),
            ViolationKind::AdditionalProperty { property } if field.is_empty() => {
                format!("unknown field: {}", property)
            }
            ViolationKind::AdditionalProperty { property } => {
                format!("unknown field: {}.{}", field, property)
            }
            ViolationKind::Enum { allowed } => {
                format!("{}: must be one of: {}", field, allowed.join(", "))
            }
            ViolationKind::MinLength { limit: 1 } => format!("{}: must not be empty", field),
            ViolationKind::MinLength { limit } => {
                format!("{}: must be at least {} characters", field, limit)
            }
            ViolationKind::MaxLength { limit } => {
                format!("{}: must be at most {} characters", field, limit)
            }
            ViolationKind::Minimum { limit } => format!("{}: must be >= {}", field, limit),
            ViolationKind::Maximum { limit } => format!("{}: must be <= {}", field, limit),
            ViolationKind::MaxProperties { limit } => {
                format!("{}: must have at most {} entries", field, limit)
            }
            ViolationKind::Invalid => format!("{}: invalid value", field),
            ViolationKind::Other { message } => text_message(&field, message),
        }
    }

    /// Fix-it hints for a leaf.
    pub fn suggestions(&self) -> Vec<String> {
        let field = self.field_path();
        match &self.kind {
            ViolationKind::Required { property } if property == "version" => {
                vec!["Add 'version: \"1.0\"' to your configuration".to_string()]
            }
            ViolationKind::Pattern { .. } if field == "version" => {
                vec!["Use version format like '1.0' or '2.1' (with quotes)".to_string()]
            }
            ViolationKind::Format { format } if format == "uri" => {
                vec!["Ensure URL starts with 'https://' or 'http://'".to_string()]
            }
            ViolationKind::Type { expected, .. } if expected == "string" && !field.is_empty() => {
                vec![format!("Wrap {} value in quotes", field)]
            }
            ViolationKind::AdditionalProperty { .. } => vec![
                "Check for typos in field names".to_string(),
                "See documentation for allowed configuration fields".to_string(),
            ],
            ViolationKind::Other { message } => text_suggestions(&field, message),
            _ => Vec::new(),
        }
    }
}

// Fallback for causes that only carry text.
fn text_message(field: &str, message: &str) -> String {
    if message.contains("missing properties") {
        return if field.is_empty() {
            format!("missing required field ({})", message)
        } else {
            format!("missing required field in {}", field)
        };
    }
    if message.contains("additional property") {
        return "contains unknown fields".to_string();
    }
    if field.is_empty() {
        message.to_string()
    } else {
        format!("{}: {}", field, message)
    }
}

fn text_suggestions(field: &str, message: &str) -> Vec<String> {
    let mut out = Vec::new();
    if message.contains("missing properties") && message.contains("version") {
        out.push("Add 'version: \"1.0\"' to your configuration".to_string());
    }
    if message.contains("does not match pattern") && field == "version" {
        out.push("Use version format like '1.0' or '2.1' (with quotes)".to_string());
    }
    if message.contains("format") && message.contains("uri") {
        out.push("Ensure URL starts with 'https://' or 'http://'".to_string());
    }
    if message.contains("additional property") {
        out.push("Check for typos in field names".to_string());
    }
    out
}

/// A failed schema check: the cause tree plus its rendered form.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaReport {
    pub root: SchemaViolation,
    /// One line per leaf cause.
    pub details: Vec<String>,
    /// De-duplicated, in first-seen order.
    pub suggestions: Vec<String>,
}

impl SchemaReport {
    pub fn from_tree(root: SchemaViolation) -> Self {
        let mut details = Vec::new();
        let mut suggestions: Vec<String> = Vec::new();
        for leaf in root.leaves() {
            details.push(leaf.message());
            for suggestion in leaf.suggestions() {
                if !suggestions.contains(&suggestion) {
                    suggestions.push(suggestion);
                }
            }
        }
        Self {
            root,
            details,
            suggestions,
        }
    }

    /// True if any leaf is at `field` (dotted path).
    pub fn mentions(&self, field: &str) -> bool {
        self.root.leaves().iter().any(|leaf| {
            let path = leaf.field_path();
            path == field
                || matches!(&leaf.kind, ViolationKind::Required { property }
                    if (path.is_empty() && property == field)
                        || format!("{}.{}", path, property) == field)
        })
    }
}

impl fmt::Display for SchemaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[SCHEMA] Configuration does not match schema")?;
        if !self.details.is_empty() {
            write!(f, "\n\nDetails: {}", self.details.join("\n"))?;
        }
        if !self.suggestions.is_empty() {
            write!(f, "\n\nSuggestions:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n  - {}", suggestion)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for SchemaReport {}

/// A compiled JSON Schema.
#[derive(Debug)]
pub struct SchemaValidator {
    root: Value,
    patterns: HashMap<String, Regex>,
}

static V1: OnceLock<std::result::Result<SchemaValidator, String>> = OnceLock::new();
static V2: OnceLock<std::result::Result<SchemaValidator, String>> = OnceLock::new();

impl SchemaValidator {
    /// Parse a schema, compile its patterns and check its references resolve.
    pub fn compile(source: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(source)?;
        if !root.is_object() {
            return Err(Error::SchemaCompile("schema root must be an object".into()));
        }

        let mut patterns = HashMap::new();
        let mut refs = Vec::new();
        collect_keywords(&root, &mut patterns, &mut refs)?;
        for reference in refs {
            if resolve_pointer(&root, &reference).is_none() {
                return Err(Error::SchemaCompile(format!(
                    "unresolved reference {}",
                    reference
                )));
            }
        }

        Ok(Self { root, patterns })
    }

    /// The embedded schema for `version`, compiled on first use.
    pub fn embedded(version: SchemaVersion) -> Result<&'static SchemaValidator> {
        let (cell, source) = match version {
            SchemaVersion::V1 => (&V1, V1_SCHEMA),
            SchemaVersion::V2 => (&V2, V2_SCHEMA),
        };
        cell.get_or_init(|| Self::compile(source).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|message| Error::SchemaCompile(message.clone()))
    }

    /// Check `instance`, returning the cause tree on failure.
    pub fn validate(
        &self,
        instance: &Value,
        mode: ValidationMode,
    ) -> std::result::Result<(), SchemaReport> {
        let walker = Walker {
            validator: self,
            mode,
        };
        let causes = walker.check(&self.root, instance, &mut Vec::new());
        if causes.is_empty() {
            Ok(())
        } else {
            Err(SchemaReport::from_tree(SchemaViolation::group(&[], causes)))
        }
    }
}

fn collect_keywords(
    node: &Value,
    patterns: &mut HashMap<String, Regex>,
    refs: &mut Vec<String>,
) -> Result<()> {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("pattern", Value::String(source)) => {
                        let re = Regex::new(source).map_err(|e| {
                            Error::SchemaCompile(format!("bad pattern {}: {}", source, e))
                        })?;
                        patterns.insert(source.clone(), re);
                    }
                    ("$ref", Value::String(reference)) => refs.push(reference.clone()),
                    _ => collect_keywords(value, patterns, refs)?,
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_keywords(item, patterns, refs)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn resolve_pointer<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    reference.strip_prefix('#').and_then(|ptr| root.pointer(ptr))
}

struct Walker<'a> {
    validator: &'a SchemaValidator,
    mode: ValidationMode,
}

impl Walker<'_> {
    fn check(&self, schema: &Value, instance: &Value, path: &mut Vec<String>) -> Vec<SchemaViolation> {
        let mut out = Vec::new();
        let schema = match schema {
            Value::Object(map) => map,
            Value::Bool(false) => {
                out.push(SchemaViolation::leaf(
                    path,
                    ViolationKind::Other {
                        message: "value is not allowed here".into(),
                    },
                ));
                return out;
            }
            _ => return out,
        };

        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            match resolve_pointer(&self.validator.root, reference) {
                Some(target) => out.extend(self.check(target, instance, path)),
                None => out.push(SchemaViolation::leaf(
                    path,
                    ViolationKind::Other {
                        message: format!("unresolved reference {}", reference),
                    },
                )),
            }
        }

        if let Some(expected) = schema.get("type") {
            if !type_matches(expected, instance) {
                out.push(SchemaViolation::leaf(
                    path,
                    ViolationKind::Type {
                        expected: describe_type(expected),
                        actual: type_name(instance),
                    },
                ));
                return out;
            }
        }

        if let Some(Value::Array(allowed)) = schema.get("enum") {
            if !allowed.contains(instance) {
                out.push(SchemaViolation::leaf(
                    path,
                    ViolationKind::Enum {
                        allowed: allowed.iter().map(display_value).collect(),
                    },
                ));
            }
        }

        match instance {
            Value::String(s) => self.check_string(schema, s, path, &mut out),
            Value::Number(n) => check_number(schema, n, path, &mut out),
            Value::Object(map) => self.check_object(schema, map, path, &mut out),
            Value::Array(items) => self.check_array(schema, items, path, &mut out),
            _ => {}
        }
        out
    }

    fn check_string(
        &self,
        schema: &Map<String, Value>,
        s: &str,
        path: &[String],
        out: &mut Vec<SchemaViolation>,
    ) {
        let length = s.chars().count() as u64;
        if let Some(limit) = schema.get("minLength").and_then(Value::as_u64) {
            if length < limit {
                out.push(SchemaViolation::leaf(path, ViolationKind::MinLength { limit }));
            }
        }
        if let Some(limit) = schema.get("maxLength").and_then(Value::as_u64) {
            if length > limit {
                out.push(SchemaViolation::leaf(path, ViolationKind::MaxLength { limit }));
            }
        }
        if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
            let matched = self
                .validator
                .patterns
                .get(pattern)
                .is_none_or(|re| re.is_match(s));
            if !matched {
                out.push(SchemaViolation::leaf(
                    path,
                    ViolationKind::Pattern {
                        pattern: pattern.to_string(),
                    },
                ));
            }
        }
        if let Some(format) = schema.get("format").and_then(Value::as_str) {
            if format == "uri" && !is_valid_url(s) {
                out.push(SchemaViolation::leaf(
                    path,
                    ViolationKind::Format {
                        format: format.to_string(),
                    },
                ));
            }
        }
    }

    fn check_object(
        &self,
        schema: &Map<String, Value>,
        map: &Map<String, Value>,
        path: &mut Vec<String>,
        out: &mut Vec<SchemaViolation>,
    ) {
        if self.mode == ValidationMode::Document {
            if let Some(Value::Array(required)) = schema.get("required") {
                for property in required.iter().filter_map(Value::as_str) {
                    if !map.contains_key(property) {
                        out.push(SchemaViolation::leaf(
                            path,
                            ViolationKind::Required {
                                property: property.to_string(),
                            },
                        ));
                    }
                }
            }
        }

        if let Some(limit) = schema.get("maxProperties").and_then(Value::as_u64) {
            if map.len() as u64 > limit {
                out.push(SchemaViolation::leaf(path, ViolationKind::MaxProperties { limit }));
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        let additional = schema.get("additionalProperties");
        let names = schema.get("propertyNames");

        for (key, value) in map {
            path.push(key.clone());

            if let Some(names) = names {
                let nested = self.check(names, &Value::String(key.clone()), path);
                if !nested.is_empty() {
                    out.push(SchemaViolation::group(path, nested));
                }
            }

            let nested = match (properties.and_then(|p| p.get(key)), additional) {
                (Some(sub), _) => self.check(sub, value, path),
                (None, Some(Value::Bool(false))) => {
                    path.pop();
                    out.push(SchemaViolation::leaf(
                        path,
                        ViolationKind::AdditionalProperty {
                            property: key.clone(),
                        },
                    ));
                    continue;
                }
                (None, Some(sub)) => self.check(sub, value, path),
                (None, None) => Vec::new(),
            };
            if !nested.is_empty() {
                out.push(SchemaViolation::group(path, nested));
            }
            path.pop();
        }
    }

    fn check_array(
        &self,
        schema: &Map<String, Value>,
        items: &[Value],
        path: &mut Vec<String>,
        out: &mut Vec<SchemaViolation>,
    ) {
        let Some(item_schema) = schema.get("items") else {
            return;
        };
        for (index, item) in items.iter().enumerate() {
            path.push(index.to_string());
            let nested = self.check(item_schema, item, path);
            if !nested.is_empty() {
                out.push(SchemaViolation::group(path, nested));
            }
            path.pop();
        }
    }
}

fn check_number(
    schema: &Map<String, Value>,
    n: &Number,
    path: &[String],
    out: &mut Vec<SchemaViolation>,
) {
    let Some(value) = n.as_f64() else {
        return;
    };
    if let Some(limit) = schema.get("minimum").and_then(Value::as_f64) {
        if value < limit {
            out.push(SchemaViolation::leaf(path, ViolationKind::Minimum { limit }));
        }
    }
    if let Some(limit) = schema.get("maximum").and_then(Value::as_f64) {
        if value > limit {
            out.push(SchemaViolation::leaf(path, ViolationKind::Maximum { limit }));
        }
    }
}

fn type_matches(expected: &Value, instance: &Value) -> bool {
    match expected {
        Value::String(name) => is_type(name, instance),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| is_type(name, instance)),
        _ => true,
    }
}

fn is_type(name: &str, instance: &Value) -> bool {
    match name {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "number" => instance.is_number(),
        "integer" => instance.is_i64() || instance.is_u64(),
        _ => true,
    }
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.as_str().unwrap_or("valid").to_string(),
    }
}

fn type_name(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Accepts `scheme://rest` and scp-style `user@host:path` git remotes.
pub fn is_valid_url(value: &str) -> bool {
    static URL: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();
    let Some((standard, scp)) = URL
        .get_or_init(|| {
            let standard = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^\s/?#]+[^\s]*$").ok()?;
            let scp = Regex::new(r"^[A-Za-z0-9_.\-]+@[A-Za-z0-9_.\-]+:[^\s]+$").ok()?;
            Some((standard, scp))
        })
        .as_ref()
    else {
        return !value.is_empty();
    };
    standard.is_match(value) || scp.is_match(value)
}

/// Phase one: decode YAML into a generic tree. An empty document is an empty mapping.
pub fn parse_yaml(content: &str) -> std::result::Result<Value, SyntaxError> {
    let blank = content
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#') || line == "---");
    if blank {
        return Ok(Value::Object(Map::new()));
    }
    match serde_yaml::from_str::<Value>(content) {
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(value) => Ok(value),
        Err(err) => Err(syntax_error(&err)),
    }
}

fn syntax_error(err: &serde_yaml::Error) -> SyntaxError {
    let message = err.to_string();
    let (line, column) = match err.location() {
        Some(location) => (Some(location.line()), Some(location.column())),
        None => (
            number_after(&message, r"line (\d+)"),
            number_after(&message, r"column (\d+)"),
        ),
    };
    SyntaxError {
        line,
        column,
        message,
    }
}

fn number_after(text: &str, pattern: &str) -> Option<usize> {
    Regex::new(pattern)
        .ok()?
        .captures(text)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Both phases over raw content. Returns the decoded tree on success.
pub fn validate_content(content: &str, mode: ValidationMode) -> Result<Value> {
    let tree = parse_yaml(content)?;
    let version = SchemaVersion::for_version(tree.get("version").and_then(Value::as_str));
    SchemaValidator::embedded(version)?.validate(&tree, mode)?;
    Ok(tree)
}
