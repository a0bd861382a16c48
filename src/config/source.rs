//! Guarded reads of configuration files.

use super::security::SecurityPolicy;
use crate::error::{Error, Result, SecurityViolation};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// File extensions a configuration source may have.
pub const ALLOWED_EXTENSIONS: &[&str] = &["yml", "yaml", "json"];

/// Reads configuration files subject to path and size limits.
#[derive(Debug, Clone, Default)]
pub struct SourceReader {
    policy: SecurityPolicy,
    /// When non-empty, every path must live under one of these.
    allowed_roots: Vec<PathBuf>,
}

impl SourceReader {
    pub fn new(policy: SecurityPolicy) -> Self {
        Self {
            policy,
            allowed_roots: Vec::new(),
        }
    }

    /// Restrict reads to paths under `roots`.
    pub fn with_allowed_roots(mut self, roots: impl IntoIterator<Item = PathBuf>) -> Self {
        self.allowed_roots = roots.into_iter().collect();
        self
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Reject traversal, over-long paths, unknown extensions and paths
    /// outside the allowed roots.
    pub fn check_path(&self, path: &Path) -> Result<()> {
        if path.as_os_str().len() > self.policy.max_path_length {
            return Err(Error::invalid_path(path, "path too long"));
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(Error::invalid_path(path, "path traversal not allowed"));
        }

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !ALLOWED_EXTENSIONS.contains(&extension) {
            return Err(Error::invalid_path(
                path,
                format!(
                    "unsupported extension '{}' (expected one of: {})",
                    extension,
                    ALLOWED_EXTENSIONS.join(", ")
                ),
            ));
        }

        if !self.allowed_roots.is_empty() && !self.is_under_allowed_root(path) {
            return Err(Error::invalid_path(path, "outside of allowed directories"));
        }
        Ok(())
    }

    fn is_under_allowed_root(&self, path: &Path) -> bool {
        if self.allowed_roots.iter().any(|root| path.starts_with(root)) {
            return true;
        }
        // Symlinked temp or home directories only compare equal once resolved.
        let resolved = path
            .parent()
            .and_then(|parent| parent.canonicalize().ok())
            .map(|parent| match path.file_name() {
                Some(name) => parent.join(name),
                None => parent,
            });
        let Some(resolved) = resolved else {
            return false;
        };
        self.allowed_roots
            .iter()
            .filter_map(|root| root.canonicalize().ok())
            .any(|root| resolved.starts_with(root))
    }

    /// Read `path` as UTF-8. `Ok(None)` means the file does not exist.
    pub fn read(&self, path: &Path) -> Result<Option<String>> {
        self.check_path(path)?;

        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("config source {} not present", path.display());
                return Ok(None);
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        if !metadata.is_file() {
            return Err(Error::invalid_path(path, "not a regular file"));
        }
        if metadata.len() > self.policy.max_file_size {
            return Err(SecurityViolation::FileTooLarge {
                size: metadata.len(),
                max: self.policy.max_file_size,
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        debug!("read config source {} ({} bytes)", path.display(), content.len());
        Ok(Some(content))
    }

    /// Like [`read`](Self::read), but a missing file is an error.
    pub fn read_required(&self, path: &Path) -> Result<String> {
        self.read(path)?
            .ok_or_else(|| Error::NotFound(path.to_path_buf()))
    }
}
