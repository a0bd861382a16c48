//! Locating the template/pattern/prompt library on disk.
//!
//! Resolution order:
//! 1. An explicit override (command-line flag)
//! 2. `DDX_LIBRARY_BASE_PATH`
//! 3. The nearest `.ddx/library` in the working directory or its ancestors,
//!    or the expected `.ddx/library` next to an ancestor `.ddx.yml`
//! 4. `~/.ddx/library`
//!
//! Paths from 1 and 2 must exist; 3 and 4 may not exist yet.

use super::loader::ConfigPaths;
use super::resources::ResourceKind;
use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub const LIBRARY_DIR: &str = "library";

/// Resolves the library directory for one working directory.
#[derive(Debug, Clone)]
pub struct LibraryLocator {
    working_dir: PathBuf,
    home_dir: Option<PathBuf>,
    env_path: Option<PathBuf>,
}

impl LibraryLocator {
    pub fn new(paths: &ConfigPaths) -> Self {
        Self {
            working_dir: paths.working_dir.clone(),
            home_dir: paths.home_dir.clone(),
            env_path: paths.library_base_path.clone(),
        }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    /// The library directory, honouring `override_path` first.
    pub fn resolve(&self, override_path: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = override_path.filter(|p| !p.as_os_str().is_empty()) {
            let path = self.absolute(path);
            if !path.is_dir() {
                return Err(Error::invalid_path(path, "library path does not exist"));
            }
            debug!("library from override: {}", path.display());
            return Ok(path);
        }

        if let Some(ref env_path) = self.env_path {
            let path = self.absolute(env_path);
            if !path.is_dir() {
                return Err(Error::invalid_path(
                    path,
                    "DDX_LIBRARY_BASE_PATH does not exist",
                ));
            }
            debug!("library from DDX_LIBRARY_BASE_PATH: {}", path.display());
            return Ok(path);
        }

        if let Some(path) = self.nearest_project_library() {
            debug!("library from project: {}", path.display());
            return Ok(path);
        }

        let home = self
            .home_dir
            .as_ref()
            .ok_or_else(|| Error::invalid_path("~", "cannot determine home directory"))?;
        Ok(home.join(".ddx").join(LIBRARY_DIR))
    }

    fn nearest_project_library(&self) -> Option<PathBuf> {
        for dir in self.working_dir.ancestors() {
            let library = dir.join(".ddx").join(LIBRARY_DIR);
            if library.is_dir() {
                return Some(library);
            }
            // A project root without a library yet.
            if dir.join(".ddx.yml").is_file() {
                return Some(library);
            }
        }
        None
    }

    /// Full path of `resource` inside the library. It must exist.
    pub fn resolve_resource(&self, resource: &str, override_path: Option<&Path>) -> Result<PathBuf> {
        let relative = Path::new(resource);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(Error::invalid_path(relative, "invalid resource path"));
        }

        let full = self.resolve(override_path)?.join(relative);
        if !full.exists() {
            return Err(Error::NotFound(full));
        }
        Ok(full)
    }

    /// Directory for one resource kind (`<library>/prompts`, ...).
    pub fn resource_dir(&self, kind: ResourceKind, override_path: Option<&Path>) -> Result<PathBuf> {
        Ok(self.resolve(override_path)?.join(kind.as_str()))
    }

    pub fn personas_path(&self, override_path: Option<&Path>) -> Result<PathBuf> {
        Ok(self.resolve(override_path)?.join("personas"))
    }

    pub fn mcp_servers_path(&self, override_path: Option<&Path>) -> Result<PathBuf> {
        Ok(self.resolve(override_path)?.join("mcp-servers"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn locator(work: &Path, home: &Path) -> LibraryLocator {
        LibraryLocator::new(&ConfigPaths::with_dirs(work, Some(home.to_path_buf())))
    }

    #[test]
    fn test_override_must_exist() {
        let temp = TempDir::new().unwrap();
        let lib = temp.path().join("lib");
        let locator = locator(temp.path(), temp.path());

        assert!(locator.resolve(Some(&lib)).is_err());
        std::fs::create_dir(&lib).unwrap();
        assert_eq!(locator.resolve(Some(&lib)).unwrap(), lib);
        // Relative overrides are taken from the working directory.
        assert_eq!(locator.resolve(Some(Path::new("lib"))).unwrap(), lib);
    }

    #[test]
    fn test_env_path_beats_project() {
        let temp = TempDir::new().unwrap();
        let env_lib = temp.path().join("env-lib");
        std::fs::create_dir(&env_lib).unwrap();
        std::fs::create_dir_all(temp.path().join(".ddx/library")).unwrap();

        let paths = ConfigPaths::with_dirs(temp.path(), None).with_library_base_path(&env_lib);
        assert_eq!(LibraryLocator::new(&paths).resolve(None).unwrap(), env_lib);
    }

    #[test]
    fn test_nearest_ancestor_library() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        let nested = project.join("src/deep");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(project.join(".ddx/library")).unwrap();

        let home = TempDir::new().unwrap();
        assert_eq!(
            locator(&nested, home.path()).resolve(None).unwrap(),
            project.join(".ddx/library")
        );
    }

    #[test]
    fn test_project_root_without_library() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".ddx.yml"), "version: \"1.0\"\n").unwrap();
        let home = TempDir::new().unwrap();
        assert_eq!(
            locator(temp.path(), home.path()).resolve(None).unwrap(),
            temp.path().join(".ddx/library")
        );
    }

    #[test]
    fn test_resources() {
        let temp = TempDir::new().unwrap();
        let lib = temp.path().join(".ddx/library");
        std::fs::create_dir_all(lib.join("prompts/claude")).unwrap();
        let locator = locator(temp.path(), temp.path());

        assert_eq!(
            locator.resolve_resource("prompts/claude", None).unwrap(),
            lib.join("prompts/claude")
        );
        assert!(locator.resolve_resource("../etc", None).is_err());
        assert!(locator.resolve_resource("/etc", None).is_err());
        assert!(locator.resolve_resource("prompts/missing", None).unwrap_err().is_not_found());
        assert_eq!(
            locator.resource_dir(ResourceKind::Templates, None).unwrap(),
            lib.join("templates")
        );
        assert_eq!(locator.personas_path(None).unwrap(), lib.join("personas"));
    }
}
