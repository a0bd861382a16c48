//! Layered configuration for the DDx CLI.
//!
//! Merges up to four tiers field by field, lowest to highest:
//! 1. **Defaults** - built into the binary
//! 2. **Global** - `~/.ddx.yml`
//! 3. **Local** - `./.ddx/config.yaml`, falling back to `./.ddx.yml`
//! 4. **Environment** - `./.ddx.<DDX_ENV>.yml`
//!
//! ## Merge Strategy
//! - Scalars: the higher tier wins when its value is non-empty
//! - `includes`: order-preserving union
//! - `variables`, `overrides`, `persona_bindings`: key-wise overwrite
//! - `repository.auth/proxy/sync` and each `resources` kind: replaced whole
//!
//! Every file passes a security scan, syntax decode, schema check and legacy
//! normalization before it is merged. The merged result is validated once more.
//!
//! ## Environment Variables
//! - `DDX_ENV` - Selects the environment override file
//! - `DDX_LIBRARY_BASE_PATH` - Overrides `library_path` after merging
//! - `HOME` / `USERPROFILE` - Location of the global file

mod accessor;
mod cache;
mod library;
mod loader;
mod merge;
mod migrate;
mod normalize;
mod resources;
pub mod schema;
mod security;
mod source;
mod types;
mod validate;
mod variables;

pub use accessor::settable_keys;
pub use cache::{CacheEntry, ConfigCache, default_ttl, file_info_hash};
pub use library::{LIBRARY_DIR, LibraryLocator};
pub use loader::{
    CONFIG_DIR_FILE, CONFIG_FILE, ConfigLoader, ConfigLoaderBuilder, ConfigPaths, ConfigTier,
    LayerSource,
};
pub use merge::{merge_all, union_list};
pub use migrate::{IDEMPOTENT_RULES, IdempotentRule, MigrationRule, RULES, plan};
pub use normalize::normalize;
pub use resources::{
    ResourceFilter, ResourceKind, ResourceSelection, SelectionPreview, matches_pattern,
};
pub use schema::{SchemaReport, SchemaValidator, SchemaVersion, ValidationMode};
pub use security::{REDACTED, SecurityPolicy, is_sensitive, sanitize_for_save};
pub use source::SourceReader;
pub use types::*;
pub use validate::is_valid_variable_name;
pub use variables::MAX_REPLACEMENTS;

use crate::error::Result;
use std::path::Path;

/// Load the merged configuration for the current directory and environment.
pub fn load() -> Result<Config> {
    Ok(ConfigLoader::load()?.into_config())
}

/// Load the merged configuration as seen from `dir`.
pub fn load_with_working_dir(dir: impl AsRef<Path>) -> Result<Config> {
    let paths = ConfigPaths::for_working_dir(dir.as_ref());
    Ok(ConfigLoader::load_with_paths(paths)?.into_config())
}

/// Load one complete file, without defaults or other tiers.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    ConfigLoader::builder()
        .no_cache()
        .build()
        .load_file(path.as_ref())
}
