//! Legacy layout normalization.
//!
//! Older files spell the library location and repository subtree in several
//! ways. They are rewritten on the decoded tree, before typing, into the
//! canonical fields:
//!
//! | Legacy                                  | Canonical            |
//! |-----------------------------------------|----------------------|
//! | `library_base_path`                     | `library_path`       |
//! | `library.path`                          | `library_path`       |
//! | `library.repository.url` / `.branch`    | `repository.url` / `.branch` |
//! | `library.repository.subtree_prefix`     | `repository.path`    |
//! | `repository.subtree_prefix`             | `repository.path`    |
//!
//! A canonical field that is already set always wins over its legacy spelling.

use serde_json::{Map, Value};

/// Rewrite legacy keys in place. Returns a note per rewrite.
pub fn normalize(tree: &mut Value) -> Vec<String> {
    let mut notes = Vec::new();
    let Some(root) = tree.as_object_mut() else {
        return notes;
    };

    if let Some(legacy) = root.remove("library_base_path") {
        if set_if_absent(root, "library_path", legacy) {
            notes.push("library_base_path -> library_path".to_string());
        }
    }

    if let Some(Value::Object(mut library)) = root.remove("library") {
        if let Some(path) = library.remove("path") {
            if set_if_absent(root, "library_path", path) {
                notes.push("library.path -> library_path".to_string());
            }
        }
        if let Some(Value::Object(legacy_repo)) = library.remove("repository") {
            let repository = root
                .entry("repository")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(repository) = repository.as_object_mut() {
                for (from, to) in [("url", "url"), ("branch", "branch"), ("subtree_prefix", "path")] {
                    if let Some(value) = legacy_repo.get(from) {
                        if set_if_absent(repository, to, value.clone()) {
                            notes.push(format!("library.repository.{} -> repository.{}", from, to));
                        }
                    }
                }
            }
        }
    }

    if let Some(Value::Object(repository)) = root.get_mut("repository") {
        if rename_subtree_prefix(repository) {
            notes.push("repository.subtree_prefix -> repository.path".to_string());
        }
    }

    if let Some(Value::Object(repositories)) = root.get_mut("repositories") {
        for (name, repository) in repositories.iter_mut() {
            if let Value::Object(repository) = repository {
                if rename_subtree_prefix(repository) {
                    notes.push(format!(
                        "repositories.{}.subtree_prefix -> repositories.{}.path",
                        name, name
                    ));
                }
            }
        }
    }

    notes
}

fn rename_subtree_prefix(repository: &mut Map<String, Value>) -> bool {
    match repository.remove("subtree_prefix") {
        Some(prefix) => set_if_absent(repository, "path", prefix),
        None => false,
    }
}

fn set_if_absent(map: &mut Map<String, Value>, key: &str, value: Value) -> bool {
    let occupied = map
        .get(key)
        .is_some_and(|v| !v.is_null() && v.as_str() != Some(""));
    if occupied {
        return false;
    }
    map.insert(key.to_string(), value);
    true
}
