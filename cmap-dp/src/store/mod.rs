//! Document store access
//!
//! - `fetch`: filtered, projected, id-sorted document retrieval
//! - `sync`: idempotent result/stage write-back and child-record insertion
//! - `snapshot`: codec-tagged annotation-graph blobs
//!
//! All access goes through the shared `sqlx` SQLite pool initialized by
//! `cmap_common::db`; documents are single rows with a nested JSON body.

pub mod fetch;
pub mod snapshot;
pub mod sync;

/// Split a dot-qualified field path into its key components.
pub(crate) fn split_path(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

/// Convert a dot-qualified field path to a SQLite JSON path expression.
pub(crate) fn json_path(field: &str) -> String {
    format!("$.{}", field)
}

/// Navigate a dot-qualified path through a nested JSON value.
pub(crate) fn resolve_path<'a>(
    root: &'a serde_json::Value,
    field: &str,
) -> Option<&'a serde_json::Value> {
    let mut current = root;
    for key in field.split('.') {
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}

/// Set a path (as key components) inside a nested JSON value, creating
/// intermediate objects as needed; non-object intermediates are replaced.
pub(crate) fn set_components(root: &mut serde_json::Value, keys: &[String], value: serde_json::Value) {
    let mut current = root;
    for key in &keys[..keys.len() - 1] {
        if !current.is_object() {
            *current = serde_json::Value::Object(serde_json::Map::new());
        }
        current = current
            .as_object_mut()
            .expect("just ensured object")
            .entry(key.clone())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    }
    if !current.is_object() {
        *current = serde_json::Value::Object(serde_json::Map::new());
    }
    current
        .as_object_mut()
        .expect("just ensured object")
        .insert(keys[keys.len() - 1].clone(), value);
}

/// Set a dot-qualified path inside a nested JSON value.
pub(crate) fn set_path(root: &mut serde_json::Value, field: &str, value: serde_json::Value) {
    set_components(root, &split_path(field), value);
}
