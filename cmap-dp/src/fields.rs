//! Flattened field access for fetched documents
//!
//! The fetch interface projects dot-qualified paths out of a document's
//! nested JSON body into a flat field→value map. Accessors here keep
//! "field absent" (skip silently) and "field present but malformed" (warn
//! and drop the field's contribution) distinguishable, instead of collapsing
//! both to a missing-value lookup.

use cmap_common::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::models::DocumentMeta;

/// Conventional metadata paths
pub const META_TITLE: &str = "meta.source.headline";
pub const META_DATE_PUBLISHED: &str = "meta.source.datePublished";
pub const META_MEDIA_URL: &str = "meta.source.mediaurl";

/// One document as returned by the fetch interface: stable external id,
/// optional language, and the projected field map.
#[derive(Debug, Clone, Default)]
pub struct FetchedDocument {
    pub id: String,
    pub language: Option<String>,
    fields: HashMap<String, Value>,
}

impl FetchedDocument {
    pub fn new(id: impl Into<String>, language: Option<String>) -> Self {
        Self {
            id: id.into(),
            language,
            fields: HashMap::new(),
        }
    }

    pub fn insert(&mut self, path: impl Into<String>, value: Value) {
        self.fields.insert(path.into(), value);
    }

    /// Raw field lookup; `None` means the document does not carry the field.
    pub fn get(&self, path: &str) -> Option<&Value> {
        // JSON null from a projection counts as absent
        self.fields.get(path).filter(|v| !v.is_null())
    }

    /// String field: absent → `Ok(None)`, non-string → `Malformed`.
    pub fn text(&self, path: &str) -> Result<Option<&str>> {
        match self.get(path) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(Error::malformed(path, format!("expected string, got {}", kind(other)))),
        }
    }

    /// String field that must be present: absent → `MissingField`,
    /// non-string → `Malformed`.
    pub fn require_text(&self, path: &str) -> Result<&str> {
        self.text(path)?.ok_or_else(|| Error::missing(path))
    }

    /// Object field: absent → `Ok(None)`, non-object → `Malformed`.
    pub fn object(&self, path: &str) -> Result<Option<&Map<String, Value>>> {
        match self.get(path) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(Error::malformed(path, format!("expected object, got {}", kind(other)))),
        }
    }

    /// Load document metadata from the conventional paths; absence of any
    /// metadata field is never an error.
    pub fn meta(&self) -> DocumentMeta {
        DocumentMeta {
            id: self.id.clone(),
            language: self.language.clone(),
            title: self.text(META_TITLE).ok().flatten().map(str::to_string),
            date_published: self
                .text(META_DATE_PUBLISHED)
                .ok()
                .flatten()
                .map(str::to_string),
            media_url: self.text(META_MEDIA_URL).ok().flatten().map(str::to_string),
        }
    }
}

/// Required string member of a nested object.
pub fn member_str<'a>(obj: &'a Map<String, Value>, key: &str, field: &str) -> Result<&'a str> {
    match obj.get(key) {
        None => Err(Error::malformed(field, format!("missing key '{}'", key))),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(Error::malformed(
            field,
            format!("key '{}': expected string, got {}", key, kind(other)),
        )),
    }
}

/// Required numeric member of a nested object. Numeric strings are accepted,
/// matching how source documents sometimes store offsets.
pub fn member_f64(obj: &Map<String, Value>, key: &str, field: &str) -> Result<f64> {
    match obj.get(key) {
        None => Err(Error::malformed(field, format!("missing key '{}'", key))),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| Error::malformed(field, format!("key '{}': non-finite number", key))),
        Some(Value::String(s)) => s
            .parse::<f64>()
            .map_err(|_| Error::malformed(field, format!("key '{}': unparsable number '{}'", key, s))),
        Some(other) => Err(Error::malformed(
            field,
            format!("key '{}': expected number, got {}", key, kind(other)),
        )),
    }
}

/// Required array member of a nested object.
pub fn member_array<'a>(obj: &'a Map<String, Value>, key: &str, field: &str) -> Result<&'a Vec<Value>> {
    match obj.get(key) {
        None => Err(Error::malformed(field, format!("missing key '{}'", key))),
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(Error::malformed(
            field,
            format!("key '{}': expected array, got {}", key, kind(other)),
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
