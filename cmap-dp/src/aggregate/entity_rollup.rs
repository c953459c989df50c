//! Whole-document entity rollup
//!
//! Builds one nested map per configured layer: canonical type → ordered list
//! of entity strings, every entity additionally filed under `all`. The
//! unverified linked-entity layer passes through a surface-form filter that
//! keeps only multi-word or non-all-lowercase mentions, dropping the
//! low-precision single-word lowercase links.

use serde_json::{Map, Value};
use tracing::warn;

use crate::aggregate::normalize::normalize;
use crate::models::{AnnotationSet, AssembledDocument, TypedAnnotation};

/// One layer's contribution to the rollup
#[derive(Debug, Clone)]
pub struct RollupLayer {
    /// Annotation layer name to read
    pub layer: String,
    /// Output key in the persisted result
    pub key: String,
    /// File the linked-resource URI instead of the covered text
    pub use_uri: bool,
    /// Apply the surface-form precision filter
    pub surface_filter: bool,
}

/// Default rollup mirroring the standard entity stage: verified links,
/// unverified links (filtered), and plain named entities.
pub fn default_layers() -> Vec<RollupLayer> {
    vec![
        RollupLayer {
            layer: "linked".to_string(),
            key: "dbpedia".to_string(),
            use_uri: true,
            surface_filter: true,
        },
        RollupLayer {
            layer: "linked-verified".to_string(),
            key: "dbpedia-filtered".to_string(),
            use_uri: true,
            surface_filter: false,
        },
        RollupLayer {
            layer: "ner".to_string(),
            key: "ner".to_string(),
            use_uri: false,
            surface_filter: false,
        },
    ]
}

/// Aggregate the configured layers into the nested rollup object.
pub fn aggregate(doc: &AssembledDocument, set: &AnnotationSet, layers: &[RollupLayer]) -> Value {
    let mut rollup = Map::new();
    for config in layers {
        let mut buckets: Map<String, Value> = Map::new();
        match set.get(&config.layer) {
            Some(layer) => {
                for annotation in layer.iter() {
                    if config.surface_filter && !passes_surface_filter(&annotation.text) {
                        continue;
                    }
                    file_annotation(&mut buckets, annotation, config.use_uri);
                }
            }
            None => {
                warn!(document_id = %doc.meta.id, layer = %config.layer, "Rollup layer absent, emitting empty buckets");
            }
        }
        rollup.insert(config.key.clone(), Value::Object(buckets));
    }
    Value::Object(rollup)
}

/// Keep multi-word mentions and mentions that are not all-lowercase.
fn passes_surface_filter(text: &str) -> bool {
    text.contains(' ') || text != text.to_lowercase()
}

fn file_annotation(buckets: &mut Map<String, Value>, annotation: &TypedAnnotation, use_uri: bool) {
    let entity = if use_uri {
        match &annotation.uri {
            Some(uri) => uri.clone(),
            None => annotation.text.clone(),
        }
    } else {
        annotation.text.clone()
    };

    for canonical in normalize(&annotation.raw_type) {
        let list = buckets
            .entry(canonical.as_str().to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = list {
            items.push(Value::String(entity.clone()));
        }
    }
}
