//! Time-anchored entity aggregation
//!
//! For each linked-entity annotation on a time-addressed surface, emits a
//! record anchored to the begin time of the first speech token the
//! annotation contains (0 when it contains none). Serialized as one
//! pretty-printed JSON string.

use cmap_common::Result;
use serde_json::{json, Value};
use tracing::warn;

use crate::models::{contained_in, Addressing, AnnotationLayer, AssembledDocument};

/// Aggregate the layer into a serialized entity list.
pub fn aggregate(doc: &AssembledDocument, layer: &AnnotationLayer) -> Result<Value> {
    if layer.addressing() != Addressing::Time {
        warn!(
            document_id = %doc.meta.id,
            "Timed-entity aggregation over a non-time-addressed layer, emitting empty list"
        );
        return Ok(Value::String("[]".to_string()));
    }

    let mut records = Vec::with_capacity(layer.len());
    for annotation in layer.iter() {
        let begin_time = contained_in(&doc.tokens, &annotation.span)
            .next()
            .map(|token| token.span.begin)
            .unwrap_or(0);
        records.push(json!({
            "beginTime": begin_time,
            "text": annotation.text,
            "uri": annotation.uri,
            "types": annotation.raw_type,
        }));
    }

    let serialized = serde_json::to_string_pretty(&records)
        .map_err(|e| cmap_common::Error::Internal(format!("serializing timed entities: {}", e)))?;
    Ok(Value::String(serialized))
}
