//! Per-frame entity aggregation
//!
//! Groups character-addressed entity annotations by the top-ranked optical
//! detection frame containing them. Only frames with at least one contained
//! annotation are emitted; each record carries the frame's time range, its
//! best transcript and confidence, and the contained linked-entity and
//! plain-entity lists.

use serde_json::{json, Value};
use tracing::warn;

use crate::models::{Addressing, AnnotationLayer, AssembledDocument};

/// Aggregate contained annotations per top hypothesis into a result array.
pub fn aggregate(
    doc: &AssembledDocument,
    linked: Option<&AnnotationLayer>,
    entities: Option<&AnnotationLayer>,
) -> Value {
    let linked = checked(doc, linked);
    let entities = checked(doc, entities);

    let mut records = Vec::new();
    for top in doc.top_hypotheses() {
        let linked_hits: Vec<Value> = linked
            .iter()
            .flat_map(|layer| layer.contained_in(&top.span))
            .map(|a| {
                json!({
                    "text": a.text,
                    "uri": a.uri,
                    "types": a.raw_type,
                })
            })
            .collect();
        let entity_hits: Vec<Value> = entities
            .iter()
            .flat_map(|layer| layer.contained_in(&top.span))
            .map(|a| {
                json!({
                    "text": a.text,
                    "type": a.raw_type,
                })
            })
            .collect();

        // only frames with at least one annotation are emitted
        if linked_hits.is_empty() && entity_hits.is_empty() {
            continue;
        }

        records.push(json!({
            "start": top.frame.begin,
            "end": top.frame.end,
            "transcript": top.text,
            "score": top.confidence,
            "dbpedia": linked_hits,
            "ner": entity_hits,
        }));
    }

    Value::Array(records)
}

/// Drop a layer whose addressing mode does not match the document's.
fn checked<'a>(
    doc: &AssembledDocument,
    layer: Option<&'a AnnotationLayer>,
) -> Option<&'a AnnotationLayer> {
    match layer {
        Some(layer) if layer.addressing() != Addressing::Character => {
            warn!(
                document_id = %doc.meta.id,
                "Frame-entity aggregation over a non-character-addressed layer, ignoring it"
            );
            None
        }
        other => other,
    }
}
