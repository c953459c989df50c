//! Whole-document sentiment aggregation
//!
//! Sums a numeric polarity score over all annotations of the configured
//! layer and discretizes: score > 0 → POSITIVE, score < 0 → NEGATIVE,
//! score == 0 → NEUTRAL.

use serde_json::{json, Value};
use tracing::warn;

use crate::models::{AnnotationLayer, AssembledDocument, TypedAnnotation};

pub const POSITIVE: &str = "POSITIVE";
pub const NEGATIVE: &str = "NEGATIVE";
pub const NEUTRAL: &str = "NEUTRAL";

/// Aggregate the layer into `{discrete, numeric}`.
pub fn aggregate(doc: &AssembledDocument, layer: &AnnotationLayer) -> Value {
    let mut numeric = 0.0;
    for annotation in layer.iter() {
        match polarity(annotation) {
            Some(score) => numeric += score,
            None => {
                warn!(
                    document_id = %doc.meta.id,
                    text = %annotation.text,
                    "Skipping opinion annotation without parsable polarity"
                );
            }
        }
    }

    let discrete = if numeric > 0.0 {
        POSITIVE
    } else if numeric < 0.0 {
        NEGATIVE
    } else {
        NEUTRAL
    };

    json!({
        "discrete": discrete,
        "numeric": numeric,
    })
}

/// Polarity score carried in the annotation's enrichment payload: a number,
/// a numeric string, or an object with a `polarity` member.
fn polarity(annotation: &TypedAnnotation) -> Option<f64> {
    match annotation.enrichment.as_ref()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        Value::Object(map) => match map.get("polarity")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        },
        _ => None,
    }
}
