//! Document keyphrase aggregation
//!
//! Collects keyphrase annotations into `{"keyphrases": [...]}`. Deprecated
//! keyphrase variants contribute no phrase text; enrichment payloads are
//! appended whenever present.

use serde_json::{json, Value};

use crate::models::AnnotationLayer;

/// Raw type label marking a superseded keyphrase variant
pub const DEPRECATED_LABEL: &str = "keyphrase-deprecated";

/// Aggregate the keyphrase layer into the persisted result object.
pub fn aggregate(layer: &AnnotationLayer) -> Value {
    let mut phrases = Vec::new();
    for annotation in layer.iter() {
        if annotation.raw_type != DEPRECATED_LABEL {
            phrases.push(Value::String(annotation.text.clone()));
        }
        if let Some(enrichment) = &annotation.enrichment {
            phrases.push(enrichment.clone());
        }
    }
    json!({ "keyphrases": phrases })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Addressing, LayerBuilder, Span, TypedAnnotation};

    fn keyphrase(text: &str, raw_type: &str, enrichment: Option<Value>) -> TypedAnnotation {
        TypedAnnotation {
            span: Span::new(0, text.len() as i64),
            text: text.to_string(),
            raw_type: raw_type.to_string(),
            uri: None,
            enrichment,
        }
    }

    #[test]
    fn test_keyphrases_collected() {
        let mut builder = LayerBuilder::new(Addressing::Character);
        builder.push(keyphrase("climate change", "keyphrase", None));
        builder.push(keyphrase("old phrase", DEPRECATED_LABEL, None));
        builder.push(keyphrase(
            "energy policy",
            "keyphrase",
            Some(json!("energy policy (enriched)")),
        ));
        let result = aggregate(&builder.build());

        assert_eq!(
            result["keyphrases"],
            json!(["climate change", "energy policy", "energy policy (enriched)"])
        );
    }

    #[test]
    fn test_empty_layer() {
        let builder = LayerBuilder::new(Addressing::Character);
        let result = aggregate(&builder.build());
        assert_eq!(result["keyphrases"], json!([]));
    }
}
