//! External annotator boundary
//!
//! The analysis algorithms themselves (entity recognition, linking,
//! keyphrase extraction, sentiment) are external collaborators. They consume
//! the assembled surface and produce typed annotations in the surface's
//! addressing mode; the pipeline files each annotator's output as one named
//! layer. The core never implements these algorithms.

use cmap_common::Result;
use tracing::warn;

use crate::models::{AnnotationSet, AssembledDocument, LayerBuilder, TypedAnnotation};

/// An external analyzer producing typed annotations over an assembled
/// document surface.
pub trait Annotator: Send + Sync {
    /// Layer name the output is filed under
    fn name(&self) -> &str;

    /// Produce annotations in the same addressing mode as the surface.
    fn annotate(&self, doc: &AssembledDocument) -> Result<Vec<TypedAnnotation>>;
}

/// Run every annotator over the document, building one immutable layer per
/// annotator. A failing annotator loses only its own layer, with a warning.
pub fn run_annotators(
    doc: &AssembledDocument,
    annotators: &[std::sync::Arc<dyn Annotator>],
) -> AnnotationSet {
    let mut set = AnnotationSet::new();
    for annotator in annotators {
        match annotator.annotate(doc) {
            Ok(annotations) => {
                let mut builder = LayerBuilder::new(doc.addressing);
                builder.extend(annotations);
                set.insert(annotator.name().to_string(), builder.build());
            }
            Err(e) => {
                warn!(
                    document_id = %doc.meta.id,
                    annotator = %annotator.name(),
                    error = %e,
                    "Annotator failed, dropping its layer"
                );
            }
        }
    }
    set
}
