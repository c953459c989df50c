//! Character-addressed document assembly
//!
//! Concatenates the configured text fields, in order, into one document text
//! with field-provenance segments. Offsets are byte offsets into the
//! assembled UTF-8 text; segments are ordered, non-overlapping, and together
//! with the separators span the full text.

use tracing::warn;

use crate::assembly::{field_label, FIELD_SEPARATOR};
use crate::fields::FetchedDocument;
use crate::models::{Addressing, AssembledDocument, Segment, Span};
use crate::sanitize::sanitize;

/// Assemble the document text from `fields`, in order.
///
/// Absent fields are skipped silently; malformed (non-string) fields are
/// skipped with a warning. Never fails: a document with no present field
/// yields empty text and no segments.
pub fn assemble(doc: &FetchedDocument, fields: &[String]) -> AssembledDocument {
    let mut text = String::new();
    let mut segments = Vec::new();

    for field in fields {
        let raw = match doc.text(field) {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(e) => {
                warn!(document_id = %doc.id, field = %field, error = %e, "Skipping malformed text field");
                continue;
            }
        };

        if !text.is_empty() {
            text.push_str(FIELD_SEPARATOR);
        }
        let begin = text.len() as i64;
        text.push_str(&sanitize(raw));

        segments.push(Segment {
            span: Span::new(begin, text.len() as i64),
            source_field: field.clone(),
            label: field_label(field),
        });
    }

    AssembledDocument {
        meta: doc.meta(),
        addressing: Addressing::Character,
        text,
        segments,
        ..Default::default()
    }
}
