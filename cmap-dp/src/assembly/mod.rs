//! Document assembly components
//!
//! Each submodule turns one family of raw per-document metadata into an
//! [`AssembledDocument`](crate::models::AssembledDocument):
//! - `document`: character-addressed text assembly from plain text fields
//! - `asr`: time-addressed speech tokens and speaker turns
//! - `ocr`: ranked optical-text hypotheses per detection frame
//!
//! Fields contributing to one document are joined by a fixed 3-character
//! newline separator in the assembled/rendered text.

pub mod asr;
pub mod document;
pub mod ocr;

/// Separator between contributions of different source fields
pub const FIELD_SEPARATOR: &str = "\n\n\n";

/// Last dot-path component of a field name, used as the segment label
pub(crate) fn field_label(field: &str) -> String {
    field
        .rsplit('.')
        .next()
        .unwrap_or(field)
        .to_string()
}
