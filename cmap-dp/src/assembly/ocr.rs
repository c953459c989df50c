//! Ranked optical-text hypothesis assembly
//!
//! Each detection frame carries a time range and hypotheses already sorted
//! by descending confidence. The first hypothesis of a frame is its top
//! hypothesis and alone carries the confidence ratio (second-best over best,
//! 0 when the frame has fewer than two hypotheses). The assembled text is
//! character-addressed: top hypotheses are appended one per line followed by
//! a sentence mark so downstream annotators see sentence boundaries.

use cmap_common::time::secs_to_ms;
use cmap_common::Result;
use serde_json::Value;
use tracing::warn;

use crate::assembly::{field_label, FIELD_SEPARATOR};
use crate::fields::{member_array, member_f64, member_str, FetchedDocument};
use crate::models::{
    Addressing, AssembledDocument, HypothesisRank, OcrHypothesis, Segment, Span,
};

/// Aligner configuration
#[derive(Debug, Clone)]
pub struct OcrOptions {
    /// Only emit the top hypothesis of each frame
    pub only_best: bool,
    /// Stack alternates on the top hypothesis's character span; when false,
    /// alternates are appended to the text with their own disjoint spans
    pub vertically_aligned: bool,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            only_best: true,
            vertically_aligned: true,
        }
    }
}

/// Assemble ranked optical-text hypotheses for one document.
///
/// A frame with zero hypotheses contributes nothing; a malformed frame is
/// dropped with a warning, leaving sibling frames unaffected.
pub fn assemble(doc: &FetchedDocument, fields: &[String], options: &OcrOptions) -> AssembledDocument {
    let mut assembled = AssembledDocument {
        meta: doc.meta(),
        addressing: Addressing::Character,
        ..Default::default()
    };

    for field in fields {
        if let Err(e) = assemble_field(doc, field, options, &mut assembled) {
            warn!(document_id = %doc.id, field = %field, error = %e, "Skipping malformed detection field");
        }
    }

    assembled
}

fn assemble_field(
    doc: &FetchedDocument,
    field: &str,
    options: &OcrOptions,
    assembled: &mut AssembledDocument,
) -> Result<()> {
    let detection = match doc.object(field)? {
        Some(detection) => detection,
        None => return Ok(()),
    };
    let frames = member_array(detection, "VideoTextDetection", field)?;

    if !assembled.text.is_empty() {
        assembled.text.push_str(FIELD_SEPARATOR);
    }
    let segment_begin = assembled.text.len() as i64;

    for frame in frames {
        if let Err(e) = assemble_frame(frame, field, options, assembled) {
            warn!(document_id = %doc.id, field = %field, error = %e, "Skipping malformed detection frame");
        }
    }

    assembled.segments.push(Segment {
        span: Span::new(segment_begin, assembled.text.len() as i64),
        source_field: field.to_string(),
        label: field_label(field),
    });

    Ok(())
}

fn assemble_frame(
    frame: &Value,
    field: &str,
    options: &OcrOptions,
    assembled: &mut AssembledDocument,
) -> Result<()> {
    let frame = match frame {
        Value::Object(map) => map,
        _ => return Err(cmap_common::Error::malformed(field, "frame is not an object")),
    };
    let begin_ms = secs_to_ms(member_f64(frame, "mediaRelIncrTimePoint_S", field)?);
    let end_ms = begin_ms + secs_to_ms(member_f64(frame, "mediaIncrDuration_S", field)?);
    let frame_span = Span::new(begin_ms, end_ms);

    let hypotheses = member_array(frame, "Hypotheses", field)?;
    let mut parsed = Vec::with_capacity(hypotheses.len());
    for hypothesis in hypotheses {
        let hypothesis = match hypothesis {
            Value::Object(map) => map,
            _ => return Err(cmap_common::Error::malformed(field, "hypothesis is not an object")),
        };
        let text = member_str(hypothesis, "text", field)?;
        let score = member_f64(hypothesis, "score", field)?;
        parsed.push((text, score));
    }

    // A frame with zero hypotheses contributes nothing
    let Some(&(top_text, top_score)) = parsed.first() else {
        return Ok(());
    };

    let confidence_ratio = match parsed.get(1) {
        Some(&(_, second_score)) if top_score > 0.0 => second_score / top_score,
        _ => 0.0,
    };

    let top_span = append_line(&mut assembled.text, top_text);
    assembled.hypotheses.push(OcrHypothesis {
        span: top_span,
        text: top_text.to_string(),
        confidence: top_score,
        frame: frame_span,
        rank: HypothesisRank::Top { confidence_ratio },
    });

    if options.only_best {
        return Ok(());
    }

    for &(text, score) in &parsed[1..] {
        let span = if options.vertically_aligned {
            top_span
        } else {
            append_line(&mut assembled.text, text)
        };
        assembled.hypotheses.push(OcrHypothesis {
            span,
            text: text.to_string(),
            confidence: score,
            frame: frame_span,
            rank: HypothesisRank::Alternate,
        });
    }

    Ok(())
}

/// Append one hypothesis line ("<text> .") and return its character span.
fn append_line(text: &mut String, line: &str) -> Span {
    if !text.is_empty() {
        text.push('\n');
    }
    let begin = text.len() as i64;
    text.push_str(line);
    text.push_str(" .");
    Span::new(begin, text.len() as i64)
}
