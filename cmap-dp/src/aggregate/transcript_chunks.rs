//! Transcript chunking into child records
//!
//! Breaks the word-token stream into pseudo-segments of roughly 200
//! characters and emits each as a child record, giving downstream consumers
//! that expect segmented text something to page through even when the source
//! provides no real segmentation. Each record's time range spans its first
//! to last contained token.

use serde_json::json;

use crate::aggregate::ChildRecord;
use crate::models::{AssembledDocument, Span, TokenKind};

/// Character threshold after which a chunk is flushed
const CHUNK_TARGET_LEN: usize = 200;

/// Segment type tag on emitted child records
pub const SEGMENT_TYPE: &str = "TranscriptChunk";

/// Chunk the document's word tokens into child records.
pub fn aggregate(doc: &AssembledDocument) -> Vec<ChildRecord> {
    let mut records = Vec::new();
    let mut text = String::new();
    let mut begin = 0;
    let mut end = 0;

    for token in doc.tokens.iter().filter(|t| t.kind == TokenKind::Word) {
        if text.is_empty() {
            begin = token.span.begin;
        }
        end = token.span.end;
        text.push_str(&token.text);
        text.push(' ');
        if text.len() > CHUNK_TARGET_LEN {
            records.push(chunk_record(doc, &text, begin, end));
            text.clear();
        }
    }
    if !text.is_empty() {
        records.push(chunk_record(doc, &text, begin, end));
    }

    records
}

fn chunk_record(doc: &AssembledDocument, text: &str, begin: i64, end: i64) -> ChildRecord {
    ChildRecord::new(
        &doc.meta.id,
        Span::new(begin, end),
        SEGMENT_TYPE,
        json!({
            "meta": {
                "extracted": {
                    "audio_transcript": text,
                }
            }
        }),
    )
}
