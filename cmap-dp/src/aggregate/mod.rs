//! Annotation aggregation
//!
//! Aggregators group externally produced typed annotations by the output
//! unit containing them (document, speaker turn, or top-ranked detection
//! frame) and build the per-stage result that ResultSync persists. Each
//! submodule is one consumer with its own emission policy; all containment
//! queries are same-addressing-mode only.

pub mod entity_rollup;
pub mod frame_entities;
pub mod frame_records;
pub mod keyphrases;
pub mod normalize;
pub mod sentiment;
pub mod timed_entities;
pub mod transcript_chunks;
pub mod turn_transcripts;

use serde_json::Value;
use uuid::Uuid;

use crate::models::Span;

/// Child record emitted into the `document_segments` table by
/// segment-emitting consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildRecord {
    pub id: Uuid,
    pub parent_id: String,
    /// Media time range covered by the record, in milliseconds
    pub span: Span,
    pub segment_type: String,
    pub data: Value,
}

impl ChildRecord {
    pub fn new(parent_id: &str, span: Span, segment_type: &str, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: parent_id.to_string(),
            span,
            segment_type: segment_type.to_string(),
            data,
        }
    }
}
