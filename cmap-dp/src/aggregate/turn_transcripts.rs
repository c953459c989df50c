//! Per-speaker-turn transcript aggregation
//!
//! Emits one record per speaker turn with the transcript of the word tokens
//! the turn contains (time-addressed containment). The result is a single
//! pretty-printed JSON string, matching the persisted layout downstream
//! consumers already read. Every turn is emitted, transcript or not.

use cmap_common::Result;
use serde_json::{json, Value};

use crate::models::{contained_in, AssembledDocument, TokenKind};

/// Aggregate all speaker turns into one serialized JSON string.
pub fn aggregate(doc: &AssembledDocument) -> Result<Value> {
    let mut records = Vec::with_capacity(doc.turns.len());
    for turn in &doc.turns {
        let transcript: Vec<&str> = contained_in(&doc.tokens, &turn.span)
            .filter(|token| token.kind == TokenKind::Word)
            .map(|token| token.text.as_str())
            .collect();
        records.push(json!({
            "speakerId": turn.speaker_id,
            "beginTime": turn.span.begin,
            "endTime": turn.span.end,
            "transcript": transcript.join(" "),
        }));
    }

    let serialized = serde_json::to_string_pretty(&records)
        .map_err(|e| cmap_common::Error::Internal(format!("serializing turn transcripts: {}", e)))?;
    Ok(Value::String(serialized))
}
