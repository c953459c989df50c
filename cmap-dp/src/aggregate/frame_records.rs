//! Per-frame optical-text child records
//!
//! Emits one child record per top-ranked detection frame carrying the best
//! transcript and the full hypothesis stack (best first, newline joined).
//! The stacked-alternate lookup relies on vertically aligned assembly, where
//! all hypotheses of a frame share the top's character span.

use serde_json::json;

use crate::aggregate::ChildRecord;
use crate::models::AssembledDocument;

/// Segment type tag on emitted child records
pub const SEGMENT_TYPE: &str = "OcrSegment";

/// Emit one child record per top hypothesis.
pub fn aggregate(doc: &AssembledDocument) -> Vec<ChildRecord> {
    doc.top_hypotheses()
        .map(|top| {
            let mut all = vec![top.text.as_str()];
            all.extend(doc.stacked_alternates(top).map(|h| h.text.as_str()));
            ChildRecord::new(
                &doc.meta.id,
                top.frame,
                SEGMENT_TYPE,
                json!({
                    "meta": {
                        "extracted": {
                            "video_ocr": {
                                "best": top.text,
                                "all": all.join("\n"),
                            }
                        }
                    }
                }),
            )
        })
        .collect()
}
