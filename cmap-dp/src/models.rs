//! Core annotation model for cmap-dp
//!
//! A document is assembled once per pipeline stage into an
//! [`AssembledDocument`]: one text plus annotation units whose offsets are
//! either character positions in that text or milliseconds since media start.
//! The two addressing modes never mix within one annotation collection, and
//! containment queries only compare offsets within the same mode.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Addressing mode of a document's annotation offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Addressing {
    /// Offsets index characters of the assembled document text
    Character,
    /// Offsets are milliseconds since media start
    Time,
}

/// Half-open offset range in either addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub begin: i64,
    pub end: i64,
}

impl Span {
    pub fn new(begin: i64, end: i64) -> Self {
        Self { begin, end }
    }

    /// Containment check, inclusive at both boundaries: a span exactly
    /// matching the unit's bounds is contained.
    pub fn contains(&self, other: &Span) -> bool {
        other.begin >= self.begin && other.end <= self.end
    }
}

/// Anything carrying a span in the document's addressing mode
pub trait Spanned {
    fn span(&self) -> &Span;
}

/// Select items whose span is contained in `unit` (inclusive boundaries).
///
/// Requires `items` sorted by non-decreasing begin, which all assembly
/// components guarantee; the lookup narrows by binary search before the
/// linear scan.
pub fn contained_in<'a, T: Spanned>(items: &'a [T], unit: &'a Span) -> impl Iterator<Item = &'a T> {
    let start = items.partition_point(|item| item.span().begin < unit.begin);
    items[start..]
        .iter()
        .take_while(move |item| item.span().begin <= unit.end)
        .filter(move |item| unit.contains(item.span()))
}

/// Provenance span marking which source field contributed a text range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub span: Span,
    /// Dot-qualified source field name
    pub source_field: String,
    /// Last dot-path component of the source field
    pub label: String,
}

impl Spanned for Segment {
    fn span(&self) -> &Span {
        &self.span
    }
}

/// Time-addressed speaker-diarization turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerTurn {
    pub span: Span,
    pub speaker_id: String,
    pub gender: Option<String>,
}

impl Spanned for SpeakerTurn {
    fn span(&self) -> &Span {
        &self.span
    }
}

/// Classification of a recognized speech unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Word,
    Filler,
    Other,
}

impl TokenKind {
    /// Map a source type tag to a kind; `None` for unrecognized tags (the
    /// caller logs and classifies them `Other`).
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "word" => Some(TokenKind::Word),
            "filler" => Some(TokenKind::Filler),
            _ => None,
        }
    }
}

/// Time-addressed speech token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub span: Span,
    pub text: String,
    pub kind: TokenKind,
    pub confidence: f64,
}

impl Spanned for Token {
    fn span(&self) -> &Span {
        &self.span
    }
}

/// Rank of an optical-text hypothesis within its detection frame.
///
/// Only the top-ranked hypothesis carries the confidence ratio (second-best
/// confidence over best, 0.0 when the frame has a single hypothesis).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rank", rename_all = "snake_case")]
pub enum HypothesisRank {
    Top { confidence_ratio: f64 },
    Alternate,
}

/// One optical-text hypothesis of a detection frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrHypothesis {
    /// Character span in the assembled text (alternates share the top's
    /// span when vertically aligned)
    pub span: Span,
    pub text: String,
    pub confidence: f64,
    /// Frame time range in milliseconds
    pub frame: Span,
    pub rank: HypothesisRank,
}

impl OcrHypothesis {
    pub fn is_top(&self) -> bool {
        matches!(self.rank, HypothesisRank::Top { .. })
    }

    /// Confidence ratio of the top hypothesis; `None` for alternates
    pub fn confidence_ratio(&self) -> Option<f64> {
        match self.rank {
            HypothesisRank::Top { confidence_ratio } => Some(confidence_ratio),
            HypothesisRank::Alternate => None,
        }
    }
}

impl Spanned for OcrHypothesis {
    fn span(&self) -> &Span {
        &self.span
    }
}

/// Externally produced annotation consumed by the aggregators.
///
/// The span uses the same addressing mode as the document surface the
/// annotator ran on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedAnnotation {
    pub span: Span,
    pub text: String,
    /// Raw type label from the producing annotator's vocabulary
    pub raw_type: String,
    /// Linked-resource URI, when the annotator is an entity linker
    pub uri: Option<String>,
    /// Optional enrichment payload (polarity score, keyphrase enrichment, ...)
    pub enrichment: Option<serde_json::Value>,
}

impl Spanned for TypedAnnotation {
    fn span(&self) -> &Span {
        &self.span
    }
}

/// Document metadata loaded from conventional store paths
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: String,
    pub language: Option<String>,
    pub title: Option<String>,
    pub date_published: Option<String>,
    pub media_url: Option<String>,
}

/// One document's assembled annotation surface.
///
/// Owned exclusively by the worker processing the document; immutable once
/// assembly completes. For time-addressed surfaces the text is rendered for
/// human inspection only and its character offsets carry no authoritative
/// relationship to the annotation spans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssembledDocument {
    pub meta: DocumentMeta,
    pub addressing: Addressing,
    pub text: String,
    pub segments: Vec<Segment>,
    pub turns: Vec<SpeakerTurn>,
    pub tokens: Vec<Token>,
    pub hypotheses: Vec<OcrHypothesis>,
}

impl Default for Addressing {
    fn default() -> Self {
        Addressing::Character
    }
}

impl AssembledDocument {
    /// Top-ranked hypotheses in frame order
    pub fn top_hypotheses(&self) -> impl Iterator<Item = &OcrHypothesis> {
        self.hypotheses.iter().filter(|h| h.is_top())
    }

    /// All alternates stacked on the given top hypothesis's character span
    pub fn stacked_alternates<'a>(
        &'a self,
        top: &'a OcrHypothesis,
    ) -> impl Iterator<Item = &'a OcrHypothesis> {
        self.hypotheses
            .iter()
            .filter(move |h| !h.is_top() && h.span == top.span)
    }
}

/// Immutable, begin-sorted collection of one annotator's output.
///
/// Built once per document via [`LayerBuilder`] and queried by containment;
/// never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationLayer {
    addressing: Addressing,
    annotations: Vec<TypedAnnotation>,
}

impl AnnotationLayer {
    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypedAnnotation> {
        self.annotations.iter()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Annotations contained in `unit`, inclusive at both boundaries
    pub fn contained_in<'a>(&'a self, unit: &'a Span) -> impl Iterator<Item = &'a TypedAnnotation> {
        contained_in(&self.annotations, unit)
    }
}

/// Accumulates one annotator's output, then freezes it into a sorted layer.
#[derive(Debug)]
pub struct LayerBuilder {
    addressing: Addressing,
    annotations: Vec<TypedAnnotation>,
}

impl LayerBuilder {
    pub fn new(addressing: Addressing) -> Self {
        Self {
            addressing,
            annotations: Vec::new(),
        }
    }

    pub fn push(&mut self, annotation: TypedAnnotation) {
        self.annotations.push(annotation);
    }

    pub fn extend(&mut self, annotations: impl IntoIterator<Item = TypedAnnotation>) {
        self.annotations.extend(annotations);
    }

    /// Freeze into an immutable layer, stably sorted by begin offset
    pub fn build(mut self) -> AnnotationLayer {
        self.annotations.sort_by_key(|a| a.span.begin);
        AnnotationLayer {
            addressing: self.addressing,
            annotations: self.annotations,
        }
    }
}

/// Named annotation layers produced for one document, keyed by annotator name
pub type AnnotationSet = BTreeMap<String, AnnotationLayer>;

#[cfg(test)]
mod tests {
    use super::*;

    fn ann(begin: i64, end: i64, text: &str) -> TypedAnnotation {
        TypedAnnotation {
            span: Span::new(begin, end),
            text: text.to_string(),
            raw_type: "X".to_string(),
            uri: None,
            enrichment: None,
        }
    }

    #[test]
    fn test_span_containment_inclusive_boundaries() {
        let unit = Span::new(10, 20);
        assert!(unit.contains(&Span::new(10, 20)));
        assert!(unit.contains(&Span::new(12, 18)));
        assert!(!unit.contains(&Span::new(9, 15)));
        assert!(!unit.contains(&Span::new(15, 21)));
    }

    #[test]
    fn test_layer_containment_query() {
        let mut builder = LayerBuilder::new(Addressing::Character);
        builder.push(ann(5, 8, "before"));
        builder.push(ann(10, 20, "exact"));
        builder.push(ann(12, 15, "inside"));
        builder.push(ann(18, 25, "straddles"));
        builder.push(ann(30, 35, "after"));
        let layer = builder.build();

        let unit = Span::new(10, 20);
        let hits: Vec<&str> = layer
            .contained_in(&unit)
            .map(|a| a.text.as_str())
            .collect();
        assert_eq!(hits, vec!["exact", "inside"]);
    }

    #[test]
    fn test_layer_builder_sorts_by_begin() {
        let mut builder = LayerBuilder::new(Addressing::Time);
        builder.push(ann(5000, 9000, "second"));
        builder.push(ann(1000, 4000, "first"));
        let layer = builder.build();
        let order: Vec<&str> = layer.iter().map(|a| a.text.as_str()).collect();
        assert_eq!(order, vec!["first", "second"]);
    }

    #[test]
    fn test_token_kind_from_tag() {
        assert_eq!(TokenKind::from_tag("word"), Some(TokenKind::Word));
        assert_eq!(TokenKind::from_tag("filler"), Some(TokenKind::Filler));
        assert_eq!(TokenKind::from_tag("noise"), None);
    }

    #[test]
    fn test_confidence_ratio_only_on_top() {
        let top = OcrHypothesis {
            span: Span::new(0, 5),
            text: "HELLO".to_string(),
            confidence: 0.9,
            frame: Span::new(1000, 2000),
            rank: HypothesisRank::Top {
                confidence_ratio: 0.5,
            },
        };
        let alt = OcrHypothesis {
            rank: HypothesisRank::Alternate,
            ..top.clone()
        };
        assert_eq!(top.confidence_ratio(), Some(0.5));
        assert_eq!(alt.confidence_ratio(), None);
    }

    #[test]
    fn test_stacked_alternates_share_span() {
        let top = OcrHypothesis {
            span: Span::new(0, 5),
            text: "HELLO".to_string(),
            confidence: 0.9,
            frame: Span::new(1000, 2000),
            rank: HypothesisRank::Top {
                confidence_ratio: 0.3,
            },
        };
        let alt = OcrHypothesis {
            text: "HELL0".to_string(),
            confidence: 0.3,
            rank: HypothesisRank::Alternate,
            ..top.clone()
        };
        let doc = AssembledDocument {
            hypotheses: vec![top.clone(), alt],
            ..Default::default()
        };
        let stacked: Vec<&str> = doc
            .stacked_alternates(&top)
            .map(|h| h.text.as_str())
            .collect();
        assert_eq!(stacked, vec!["HELL0"]);
    }
}
