//! Canonical type normalization
//!
//! Annotators emit type labels from heterogeneous vocabularies (CoNLL-style
//! `I-PER` tags, ontology class paths, plain NER labels). Normalization maps
//! each raw label onto a fixed closed set via an ordered rule list of
//! (pattern, canonical type) pairs. Rules are evaluated independently, with
//! no short-circuiting, so one label can be filed under several canonical
//! types at once.

use once_cell::sync::Lazy;
use regex::Regex;

/// Closed set of canonical annotation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalType {
    Person,
    Location,
    Organization,
    Misc,
    City,
    Country,
    Other,
    All,
}

impl CanonicalType {
    /// Bucket name used in persisted aggregates
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalType::Person => "PERSON",
            CanonicalType::Location => "LOCATION",
            CanonicalType::Organization => "ORGANIZATION",
            CanonicalType::Misc => "MISC",
            CanonicalType::City => "City",
            CanonicalType::Country => "Country",
            CanonicalType::Other => "other",
            CanonicalType::All => "all",
        }
    }
}

/// Ordered rule list; patterns are case-sensitive unanchored searches.
static RULES: Lazy<Vec<(Regex, CanonicalType)>> = Lazy::new(|| {
    [
        ("PERSON|I-PER|Person", CanonicalType::Person),
        ("LOCATION|I-LOC|Place", CanonicalType::Location),
        ("ORGANIZATION|I-ORG|Organisation", CanonicalType::Organization),
        ("MISC|I-MISC", CanonicalType::Misc),
        ("City", CanonicalType::City),
        ("Country", CanonicalType::Country),
    ]
    .into_iter()
    .map(|(pattern, canonical)| (Regex::new(pattern).expect("static rule pattern"), canonical))
    .collect()
});

/// Normalize a raw type label to its canonical types.
///
/// A matching label is filed under every matching type plus the catch-all
/// `all` bucket; a label matching no rule files under `other` only.
pub fn normalize(raw_label: &str) -> Vec<CanonicalType> {
    let mut types: Vec<CanonicalType> = RULES
        .iter()
        .filter(|(pattern, _)| pattern.is_match(raw_label))
        .map(|(_, canonical)| *canonical)
        .collect();
    if types.is_empty() {
        types.push(CanonicalType::Other);
    } else {
        types.push(CanonicalType::All);
    }
    types
}
