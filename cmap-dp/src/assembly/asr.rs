//! Time-addressed speech assembly
//!
//! Builds speaker turns and speech tokens whose offsets are milliseconds
//! since media start. A document text is rendered alongside purely for human
//! inspection (tokens joined by single spaces, fields separated by the fixed
//! separator); its character offsets carry no authoritative relationship to
//! the emitted time-addressed spans.

use cmap_common::time::secs_to_ms;
use cmap_common::Result;
use serde_json::Value;
use tracing::warn;

use crate::assembly::FIELD_SEPARATOR;
use crate::fields::{member_array, member_f64, member_str, FetchedDocument};
use crate::models::{Addressing, AssembledDocument, SpeakerTurn, Span, Token, TokenKind};

/// Tokenizer configuration
#[derive(Debug, Clone, Default)]
pub struct AsrOptions {
    /// Only emit word tokens (no fillers or others)
    pub only_words: bool,
}

/// Assemble speech tokens and speaker turns for one document.
///
/// `fields` name the transcript fields (normally one); `speaker_field`
/// optionally names the speaker-track table. A malformed field or track
/// table loses only its own contribution, with a warning; siblings are
/// unaffected.
pub fn assemble(
    doc: &FetchedDocument,
    fields: &[String],
    speaker_field: Option<&str>,
    options: &AsrOptions,
) -> AssembledDocument {
    let mut assembled = AssembledDocument {
        meta: doc.meta(),
        addressing: Addressing::Time,
        ..Default::default()
    };

    if let Some(field) = speaker_field {
        match speaker_turns(doc, field) {
            Ok(turns) => assembled.turns = turns,
            Err(e) => {
                warn!(document_id = %doc.id, field = %field, error = %e, "Skipping malformed speaker tracks");
            }
        }
    }

    for field in fields {
        match field_tokens(doc, field, options) {
            Ok(None) => {}
            Ok(Some((tokens, rendered))) => {
                if !assembled.text.is_empty() {
                    assembled.text.push_str(FIELD_SEPARATOR);
                }
                assembled.text.push_str(&rendered);
                assembled.tokens.extend(tokens);
            }
            Err(e) => {
                warn!(document_id = %doc.id, field = %field, error = %e, "Skipping malformed transcript field");
            }
        }
    }

    assembled
}

/// Flatten all per-speaker interval tracks into one list sorted by start
/// time (stable on ties), converted to integer milliseconds.
fn speaker_turns(doc: &FetchedDocument, field: &str) -> Result<Vec<SpeakerTurn>> {
    let speakers = match doc.object(field)? {
        Some(speakers) => speakers,
        None => return Ok(Vec::new()),
    };

    let mut turns = Vec::new();
    for (speaker_id, value) in speakers {
        let speaker = match value {
            Value::Object(map) => map,
            _ => {
                warn!(document_id = %doc.id, speaker = %speaker_id, "Skipping malformed speaker entry");
                continue;
            }
        };
        let gender = speaker
            .get("speaker_gender")
            .and_then(Value::as_str)
            .map(str::to_string);
        // A person without audio segments is not a speaker
        let tracks = match speaker.get("audio_segments").and_then(Value::as_array) {
            Some(tracks) => tracks,
            None => continue,
        };
        for track in tracks {
            let track = match track {
                Value::Object(map) => map,
                _ => {
                    warn!(document_id = %doc.id, speaker = %speaker_id, "Skipping malformed speaker track");
                    continue;
                }
            };
            let begin = match member_f64(track, "start_S", field) {
                Ok(seconds) => secs_to_ms(seconds),
                Err(e) => {
                    warn!(document_id = %doc.id, speaker = %speaker_id, error = %e, "Skipping speaker track");
                    continue;
                }
            };
            let end = match member_f64(track, "end_S", field) {
                Ok(seconds) => secs_to_ms(seconds),
                Err(e) => {
                    warn!(document_id = %doc.id, speaker = %speaker_id, error = %e, "Skipping speaker track");
                    continue;
                }
            };
            turns.push(SpeakerTurn {
                span: Span::new(begin, end),
                speaker_id: speaker_id.clone(),
                gender: gender.clone(),
            });
        }
    }

    turns.sort_by_key(|turn| turn.span.begin);
    Ok(turns)
}

/// Parse one transcript field's token array.
///
/// Returns `None` when the field is absent; the whole field contribution is
/// parsed before anything is committed, so a malformed token drops the field
/// without leaving a partial rendering behind.
fn field_tokens(
    doc: &FetchedDocument,
    field: &str,
    options: &AsrOptions,
) -> Result<Option<(Vec<Token>, String)>> {
    let transcript = match doc.object(field)? {
        Some(transcript) => transcript,
        None => return Ok(None),
    };
    let content = member_array(transcript, "content", field)?;

    let mut tokens = Vec::new();
    let mut rendered = String::new();
    for entry in content {
        let entry = match entry {
            Value::Object(map) => map,
            _ => {
                return Err(cmap_common::Error::malformed(
                    field,
                    "token entry is not an object",
                ))
            }
        };
        let text = member_str(entry, "item", field)?;
        let begin = secs_to_ms(member_f64(entry, "start", field)?);
        let end = secs_to_ms(member_f64(entry, "end", field)?);
        let confidence = member_f64(entry, "conf", field)?;
        let type_tag = member_str(entry, "type", field)?;

        if !rendered.is_empty() {
            rendered.push(' ');
        }
        rendered.push_str(text);

        let kind = match TokenKind::from_tag(type_tag) {
            Some(kind) => kind,
            None => {
                warn!(document_id = %doc.id, token_type = %type_tag, "Unknown token type, classifying as other");
                TokenKind::Other
            }
        };
        if options.only_words && kind != TokenKind::Word {
            continue;
        }

        tokens.push(Token {
            span: Span::new(begin, end),
            text: text.to_string(),
            kind,
            confidence,
        });
    }

    Ok(Some((tokens, rendered)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transcript_doc() -> FetchedDocument {
        let mut doc = FetchedDocument::new("doc-1", Some("en".to_string()));
        doc.insert(
            "meta.extracted.audio_transcript",
            json!({
                "content": [
                    {"item": "hello", "start": 1.0, "end": 1.5, "conf": 0.9, "type": "word"},
                    {"item": "uh", "start": 1.5, "end": 1.7, "conf": 0.4, "type": "filler"},
                    {"item": "world", "start": 1.7, "end": 2.2, "conf": 0.8, "type": "word"},
                    {"item": "??", "start": 2.2, "end": 2.3, "conf": 0.1, "type": "noise"}
                ]
            }),
        );
        doc.insert(
            "meta.extracted.speakers",
            json!({
                "spk-a": {
                    "speaker_gender": "female",
                    "audio_segments": [{"start_S": 5.0, "end_S": 9.0}]
                },
                "spk-b": {
                    "speaker_gender": "male",
                    "audio_segments": [{"start_S": 1.0, "end_S": 4.0}]
                },
                "not-a-speaker": {"speaker_gender": "male"}
            }),
        );
        doc
    }

    const TRANSCRIPT: &str = "meta.extracted.audio_transcript";
    const SPEAKERS: &str = "meta.extracted.speakers";

    #[test]
    fn test_tokens_time_addressed() {
        let doc = transcript_doc();
        let assembled = assemble(
            &doc,
            &[TRANSCRIPT.to_string()],
            None,
            &AsrOptions::default(),
        );
        assert_eq!(assembled.addressing, Addressing::Time);
        assert_eq!(assembled.tokens.len(), 4);
        assert_eq!(assembled.tokens[0].span, Span::new(1000, 1500));
        assert_eq!(assembled.tokens[0].kind, TokenKind::Word);
        assert_eq!(assembled.tokens[1].kind, TokenKind::Filler);
        // unknown type tag classified other
        assert_eq!(assembled.tokens[3].kind, TokenKind::Other);
    }

    #[test]
    fn test_rendered_text_joined_by_spaces() {
        let doc = transcript_doc();
        let assembled = assemble(
            &doc,
            &[TRANSCRIPT.to_string()],
            None,
            &AsrOptions::default(),
        );
        assert_eq!(assembled.text, "hello uh world ??");
    }

    #[test]
    fn test_only_words_drops_non_words_but_renders_all() {
        let doc = transcript_doc();
        let assembled = assemble(
            &doc,
            &[TRANSCRIPT.to_string()],
            None,
            &AsrOptions { only_words: true },
        );
        assert_eq!(assembled.tokens.len(), 2);
        assert!(assembled.tokens.iter().all(|t| t.kind == TokenKind::Word));
        assert_eq!(assembled.text, "hello uh world ??");
    }

    #[test]
    fn test_speaker_turns_sorted_across_speakers() {
        let doc = transcript_doc();
        let assembled = assemble(
            &doc,
            &[TRANSCRIPT.to_string()],
            Some(SPEAKERS),
            &AsrOptions::default(),
        );
        let order: Vec<(&str, i64, i64)> = assembled
            .turns
            .iter()
            .map(|t| (t.speaker_id.as_str(), t.span.begin, t.span.end))
            .collect();
        assert_eq!(order, vec![("spk-b", 1000, 4000), ("spk-a", 5000, 9000)]);
        assert_eq!(assembled.turns[0].gender.as_deref(), Some("male"));
    }

    #[test]
    fn test_malformed_transcript_field_skipped() {
        let mut doc = FetchedDocument::new("doc-1", None);
        doc.insert(TRANSCRIPT, json!({"content": [{"item": "x"}]}));
        let assembled = assemble(
            &doc,
            &[TRANSCRIPT.to_string()],
            None,
            &AsrOptions::default(),
        );
        assert!(assembled.tokens.is_empty());
        assert_eq!(assembled.text, "");
    }

    #[test]
    fn test_absent_fields_yield_empty_surface() {
        let doc = FetchedDocument::new("doc-1", None);
        let assembled = assemble(
            &doc,
            &[TRANSCRIPT.to_string()],
            Some(SPEAKERS),
            &AsrOptions::default(),
        );
        assert!(assembled.tokens.is_empty());
        assert!(assembled.turns.is_empty());
    }
}
