//! End-to-end pipeline tests over a real on-disk document store

use std::sync::Arc;

use serde_json::{json, Value};

use cmap_common::config::TomlConfig;
use cmap_common::Result;
use cmap_dp::annotate::Annotator;
use cmap_dp::config::{parse_stages, StageConfig};
use cmap_dp::models::{AssembledDocument, Span, TypedAnnotation};
use cmap_dp::pipeline::Pipeline;
use cmap_dp::store::fetch::{read_document, upsert_document};

async fn pool_in(dir: &tempfile::TempDir) -> sqlx::SqlitePool {
    cmap_common::db::init_pool(&dir.path().join("cmap.db"))
        .await
        .unwrap()
}

fn stage(toml_text: &str) -> StageConfig {
    let config: TomlConfig = toml::from_str(toml_text).unwrap();
    parse_stages(&config).unwrap().remove(0)
}

/// Finds fixed substrings of the assembled text and emits one annotation per
/// occurrence, standing in for an external entity recognizer.
struct SubstringAnnotator {
    name: &'static str,
    needles: Vec<(&'static str, &'static str)>,
}

impl Annotator for SubstringAnnotator {
    fn name(&self) -> &str {
        self.name
    }

    fn annotate(&self, doc: &AssembledDocument) -> Result<Vec<TypedAnnotation>> {
        let mut annotations = Vec::new();
        for (needle, raw_type) in &self.needles {
            if let Some(at) = doc.text.find(needle) {
                annotations.push(TypedAnnotation {
                    span: Span::new(at as i64, (at + needle.len()) as i64),
                    text: needle.to_string(),
                    raw_type: raw_type.to_string(),
                    uri: None,
                    enrichment: None,
                });
            }
        }
        Ok(annotations)
    }
}

/// Emits fixed polarity scores over the whole document.
struct PolarityAnnotator {
    scores: Vec<f64>,
}

impl Annotator for PolarityAnnotator {
    fn name(&self) -> &str {
        "sentiment"
    }

    fn annotate(&self, doc: &AssembledDocument) -> Result<Vec<TypedAnnotation>> {
        Ok(self
            .scores
            .iter()
            .map(|score| TypedAnnotation {
                span: Span::new(0, doc.text.len() as i64),
                text: doc.text.clone(),
                raw_type: "OpinionExpression".to_string(),
                uri: None,
                enrichment: Some(json!(score)),
            })
            .collect())
    }
}

#[tokio::test]
async fn test_entity_stage_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool_in(&dir).await;
    upsert_document(&pool, "doc-1", Some("en"), &json!({"body": "Hello world"}))
        .await
        .unwrap();

    let stage = stage(
        r#"
        [[stage]]
        name = "ner"
        kind = "text"
        fields = ["body"]
        aggregator = "entity_rollup"
        output_field = "processing.results.ner"
        [[stage.rollup]]
        layer = "ner"
        key = "ner"
        "#,
    );

    let mut pipeline = Pipeline::new(pool.clone(), 2);
    pipeline.register_annotator(
        "ner",
        Arc::new(SubstringAnnotator {
            name: "ner",
            needles: vec![("world", "I-LOC")],
        }),
    );

    let summary = pipeline.run_stage(&stage).await.unwrap();
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);

    let body = read_document(&pool, "doc-1").await.unwrap().unwrap();
    assert_eq!(
        body["processing"]["results"]["ner"]["ner"]["LOCATION"],
        json!(["world"])
    );
    assert_eq!(
        body["processing"]["results"]["ner"]["ner"]["all"],
        json!(["world"])
    );
    assert_eq!(body["processing"]["available_data"], json!(["ner"]));
}

#[tokio::test]
async fn test_sentiment_stage_discretizes_negative() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool_in(&dir).await;
    upsert_document(&pool, "doc-1", None, &json!({"body": "Hello world"}))
        .await
        .unwrap();

    let stage = stage(
        r#"
        [[stage]]
        name = "polarity"
        kind = "text"
        fields = ["body"]
        aggregator = "sentiment"
        output_field = "processing.results.polarity"
        "#,
    );

    let mut pipeline = Pipeline::new(pool.clone(), 1);
    pipeline.register_annotator(
        "polarity",
        Arc::new(PolarityAnnotator {
            scores: vec![1.0, -2.0],
        }),
    );
    pipeline.run_stage(&stage).await.unwrap();

    let body = read_document(&pool, "doc-1").await.unwrap().unwrap();
    let result = &body["processing"]["results"]["polarity"];
    assert_eq!(result["numeric"], json!(-1.0));
    assert_eq!(result["discrete"], json!("NEGATIVE"));
}

#[tokio::test]
async fn test_stage_is_idempotent_and_skips_completed() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool_in(&dir).await;
    upsert_document(&pool, "doc-1", None, &json!({"body": "text"}))
        .await
        .unwrap();

    let stage = stage(
        r#"
        [[stage]]
        name = "ner"
        kind = "text"
        fields = ["body"]
        aggregator = "entity_rollup"
        output_field = "processing.results.ner"
        "#,
    );

    let pipeline = Pipeline::new(pool.clone(), 1);
    let first = pipeline.run_stage(&stage).await.unwrap();
    assert_eq!(first.processed, 1);

    // second pass finds nothing: the stage is already marked
    let second = pipeline.run_stage(&stage).await.unwrap();
    assert_eq!(second.fetched, 0);

    let body = read_document(&pool, "doc-1").await.unwrap().unwrap();
    assert_eq!(body["processing"]["available_data"], json!(["ner"]));
}

#[tokio::test]
async fn test_asr_turn_transcripts_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool_in(&dir).await;
    upsert_document(
        &pool,
        "doc-1",
        Some("en"),
        &json!({
            "meta": {"extracted": {
                "audio_transcript": {
                    "content": [
                        {"item": "guten", "start": 1.0, "end": 1.4, "conf": 0.9, "type": "word"},
                        {"item": "tag", "start": 1.4, "end": 1.8, "conf": 0.9, "type": "word"},
                        {"item": "hello", "start": 5.2, "end": 5.6, "conf": 0.8, "type": "word"}
                    ]
                },
                "speakers": {
                    "spk-a": {"speaker_gender": "female", "audio_segments": [{"start_S": 5.0, "end_S": 9.0}]},
                    "spk-b": {"speaker_gender": "male", "audio_segments": [{"start_S": 1.0, "end_S": 4.0}]}
                }
            }}
        }),
    )
    .await
    .unwrap();

    let stage = stage(
        r#"
        [[stage]]
        name = "asr"
        kind = "asr"
        fields = ["meta.extracted.audio_transcript"]
        speaker_field = "meta.extracted.speakers"
        aggregator = "turn_transcripts"
        output_field = "processing.results.asr"
        "#,
    );

    let pipeline = Pipeline::new(pool.clone(), 1);
    pipeline.run_stage(&stage).await.unwrap();

    let body = read_document(&pool, "doc-1").await.unwrap().unwrap();
    let serialized = body["processing"]["results"]["asr"].as_str().unwrap();
    let records: Vec<Value> = serde_json::from_str(serialized).unwrap();
    // turns globally ordered by start time, regardless of table order
    assert_eq!(records[0]["speakerId"], json!("spk-b"));
    assert_eq!(records[0]["beginTime"], json!(1000));
    assert_eq!(records[0]["transcript"], json!("guten tag"));
    assert_eq!(records[1]["speakerId"], json!("spk-a"));
    assert_eq!(records[1]["transcript"], json!("hello"));
}

#[tokio::test]
async fn test_ocr_frame_records_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool_in(&dir).await;
    upsert_document(
        &pool,
        "doc-1",
        None,
        &json!({
            "meta": {"extracted": {"video_ocr": {
                "VideoTextDetection": [
                    {
                        "mediaRelIncrTimePoint_S": 1.0,
                        "mediaIncrDuration_S": 2.0,
                        "Hypotheses": [
                            {"text": "BREAKING NEWS", "score": 0.9},
                            {"text": "BRAKING NEWS", "score": 0.3}
                        ]
                    }
                ]
            }}}
        }),
    )
    .await
    .unwrap();

    let stage = stage(
        r#"
        [[stage]]
        name = "ocr-segments"
        kind = "ocr"
        fields = ["meta.extracted.video_ocr"]
        aggregator = "frame_records"
        only_best = false
        "#,
    );

    let pipeline = Pipeline::new(pool.clone(), 1);
    pipeline.run_stage(&stage).await.unwrap();

    let rows: Vec<(i64, i64, String)> = sqlx::query_as(
        "SELECT begin_ms, end_ms, data FROM document_segments WHERE parent_id = 'doc-1'",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, 1000);
    assert_eq!(rows[0].1, 3000);
    let data: Value = serde_json::from_str(&rows[0].2).unwrap();
    assert_eq!(
        data["meta"]["extracted"]["video_ocr"]["best"],
        json!("BREAKING NEWS")
    );
    assert_eq!(
        data["meta"]["extracted"]["video_ocr"]["all"],
        json!("BREAKING NEWS\nBRAKING NEWS")
    );

    let body = read_document(&pool, "doc-1").await.unwrap().unwrap();
    assert_eq!(body["processing"]["available_data"], json!(["ocr-segments"]));
}

#[tokio::test]
async fn test_snapshot_stage_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool_in(&dir).await;
    upsert_document(&pool, "doc-1", None, &json!({"body": "Hello world"}))
        .await
        .unwrap();

    let stage = stage(
        r#"
        [[stage]]
        name = "cas"
        kind = "text"
        fields = ["body"]
        aggregator = "snapshot"
        compression = "gzip"
        "#,
    );

    let pipeline = Pipeline::new(pool.clone(), 1);
    pipeline.run_stage(&stage).await.unwrap();

    let body = read_document(&pool, "doc-1").await.unwrap().unwrap();
    let stored = body["meta"]["cas"]["cas.gz"].as_str().unwrap();
    let snapshot = cmap_dp::store::snapshot::decode(
        stored,
        cmap_dp::store::snapshot::Compression::Gzip,
    )
    .unwrap();
    assert_eq!(snapshot.document.text, "Hello world");
    assert_eq!(snapshot.document.segments.len(), 1);
    assert_eq!(snapshot.document.segments[0].span, Span::new(0, 11));
}

#[tokio::test]
async fn test_failed_document_isolated_from_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool_in(&dir).await;
    upsert_document(&pool, "doc-bad", None, &json!({"body": "poison"}))
        .await
        .unwrap();
    upsert_document(&pool, "doc-good", None, &json!({"body": "fine"}))
        .await
        .unwrap();

    struct PoisonAnnotator;
    impl Annotator for PoisonAnnotator {
        fn name(&self) -> &str {
            "ner"
        }
        fn annotate(&self, doc: &AssembledDocument) -> Result<Vec<TypedAnnotation>> {
            if doc.text.contains("poison") {
                Err(cmap_common::Error::Internal("annotator crashed".to_string()))
            } else {
                Ok(vec![])
            }
        }
    }

    let stage = stage(
        r#"
        [[stage]]
        name = "ner"
        kind = "text"
        fields = ["body"]
        aggregator = "entity_rollup"
        output_field = "processing.results.ner"
        "#,
    );

    let mut pipeline = Pipeline::new(pool.clone(), 2);
    pipeline.register_annotator("ner", Arc::new(PoisonAnnotator));
    let summary = pipeline.run_stage(&stage).await.unwrap();

    // a failing annotator only loses its layer; both documents still process
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.processed, 2);

    let body = read_document(&pool, "doc-good").await.unwrap().unwrap();
    assert_eq!(body["processing"]["available_data"], json!(["ner"]));
}

#[tokio::test]
async fn test_max_items_bounds_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool_in(&dir).await;
    for i in 0..5 {
        upsert_document(&pool, &format!("doc-{}", i), None, &json!({"body": "x"}))
            .await
            .unwrap();
    }

    let mut stage = stage(
        r#"
        [[stage]]
        name = "ner"
        kind = "text"
        fields = ["body"]
        aggregator = "entity_rollup"
        output_field = "processing.results.ner"
        "#,
    );
    stage.max_items = 3;

    let pipeline = Pipeline::new(pool.clone(), 2);
    let first = pipeline.run_stage(&stage).await.unwrap();
    assert_eq!(first.fetched, 3);

    // the remaining documents are picked up by the next pass
    let second = pipeline.run_stage(&stage).await.unwrap();
    assert_eq!(second.fetched, 2);
}
