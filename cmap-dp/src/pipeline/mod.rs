//! Stage orchestration
//!
//! A stage pass fetches matching documents (bounded by the configured item
//! limit) and hands each to a free worker. Every worker exclusively owns the
//! assembled surface, annotation layers, and aggregate of the one document
//! it processes; no state crosses worker boundaries, so no locking. A
//! failed document is logged, counted, and abandoned wholesale; resubmission
//! is the external scheduler's call.

use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use cmap_common::{Error, Result};

use crate::aggregate::{
    entity_rollup, frame_entities, frame_records, keyphrases, sentiment, timed_entities,
    transcript_chunks, turn_transcripts,
};
use crate::annotate::{run_annotators, Annotator};
use crate::assembly::{asr, document, ocr};
use crate::config::{AggregatorKind, StageConfig, StageKind};
use crate::fields::{FetchedDocument, META_DATE_PUBLISHED, META_MEDIA_URL, META_TITLE};
use crate::models::{AnnotationLayer, AssembledDocument, LayerBuilder};
use crate::store::fetch::fetch_documents;
use crate::store::snapshot::write_snapshot;
use crate::store::sync::{insert_child_records, mark_stage_complete, sync_result};

/// Default number of concurrent document workers
pub const DEFAULT_WORKERS: usize = 4;

/// Outcome of one stage pass
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stage: String,
    pub fetched: usize,
    pub processed: usize,
    pub failed: usize,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

/// Document-processing pipeline over one document store.
pub struct Pipeline {
    pool: SqlitePool,
    workers: usize,
    annotators: HashMap<String, Vec<Arc<dyn Annotator>>>,
}

impl Pipeline {
    pub fn new(pool: SqlitePool, workers: usize) -> Self {
        Self {
            pool,
            workers: workers.max(1),
            annotators: HashMap::new(),
        }
    }

    /// Register an external annotator for a stage; its output becomes the
    /// layer named after the annotator.
    pub fn register_annotator(&mut self, stage: &str, annotator: Arc<dyn Annotator>) {
        self.annotators
            .entry(stage.to_string())
            .or_default()
            .push(annotator);
    }

    /// Run one stage pass to completion.
    pub async fn run_stage(&self, stage: &StageConfig) -> Result<RunSummary> {
        let started_at = cmap_common::time::now();
        let projection = projection_fields(stage);
        let docs = fetch_documents(
            &self.pool,
            &stage.fetch_filter(),
            stage.max_items,
            &projection,
        )
        .await?;
        let fetched = docs.len();
        info!(stage = %stage.name, fetched, workers = self.workers, "Starting stage pass");

        let annotators = self
            .annotators
            .get(&stage.name)
            .cloned()
            .unwrap_or_default();

        let outcomes: Vec<bool> = stream::iter(docs)
            .map(|doc| {
                let pool = self.pool.clone();
                let annotators = annotators.clone();
                let document_id = doc.id.clone();
                async move {
                    match process_document(&pool, stage, &annotators, doc).await {
                        Ok(()) => true,
                        Err(e) => {
                            // per-document error isolation: log and abandon
                            error!(
                                document_id = %document_id,
                                stage = %stage.name,
                                error = %e,
                                "Document processing failed"
                            );
                            false
                        }
                    }
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let processed = outcomes.iter().filter(|ok| **ok).count();
        let summary = RunSummary {
            stage: stage.name.clone(),
            fetched,
            processed,
            failed: fetched - processed,
            started_at,
            finished_at: cmap_common::time::now(),
        };
        info!(
            stage = %summary.stage,
            processed = summary.processed,
            failed = summary.failed,
            "Stage pass complete"
        );
        Ok(summary)
    }
}

/// All store fields a stage pass projects: stage inputs plus the
/// conventional metadata paths.
fn projection_fields(stage: &StageConfig) -> Vec<String> {
    let mut fields = stage.fields.clone();
    if let Some(speaker_field) = &stage.speaker_field {
        fields.push(speaker_field.clone());
    }
    for meta in [META_TITLE, META_DATE_PUBLISHED, META_MEDIA_URL] {
        fields.push(meta.to_string());
    }
    fields
}

/// Process one document through assembly, annotation, aggregation, and sync.
async fn process_document(
    pool: &SqlitePool,
    stage: &StageConfig,
    annotators: &[Arc<dyn Annotator>],
    fetched: FetchedDocument,
) -> Result<()> {
    let doc = assemble(stage, &fetched);
    let layers = run_annotators(&doc, annotators);

    match stage.aggregator {
        AggregatorKind::EntityRollup => {
            let value = entity_rollup::aggregate(&doc, &layers, &stage.rollup_layers());
            sync(pool, stage, &doc, &value).await
        }
        AggregatorKind::Sentiment => {
            let layer = named_layer(&doc, &layers, stage.layer.as_deref(), "sentiment");
            let value = sentiment::aggregate(&doc, &layer);
            sync(pool, stage, &doc, &value).await
        }
        AggregatorKind::TurnTranscripts => {
            let value = turn_transcripts::aggregate(&doc)?;
            sync(pool, stage, &doc, &value).await
        }
        AggregatorKind::TimedEntities => {
            let layer = named_layer(&doc, &layers, stage.layer.as_deref(), "linked");
            let value = timed_entities::aggregate(&doc, &layer)?;
            sync(pool, stage, &doc, &value).await
        }
        AggregatorKind::FrameEntities => {
            let linked = layers.get(stage.linked_layer.as_deref().unwrap_or("linked"));
            let entities = layers.get(stage.entity_layer.as_deref().unwrap_or("ner"));
            let value = frame_entities::aggregate(&doc, linked, entities);
            sync(pool, stage, &doc, &value).await
        }
        AggregatorKind::Keyphrases => {
            let layer = named_layer(&doc, &layers, stage.layer.as_deref(), "keyphrases");
            let value = keyphrases::aggregate(&layer);
            sync(pool, stage, &doc, &value).await
        }
        AggregatorKind::TranscriptChunks => {
            let records = transcript_chunks::aggregate(&doc);
            insert_child_records(pool, &records).await?;
            mark_stage_complete(pool, &doc.meta.id, &stage.name, &stage.stage_field).await
        }
        AggregatorKind::FrameRecords => {
            let records = frame_records::aggregate(&doc);
            insert_child_records(pool, &records).await?;
            mark_stage_complete(pool, &doc.meta.id, &stage.name, &stage.stage_field).await
        }
        AggregatorKind::Snapshot => {
            write_snapshot(
                pool,
                &doc,
                &layers,
                stage.output_field.as_deref(),
                &stage.name,
                &stage.stage_field,
                stage.compression,
            )
            .await
        }
    }
}

fn assemble(stage: &StageConfig, fetched: &FetchedDocument) -> AssembledDocument {
    match stage.kind {
        StageKind::Text => document::assemble(fetched, &stage.fields),
        StageKind::Asr => asr::assemble(
            fetched,
            &stage.fields,
            stage.speaker_field.as_deref(),
            &asr::AsrOptions {
                only_words: stage.only_words,
            },
        ),
        StageKind::Ocr => ocr::assemble(
            fetched,
            &stage.fields,
            &ocr::OcrOptions {
                only_best: stage.only_best,
                vertically_aligned: stage.vertically_aligned,
            },
        ),
    }
}

/// Look up the configured layer, falling back to an empty one.
fn named_layer(
    doc: &AssembledDocument,
    layers: &crate::models::AnnotationSet,
    configured: Option<&str>,
    default_name: &str,
) -> AnnotationLayer {
    let name = configured.unwrap_or(default_name);
    layers
        .get(name)
        .cloned()
        .unwrap_or_else(|| LayerBuilder::new(doc.addressing).build())
}

async fn sync(
    pool: &SqlitePool,
    stage: &StageConfig,
    doc: &AssembledDocument,
    value: &serde_json::Value,
) -> Result<()> {
    let output_field = stage
        .output_field
        .as_deref()
        .ok_or_else(|| Error::Config(format!("stage '{}': output_field unset", stage.name)))?;
    sync_result(
        pool,
        &doc.meta.id,
        output_field,
        value,
        &stage.name,
        &stage.stage_field,
    )
    .await
}
