//! Pipeline stage configuration
//!
//! Stage definitions come from the `[[stage]]` tables of the TOML config
//! file (kept raw by `cmap_common::config::TomlConfig`) and are parsed and
//! validated here. Unknown keys, unknown kinds, and aggregator/surface
//! mismatches are rejected at load time, not mid-run.

use cmap_common::{config::TomlConfig, Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::aggregate::entity_rollup::{self, RollupLayer};
use crate::store::fetch::FetchFilter;
use crate::store::snapshot::Compression;
use crate::store::sync::DEFAULT_STAGE_FIELD;

/// Which assembly component builds the stage's annotation surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Character-addressed text assembly from plain text fields
    Text,
    /// Time-addressed speech tokens and speaker turns
    Asr,
    /// Character-addressed ranked optical-text hypotheses
    Ocr,
}

/// Which aggregator consumes the stage's annotated surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorKind {
    EntityRollup,
    Sentiment,
    TurnTranscripts,
    TimedEntities,
    FrameEntities,
    Keyphrases,
    TranscriptChunks,
    FrameRecords,
    Snapshot,
}

impl AggregatorKind {
    /// Aggregators that persist through child records / blobs instead of a
    /// single result field
    fn needs_output_field(&self) -> bool {
        !matches!(
            self,
            AggregatorKind::TranscriptChunks | AggregatorKind::FrameRecords | AggregatorKind::Snapshot
        )
    }
}

/// One configured rollup layer
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RollupLayerConfig {
    pub layer: String,
    pub key: String,
    #[serde(default)]
    pub use_uri: bool,
    #[serde(default)]
    pub surface_filter: bool,
}

/// One pipeline stage
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    /// Stage name, recorded in the completed-stages set
    pub name: String,
    pub kind: StageKind,
    /// Dot-qualified input fields, in assembly order
    pub fields: Vec<String>,
    /// Speaker-track table field (asr stages)
    pub speaker_field: Option<String>,
    /// Only emit word tokens (asr stages)
    #[serde(default)]
    pub only_words: bool,
    /// Only emit the top hypothesis per frame (ocr stages)
    #[serde(default = "default_true")]
    pub only_best: bool,
    /// Stack alternate hypotheses on the top's span (ocr stages)
    #[serde(default = "default_true")]
    pub vertically_aligned: bool,
    /// Maximum documents per run
    #[serde(default = "default_max_items")]
    pub max_items: u32,
    /// Field-equality selection conditions
    #[serde(default)]
    pub filter: BTreeMap<String, Value>,
    /// Skip documents already marked with this stage
    #[serde(default = "default_true")]
    pub skip_completed: bool,
    /// Dot-qualified result field
    pub output_field: Option<String>,
    /// Dot-qualified completed-stages set field
    #[serde(default = "default_stage_field")]
    pub stage_field: String,
    pub aggregator: AggregatorKind,
    /// Rollup layers (entity_rollup); empty uses the default three layers
    #[serde(default)]
    pub rollup: Vec<RollupLayerConfig>,
    /// Annotation layer name (sentiment, timed_entities, keyphrases)
    pub layer: Option<String>,
    /// Linked-entity layer name (frame_entities)
    pub linked_layer: Option<String>,
    /// Plain-entity layer name (frame_entities)
    pub entity_layer: Option<String>,
    /// Snapshot codec
    #[serde(default)]
    pub compression: Compression,
}

fn default_true() -> bool {
    true
}

fn default_max_items() -> u32 {
    1000
}

fn default_stage_field() -> String {
    DEFAULT_STAGE_FIELD.to_string()
}

impl StageConfig {
    /// Selection filter for this stage's fetch pass
    pub fn fetch_filter(&self) -> FetchFilter {
        FetchFilter {
            equals: self
                .filter
                .iter()
                .map(|(path, value)| (path.clone(), value.clone()))
                .collect(),
            missing_stage: self.skip_completed.then(|| self.name.clone()),
            stage_field: self.stage_field.clone(),
        }
    }

    /// Configured rollup layers, defaulting to the standard three
    pub fn rollup_layers(&self) -> Vec<RollupLayer> {
        if self.rollup.is_empty() {
            return entity_rollup::default_layers();
        }
        self.rollup
            .iter()
            .map(|config| RollupLayer {
                layer: config.layer.clone(),
                key: config.key.clone(),
                use_uri: config.use_uri,
                surface_filter: config.surface_filter,
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(Error::Config(format!(
                "stage '{}': fields must not be empty",
                self.name
            )));
        }
        if self.speaker_field.is_some() && self.kind != StageKind::Asr {
            return Err(Error::Config(format!(
                "stage '{}': speaker_field only applies to asr stages",
                self.name
            )));
        }
        let compatible = match self.aggregator {
            AggregatorKind::TurnTranscripts
            | AggregatorKind::TimedEntities
            | AggregatorKind::TranscriptChunks => self.kind == StageKind::Asr,
            AggregatorKind::FrameEntities | AggregatorKind::FrameRecords => {
                self.kind == StageKind::Ocr
            }
            _ => true,
        };
        if !compatible {
            return Err(Error::Config(format!(
                "stage '{}': aggregator {:?} does not apply to {:?} surfaces",
                self.name, self.aggregator, self.kind
            )));
        }
        if self.aggregator.needs_output_field() && self.output_field.is_none() {
            return Err(Error::Config(format!(
                "stage '{}': output_field is required for {:?}",
                self.name, self.aggregator
            )));
        }
        Ok(())
    }
}

/// Parse and validate all stage definitions of a loaded config file.
pub fn parse_stages(config: &TomlConfig) -> Result<Vec<StageConfig>> {
    let mut stages = Vec::with_capacity(config.stages.len());
    for (index, raw) in config.stages.iter().enumerate() {
        let stage: StageConfig = raw
            .clone()
            .try_into()
            .map_err(|e| Error::Config(format!("stage #{}: {}", index + 1, e)))?;
        stage.validate()?;
        stages.push(stage);
    }
    Ok(stages)
}
