//! Annotation-graph snapshots
//!
//! A full serialized snapshot of one document's assembled surface and
//! annotation layers, stored as a text blob under a field name suffixed by
//! the compression-codec tag. The snapshot is an opaque interchange blob:
//! nothing in the pipeline reads it back except diagnostics and tests.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cmap_common::{Error, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::models::{AnnotationSet, AssembledDocument};
use crate::store::split_path;
use crate::store::sync::sync_result_at;

/// Snapshot compression codec, tagged onto the field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    /// Field-name suffix identifying the codec
    pub fn tag(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Bzip2 => ".bz2",
            Compression::Xz => ".xz",
        }
    }
}

/// Serialized annotation graph
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub document: AssembledDocument,
    pub layers: AnnotationSet,
}

/// Encode a snapshot to its stored text form: plain JSON uncompressed, or
/// base64-wrapped compressed bytes.
pub fn encode(
    doc: &AssembledDocument,
    layers: &AnnotationSet,
    compression: Compression,
) -> Result<String> {
    let snapshot = Snapshot {
        document: doc.clone(),
        layers: layers.clone(),
    };
    let json = serde_json::to_string(&snapshot)
        .map_err(|e| Error::Internal(format!("serializing snapshot: {}", e)))?;

    match compression {
        Compression::None => Ok(json),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(json.as_bytes())?;
            let compressed = encoder.finish()?;
            Ok(BASE64.encode(compressed))
        }
        Compression::Bzip2 | Compression::Xz => {
            Err(Error::UnsupportedCodec(format!("{:?}", compression)))
        }
    }
}

/// Decode a stored snapshot back into the annotation graph.
pub fn decode(stored: &str, compression: Compression) -> Result<Snapshot> {
    let json = match compression {
        Compression::None => stored.to_string(),
        Compression::Gzip => {
            let compressed = BASE64
                .decode(stored)
                .map_err(|e| Error::malformed("snapshot", format!("base64: {}", e)))?;
            let mut decoder = GzDecoder::new(compressed.as_slice());
            let mut json = String::new();
            decoder.read_to_string(&mut json)?;
            json
        }
        Compression::Bzip2 | Compression::Xz => {
            return Err(Error::UnsupportedCodec(format!("{:?}", compression)))
        }
    };
    serde_json::from_str(&json)
        .map_err(|e| Error::malformed("snapshot", format!("deserializing: {}", e)))
}

/// Encode and persist the snapshot under `<base_field><codec tag>`, marking
/// the stage complete. `base_field` defaults to `meta.cas.<stage>`.
pub async fn write_snapshot(
    pool: &SqlitePool,
    doc: &AssembledDocument,
    layers: &AnnotationSet,
    base_field: Option<&str>,
    stage: &str,
    stage_field: &str,
    compression: Compression,
) -> Result<()> {
    let encoded = encode(doc, layers, compression)?;
    let mut keys = match base_field {
        Some(field) => split_path(field),
        None => vec!["meta".to_string(), "cas".to_string(), stage.to_string()],
    };
    if let Some(last) = keys.last_mut() {
        // the codec tag is part of the final key, not a nested path step
        last.push_str(compression.tag());
    }
    sync_result_at(
        pool,
        &doc.meta.id,
        &keys,
        &Value::String(encoded),
        stage,
        stage_field,
    )
    .await
}
