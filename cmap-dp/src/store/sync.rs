//! Result write-back
//!
//! Merges a stage's aggregate into the document's result field and records
//! stage completion with set-union semantics, so repeated application is
//! idempotent. The write is attempted exactly once: on failure the error is
//! logged with a best-effort diagnostic read of the current document state,
//! and the stage stays unmarked so an external scheduler can resubmit the
//! document wholesale.

use cmap_common::{Error, Result};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tracing::{debug, error};

use crate::aggregate::ChildRecord;
use crate::store::{resolve_path, set_path, split_path};

/// Default dot-qualified path of the completed-stages set
pub const DEFAULT_STAGE_FIELD: &str = "processing.available_data";

/// Set `result_field` to `value` and union `stage` into the completed-stages
/// set, atomically for the one document identified by `id`.
pub async fn sync_result(
    pool: &SqlitePool,
    id: &str,
    result_field: &str,
    value: &Value,
    stage: &str,
    stage_field: &str,
) -> Result<()> {
    sync_result_at(pool, id, &split_path(result_field), value, stage, stage_field).await
}

/// Like [`sync_result`], with the result field given as explicit key
/// components; the final key may itself contain a dot (codec-tagged
/// snapshot fields).
pub async fn sync_result_at(
    pool: &SqlitePool,
    id: &str,
    result_keys: &[String],
    value: &Value,
    stage: &str,
    stage_field: &str,
) -> Result<()> {
    let outcome = apply(pool, id, Some((result_keys, value)), stage, stage_field).await;
    report(pool, id, stage, outcome).await
}

/// Record stage completion without touching a result field (used by
/// consumers whose payload goes elsewhere, e.g. child records).
pub async fn mark_stage_complete(
    pool: &SqlitePool,
    id: &str,
    stage: &str,
    stage_field: &str,
) -> Result<()> {
    let outcome = apply(pool, id, None, stage, stage_field).await;
    report(pool, id, stage, outcome).await
}

/// Insert child records emitted for one document.
pub async fn insert_child_records(pool: &SqlitePool, records: &[ChildRecord]) -> Result<()> {
    for record in records {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO document_segments
                (id, parent_id, begin_ms, end_ms, segment_type, data)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.parent_id)
        .bind(record.span.begin)
        .bind(record.span.end)
        .bind(&record.segment_type)
        .bind(record.data.to_string())
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn apply(
    pool: &SqlitePool,
    id: &str,
    result: Option<(&[String], &Value)>,
    stage: &str,
    stage_field: &str,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query("SELECT data FROM documents WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("document {}", id)))?;
    let data: String = row.get("data");
    let mut body: Value = serde_json::from_str(&data)
        .map_err(|e| Error::malformed("data", format!("document body: {}", e)))?;

    if let Some((keys, value)) = result {
        crate::store::set_components(&mut body, keys, value.clone());
    }
    union_stage(&mut body, stage, stage_field);

    sqlx::query("UPDATE documents SET data = ? WHERE id = ?")
        .bind(body.to_string())
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Union the stage name into the set-valued completed-stages field. A
/// missing or non-array field is replaced by a fresh single-element set.
fn union_stage(body: &mut Value, stage: &str, stage_field: &str) {
    let existing = resolve_path(body, stage_field).and_then(Value::as_array).cloned();
    match existing {
        Some(mut stages) => {
            if !stages.iter().any(|s| s.as_str() == Some(stage)) {
                stages.push(Value::String(stage.to_string()));
            }
            set_path(body, stage_field, Value::Array(stages));
        }
        None => {
            set_path(
                body,
                stage_field,
                Value::Array(vec![Value::String(stage.to_string())]),
            );
        }
    }
}

/// Log a failed write with a best-effort diagnostic read; never retry.
async fn report(pool: &SqlitePool, id: &str, stage: &str, outcome: Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => {
            debug!(document_id = %id, stage = %stage, "Result synced");
            Ok(())
        }
        Err(e) => {
            error!(document_id = %id, stage = %stage, error = %e, "Result sync failed, stage left unmarked");
            match crate::store::fetch::read_document(pool, id).await {
                Ok(Some(body)) => debug!(document_id = %id, state = %body, "Current document state"),
                Ok(None) => debug!(document_id = %id, "Document not present in store"),
                Err(read_error) => debug!(document_id = %id, error = %read_error, "Diagnostic read failed"),
            }
            Err(e)
        }
    }
}
