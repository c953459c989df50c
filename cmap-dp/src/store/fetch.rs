//! Document fetch
//!
//! Fetches documents matching a selection filter, projecting the requested
//! dot-qualified fields into a flattened field map, sorted by id with an
//! item limit: a deterministic, stable cursor across repeated calls with
//! the same filter.

use cmap_common::Result;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::fields::FetchedDocument;
use crate::store::{json_path, resolve_path};

/// Selection filter for a fetch pass.
#[derive(Debug, Clone, Default)]
pub struct FetchFilter {
    /// Field-equality conditions on dot-qualified paths
    pub equals: Vec<(String, Value)>,
    /// Only documents whose completed-stages set (at `stage_field`) does not
    /// contain this stage name
    pub missing_stage: Option<String>,
    /// Dot-qualified path of the completed-stages set
    pub stage_field: String,
}

impl FetchFilter {
    pub fn new(stage_field: impl Into<String>) -> Self {
        Self {
            equals: Vec::new(),
            missing_stage: None,
            stage_field: stage_field.into(),
        }
    }
}

/// Fetch up to `max_items` matching documents, projecting `fields`.
pub async fn fetch_documents(
    pool: &SqlitePool,
    filter: &FetchFilter,
    max_items: u32,
    fields: &[String],
) -> Result<Vec<FetchedDocument>> {
    let mut sql = String::from("SELECT id, language, data FROM documents");
    let mut conditions = Vec::new();
    for (path, _) in &filter.equals {
        conditions.push(format!("json_extract(data, '{}') = ?", json_path(path)));
    }
    if filter.missing_stage.is_some() {
        conditions.push(format!(
            "NOT EXISTS (SELECT 1 FROM json_each(data, '{}') WHERE json_each.value = ?)",
            json_path(&filter.stage_field)
        ));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY id LIMIT ?");

    let mut query = sqlx::query(&sql);
    for (_, value) in &filter.equals {
        query = match value {
            Value::String(s) => query.bind(s.clone()),
            Value::Number(n) => query.bind(n.as_f64().unwrap_or(0.0)),
            Value::Bool(b) => query.bind(*b as i64),
            other => query.bind(other.to_string()),
        };
    }
    if let Some(stage) = &filter.missing_stage {
        query = query.bind(stage.clone());
    }
    query = query.bind(max_items as i64);

    let rows = query.fetch_all(pool).await?;
    debug!(matched = rows.len(), "Fetched documents");

    let mut documents = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.get("id");
        let language: Option<String> = row.get("language");
        let data: String = row.get("data");
        let body: Value = serde_json::from_str(&data)
            .map_err(|e| cmap_common::Error::malformed("data", format!("document body: {}", e)))?;

        // language column, falling back to the body's lang key
        let language = language.or_else(|| {
            resolve_path(&body, "lang")
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        let mut doc = FetchedDocument::new(id, language);
        for field in fields {
            if let Some(value) = resolve_path(&body, field) {
                doc.insert(field.clone(), value.clone());
            }
        }
        documents.push(doc);
    }

    Ok(documents)
}

/// Insert or replace a document row; test and seeding helper.
pub async fn upsert_document(
    pool: &SqlitePool,
    id: &str,
    language: Option<&str>,
    body: &Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (id, language, data) VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            language = excluded.language,
            data = excluded.data
        "#,
    )
    .bind(id)
    .bind(language)
    .bind(body.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Read one document's raw JSON body, for diagnostics and tests.
pub async fn read_document(pool: &SqlitePool, id: &str) -> Result<Option<Value>> {
    let row = sqlx::query("SELECT data FROM documents WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    match row {
        None => Ok(None),
        Some(row) => {
            let data: String = row.get("data");
            let body = serde_json::from_str(&data)
                .map_err(|e| cmap_common::Error::malformed("data", format!("document body: {}", e)))?;
            Ok(Some(body))
        }
    }
}
