use crate::engine::{CellValue, EngineConnection, EngineHandle};
use crate::filter::quote_ident;
use crate::query::from_clause;
use parquet_grid_common::{GridError, ProbeConfig, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One column as reported by the engine's DESCRIBE introspection.
/// Immutable once fetched for a dataset path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub physical_type: String,
    pub nullable: bool,
    pub key: Option<String>,
    pub default_value: Option<String>,
}

/// Sampled per-column hints. `unique_values` is bounded by the distinct
/// sample limit and may be incomplete; treat it as a hint, not ground
/// truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub unique_values: Option<Vec<String>>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct DatasetProbe {
    pub columns: Vec<ColumnSchema>,
    pub total_rows: u64,
    pub metadata: HashMap<String, ColumnMetadata>,
}

// physical type classifiers shared with the column model generator

pub fn is_string_type(physical_type: &str) -> bool {
    let t = physical_type.to_lowercase();
    t.contains("varchar") || t.contains("text") || t.contains("enum")
}

pub fn is_numeric_type(physical_type: &str) -> bool {
    let t = physical_type.to_lowercase();
    t.contains("int") || t.contains("float") || t.contains("double") || t.contains("decimal")
}

pub fn is_temporal_type(physical_type: &str) -> bool {
    let t = physical_type.to_lowercase();
    t.contains("date") || t.contains("time")
}

pub fn is_boolean_type(physical_type: &str) -> bool {
    physical_type.to_lowercase().contains("bool")
}

pub fn is_geometry_type(physical_type: &str) -> bool {
    physical_type.to_lowercase().contains("geometry")
}

/// Probes a dataset: schema, total row count, and per-column value hints.
/// Opens one connection and closes it exactly once on every path. A
/// failing probe for one column is logged and skipped; only the schema and
/// count queries are fatal.
pub async fn probe_dataset(
    engine: &EngineHandle,
    dataset_path: &str,
    config: &ProbeConfig,
) -> Result<DatasetProbe> {
    let mut conn = engine.connect().await?;
    let result = run_probes(conn.as_mut(), dataset_path, config).await;
    let closed = conn.close().await;
    let probe = result?;
    closed?;
    Ok(probe)
}

async fn run_probes(
    conn: &mut dyn EngineConnection,
    dataset_path: &str,
    config: &ProbeConfig,
) -> Result<DatasetProbe> {
    let from = from_clause(dataset_path);

    let describe = conn
        .query(&format!("DESCRIBE SELECT * FROM {from} LIMIT 1"))
        .await
        .map_err(|e| GridError::SchemaProbe(e.to_string()))?;
    let columns = parse_describe(&describe)?;

    let count = conn
        .query(&format!("SELECT COUNT(*) AS total_rows FROM {from}"))
        .await
        .map_err(|e| GridError::SchemaProbe(e.to_string()))?;
    let total_rows = count
        .scalar()
        .and_then(CellValue::as_u64)
        .ok_or_else(|| GridError::SchemaProbe("COUNT(*) returned no rows".into()))?;

    let mut metadata = HashMap::new();
    for col in &columns {
        match probe_column(conn, &from, col, config).await {
            Ok(Some(meta)) => {
                metadata.insert(col.name.clone(), meta);
            }
            Ok(None) => {}
            Err(e) => {
                // partial metadata is acceptable; one bad column must not
                // abort the others
                tracing::warn!(column = %col.name, error = %e, "column metadata probe failed");
            }
        }
    }

    Ok(DatasetProbe {
        columns,
        total_rows,
        metadata,
    })
}

async fn probe_column(
    conn: &mut dyn EngineConnection,
    from: &str,
    col: &ColumnSchema,
    config: &ProbeConfig,
) -> Result<Option<ColumnMetadata>> {
    let ident = quote_ident(&col.name);
    if is_string_type(&col.physical_type) {
        let sql = format!(
            "SELECT DISTINCT {ident} AS value FROM {from} WHERE {ident} IS NOT NULL LIMIT {}",
            config.distinct_sample_limit
        );
        let distinct = conn.query(&sql).await?;
        if distinct.rows.len() <= config.multi_select_max {
            let values = distinct
                .rows
                .iter()
                .filter_map(|r| r.first())
                .map(|v| v.to_string())
                .collect();
            return Ok(Some(ColumnMetadata {
                unique_values: Some(values),
                ..Default::default()
            }));
        }
        // more distinct values than the menu can hold: treat as free text
        return Ok(None);
    }
    if is_numeric_type(&col.physical_type) {
        let sql = format!(
            "SELECT MIN({ident}) AS min_val, MAX({ident}) AS max_val FROM {from} \
             WHERE {ident} IS NOT NULL"
        );
        let range = conn.query(&sql).await?;
        if let Some(row) = range.rows.first() {
            return Ok(Some(ColumnMetadata {
                unique_values: None,
                min_value: row.first().and_then(CellValue::as_f64),
                max_value: row.get(1).and_then(CellValue::as_f64),
            }));
        }
        return Ok(None);
    }
    Ok(None)
}

fn parse_describe(rows: &crate::engine::RowSet) -> Result<Vec<ColumnSchema>> {
    let name_idx = rows
        .column_index("column_name")
        .ok_or_else(|| GridError::SchemaProbe("DESCRIBE result lacks column_name".into()))?;
    let type_idx = rows
        .column_index("column_type")
        .ok_or_else(|| GridError::SchemaProbe("DESCRIBE result lacks column_type".into()))?;
    let null_idx = rows.column_index("null");
    let key_idx = rows.column_index("key");
    let default_idx = rows.column_index("default");

    rows.rows
        .iter()
        .map(|row| {
            let name = row
                .get(name_idx)
                .and_then(|v| v.as_text())
                .ok_or_else(|| GridError::SchemaProbe("non-text column_name".into()))?
                .to_owned();
            let physical_type = row
                .get(type_idx)
                .and_then(|v| v.as_text())
                .ok_or_else(|| GridError::SchemaProbe("non-text column_type".into()))?
                .to_owned();
            let nullable = null_idx
                .and_then(|i| row.get(i))
                .and_then(|v| v.as_text())
                .map(|s| s.eq_ignore_ascii_case("yes"))
                .unwrap_or(true);
            let non_empty = |v: &CellValue| {
                v.as_text()
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_owned())
            };
            Ok(ColumnSchema {
                name,
                physical_type,
                nullable,
                key: key_idx.and_then(|i| row.get(i)).and_then(non_empty),
                default_value: default_idx.and_then(|i| row.get(i)).and_then(non_empty),
            })
        })
        .collect()
}
