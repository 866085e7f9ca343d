use crate::engine::{EngineConnection, EngineHandle};
use parquet_grid_common::{ExportConfig, GridError, Result};

const TEMP_TABLE: &str = "temp_results";

/// Bytes ready to be saved by the presentation collaborator.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Derives the export filename from a display title: lowercased,
/// whitespace collapsed to underscores, fixed suffix.
pub fn export_file_name(title: &str, config: &ExportConfig) -> String {
    let stem = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();
    format!("{stem}{}", config.file_suffix)
}

/// Materializes a compiled query as a parquet file and reads it back out
/// of the engine's virtual filesystem. The transient table and virtual
/// file are removed before the connection is released on every path, even
/// when the buffer fetch fails, so nothing leaks across calls.
pub async fn export_results(
    engine: &EngineHandle,
    query: &str,
    file_name: &str,
    config: &ExportConfig,
) -> Result<ExportedFile> {
    let mut conn = engine.connect().await?;
    let result = materialize(engine, conn.as_mut(), query, file_name, config).await;
    cleanup(engine, conn.as_mut(), file_name).await;
    let closed = conn.close().await;
    let bytes = result.map_err(|e| GridError::Export(e.to_string()))?;
    closed?;
    Ok(ExportedFile {
        file_name: file_name.to_owned(),
        bytes,
    })
}

async fn materialize(
    engine: &EngineHandle,
    conn: &mut dyn EngineConnection,
    query: &str,
    file_name: &str,
    config: &ExportConfig,
) -> Result<Vec<u8>> {
    conn.query(&format!("CREATE TEMPORARY TABLE {TEMP_TABLE} AS {query}"))
        .await?;
    conn.query(&format!(
        "COPY (SELECT * FROM {TEMP_TABLE}) TO '{file_name}' \
         (FORMAT 'parquet', COMPRESSION '{}')",
        config.compression
    ))
    .await?;
    engine.copy_file_to_buffer(file_name).await
}

/// Best-effort teardown; failures are logged and never mask the primary
/// result.
async fn cleanup(engine: &EngineHandle, conn: &mut dyn EngineConnection, file_name: &str) {
    if let Err(e) = conn
        .query(&format!("DROP TABLE IF EXISTS {TEMP_TABLE}"))
        .await
    {
        tracing::warn!(error = %e, "failed to drop transient export table");
    }
    if let Err(e) = engine.drop_file(file_name).await {
        tracing::warn!(file = file_name, error = %e, "failed to drop virtual export file");
    }
}
