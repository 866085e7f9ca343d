use async_trait::async_trait;
use parquet_grid_common::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One cell as returned by the engine. `BigInt` carries engine-native wide
/// integers (BIGINT/HUGEINT) before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    BigInt(i128),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl CellValue {
    /// Downcasts wide integers to the host float. Values above 2^53 lose
    /// precision; that is accepted behavior for display and paging math.
    pub fn normalized(self) -> CellValue {
        match self {
            CellValue::BigInt(v) => CellValue::Float(v as f64),
            other => other,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            CellValue::Int(v) => u64::try_from(*v).ok(),
            CellValue::BigInt(v) => u64::try_from(*v).ok(),
            CellValue::Float(v) if *v >= 0.0 => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::BigInt(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => write!(f, ""),
            CellValue::Bool(v) => write!(f, "{v}"),
            CellValue::Int(v) => write!(f, "{v}"),
            CellValue::BigInt(v) => write!(f, "{v}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Materialized result of one query: column names plus row vectors in
/// column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// First cell of the first row; the shape COUNT/MIN/MAX probes come in.
    pub fn scalar(&self) -> Option<&CellValue> {
        self.rows.first()?.first()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Applies wide-integer normalization to every cell in place.
    pub fn normalize(&mut self) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                let v = std::mem::replace(cell, CellValue::Null);
                *cell = v.normalized();
            }
        }
    }
}

/// Black-box SQL executor. All interaction is textual SQL; there is no
/// parameterized-query primitive, so literal escaping in the filter
/// compiler is load-bearing.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn EngineConnection>>;

    /// Reads a file out of the engine's virtual filesystem.
    async fn copy_file_to_buffer(&self, name: &str) -> Result<Vec<u8>>;

    /// Deletes a file from the engine's virtual filesystem.
    async fn drop_file(&self, name: &str) -> Result<()>;

    async fn terminate(&self) -> Result<()> {
        Ok(())
    }
}

/// A single engine connection. Scarce per-call resource: callers must
/// close it on every exit path and never reuse it across operations.
#[async_trait]
pub trait EngineConnection: Send {
    async fn query(&mut self, sql: &str) -> Result<RowSet>;
    async fn close(&mut self) -> Result<()>;
}

/// Explicitly owned engine lifecycle. Created once by the host and cloned
/// into every component that issues queries; nothing caches a connection
/// or the engine behind the caller's back.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<dyn Engine>,
}

impl EngineHandle {
    pub fn init(engine: Arc<dyn Engine>) -> Self {
        Self { inner: engine }
    }

    pub async fn connect(&self) -> Result<Box<dyn EngineConnection>> {
        self.inner.connect().await
    }

    pub async fn copy_file_to_buffer(&self, name: &str) -> Result<Vec<u8>> {
        self.inner.copy_file_to_buffer(name).await
    }

    pub async fn drop_file(&self, name: &str) -> Result<()> {
        self.inner.drop_file(name).await
    }

    pub async fn terminate(&self) -> Result<()> {
        self.inner.terminate().await
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EngineHandle")
    }
}
