pub mod columns;
pub mod controller;
pub mod engine;
pub mod export;
pub mod filter;
pub mod probe;
pub mod query;

pub use parquet_grid_common::{Config, ExportConfig, GridError, ProbeConfig, Result};

pub use columns::{generate_column_models, ColumnModel, ColumnVariant, DisplayHint};
pub use controller::{LoadPhase, PageState, TableController, TableEvent};
pub use engine::{CellValue, Engine, EngineConnection, EngineHandle, RowSet};
pub use export::{export_file_name, export_results, ExportedFile};
pub use filter::{
    compile_where_clause, map_operator, FilterDescriptor, FilterOperator, FilterValue,
    FilterVariant, InvalidFilterMode, JoinOperator,
};
pub use probe::{probe_dataset, ColumnMetadata, ColumnSchema, DatasetProbe};
pub use query::SortDescriptor;
