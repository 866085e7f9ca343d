use crate::columns::{generate_column_models, ColumnModel};
use crate::engine::{CellValue, EngineConnection, EngineHandle, RowSet};
use crate::filter::{
    compile_where_clause, FilterDescriptor, InvalidFilterMode, JoinOperator,
};
use crate::probe::{probe_dataset, ColumnMetadata, ColumnSchema};
use crate::query::{build_count, build_export_select, build_select, SortDescriptor};
use parquet_grid_common::{Config, GridError, ProbeConfig, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadPhase {
    Idle,
    SchemaLoading,
    DataLoading,
    Ready,
    Error,
}

/// Paging state recomputed after every successful query. Out-of-range
/// pages are not clamped; they simply yield empty result sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageState {
    pub page_index: usize,
    pub page_size: usize,
    pub total_rows: u64,
    pub filtered_rows: Option<u64>,
    pub total_pages: u64,
}

impl PageState {
    fn new(page_size: usize) -> Self {
        Self {
            page_index: 0,
            page_size: page_size.max(1),
            total_rows: 0,
            filtered_rows: None,
            total_pages: 0,
        }
    }

    fn effective_rows(&self) -> u64 {
        self.filtered_rows.unwrap_or(self.total_rows)
    }

    fn recompute_pages(&mut self) {
        let size = self.page_size as u64;
        self.total_pages = self.effective_rows().div_ceil(size);
    }
}

/// Discrete user-driven changes from the presentation collaborator.
/// Descriptor sets are replaced wholesale, never partially mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    PageChanged(usize),
    PageSizeChanged(usize),
    FiltersChanged(Vec<FilterDescriptor>),
    SortsChanged(Vec<SortDescriptor>),
}

/// Tag for one reload cycle. A completion whose ticket no longer matches
/// the controller's generation is stale and gets discarded, so replies can
/// never apply out of order.
#[derive(Debug)]
pub struct ReloadTicket {
    generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReloadPlan {
    pub select_sql: String,
    pub count_sql: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReloadOutcome {
    pub rows: RowSet,
    pub filtered_rows: Option<u64>,
}

pub struct TableController {
    engine: EngineHandle,
    dataset_path: String,
    join: JoinOperator,
    invalid_mode: InvalidFilterMode,
    enable_selection: bool,
    probe_config: ProbeConfig,
    phase: LoadPhase,
    schema: Vec<ColumnSchema>,
    metadata: HashMap<String, ColumnMetadata>,
    models: Vec<ColumnModel>,
    filters: Vec<FilterDescriptor>,
    sorts: Vec<SortDescriptor>,
    page: PageState,
    rows: RowSet,
    error: Option<String>,
    generation: u64,
}

impl TableController {
    pub fn new(engine: EngineHandle, dataset_path: impl Into<String>, config: &Config) -> Self {
        Self {
            engine,
            dataset_path: dataset_path.into(),
            join: JoinOperator::from_config(&config.filter.join_operator),
            invalid_mode: InvalidFilterMode::from_config(&config.filter.on_invalid),
            enable_selection: config.paging.enable_selection,
            probe_config: config.probe.clone(),
            phase: LoadPhase::Idle,
            schema: Vec::new(),
            metadata: HashMap::new(),
            models: Vec::new(),
            filters: Vec::new(),
            sorts: Vec::new(),
            page: PageState::new(config.paging.default_page_size),
            rows: RowSet::default(),
            error: None,
            generation: 0,
        }
    }

    /// Probes the dataset and loads the first page. A schema-probe failure
    /// is fatal to the view: no column models exist, so nothing renders.
    pub async fn open(&mut self) -> Result<()> {
        self.phase = LoadPhase::SchemaLoading;
        self.error = None;
        match probe_dataset(&self.engine, &self.dataset_path, &self.probe_config).await {
            Ok(probe) => {
                self.page.total_rows = probe.total_rows;
                self.page.filtered_rows = None;
                self.page.recompute_pages();
                self.models = generate_column_models(
                    &probe.columns,
                    &probe.metadata,
                    self.enable_selection,
                );
                self.schema = probe.columns;
                self.metadata = probe.metadata;
                self.reload().await
            }
            Err(e) => {
                self.phase = LoadPhase::Error;
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Switches to a new dataset path: schema, metadata, and descriptor
    /// sets are discarded and the probe runs again.
    pub async fn open_dataset(&mut self, dataset_path: impl Into<String>) -> Result<()> {
        self.dataset_path = dataset_path.into();
        self.schema.clear();
        self.metadata.clear();
        self.models.clear();
        self.filters.clear();
        self.sorts.clear();
        self.rows = RowSet::default();
        self.page.page_index = 0;
        self.phase = LoadPhase::Idle;
        self.open().await
    }

    /// Applies one user event transactionally and reloads the page.
    pub async fn apply(&mut self, event: TableEvent) -> Result<()> {
        match event {
            TableEvent::PageChanged(index) => {
                self.page.page_index = index;
            }
            TableEvent::PageSizeChanged(size) => {
                // page boundaries are invalidated, start over at page 0
                self.page.page_size = size.max(1);
                self.page.page_index = 0;
            }
            TableEvent::FiltersChanged(filters) => {
                self.filters = filters;
                self.page.page_index = 0;
            }
            TableEvent::SortsChanged(sorts) => {
                self.sorts = sorts;
            }
        }
        if self.schema.is_empty() {
            // nothing to reload until the probe has produced a schema
            return Ok(());
        }
        self.reload().await
    }

    /// One full reload cycle: tag, fetch, apply-if-current.
    pub async fn reload(&mut self) -> Result<()> {
        let ticket = self.begin_reload();
        let plan = match self.build_plan() {
            Ok(plan) => plan,
            Err(e) => return self.finish_reload(ticket, Err(e)),
        };
        let outcome = fetch_page(&self.engine, &plan).await;
        self.finish_reload(ticket, outcome)
    }

    /// Starts a reload cycle and advances the generation counter,
    /// invalidating any cycle still in flight.
    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.generation += 1;
        self.phase = LoadPhase::DataLoading;
        ReloadTicket {
            generation: self.generation,
        }
    }

    /// Compiles the current descriptor sets into the page and count
    /// statements. The count pass only runs when filters are present.
    pub fn build_plan(&self) -> Result<ReloadPlan> {
        let where_clause = compile_where_clause(&self.filters, self.join, self.invalid_mode)?;
        let offset = self.page.page_index * self.page.page_size;
        let select_sql = build_select(
            &self.dataset_path,
            &where_clause,
            &self.sorts,
            self.page.page_size,
            offset,
        );
        let count_sql = (!self.filters.is_empty() && !where_clause.is_empty())
            .then(|| build_count(&self.dataset_path, &where_clause));
        Ok(ReloadPlan {
            select_sql,
            count_sql,
        })
    }

    /// Applies a completed reload. Stale tickets (superseded by a newer
    /// `begin_reload`) are discarded without touching state. Failures set
    /// the error phase but keep the previously loaded rows visible.
    pub fn finish_reload(
        &mut self,
        ticket: ReloadTicket,
        outcome: Result<ReloadOutcome>,
    ) -> Result<()> {
        if ticket.generation != self.generation {
            tracing::debug!(
                stale = ticket.generation,
                current = self.generation,
                "discarding stale reload"
            );
            return Ok(());
        }
        match outcome {
            Ok(mut outcome) => {
                outcome.rows.normalize();
                self.rows = outcome.rows;
                self.page.filtered_rows = outcome.filtered_rows;
                self.page.recompute_pages();
                self.phase = LoadPhase::Ready;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.phase = LoadPhase::Error;
                self.error = Some(message.clone());
                Err(GridError::DataLoad(message))
            }
        }
    }

    /// Filtered, unpaged SELECT for the export path.
    pub fn export_query(&self) -> Result<String> {
        let where_clause = compile_where_clause(&self.filters, self.join, self.invalid_mode)?;
        Ok(build_export_select(&self.dataset_path, &where_clause))
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn page_state(&self) -> &PageState {
        &self.page
    }

    pub fn rows(&self) -> &RowSet {
        &self.rows
    }

    pub fn column_models(&self) -> &[ColumnModel] {
        &self.models
    }

    pub fn schema(&self) -> &[ColumnSchema] {
        &self.schema
    }

    pub fn metadata(&self) -> &HashMap<String, ColumnMetadata> {
        &self.metadata
    }

    pub fn filters(&self) -> &[FilterDescriptor] {
        &self.filters
    }

    pub fn sorts(&self) -> &[SortDescriptor] {
        &self.sorts
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Runs the count-then-fetch protocol on one connection and releases it on
/// every path.
pub async fn fetch_page(engine: &EngineHandle, plan: &ReloadPlan) -> Result<ReloadOutcome> {
    let mut conn = engine.connect().await?;
    let result = run_fetch(conn.as_mut(), plan).await;
    let closed = conn.close().await;
    let outcome = result?;
    closed?;
    Ok(outcome)
}

async fn run_fetch(
    conn: &mut dyn EngineConnection,
    plan: &ReloadPlan,
) -> Result<ReloadOutcome> {
    let filtered_rows = match &plan.count_sql {
        Some(sql) => Some(
            conn.query(sql)
                .await?
                .scalar()
                .and_then(CellValue::as_u64)
                .ok_or_else(|| GridError::DataLoad("count query returned no rows".into()))?,
        ),
        None => None,
    };
    let rows = conn.query(&plan.select_sql).await?;
    Ok(ReloadOutcome {
        rows,
        filtered_rows,
    })
}
