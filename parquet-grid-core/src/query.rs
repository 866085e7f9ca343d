use crate::filter::quote_ident;
use serde::{Deserialize, Serialize};

/// One ORDER BY key. Sequence order in the descriptor list is the clause
/// order; there is no implicit secondary tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDescriptor {
    pub column_id: String,
    #[serde(default)]
    pub descending: bool,
}

/// The engine reads columnar files through its reader function; the path
/// goes in verbatim and must come from trusted configuration.
pub fn from_clause(dataset_path: &str) -> String {
    format!("read_parquet('{dataset_path}')")
}

pub fn order_by_clause(sorts: &[SortDescriptor]) -> String {
    sorts
        .iter()
        .map(|s| {
            format!(
                "{} {}",
                quote_ident(&s.column_id),
                if s.descending { "DESC" } else { "ASC" }
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Full page query: SELECT *, optional WHERE and ORDER BY, always
/// LIMIT/OFFSET. `where_clause` is the compiler's output ("" means no
/// filter).
pub fn build_select(
    dataset_path: &str,
    where_clause: &str,
    sorts: &[SortDescriptor],
    limit: usize,
    offset: usize,
) -> String {
    let mut sql = format!("SELECT * FROM {}", from_clause(dataset_path));
    if !where_clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    if !sorts.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by_clause(sorts));
    }
    sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
    sql
}

/// Count query sharing the page query's WHERE clause; second pass of the
/// count-then-fetch protocol.
pub fn build_count(dataset_path: &str, where_clause: &str) -> String {
    let mut sql = format!(
        "SELECT COUNT(*) AS filtered_rows FROM {}",
        from_clause(dataset_path)
    );
    if !where_clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    sql
}

/// Unpaged, unsorted filtered SELECT used as the export source.
pub fn build_export_select(dataset_path: &str, where_clause: &str) -> String {
    let mut sql = format!("SELECT * FROM {}", from_clause(dataset_path));
    if !where_clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    sql
}
