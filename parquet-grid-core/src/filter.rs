use chrono::{Local, SecondsFormat, TimeZone, Utc};
use parquet_grid_common::{GridError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    Ilike,
    NotIlike,
    In,
    NotIn,
    Between,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterVariant {
    Text,
    Number,
    Date,
    DateRange,
    MultiSelect,
    Boolean,
    Range,
}

impl FilterVariant {
    fn is_date(&self) -> bool {
        matches!(self, FilterVariant::Date | FilterVariant::DateRange)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FilterValue>),
}

/// One declarative filter as emitted by the grid toolbar. `column_id` must
/// come from schema introspection, never raw user text: identifiers are
/// quoted verbatim and not escaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDescriptor {
    pub column_id: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
    pub variant: FilterVariant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinOperator {
    #[default]
    And,
    Or,
}

impl JoinOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinOperator::And => "AND",
            JoinOperator::Or => "OR",
        }
    }

    pub fn from_config(s: &str) -> Self {
        if s.eq_ignore_ascii_case("or") {
            JoinOperator::Or
        } else {
            JoinOperator::And
        }
    }
}

/// What to do with a descriptor whose value shape does not match its
/// operator. `Drop` skips it silently, which widens the result set;
/// `Reject` fails the whole clause with a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidFilterMode {
    Drop,
    #[default]
    Reject,
}

impl InvalidFilterMode {
    pub fn from_config(s: &str) -> Self {
        if s.eq_ignore_ascii_case("drop") {
            InvalidFilterMode::Drop
        } else {
            InvalidFilterMode::Reject
        }
    }
}

/// Compiles filter descriptors to a WHERE predicate (without the `WHERE`
/// keyword). Empty input compiles to an empty string so the caller can
/// omit the clause entirely. Two or more fragments are parenthesized as a
/// group; a single fragment is returned unwrapped.
pub fn compile_where_clause(
    filters: &[FilterDescriptor],
    join: JoinOperator,
    mode: InvalidFilterMode,
) -> Result<String> {
    if filters.is_empty() {
        return Ok(String::new());
    }
    let mut fragments = Vec::with_capacity(filters.len());
    for filter in filters {
        match fragment(filter) {
            Ok(frag) => fragments.push(frag),
            Err(reason) => match mode {
                InvalidFilterMode::Reject => {
                    return Err(GridError::Filter {
                        column: filter.column_id.clone(),
                        reason,
                    })
                }
                InvalidFilterMode::Drop => {
                    tracing::debug!(column = %filter.column_id, %reason, "dropping malformed filter");
                }
            },
        }
    }
    Ok(match fragments.len() {
        0 => String::new(),
        1 => fragments.pop().unwrap_or_default(),
        _ => format!("({})", fragments.join(&format!(" {} ", join.as_sql()))),
    })
}

/// Compiles one descriptor to a predicate fragment, or the reason it
/// cannot be compiled.
fn fragment(filter: &FilterDescriptor) -> std::result::Result<String, String> {
    let col = quote_ident(&filter.column_id);
    let value = &filter.value;
    match filter.operator {
        FilterOperator::Eq => {
            if filter.variant.is_date() {
                let ms = timestamp_ms(value).ok_or("date filter needs a numeric timestamp")?;
                let (start, end) = day_bounds(ms).ok_or("timestamp out of calendar range")?;
                return Ok(format!("({col} >= '{start}' AND {col} <= '{end}')"));
            }
            Ok(format!("{col} = {}", scalar_literal(value)?))
        }
        FilterOperator::Ne => Ok(format!("{col} != {}", scalar_literal(value)?)),
        FilterOperator::Lt => Ok(format!("{col} < {}", comparable(value, filter.variant)?)),
        FilterOperator::Lte => Ok(format!("{col} <= {}", comparable(value, filter.variant)?)),
        FilterOperator::Gt => Ok(format!("{col} > {}", comparable(value, filter.variant)?)),
        FilterOperator::Gte => Ok(format!("{col} >= {}", comparable(value, filter.variant)?)),
        FilterOperator::Like => {
            let s = text_value(value)?;
            Ok(format!("{col} LIKE '%{}%'", escape_str(s)))
        }
        FilterOperator::Ilike => {
            let s = text_value(value)?;
            Ok(format!("{col} ILIKE '%{}%'", escape_str(s)))
        }
        FilterOperator::NotIlike => {
            let s = text_value(value)?;
            Ok(format!("{col} NOT ILIKE '%{}%'", escape_str(s)))
        }
        FilterOperator::In => Ok(format!("{col} IN ({})", list_literals(value)?)),
        FilterOperator::NotIn => Ok(format!("{col} NOT IN ({})", list_literals(value)?)),
        FilterOperator::Between => {
            let FilterValue::List(items) = value else {
                return Err("between needs a 2-element array".into());
            };
            let [lo, hi] = items.as_slice() else {
                return Err("between needs a 2-element array".into());
            };
            if filter.variant.is_date() {
                let lo_ms = timestamp_ms(lo).ok_or("date bound is not a timestamp")?;
                let hi_ms = timestamp_ms(hi).ok_or("date bound is not a timestamp")?;
                let (start, _) = day_bounds(lo_ms).ok_or("timestamp out of calendar range")?;
                let (_, end) = day_bounds(hi_ms).ok_or("timestamp out of calendar range")?;
                return Ok(format!("{col} BETWEEN '{start}' AND '{end}'"));
            }
            Ok(format!(
                "{col} BETWEEN {} AND {}",
                scalar_literal(lo)?,
                scalar_literal(hi)?
            ))
        }
        FilterOperator::IsNull => Ok(format!("{col} IS NULL")),
        FilterOperator::IsNotNull => Ok(format!("{col} IS NOT NULL")),
    }
}

/// Translates the external filter-UI operator vocabulary into the
/// compiler's operators. Unrecognized operators fall back to `Ilike`.
pub fn map_operator(operator: &str) -> FilterOperator {
    match operator {
        "eq" => FilterOperator::Eq,
        "ne" => FilterOperator::Ne,
        "lt" => FilterOperator::Lt,
        "lte" => FilterOperator::Lte,
        "gt" => FilterOperator::Gt,
        "gte" => FilterOperator::Gte,
        "iLike" => FilterOperator::Ilike,
        "notILike" => FilterOperator::NotIlike,
        "inArray" => FilterOperator::In,
        "notInArray" => FilterOperator::NotIn,
        "isBetween" => FilterOperator::Between,
        "isEmpty" => FilterOperator::IsNull,
        "isNotEmpty" => FilterOperator::IsNotNull,
        _ => FilterOperator::Ilike,
    }
}

pub fn quote_ident(id: &str) -> String {
    format!("\"{id}\"")
}

fn escape_str(s: &str) -> String {
    s.replace('\'', "''")
}

fn scalar_literal(value: &FilterValue) -> std::result::Result<String, String> {
    match value {
        FilterValue::Text(s) => Ok(format!("'{}'", escape_str(s))),
        FilterValue::Number(n) => Ok(fmt_number(*n)),
        FilterValue::Bool(b) => Ok(if *b { "TRUE".into() } else { "FALSE".into() }),
        FilterValue::Null => Err("value is null".into()),
        FilterValue::List(_) => Err("expected a scalar, got an array".into()),
    }
}

fn comparable(
    value: &FilterValue,
    variant: FilterVariant,
) -> std::result::Result<String, String> {
    if variant.is_date() {
        let ms = timestamp_ms(value).ok_or("date filter needs a numeric timestamp")?;
        let iso = instant_iso(ms).ok_or("timestamp out of calendar range")?;
        return Ok(format!("'{iso}'"));
    }
    scalar_literal(value)
}

fn list_literals(value: &FilterValue) -> std::result::Result<String, String> {
    let FilterValue::List(items) = value else {
        return Err("expected a non-empty array".into());
    };
    if items.is_empty() {
        return Err("expected a non-empty array".into());
    }
    let rendered: std::result::Result<Vec<_>, _> = items.iter().map(scalar_literal).collect();
    Ok(rendered?.join(", "))
}

fn text_value(value: &FilterValue) -> std::result::Result<&str, String> {
    match value {
        FilterValue::Text(s) => Ok(s),
        _ => Err("pattern match needs a string value".into()),
    }
}

/// Renders a float the way SQL wants it: integral values without a
/// trailing `.0`.
fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// The grid sends date filter values as epoch milliseconds, sometimes as a
/// stringified number.
fn timestamp_ms(value: &FilterValue) -> Option<f64> {
    match value {
        FilterValue::Number(n) => Some(*n),
        FilterValue::Text(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn instant_iso(ms: f64) -> Option<String> {
    let dt = Local.timestamp_millis_opt(ms as i64).single()?;
    Some(
        dt.with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Bounds of the local calendar day containing the timestamp, rendered as
/// UTC instants.
fn day_bounds(ms: f64) -> Option<(String, String)> {
    let date = Local.timestamp_millis_opt(ms as i64).single()?.date_naive();
    let start = Local
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .single()?;
    let end = Local
        .from_local_datetime(&date.and_hms_milli_opt(23, 59, 59, 999)?)
        .single()?;
    Some((
        start
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        end.with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(
        column: &str,
        operator: FilterOperator,
        value: FilterValue,
        variant: FilterVariant,
    ) -> FilterDescriptor {
        FilterDescriptor {
            column_id: column.into(),
            operator,
            value,
            variant,
        }
    }

    #[test]
    fn empty_input_compiles_to_empty_string() {
        let sql =
            compile_where_clause(&[], JoinOperator::And, InvalidFilterMode::Reject).unwrap();
        assert_eq!(sql, "");
    }

    #[test]
    fn between_numbers() {
        let f = filter(
            "age",
            FilterOperator::Between,
            FilterValue::List(vec![FilterValue::Number(18.0), FilterValue::Number(65.0)]),
            FilterVariant::Number,
        );
        let sql =
            compile_where_clause(&[f], JoinOperator::And, InvalidFilterMode::Reject).unwrap();
        assert_eq!(sql, "\"age\" BETWEEN 18 AND 65");
    }

    #[test]
    fn ilike_doubles_embedded_quotes() {
        let f = filter(
            "name",
            FilterOperator::Ilike,
            FilterValue::Text("Jo'hn".into()),
            FilterVariant::Text,
        );
        let sql =
            compile_where_clause(&[f], JoinOperator::And, InvalidFilterMode::Reject).unwrap();
        assert_eq!(sql, "\"name\" ILIKE '%Jo''hn%'");
    }

    #[test]
    fn no_unescaped_quote_survives() {
        let tricky = "a'b''c'''";
        let f = filter(
            "col",
            FilterOperator::Eq,
            FilterValue::Text(tricky.into()),
            FilterVariant::Text,
        );
        let sql =
            compile_where_clause(&[f], JoinOperator::And, InvalidFilterMode::Reject).unwrap();
        // strip the outer literal quotes, every interior quote must be doubled
        let inner = sql.strip_prefix("\"col\" = '").unwrap();
        let inner = inner.strip_suffix('\'').unwrap();
        let mut run = 0usize;
        for c in inner.chars() {
            if c == '\'' {
                run += 1;
            } else {
                assert_eq!(run % 2, 0, "odd quote run in {inner:?}");
                run = 0;
            }
        }
        assert_eq!(run % 2, 0);
    }

    #[test]
    fn single_fragment_is_unwrapped_two_are_grouped() {
        let a = filter(
            "a",
            FilterOperator::Eq,
            FilterValue::Number(1.0),
            FilterVariant::Number,
        );
        let b = filter(
            "b",
            FilterOperator::Eq,
            FilterValue::Number(2.0),
            FilterVariant::Number,
        );
        let one = compile_where_clause(
            std::slice::from_ref(&a),
            JoinOperator::And,
            InvalidFilterMode::Reject,
        )
        .unwrap();
        assert_eq!(one, "\"a\" = 1");
        let two = compile_where_clause(&[a, b], JoinOperator::And, InvalidFilterMode::Reject)
            .unwrap();
        assert_eq!(two, "(\"a\" = 1 AND \"b\" = 2)");
    }

    #[test]
    fn or_join_uses_or() {
        let a = filter(
            "a",
            FilterOperator::Gt,
            FilterValue::Number(1.0),
            FilterVariant::Number,
        );
        let b = filter(
            "a",
            FilterOperator::Lt,
            FilterValue::Number(0.0),
            FilterVariant::Number,
        );
        let sql =
            compile_where_clause(&[a, b], JoinOperator::Or, InvalidFilterMode::Reject).unwrap();
        assert_eq!(sql, "(\"a\" > 1 OR \"a\" < 0)");
    }

    #[test]
    fn empty_in_list_is_rejected_or_dropped_by_mode() {
        let f = filter(
            "tag",
            FilterOperator::In,
            FilterValue::List(vec![]),
            FilterVariant::MultiSelect,
        );
        let err = compile_where_clause(
            std::slice::from_ref(&f),
            JoinOperator::And,
            InvalidFilterMode::Reject,
        )
        .unwrap_err();
        assert!(err.to_string().contains("tag"));
        let sql = compile_where_clause(&[f], JoinOperator::And, InvalidFilterMode::Drop).unwrap();
        assert_eq!(sql, "");
    }

    #[test]
    fn dropped_descriptor_keeps_the_rest() {
        let bad = filter(
            "tag",
            FilterOperator::Between,
            FilterValue::Number(1.0),
            FilterVariant::Number,
        );
        let good = filter(
            "a",
            FilterOperator::Eq,
            FilterValue::Number(1.0),
            FilterVariant::Number,
        );
        let sql = compile_where_clause(&[bad, good], JoinOperator::And, InvalidFilterMode::Drop)
            .unwrap();
        assert_eq!(sql, "\"a\" = 1");
    }

    #[test]
    fn in_list_mixes_text_and_numbers() {
        let f = filter(
            "state",
            FilterOperator::In,
            FilterValue::List(vec![
                FilterValue::Text("UT".into()),
                FilterValue::Text("N'V".into()),
                FilterValue::Number(3.0),
            ]),
            FilterVariant::MultiSelect,
        );
        let sql =
            compile_where_clause(&[f], JoinOperator::And, InvalidFilterMode::Reject).unwrap();
        assert_eq!(sql, "\"state\" IN ('UT', 'N''V', 3)");
    }

    #[test]
    fn is_null_ignores_value() {
        let f = filter(
            "name",
            FilterOperator::IsNull,
            FilterValue::Text("ignored".into()),
            FilterVariant::Text,
        );
        let sql =
            compile_where_clause(&[f], JoinOperator::And, InvalidFilterMode::Reject).unwrap();
        assert_eq!(sql, "\"name\" IS NULL");
    }

    #[test]
    fn date_eq_expands_to_day_range() {
        let f = filter(
            "created",
            FilterOperator::Eq,
            FilterValue::Number(1_700_000_000_000.0),
            FilterVariant::Date,
        );
        let sql =
            compile_where_clause(&[f], JoinOperator::And, InvalidFilterMode::Reject).unwrap();
        assert!(sql.starts_with("(\"created\" >= '"), "got {sql}");
        assert!(sql.contains("' AND \"created\" <= '"), "got {sql}");
        assert!(sql.ends_with("')"), "got {sql}");
    }

    #[test]
    fn date_between_uses_day_bounds_of_each_end() {
        let day_ms = 86_400_000.0;
        let f = filter(
            "created",
            FilterOperator::Between,
            FilterValue::List(vec![
                FilterValue::Number(1_700_000_000_000.0),
                FilterValue::Number(1_700_000_000_000.0 + 5.0 * day_ms),
            ]),
            FilterVariant::DateRange,
        );
        let sql =
            compile_where_clause(&[f], JoinOperator::And, InvalidFilterMode::Reject).unwrap();
        assert!(sql.starts_with("\"created\" BETWEEN '"), "got {sql}");
        // end bound lands on an end-of-day instant
        assert!(sql.contains(":59.999"), "got {sql}");
    }

    #[test]
    fn not_ilike_negates() {
        let f = filter(
            "name",
            FilterOperator::NotIlike,
            FilterValue::Text("bot".into()),
            FilterVariant::Text,
        );
        let sql =
            compile_where_clause(&[f], JoinOperator::And, InvalidFilterMode::Reject).unwrap();
        assert_eq!(sql, "\"name\" NOT ILIKE '%bot%'");
    }

    #[test]
    fn map_operator_vocabulary() {
        assert_eq!(map_operator("iLike"), FilterOperator::Ilike);
        assert_eq!(map_operator("notILike"), FilterOperator::NotIlike);
        assert_eq!(map_operator("inArray"), FilterOperator::In);
        assert_eq!(map_operator("notInArray"), FilterOperator::NotIn);
        assert_eq!(map_operator("isBetween"), FilterOperator::Between);
        assert_eq!(map_operator("isEmpty"), FilterOperator::IsNull);
        assert_eq!(map_operator("isNotEmpty"), FilterOperator::IsNotNull);
        assert_eq!(map_operator("fuzzy"), FilterOperator::Ilike);
    }

    #[test]
    fn descriptor_wire_shape_is_camel_case() {
        let json = r#"{
            "columnId": "age",
            "operator": "between",
            "value": [18, 65],
            "variant": "number"
        }"#;
        let f: FilterDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(f.column_id, "age");
        assert_eq!(f.operator, FilterOperator::Between);
        assert_eq!(f.variant, FilterVariant::Number);
        assert_eq!(
            f.value,
            FilterValue::List(vec![FilterValue::Number(18.0), FilterValue::Number(65.0)])
        );
        let sql = compile_where_clause(
            std::slice::from_ref(&f),
            JoinOperator::And,
            InvalidFilterMode::Reject,
        )
        .unwrap();
        assert_eq!(sql, "\"age\" BETWEEN 18 AND 65");

        let op: FilterOperator = serde_json::from_str("\"isNotNull\"").unwrap();
        assert_eq!(op, FilterOperator::IsNotNull);
        let variant: FilterVariant = serde_json::from_str("\"dateRange\"").unwrap();
        assert_eq!(variant, FilterVariant::DateRange);
    }

    #[test]
    fn boolean_eq() {
        let f = filter(
            "active",
            FilterOperator::Eq,
            FilterValue::Bool(true),
            FilterVariant::Boolean,
        );
        let sql =
            compile_where_clause(&[f], JoinOperator::And, InvalidFilterMode::Reject).unwrap();
        assert_eq!(sql, "\"active\" = TRUE");
    }
}
