use crate::probe::{
    is_boolean_type, is_geometry_type, is_numeric_type, is_temporal_type, ColumnMetadata,
    ColumnSchema,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which filter control a column gets in the grid toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnVariant {
    Text,
    Number,
    Boolean,
    DateRange,
    MultiSelect,
    Range,
}

/// How the cell value should be rendered. Rendering itself lives in the
/// presentation collaborator; the model only carries the hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplayHint {
    Value,
    BooleanBadge,
    Date,
    /// Geometry blobs render as an opaque placeholder badge, never raw bytes.
    GeometryBadge,
    TruncatedJson,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnModel {
    pub id: String,
    pub label: String,
    pub variant: ColumnVariant,
    pub display: DisplayHint,
    pub sortable: bool,
    pub hideable: bool,
    pub filterable: bool,
    pub options: Vec<SelectOption>,
    pub range: Option<(f64, f64)>,
    pub placeholder: String,
}

/// Reserved id of the prepended selection column.
pub const SELECT_COLUMN_ID: &str = "select";

/// Derives the grid's column models from schema plus sampled metadata.
/// Pure: identical inputs always produce identical output.
pub fn generate_column_models(
    schema: &[ColumnSchema],
    metadata: &HashMap<String, ColumnMetadata>,
    enable_selection: bool,
) -> Vec<ColumnModel> {
    let mut models = Vec::with_capacity(schema.len() + 1);
    if enable_selection {
        models.push(selection_column());
    }
    for col in schema {
        let meta = metadata.get(&col.name);
        let variant = derive_variant(&col.physical_type, meta);
        let options = match (variant, meta) {
            (ColumnVariant::MultiSelect, Some(m)) => m
                .unique_values
                .iter()
                .flatten()
                .map(|v| SelectOption {
                    label: v.clone(),
                    value: v.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };
        let range = match (variant, meta) {
            (ColumnVariant::Range, Some(m)) => m.min_value.zip(m.max_value),
            _ => None,
        };
        models.push(ColumnModel {
            id: col.name.clone(),
            label: col.name.clone(),
            variant,
            display: derive_display(&col.physical_type),
            sortable: true,
            hideable: true,
            filterable: true,
            options,
            range,
            placeholder: format!("Search {}...", col.name),
        });
    }
    models
}

fn selection_column() -> ColumnModel {
    ColumnModel {
        id: SELECT_COLUMN_ID.into(),
        label: String::new(),
        variant: ColumnVariant::Boolean,
        display: DisplayHint::Value,
        sortable: false,
        hideable: false,
        filterable: false,
        options: Vec::new(),
        range: None,
        placeholder: String::new(),
    }
}

fn derive_variant(physical_type: &str, meta: Option<&ColumnMetadata>) -> ColumnVariant {
    if is_boolean_type(physical_type) {
        return ColumnVariant::Boolean;
    }
    if is_temporal_type(physical_type) {
        return ColumnVariant::DateRange;
    }
    if is_numeric_type(physical_type) {
        let bounded = meta
            .map(|m| m.min_value.is_some() && m.max_value.is_some())
            .unwrap_or(false);
        return if bounded {
            ColumnVariant::Range
        } else {
            ColumnVariant::Number
        };
    }
    if let Some(values) = meta.and_then(|m| m.unique_values.as_ref()) {
        if !values.is_empty() {
            return ColumnVariant::MultiSelect;
        }
    }
    ColumnVariant::Text
}

fn derive_display(physical_type: &str) -> DisplayHint {
    if is_geometry_type(physical_type) {
        DisplayHint::GeometryBadge
    } else if is_boolean_type(physical_type) {
        DisplayHint::BooleanBadge
    } else if is_temporal_type(physical_type) {
        DisplayHint::Date
    } else if physical_type.to_lowercase().contains("struct")
        || physical_type.to_lowercase().contains("list")
        || physical_type.to_lowercase().contains("map")
    {
        DisplayHint::TruncatedJson
    } else {
        DisplayHint::Value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, ty: &str) -> ColumnSchema {
        ColumnSchema {
            name: name.into(),
            physical_type: ty.into(),
            nullable: true,
            key: None,
            default_value: None,
        }
    }

    fn meta_range(min: f64, max: f64) -> ColumnMetadata {
        ColumnMetadata {
            unique_values: None,
            min_value: Some(min),
            max_value: Some(max),
        }
    }

    #[test]
    fn variant_derivation_covers_the_matrix() {
        let mut metadata = HashMap::new();
        metadata.insert("score".to_string(), meta_range(0.0, 100.0));
        metadata.insert(
            "state".to_string(),
            ColumnMetadata {
                unique_values: Some(vec!["UT".into(), "NV".into()]),
                ..Default::default()
            },
        );
        let schema = vec![
            col("active", "BOOLEAN"),
            col("created", "TIMESTAMP"),
            col("score", "DOUBLE"),
            col("count", "BIGINT"),
            col("state", "VARCHAR"),
            col("notes", "VARCHAR"),
        ];
        let models = generate_column_models(&schema, &metadata, false);
        let variant =
            |id: &str| models.iter().find(|m| m.id == id).map(|m| m.variant).unwrap();
        assert_eq!(variant("active"), ColumnVariant::Boolean);
        assert_eq!(variant("created"), ColumnVariant::DateRange);
        assert_eq!(variant("score"), ColumnVariant::Range);
        assert_eq!(variant("count"), ColumnVariant::Number);
        assert_eq!(variant("state"), ColumnVariant::MultiSelect);
        assert_eq!(variant("notes"), ColumnVariant::Text);
    }

    #[test]
    fn selection_column_is_prepended_and_inert() {
        let schema = vec![col("id", "BIGINT")];
        let models = generate_column_models(&schema, &HashMap::new(), true);
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id, SELECT_COLUMN_ID);
        assert!(!models[0].sortable);
        assert!(!models[0].hideable);
        assert!(!models[0].filterable);
    }

    #[test]
    fn filter_config_is_attached() {
        let mut metadata = HashMap::new();
        metadata.insert("score".to_string(), meta_range(1.5, 9.5));
        metadata.insert(
            "state".to_string(),
            ColumnMetadata {
                unique_values: Some(vec!["UT".into()]),
                ..Default::default()
            },
        );
        let schema = vec![col("score", "FLOAT"), col("state", "VARCHAR")];
        let models = generate_column_models(&schema, &metadata, false);
        assert_eq!(models[0].range, Some((1.5, 9.5)));
        assert_eq!(models[1].options.len(), 1);
        assert_eq!(models[1].options[0].value, "UT");
        assert_eq!(models[0].placeholder, "Search score...");
    }

    #[test]
    fn geometry_gets_a_badge_hint() {
        let schema = vec![col("geom", "GEOMETRY")];
        let models = generate_column_models(&schema, &HashMap::new(), false);
        assert_eq!(models[0].display, DisplayHint::GeometryBadge);
    }

    #[test]
    fn generation_is_deterministic() {
        let mut metadata = HashMap::new();
        metadata.insert("a".to_string(), meta_range(0.0, 1.0));
        let schema = vec![col("a", "INT"), col("b", "VARCHAR")];
        let first = generate_column_models(&schema, &metadata, true);
        let second = generate_column_models(&schema, &metadata, true);
        assert_eq!(first, second);
    }
}
