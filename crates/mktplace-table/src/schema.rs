//! Table schema: the small set of logical column types this data plane
//! understands, plus the Delta-style JSON rendering §4.7 requires in the
//! `metaData` protocol line.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Logical column type. `TimestampNtz` is the one the watermarker targets;
/// everything else passes through untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    TimestampNtz,
    String,
}

impl ColumnType {
    /// Delta's primitive type name for this column, as it would appear in
    /// a `schemaString`. `TimestampNtz` is rewritten to `string` for reader
    /// compatibility, per §4.7.
    #[must_use]
    pub const fn delta_type_name(self) -> &'static str {
        match self {
            Self::Integer => "long",
            Self::Float => "double",
            Self::Boolean => "boolean",
            Self::TimestampNtz => "string",
            Self::String => "string",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub nullable: bool,
}

/// A table's full schema, as recorded in `_manifest.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<Column>,
}

impl TableSchema {
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    #[must_use]
    pub fn timestamp_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.column_type == ColumnType::TimestampNtz)
            .map(|c| c.name.clone())
            .collect()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Delta-style `schemaString`, filtered to `delivered_columns` and with
    /// `timestamp_ntz` fields rewritten to `string`, per §4.7.
    #[must_use]
    pub fn delta_schema_string(&self, delivered_columns: &[String]) -> String {
        let fields: Vec<_> = self
            .columns
            .iter()
            .filter(|c| delivered_columns.iter().any(|d| d == &c.name))
            .map(|c| {
                json!({
                    "name": c.name,
                    "type": c.column_type.delta_type_name(),
                    "nullable": c.nullable,
                    "metadata": {},
                })
            })
            .collect();
        let schema = json!({ "type": "struct", "fields": fields });
        schema.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_ntz_is_rewritten_to_string_in_delta_schema() {
        let schema = TableSchema {
            columns: vec![Column {
                name: "event_time".to_string(),
                column_type: ColumnType::TimestampNtz,
                nullable: false,
            }],
        };
        let rendered = schema.delta_schema_string(&["event_time".to_string()]);
        assert!(rendered.contains("\"type\":\"string\""));
    }

    #[test]
    fn delta_schema_is_filtered_to_delivered_columns() {
        let schema = TableSchema {
            columns: vec![
                Column { name: "id".to_string(), column_type: ColumnType::Integer, nullable: false },
                Column { name: "secret".to_string(), column_type: ColumnType::String, nullable: true },
            ],
        };
        let rendered = schema.delta_schema_string(&["id".to_string()]);
        assert!(rendered.contains("\"id\""));
        assert!(!rendered.contains("\"secret\""));
    }
}
