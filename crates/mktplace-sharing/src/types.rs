//! Delta Sharing REST API JSON types.
//!
//! Follows the Delta Sharing Protocol spec:
//! <https://github.com/delta-io/delta-sharing/blob/main/PROTOCOL.md>

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---- Shares / schemas / tables (single-tenant: one authenticated share) ----

#[derive(Debug, Serialize)]
pub struct ShareItem {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ListSharesResponse {
    pub items: Vec<ShareItem>,
    #[serde(rename = "nextPageToken", skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SchemaItem {
    pub name: String,
    pub share: String,
}

#[derive(Debug, Serialize)]
pub struct ListSchemasResponse {
    pub items: Vec<SchemaItem>,
    #[serde(rename = "nextPageToken", skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TableItem {
    pub name: String,
    pub schema: String,
    pub share: String,
}

#[derive(Debug, Serialize)]
pub struct ListTablesResponse {
    pub items: Vec<TableItem>,
    #[serde(rename = "nextPageToken", skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

// ---- Table metadata (NDJSON lines) ----

#[derive(Debug, Serialize)]
pub struct ProtocolLine {
    pub protocol: Protocol,
}

#[derive(Debug, Serialize)]
pub struct Protocol {
    #[serde(rename = "minReaderVersion")]
    pub min_reader_version: i32,
}

#[derive(Debug, Serialize)]
pub struct MetadataLine {
    #[serde(rename = "metaData")]
    pub meta_data: TableMetadata,
}

#[derive(Debug, Serialize)]
pub struct TableMetadata {
    pub id: String,
    pub format: Format,
    #[serde(rename = "schemaString")]
    pub schema_string: String,
    #[serde(rename = "partitionColumns")]
    pub partition_columns: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Format {
    pub provider: String,
}

// ---- Query response (presigned file URLs) ----

#[derive(Debug, Serialize)]
pub struct FileLine {
    pub file: FileEntry,
}

#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub url: String,
    pub id: String,
    #[serde(rename = "partitionValues")]
    pub partition_values: HashMap<String, String>,
    pub size: i64,
    pub version: i64,
}

// ---- Query request ----

#[derive(Debug, Default, Deserialize)]
pub struct QueryTableRequest {
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default, rename = "limitHint")]
    pub limit_hint: Option<i64>,
    #[serde(default, rename = "predicateHints")]
    pub predicate_hints: Vec<String>,
    #[serde(default, rename = "jsonPredicateHints")]
    pub json_predicate_hints: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
