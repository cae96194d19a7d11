//! Materializes watermarked rows back out to a fresh Parquet file, using
//! the `parquet` crate's typed column-writer API directly (no arrow): one
//! column at a time, built from the schema recorded in the table manifest.

use std::collections::HashMap;
use std::sync::Arc;

use mktplace_common::error::{Error, Result};
use mktplace_common::value::AnchorValue;
use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;

use crate::schema::{Column, ColumnType, TableSchema};

fn message_type(schema: &TableSchema) -> String {
    let mut fields = Vec::with_capacity(schema.columns.len());
    for col in &schema.columns {
        let repetition = if col.nullable { "optional" } else { "required" };
        let field = match col.column_type {
            ColumnType::Integer => format!("{repetition} int64 {}", col.name),
            ColumnType::Float => format!("{repetition} double {}", col.name),
            ColumnType::Boolean => format!("{repetition} boolean {}", col.name),
            ColumnType::TimestampNtz => {
                format!("{repetition} int64 {} (TIMESTAMP_MICROS)", col.name)
            }
            ColumnType::String => format!("{repetition} binary {} (UTF8)", col.name),
        };
        fields.push(field);
    }
    format!("message watermarked_table {{ {} }}", fields.join("; ") + ";")
}

/// Write `rows` to an in-memory Parquet file, following `schema`'s column
/// order.
///
/// # Errors
///
/// Returns [`Error::TransientObjectStore`] if the schema cannot be turned
/// into a Parquet message type or the writer otherwise fails.
pub fn materialize(schema: &TableSchema, rows: &[HashMap<String, AnchorValue>]) -> Result<Vec<u8>> {
    let message_type_str = message_type(schema);
    let parquet_schema = Arc::new(
        parse_message_type(&message_type_str)
            .map_err(|e| Error::TransientObjectStore(format!("invalid parquet schema: {e}")))?,
    );
    let props = Arc::new(WriterProperties::builder().build());

    let mut buffer = Vec::new();
    {
        let mut writer = SerializedFileWriter::new(&mut buffer, parquet_schema, props)
            .map_err(|e| Error::TransientObjectStore(format!("failed to open parquet writer: {e}")))?;
        let mut row_group_writer = writer
            .next_row_group()
            .map_err(|e| Error::TransientObjectStore(format!("failed to start row group: {e}")))?;

        for col in &schema.columns {
            let mut column_writer = row_group_writer
                .next_column()
                .map_err(|e| Error::TransientObjectStore(format!("failed to start column: {e}")))?
                .ok_or_else(|| Error::TransientObjectStore("schema/row-group column mismatch".to_string()))?;
            write_column_dyn(&mut column_writer, col, rows)?;
            column_writer
                .close()
                .map_err(|e| Error::TransientObjectStore(format!("failed to close column: {e}")))?;
        }

        row_group_writer
            .close()
            .map_err(|e| Error::TransientObjectStore(format!("failed to close row group: {e}")))?;
        writer
            .close()
            .map_err(|e| Error::TransientObjectStore(format!("failed to close parquet writer: {e}")))?;
    }

    Ok(buffer)
}

fn write_column_dyn(column_writer: &mut ColumnWriter<'_>, col: &Column, rows: &[HashMap<String, AnchorValue>]) -> Result<()> {
    let def_levels: Vec<i16> = rows
        .iter()
        .map(|r| i16::from(!matches!(r.get(&col.name), None | Some(AnchorValue::Null))))
        .collect();

    match (column_writer, col.column_type) {
        (ColumnWriter::Int64ColumnWriter(w), ColumnType::Integer) => {
            let values: Vec<i64> = rows
                .iter()
                .filter_map(|r| match r.get(&col.name) {
                    Some(AnchorValue::Int(i)) => Some(*i),
                    _ => None,
                })
                .collect();
            w.write_batch(&values, Some(&def_levels), None)
                .map_err(|e| Error::TransientObjectStore(format!("failed to write int64 column: {e}")))?;
        }
        (ColumnWriter::Int64ColumnWriter(w), ColumnType::TimestampNtz) => {
            let values: Vec<i64> = rows
                .iter()
                .filter_map(|r| match r.get(&col.name) {
                    Some(AnchorValue::DateTime(dt)) => Some(dt.timestamp_micros()),
                    _ => None,
                })
                .collect();
            w.write_batch(&values, Some(&def_levels), None)
                .map_err(|e| Error::TransientObjectStore(format!("failed to write timestamp column: {e}")))?;
        }
        (ColumnWriter::DoubleColumnWriter(w), ColumnType::Float) => {
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|r| match r.get(&col.name) {
                    Some(AnchorValue::Float(f)) => Some(*f),
                    Some(AnchorValue::Int(i)) => Some(*i as f64),
                    _ => None,
                })
                .collect();
            w.write_batch(&values, Some(&def_levels), None)
                .map_err(|e| Error::TransientObjectStore(format!("failed to write double column: {e}")))?;
        }
        (ColumnWriter::BoolColumnWriter(w), ColumnType::Boolean) => {
            let values: Vec<bool> = rows
                .iter()
                .filter_map(|r| match r.get(&col.name) {
                    Some(AnchorValue::Bool(b)) => Some(*b),
                    _ => None,
                })
                .collect();
            w.write_batch(&values, Some(&def_levels), None)
                .map_err(|e| Error::TransientObjectStore(format!("failed to write bool column: {e}")))?;
        }
        (ColumnWriter::ByteArrayColumnWriter(w), ColumnType::String) => {
            let values: Vec<ByteArray> = rows
                .iter()
                .filter_map(|r| match r.get(&col.name) {
                    Some(AnchorValue::Str(s)) => Some(ByteArray::from(s.as_bytes().to_vec())),
                    _ => None,
                })
                .collect();
            w.write_batch(&values, Some(&def_levels), None)
                .map_err(|e| Error::TransientObjectStore(format!("failed to write string column: {e}")))?;
        }
        (_, column_type) => {
            return Err(Error::SchemaMismatch(format!(
                "column '{}' declared as {column_type:?} does not match its physical parquet writer type",
                col.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_rewrites_timestamp_ntz_annotation() {
        let schema = TableSchema {
            columns: vec![Column {
                name: "event_time".to_string(),
                column_type: ColumnType::TimestampNtz,
                nullable: true,
            }],
        };
        let rendered = message_type(&schema);
        assert!(rendered.contains("TIMESTAMP_MICROS"));
    }
}
