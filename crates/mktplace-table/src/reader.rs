//! Row-based Parquet scanning — no arrow, just the `parquet` crate's
//! `Row`/`RowIter` API, converted to the workspace's tagged value type.

use std::collections::HashMap;

use bytes::Bytes;
use mktplace_common::error::{Error, Result};
use mktplace_common::value::AnchorValue;
use mktplace_predicate::CompiledFilter;
use parquet::file::reader::{FileReader, SerializedFileReader};

/// Maximum total row-group size accepted from one file, guarding against an
/// unexpectedly huge upstream object.
const MAX_ROW_GROUP_BYTES: i64 = 1024 * 1024 * 1024;

/// Scan one Parquet file's bytes into rows, applying `filter` (the full
/// conjunction, including any predicates on columns outside the buyer's
/// requested projection) before the row count is capped by `limit`.
///
/// Returns every column present in the file — callers are responsible for
/// stripping non-requested, non-anchor columns from the final projection
/// after watermarking (the watermarker and verifier both need the anchor
/// columns present regardless of what the buyer asked to see).
///
/// # Errors
///
/// Returns [`Error::TransientObjectStore`] if the bytes are not a valid
/// Parquet file, or a row group exceeds the configured size guard.
pub fn scan(
    bytes: Bytes,
    filter: Option<&CompiledFilter>,
    limit: Option<u64>,
) -> Result<Vec<HashMap<String, AnchorValue>>> {
    let reader = SerializedFileReader::new(bytes)
        .map_err(|e| Error::TransientObjectStore(format!("failed to open parquet file: {e}")))?;

    for rg in reader.metadata().row_groups() {
        if rg.total_byte_size() > MAX_ROW_GROUP_BYTES {
            return Err(Error::TransientObjectStore("row group exceeds size guard".to_string()));
        }
    }

    let mut rows = Vec::new();
    for record in reader.get_row_iter(None).map_err(|e| {
        Error::TransientObjectStore(format!("failed to start parquet row iterator: {e}"))
    })? {
        let record = record
            .map_err(|e| Error::TransientObjectStore(format!("failed to decode parquet row: {e}")))?;
        let json = record.to_json_value();
        let row = json_object_to_row(&json);

        if filter.is_some_and(|f| !f.matches(&row)) {
            continue;
        }

        rows.push(row);
        if limit.is_some_and(|n| rows.len() as u64 >= n) {
            break;
        }
    }

    Ok(rows)
}

fn json_object_to_row(value: &serde_json::Value) -> HashMap<String, AnchorValue> {
    value
        .as_object()
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| (k.clone(), AnchorValue::from_json(v)))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_to_row_converts_scalars() {
        let value = serde_json::json!({"id": 1, "name": "a", "active": true, "note": null});
        let row = json_object_to_row(&value);
        assert_eq!(row.get("id"), Some(&AnchorValue::Int(1)));
        assert_eq!(row.get("active"), Some(&AnchorValue::Bool(true)));
        assert_eq!(row.get("note"), Some(&AnchorValue::Null));
    }
}
