//! Per-row watermark embedding for full-access and trial shares.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Timelike, Utc};
use mktplace_common::value::AnchorValue;

use crate::anchor::compute_row_anchor;
use crate::key::WatermarkKey;

/// Column name injected into trial-share rows, per §4.5.
pub const TRIAL_WATERMARK_COLUMN: &str = "_watermark_id";

/// Embeds a deterministic, buyer-specific mark into query results.
///
/// Running this twice on the same input row and `(buyer, share)` key
/// produces byte-identical output — the embedding is a pure function of the
/// row's anchor-column values and the derived key, nothing else.
#[derive(Clone, Copy, Debug)]
pub struct Watermarker {
    key: WatermarkKey,
}

impl Watermarker {
    #[must_use]
    pub const fn new(key: WatermarkKey) -> Self {
        Self { key }
    }

    /// Watermark one row in place.
    ///
    /// `timestamp_columns` must be discovered from the table schema, not
    /// guessed from column names — every timestamp-typed column in the
    /// projection gets its sub-second component rewritten. `is_trial` also
    /// injects [`TRIAL_WATERMARK_COLUMN`].
    pub fn embed_row(
        &self,
        row: &mut HashMap<String, AnchorValue>,
        anchor_columns: &[String],
        timestamp_columns: &[String],
        is_trial: bool,
    ) {
        let anchor = compute_row_anchor(row, anchor_columns);

        for col in timestamp_columns {
            if let Some(AnchorValue::DateTime(ts)) = row.get(col) {
                let embedded = embed_in_timestamp(*ts, anchor, &self.key);
                row.insert(col.clone(), AnchorValue::DateTime(embedded));
            }
        }

        if is_trial {
            row.insert(
                TRIAL_WATERMARK_COLUMN.to_string(),
                AnchorValue::Int(self.key.watermark_id(anchor)),
            );
        }
    }
}

fn embed_in_timestamp(ts: DateTime<Utc>, anchor: u64, key: &WatermarkKey) -> DateTime<Utc> {
    let target_micros = key.target_micros(anchor);
    let floored = ts
        .with_nanosecond(0)
        .expect("zeroing nanoseconds never overflows a valid DateTime");
    floored + Duration::microseconds(i64::from(target_micros))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row_of(pairs: &[(&str, AnchorValue)]) -> HashMap<String, AnchorValue> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn embedding_is_idempotent_and_deterministic() {
        let key = WatermarkKey::derive(b"secret", 1, 2);
        let watermarker = Watermarker::new(key);
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let anchor_cols = vec!["id".to_string()];
        let ts_cols = vec!["event_time".to_string()];

        let mut row1 = row_of(&[("id", AnchorValue::Int(1)), ("event_time", AnchorValue::DateTime(ts))]);
        let mut row2 = row1.clone();

        watermarker.embed_row(&mut row1, &anchor_cols, &ts_cols, false);
        watermarker.embed_row(&mut row2, &anchor_cols, &ts_cols, false);

        assert_eq!(row1, row2);
    }

    #[test]
    fn trial_rows_get_a_watermark_id_column() {
        let key = WatermarkKey::derive(b"secret", 1, 2);
        let watermarker = Watermarker::new(key);
        let mut row = row_of(&[("id", AnchorValue::Int(5))]);
        watermarker.embed_row(&mut row, &["id".to_string()], &[], true);
        assert!(row.contains_key(TRIAL_WATERMARK_COLUMN));
    }

    #[test]
    fn full_access_rows_do_not_get_a_watermark_id_column() {
        let key = WatermarkKey::derive(b"secret", 1, 2);
        let watermarker = Watermarker::new(key);
        let mut row = row_of(&[("id", AnchorValue::Int(5))]);
        watermarker.embed_row(&mut row, &["id".to_string()], &[], false);
        assert!(!row.contains_key(TRIAL_WATERMARK_COLUMN));
    }
}
