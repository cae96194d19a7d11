//! Attribution path: given a table suspected of having leaked, recompute
//! the expected watermark for a candidate `(buyer, share)` key and see how
//! often it actually shows up.

use std::collections::HashMap;

use chrono::Timelike;
use mktplace_common::value::AnchorValue;

use crate::anchor::compute_row_anchor;
use crate::embed::TRIAL_WATERMARK_COLUMN;
use crate::key::WatermarkKey;

/// Minimum number of matches required before a channel can declare a match,
/// regardless of sample size or rate — guards against a 3-row table making
/// a 100% "match" meaningless.
const MIN_MATCHES: usize = 3;
/// Tolerance, in microseconds, for the timestamp channel's wrap-aware
/// comparison.
const MICROS_TOLERANCE: i64 = 1000;

const WATERMARK_ID_MATCH_RATE_THRESHOLD: f64 = 0.50;
const TIMESTAMP_MATCH_RATE_THRESHOLD: f64 = 0.15;

/// Per-channel verification statistics.
#[derive(Clone, Debug)]
pub struct ChannelStats {
    pub channel: String,
    pub sample_size: usize,
    pub matches: usize,
    pub match_rate: f64,
    pub declared_match: bool,
}

/// Result of running the verifier over a candidate table.
#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub found: bool,
    pub channels: Vec<ChannelStats>,
}

/// Minimum sample size required before a channel's rate is trusted:
/// `min(20, max(5, rows/4))`.
#[must_use]
pub fn required_sample_size(total_rows: usize) -> usize {
    20.min(5.max(total_rows / 4))
}

/// Recomputes the expected watermark for `(buyer_id, share_id)` and scores
/// how often it actually appears in `rows`.
///
/// `timestamp_columns` names the columns to check on the timestamp channel;
/// the `_watermark_id` channel is scored automatically when present.
#[must_use]
pub fn verify(
    rows: &[HashMap<String, AnchorValue>],
    secret: &[u8],
    buyer_id: i64,
    share_id: i64,
    anchor_columns: &[String],
    timestamp_columns: &[String],
) -> VerificationResult {
    let key = WatermarkKey::derive(secret, buyer_id, share_id);
    let min_sample = required_sample_size(rows.len());

    let mut channels = Vec::new();

    if let Some(stats) = score_watermark_id_channel(rows, anchor_columns, &key, min_sample) {
        channels.push(stats);
    }
    for col in timestamp_columns {
        if let Some(stats) = score_timestamp_channel(rows, anchor_columns, col, &key, min_sample) {
            channels.push(stats);
        }
    }

    let found = channels.iter().any(|c| c.declared_match);
    VerificationResult { found, channels }
}

fn score_watermark_id_channel(
    rows: &[HashMap<String, AnchorValue>],
    anchor_columns: &[String],
    key: &WatermarkKey,
    min_sample: usize,
) -> Option<ChannelStats> {
    let mut sample = 0usize;
    let mut matches = 0usize;

    for row in rows {
        let Some(AnchorValue::Int(observed)) = row.get(TRIAL_WATERMARK_COLUMN) else {
            continue;
        };
        sample += 1;
        let anchor = compute_row_anchor(row, anchor_columns);
        let expected = key.watermark_id(anchor);
        if *observed == expected {
            matches += 1;
        }
    }

    if sample == 0 {
        return None;
    }
    Some(finalize(
        "_watermark_id",
        sample,
        matches,
        min_sample,
        WATERMARK_ID_MATCH_RATE_THRESHOLD,
    ))
}

fn score_timestamp_channel(
    rows: &[HashMap<String, AnchorValue>],
    anchor_columns: &[String],
    column: &str,
    key: &WatermarkKey,
    min_sample: usize,
) -> Option<ChannelStats> {
    let mut sample = 0usize;
    let mut matches = 0usize;

    for row in rows {
        let Some(AnchorValue::DateTime(ts)) = row.get(column) else {
            continue;
        };
        sample += 1;
        let anchor = compute_row_anchor(row, anchor_columns);
        let expected = i64::from(key.target_micros(anchor));
        let actual = i64::from(ts.nanosecond() / 1000 % 1_000_000);

        let delta = (actual - expected).abs();
        let wrapped_delta = (actual - expected - 1_000_000).abs();
        if delta < MICROS_TOLERANCE || wrapped_delta < MICROS_TOLERANCE {
            matches += 1;
        }
    }

    if sample == 0 {
        return None;
    }
    Some(finalize(
        column,
        sample,
        matches,
        min_sample,
        TIMESTAMP_MATCH_RATE_THRESHOLD,
    ))
}

fn finalize(
    channel: &str,
    sample: usize,
    matches: usize,
    min_sample: usize,
    rate_threshold: f64,
) -> ChannelStats {
    #[allow(clippy::cast_precision_loss)]
    let match_rate = matches as f64 / sample as f64;
    let declared_match =
        sample >= min_sample && matches >= MIN_MATCHES && match_rate >= rate_threshold;
    ChannelStats {
        channel: channel.to_string(),
        sample_size: sample,
        matches,
        match_rate,
        declared_match,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::Watermarker;
    use chrono::{TimeZone, Utc};

    fn make_rows(key: WatermarkKey, count: i64, is_trial: bool) -> Vec<HashMap<String, AnchorValue>> {
        let watermarker = Watermarker::new(key);
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..count)
            .map(|i| {
                let mut row = HashMap::new();
                row.insert("id".to_string(), AnchorValue::Int(i));
                row.insert("event_time".to_string(), AnchorValue::DateTime(base));
                watermarker.embed_row(
                    &mut row,
                    &["id".to_string()],
                    &["event_time".to_string()],
                    is_trial,
                );
                row
            })
            .collect()
    }

    #[test]
    fn verifier_finds_the_correct_key() {
        let key = WatermarkKey::derive(b"secret", 1, 2);
        let rows = make_rows(key, 40, true);

        let result = verify(&rows, b"secret", 1, 2, &["id".to_string()], &["event_time".to_string()]);
        assert!(result.found);
    }

    #[test]
    fn verifier_rejects_the_wrong_key() {
        let key = WatermarkKey::derive(b"secret", 1, 2);
        let rows = make_rows(key, 40, true);

        let result = verify(&rows, b"secret", 9, 9, &["id".to_string()], &["event_time".to_string()]);
        assert!(!result.found);
    }

    #[test]
    fn required_sample_size_follows_the_formula() {
        assert_eq!(required_sample_size(4), 5);
        assert_eq!(required_sample_size(40), 10);
        assert_eq!(required_sample_size(1000), 20);
    }
}
