//! Garbage collection for materialized watermark files.
//!
//! Each query materializes a fresh `_watermarked_{share_id}_{8 hex}.parquet`
//! object so two buyers never see the same bytes (that's what makes the
//! per-query watermark traceable back to one purchase). Nothing deletes
//! those objects on the happy path, so an hourly sweep reclaims ones past
//! their useful life: the presigned URL handed back to the caller expires
//! long before an hour is up, so anything that old is unreachable anyway.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::client::ObjectStoreClient;

const WATERMARKED_PREFIX: &str = "_watermarked_";
const MAX_AGE: Duration = Duration::hours(1);

/// Delete watermarked materializations older than one hour.
///
/// Returns the number of objects deleted. Errors listing or deleting
/// individual objects are logged and skipped rather than aborting the
/// whole sweep — a stuck object should not block reclaiming the rest.
pub async fn sweep_watermarked_older_than_one_hour(store: &ObjectStoreClient) -> usize {
    let entries = match store.list(WATERMARKED_PREFIX).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "gc sweep: failed to list watermarked objects");
            return 0;
        }
    };

    let cutoff = Utc::now() - MAX_AGE;
    let mut deleted = 0usize;
    for entry in entries {
        if entry.last_modified > cutoff {
            continue;
        }
        match store.delete(&entry.key).await {
            Ok(()) => {
                deleted += 1;
                info!(key = %entry.key, age_secs = (Utc::now() - entry.last_modified).num_seconds(), "gc: deleted stale watermarked object");
            }
            Err(e) => warn!(key = %entry.key, error = %e, "gc sweep: failed to delete object"),
        }
    }
    deleted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_is_one_hour_before_now() {
        let cutoff = Utc::now() - MAX_AGE;
        assert!(cutoff < Utc::now());
        assert!((Utc::now() - cutoff - MAX_AGE).num_seconds().abs() < 2);
    }
}
