//! Analytics snapshot retention

use crate::error::{Error, Result};
use crate::traits::RecordStore;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

/// Delete snapshots captured before `now - retention`
///
/// Returns the number of snapshots removed. A window reaching past the
/// earliest representable time is a configuration error.
pub async fn purge_expired(
    store: &dyn RecordStore,
    retention: Duration,
    now: DateTime<Utc>,
) -> Result<usize> {
    let Some(cutoff) = now.checked_sub_signed(retention) else {
        return Err(Error::config(format!(
            "Analytics retention of {} day(s) is out of range",
            retention.num_days()
        )));
    };
    let purged = store.purge_snapshots_before(cutoff).await?;

    if purged > 0 {
        info!(cutoff = %cutoff, "Purged {} expired analytics snapshot(s)", purged);
    } else {
        debug!(cutoff = %cutoff, "No expired analytics snapshots");
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::model::{AnalyticsSnapshot, DomainId};
    use crate::store::MemoryRecordStore;

    #[tokio::test]
    async fn keeps_snapshots_inside_window() {
        let store = MemoryRecordStore::new();
        let now = Utc::now();

        for age in [1, 29, 31, 90] {
            store
                .save_snapshot(&AnalyticsSnapshot::new(DomainId(1), now - Duration::days(age)))
                .await
                .unwrap();
        }

        let purged = purge_expired(&store, Duration::days(30), now).await.unwrap();
        assert_eq!(purged, 2);

        let left = store.snapshots_for_domain(DomainId(1)).await.unwrap();
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|s| now - s.captured_at < Duration::days(30)));

        // A second run finds nothing new
        assert_eq!(purge_expired(&store, Duration::days(30), now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn out_of_range_window_is_an_error() {
        let store = MemoryRecordStore::new();
        let now = Utc::now();
        store
            .save_snapshot(&AnalyticsSnapshot::new(DomainId(1), now - Duration::days(400)))
            .await
            .unwrap();

        let retention = AnalyticsConfig {
            retention_days: 200_000_000,
            ..AnalyticsConfig::default()
        }
        .retention()
        .unwrap();

        let err = purge_expired(&store, retention, now).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(store.snapshots_for_domain(DomainId(1)).await.unwrap().len(), 1);
    }
}
