// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// A fast store that does not survive restarts. Used by the test suites,
// by embedders that own persistence themselves, and by the daemon when
// `ZONESYNC_STORE_TYPE=memory`.
//
// ## Crash Behavior
//
// - All domains, credentials and records are lost on restart
// - Remote ids are forgotten, so the next update of a record goes through
//   identity recovery (list, then adopt) instead of creating a duplicate

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{
    AnalyticsSnapshot, Credential, CredentialId, Domain, DomainId, Record, RecordId,
};
use crate::traits::RecordStore;

#[derive(Debug, Default)]
struct Tables {
    domains: HashMap<DomainId, Domain>,
    credentials: HashMap<CredentialId, Credential>,
    records: HashMap<RecordId, Record>,
    snapshots: Vec<AnalyticsSnapshot>,
}

/// In-memory record store
///
/// Cloning shares the underlying tables.
///
/// # Example
///
/// ```rust,no_run
/// use zonesync_core::model::{Domain, DomainId};
/// use zonesync_core::store::MemoryRecordStore;
/// use zonesync_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///     store.save_domain(&Domain::new(DomainId(1), "example.com", "zone-1")).await?;
///
///     assert!(store.get_domain(DomainId(1)).await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn record_count(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Remove everything
    pub async fn clear(&self) {
        let mut guard = self.inner.write().await;
        *guard = Tables::default();
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_domain(&self, id: DomainId) -> Result<Option<Domain>, Error> {
        Ok(self.inner.read().await.domains.get(&id).cloned())
    }

    async fn list_domains(&self) -> Result<Vec<Domain>, Error> {
        let guard = self.inner.read().await;
        let mut domains: Vec<Domain> = guard.domains.values().cloned().collect();
        domains.sort_by_key(|d| d.id);
        Ok(domains)
    }

    async fn save_domain(&self, domain: &Domain) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.domains.insert(domain.id, domain.clone());
        Ok(())
    }

    async fn get_credential(&self, id: CredentialId) -> Result<Option<Credential>, Error> {
        Ok(self.inner.read().await.credentials.get(&id).cloned())
    }

    async fn save_credential(&self, credential: &Credential) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.credentials.insert(credential.id, credential.clone());
        Ok(())
    }

    async fn get_record(&self, id: RecordId) -> Result<Option<Record>, Error> {
        Ok(self.inner.read().await.records.get(&id).cloned())
    }

    async fn records_for_domain(&self, domain_id: DomainId) -> Result<Vec<Record>, Error> {
        let guard = self.inner.read().await;
        let mut records: Vec<Record> = guard
            .records
            .values()
            .filter(|r| r.domain_id == domain_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn save_record(&self, record: &Record) -> Result<(), Error> {
        let mut stored = record.clone();
        stored.sync.syncing = false;

        let mut guard = self.inner.write().await;
        guard.records.insert(stored.id, stored);
        Ok(())
    }

    async fn delete_record(&self, id: RecordId) -> Result<Option<Record>, Error> {
        Ok(self.inner.write().await.records.remove(&id))
    }

    async fn save_snapshot(&self, snapshot: &AnalyticsSnapshot) -> Result<(), Error> {
        self.inner.write().await.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn snapshots_for_domain(
        &self,
        domain_id: DomainId,
    ) -> Result<Vec<AnalyticsSnapshot>, Error> {
        let guard = self.inner.read().await;
        let mut snapshots: Vec<AnalyticsSnapshot> = guard
            .snapshots
            .iter()
            .filter(|s| s.domain_id == domain_id)
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| s.captured_at);
        Ok(snapshots)
    }

    async fn purge_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<usize, Error> {
        let mut guard = self.inner.write().await;
        let before = guard.snapshots.len();
        guard.snapshots.retain(|s| !s.is_older_than(cutoff));
        Ok(before - guard.snapshots.len())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordType;
    use chrono::Duration;

    fn record(id: u64, domain: u64) -> Record {
        Record::new(RecordId(id), DomainId(domain), RecordType::A, "www", "1.2.3.4")
    }

    #[tokio::test]
    async fn test_memory_store_records() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.record_count().await, 0);

        store.save_record(&record(1, 1)).await.unwrap();
        store.save_record(&record(2, 1)).await.unwrap();
        store.save_record(&record(3, 2)).await.unwrap();
        assert_eq!(store.record_count().await, 3);

        let for_first = store.records_for_domain(DomainId(1)).await.unwrap();
        assert_eq!(
            for_first.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![RecordId(1), RecordId(2)]
        );

        let deleted = store.delete_record(RecordId(2)).await.unwrap();
        assert_eq!(deleted.map(|r| r.id), Some(RecordId(2)));
        assert!(store.delete_record(RecordId(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_strips_syncing() {
        let store = MemoryRecordStore::new();

        let mut r = record(1, 1);
        r.sync.syncing = true;
        store.save_record(&r).await.unwrap();

        let stored = store.get_record(RecordId(1)).await.unwrap().unwrap();
        assert!(!stored.sync.syncing);
    }

    #[tokio::test]
    async fn test_memory_store_snapshot_purge() {
        let store = MemoryRecordStore::new();
        let now = Utc::now();

        store
            .save_snapshot(&AnalyticsSnapshot::new(DomainId(1), now - Duration::days(40)))
            .await
            .unwrap();
        store
            .save_snapshot(&AnalyticsSnapshot::new(DomainId(1), now))
            .await
            .unwrap();

        let purged = store
            .purge_snapshots_before(now - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.snapshots_for_domain(DomainId(1)).await.unwrap().len(), 1);
    }
}
