//! Sync orchestrator
//!
//! The [`SyncOrchestrator`] turns local record lifecycle events into
//! reconciliation calls. It runs on the caller's task: a created, updated
//! or deleted record blocks on the remote round-trip, and any failure is
//! returned to the caller after being logged.
//!
//! ## Transitions
//!
//! ```text
//!              syncing?   remote_id?   action
//! created      yes        -            no-op
//!              no         -            create ─▶ store id ─▶ persist
//! updated      yes        -            no-op
//!              no         none         list by type+fqdn
//!                                        ├─ match ─▶ adopt first id ─▶ persist
//!                                        └─ none  ─▶ create ─▶ store id ─▶ persist
//!              no         present      update
//! deleted      yes        -            no-op
//!              -          none         no-op (nothing remote)
//!              no         present      remove
//! ```
//!
//! The persist step writes the record while it is still `syncing`, so a
//! persistence layer that fires hooks on that write sees a no-op.

mod guard;

pub use guard::SyncGuard;

use crate::error::{Error, Result};
use crate::model::{Domain, Record, RecordField};
use crate::reconcile::Reconciler;
use crate::traits::{RecordFilter, RecordLifecycle, RecordStore, RemoteOp};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Event-driven driver of the reconciliation engine
pub struct SyncOrchestrator {
    /// Remote operations
    reconciler: Reconciler,

    /// Domain lookup and record write-back
    store: Arc<dyn RecordStore>,
}

impl SyncOrchestrator {
    /// Create an orchestrator
    pub fn new(reconciler: Reconciler, store: Arc<dyn RecordStore>) -> Self {
        Self { reconciler, store }
    }

    /// The underlying reconciler
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// The record store used for lookups and write-back
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Establish the remote identity of a record that has none
    ///
    /// Searches before creating so that a record created remotely by an
    /// earlier, interrupted run is adopted rather than duplicated.
    async fn recover_identity(&self, domain: &Domain, record: &mut Record) -> Result<()> {
        let fqdn = record.fqdn(&domain.name);
        let filter = RecordFilter::new(record.record_type, &fqdn);

        let found = self
            .reconciler
            .list_records(domain, &filter)
            .await
            .map_err(|e| self.failed(domain, record, RemoteOp::List, e))?;

        if let Some(existing) = found.into_iter().next() {
            info!(
                record = %record.id,
                remote_id = %existing.id,
                "Adopting existing remote record {} ({})",
                fqdn, record.record_type
            );
            record.sync.synced = existing.matches_local(record);
            record.sync.remote_id = Some(existing.id);
            return self.write_back(domain, record).await;
        }

        let remote_id = self
            .reconciler
            .create_record(domain, record)
            .await
            .map_err(|e| self.failed(domain, record, RemoteOp::Create, e))?;

        record.sync.remote_id = Some(remote_id);
        record.sync.synced = true;
        self.write_back(domain, record).await
    }

    async fn domain_for(&self, record: &Record) -> Result<Domain> {
        self.store.get_domain(record.domain_id).await?.ok_or_else(|| {
            error!(
                record = %record.id,
                domain_id = %record.domain_id,
                "Record references an unknown domain"
            );
            Error::not_found(format!(
                "domain {} of record {}",
                record.domain_id, record.id
            ))
        })
    }

    /// Persist sync metadata discovered during a transition
    async fn write_back(&self, domain: &Domain, record: &Record) -> Result<()> {
        self.store.save_record(record).await.map_err(|e| {
            error!(
                record = %record.id,
                domain = %domain.name,
                remote_id = ?record.sync.remote_id,
                "Failed to persist sync state: {}",
                e
            );
            e
        })
    }

    fn failed(&self, domain: &Domain, record: &Record, op: RemoteOp, err: Error) -> Error {
        error!(
            record = %record.id,
            domain = %domain.name,
            fqdn = %record.fqdn(&domain.name),
            remote_id = ?record.sync.remote_id,
            operation = %op,
            "Record sync failed: {}",
            err
        );
        err
    }
}

/// Take the sync guard, or log why the event is ignored
fn enter<'a>(record: &'a mut Record, event: &str) -> Option<SyncGuard<'a>> {
    let id = record.id;
    let guard = SyncGuard::acquire(record);
    if guard.is_none() {
        debug!(record = %id, "Record already syncing, ignoring {} event", event);
    }
    guard
}

#[async_trait]
impl RecordLifecycle for SyncOrchestrator {
    fn before_record_update(&self, record: &mut Record, changed: &[RecordField]) {
        if let Some(field) = changed.iter().find(|field| field.affects_remote()) {
            if record.sync.synced {
                debug!(record = %record.id, "{:?} changed, record drifted from remote", field);
            }
            record.sync.synced = false;
        }
    }

    async fn on_record_created(&self, record: &mut Record) -> Result<()> {
        let Some(mut record) = enter(record, "created") else {
            return Ok(());
        };
        let domain = self.domain_for(&record).await?;

        let remote_id = self
            .reconciler
            .create_record(&domain, &record)
            .await
            .map_err(|e| self.failed(&domain, &record, RemoteOp::Create, e))?;

        record.sync.remote_id = Some(remote_id);
        record.sync.synced = true;
        self.write_back(&domain, &record).await
    }

    async fn on_record_updated(&self, record: &mut Record) -> Result<()> {
        let Some(mut record) = enter(record, "updated") else {
            return Ok(());
        };
        let domain = self.domain_for(&record).await?;

        if record.sync.remote_id.is_none() {
            // An update right after creation would be redundant
            return self.recover_identity(&domain, &mut record).await;
        }

        self.reconciler
            .update_record(&domain, &record)
            .await
            .map_err(|e| self.failed(&domain, &record, RemoteOp::Update, e))?;

        if !record.sync.synced {
            record.sync.synced = true;
            self.write_back(&domain, &record).await?;
        }
        Ok(())
    }

    async fn on_record_deleted(&self, record: &mut Record) -> Result<()> {
        if record.sync.remote_id.is_none() {
            debug!(record = %record.id, "Record never reached the provider, nothing to delete");
            return Ok(());
        }
        let Some(record) = enter(record, "deleted") else {
            return Ok(());
        };
        let domain = self.domain_for(&record).await?;

        self.reconciler
            .remove_record(&domain, &record)
            .await
            .map_err(|e| self.failed(&domain, &record, RemoteOp::Delete, e))
    }
}
