//! Record service
//!
//! The persistence-side entry point: writes a record to the store and calls
//! the lifecycle hooks around the write, the way an ORM would fire model
//! callbacks.
//!
//! Two paths are offered:
//!
//! - **Loud** ([`RecordService::create`], [`RecordService::update`],
//!   [`RecordService::delete`]): the remote round-trip happens on the
//!   caller's task and a failure rolls the local write back before the
//!   error is returned.
//! - **Quiet** ([`RecordService::create_deferred`],
//!   [`RecordService::update_deferred`]): the local write is kept and a
//!   [`ResyncMessage::RecordResync`] is queued; remote failures surface only
//!   through worker logs and events.

use crate::error::{Error, Result};
use crate::model::{Record, RecordField, RecordId};
use crate::resync::{ResyncMessage, ResyncQueue};
use crate::traits::{RecordLifecycle, RecordStore};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Writes records and drives their lifecycle hooks
pub struct RecordService {
    store: Arc<dyn RecordStore>,
    lifecycle: Arc<dyn RecordLifecycle>,
    queue: Option<ResyncQueue>,
}

impl RecordService {
    /// Create a service with only the synchronous path
    pub fn new(store: Arc<dyn RecordStore>, lifecycle: Arc<dyn RecordLifecycle>) -> Self {
        Self {
            store,
            lifecycle,
            queue: None,
        }
    }

    /// Enable the deferred path
    pub fn with_queue(mut self, queue: ResyncQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Store a new record and create it remotely
    ///
    /// On failure the local record is deleted again.
    pub async fn create(&self, mut record: Record) -> Result<Record> {
        self.store.save_record(&record).await?;

        if let Err(e) = self.lifecycle.on_record_created(&mut record).await {
            warn!(record = %record.id, "Rolling back local create: {}", e);
            if let Err(rollback) = self.store.delete_record(record.id).await {
                error!(record = %record.id, "Rollback of create failed: {}", rollback);
            }
            return Err(e);
        }

        Ok(record)
    }

    /// Store changed fields and push them remotely
    ///
    /// On failure the previously stored version is restored.
    pub async fn update(&self, mut record: Record, changed: &[RecordField]) -> Result<Record> {
        let previous = self.existing(record.id).await?;

        self.lifecycle.before_record_update(&mut record, changed);
        self.store.save_record(&record).await?;

        if let Err(e) = self.lifecycle.on_record_updated(&mut record).await {
            warn!(record = %record.id, "Restoring previous record version: {}", e);
            if let Err(rollback) = self.store.save_record(&previous).await {
                error!(record = %record.id, "Rollback of update failed: {}", rollback);
            }
            return Err(e);
        }

        Ok(record)
    }

    /// Delete a record locally and remotely
    ///
    /// On failure the record is saved back.
    pub async fn delete(&self, record_id: RecordId) -> Result<Record> {
        let Some(mut record) = self.store.delete_record(record_id).await? else {
            return Err(Error::not_found(format!("record {}", record_id)));
        };

        if let Err(e) = self.lifecycle.on_record_deleted(&mut record).await {
            warn!(record = %record_id, "Restoring deleted record: {}", e);
            if let Err(rollback) = self.store.save_record(&record).await {
                error!(record = %record_id, "Rollback of delete failed: {}", rollback);
            }
            return Err(e);
        }

        Ok(record)
    }

    /// Store a new record and queue its remote creation
    pub async fn create_deferred(&self, record: Record) -> Result<Record> {
        let queue = self.queue()?;
        self.store.save_record(&record).await?;
        self.defer(queue, &record).await?;
        Ok(record)
    }

    /// Store changed fields and queue the remote update
    pub async fn update_deferred(&self, mut record: Record, changed: &[RecordField]) -> Result<Record> {
        let queue = self.queue()?;
        self.existing(record.id).await?;

        self.lifecycle.before_record_update(&mut record, changed);
        self.store.save_record(&record).await?;
        self.defer(queue, &record).await?;
        Ok(record)
    }

    fn queue(&self) -> Result<&ResyncQueue> {
        self.queue
            .as_ref()
            .ok_or_else(|| Error::config("deferred writes need a resync queue"))
    }

    async fn defer(&self, queue: &ResyncQueue, record: &Record) -> Result<()> {
        queue
            .enqueue(ResyncMessage::RecordResync {
                record_id: record.id,
            })
            .await?;
        debug!(record = %record.id, "Queued record resync");
        Ok(())
    }

    async fn existing(&self, record_id: RecordId) -> Result<Record> {
        self.store
            .get_record(record_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("record {}", record_id)))
    }
}
