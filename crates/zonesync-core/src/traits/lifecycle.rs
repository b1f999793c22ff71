//! Record lifecycle hooks
//!
//! The persistence side calls these around its own writes:
//!
//! ```text
//! update:  before_record_update ─▶ write ─▶ on_record_updated
//! create:                          write ─▶ on_record_created
//! delete:                          write ─▶ on_record_deleted
//! ```
//!
//! The post-write hooks may themselves write the record back (to store a
//! newly discovered remote id). Implementations must treat a hook call for
//! a record that is already `syncing` as a no-op.

use crate::error::Result;
use crate::model::{Record, RecordField};
use async_trait::async_trait;

/// Hooks invoked by the persistence collaborator
#[async_trait]
pub trait RecordLifecycle: Send + Sync {
    /// Runs before an update is written; may reset `synced`
    fn before_record_update(&self, record: &mut Record, changed: &[RecordField]);

    /// Runs after a new record is written
    async fn on_record_created(&self, record: &mut Record) -> Result<()>;

    /// Runs after an existing record is written
    async fn on_record_updated(&self, record: &mut Record) -> Result<()>;

    /// Runs after a record is deleted
    async fn on_record_deleted(&self, record: &mut Record) -> Result<()>;
}
