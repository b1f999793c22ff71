// # Record Store Trait
//
// Defines the interface for the local persistence collaborator.
//
// ## Purpose
//
// The record store is the source of truth for local intent: domains,
// credentials, records and analytics snapshots. The engine reads domains
// and credentials from it and writes records back after discovering or
// creating their remote identity.
//
// ## Implementations
//
// - `MemoryRecordStore`: in-process maps, for tests and embedding
// - `FileRecordStore`: JSON file with atomic writes and backup recovery
//
// ## Usage
//
// ```rust,ignore
// use zonesync_core::{MemoryRecordStore, RecordStore};
//
// let store = MemoryRecordStore::new();
// store.save_domain(&domain).await?;
// store.save_record(&record).await?;
//
// let records = store.records_for_domain(domain.id).await?;
// ```

use crate::model::{
    AnalyticsSnapshot, Credential, CredentialId, Domain, DomainId, Record, RecordId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Trait for record store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage (files, databases, etc.)
/// - ✅ Implement locking/concurrency control for thread safety
///
/// ## Forbidden Capabilities
/// - ❌ Call the remote provider (owned by `Reconciler`)
/// - ❌ Invoke lifecycle hooks on its own (owned by `RecordService`)
/// - ❌ Persist the transient `syncing` flag
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get a domain by id
    async fn get_domain(&self, id: DomainId) -> Result<Option<Domain>, crate::Error>;

    /// List all domains
    async fn list_domains(&self) -> Result<Vec<Domain>, crate::Error>;

    /// Create or replace a domain
    async fn save_domain(&self, domain: &Domain) -> Result<(), crate::Error>;

    /// Get a credential by id
    async fn get_credential(&self, id: CredentialId) -> Result<Option<Credential>, crate::Error>;

    /// Create or replace a credential
    async fn save_credential(&self, credential: &Credential) -> Result<(), crate::Error>;

    /// Get a record by id
    async fn get_record(&self, id: RecordId) -> Result<Option<Record>, crate::Error>;

    /// All records owned by a domain
    async fn records_for_domain(&self, domain_id: DomainId) -> Result<Vec<Record>, crate::Error>;

    /// Create or replace a record
    ///
    /// The stored copy always has `syncing = false`.
    async fn save_record(&self, record: &Record) -> Result<(), crate::Error>;

    /// Delete a record
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Record))`: the deleted record
    /// - `Ok(None)`: no such record
    async fn delete_record(&self, id: RecordId) -> Result<Option<Record>, crate::Error>;

    /// Store an analytics snapshot
    async fn save_snapshot(&self, snapshot: &AnalyticsSnapshot) -> Result<(), crate::Error>;

    /// Snapshots captured for a domain, oldest first
    async fn snapshots_for_domain(
        &self,
        domain_id: DomainId,
    ) -> Result<Vec<AnalyticsSnapshot>, crate::Error>;

    /// Delete snapshots captured before `cutoff`, returning how many were removed
    async fn purge_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<usize, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
