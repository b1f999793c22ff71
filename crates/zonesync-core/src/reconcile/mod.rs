//! Reconciliation engine
//!
//! The [`Reconciler`] performs the four remote operations against the
//! provider that owns a domain:
//!
//! - [`Reconciler::create_record`]: push a new record, return its remote id
//! - [`Reconciler::list_records`]: conflict search by type and name
//! - [`Reconciler::update_record`]: overwrite a record by remote id
//! - [`Reconciler::remove_record`]: delete a record by remote id
//!
//! ## Response Validation
//!
//! ```text
//! RemoteZoneApi call ──▶ Err(transport) ──────────────┐
//!        │                                            ▼
//!        └──▶ ApiResponse ──▶ success == false ──▶ RemoteOperation error
//!                   │                                 (logged, returned)
//!                   └──▶ success == true ──▶ result
//! ```
//!
//! Every operation goes through the same gate. A falsy or missing
//! `success` is a failure even when the HTTP exchange itself worked.
//! Nothing here retries; the resync channel owns redelivery.

use crate::client::RemoteClientFactory;
use crate::error::{Error, Result};
use crate::model::{Domain, Record};
use crate::traits::{
    ApiError, ApiResponse, RecordFilter, RecordPayload, RemoteOp, RemoteRecord,
};
use tracing::{debug, error, info};

/// Performs remote operations for records of a domain
pub struct Reconciler {
    clients: RemoteClientFactory,
}

impl Reconciler {
    /// Create a reconciler resolving handles through `clients`
    pub fn new(clients: RemoteClientFactory) -> Self {
        Self { clients }
    }

    /// The client factory used for handle resolution
    pub fn clients(&self) -> &RemoteClientFactory {
        &self.clients
    }

    /// Create `record` remotely and return the provider-assigned id
    ///
    /// The caller is responsible for storing the id on the record.
    ///
    /// # Errors
    ///
    /// - Credential resolution errors, unchanged
    /// - `RemoteOperation` when the provider rejects the call or returns no record
    pub async fn create_record(&self, domain: &Domain, record: &Record) -> Result<String> {
        let api = self.clients.resolve(domain).await?;
        let payload = RecordPayload::from_record(record, &domain.name);

        debug!(
            domain = %domain.name,
            record = %record.id,
            "Creating {} record {} -> {}",
            payload.record_type, payload.name, payload.content
        );

        let outcome = api.create_record(&domain.zone_id, &payload).await;
        let created = self.validate(domain, RemoteOp::Create, &payload.name, outcome)?;

        let Some(created) = created else {
            return Err(self.reject(
                domain,
                RemoteOp::Create,
                &payload.name,
                vec![ApiError::new(None, "create response carried no record")],
            ));
        };

        info!(
            domain = %domain.name,
            record = %record.id,
            remote_id = %created.id,
            "Created remote record {} ({})",
            payload.name, payload.record_type
        );
        Ok(created.id)
    }

    /// Search the domain's zone for records matching `filter`
    pub async fn list_records(
        &self,
        domain: &Domain,
        filter: &RecordFilter,
    ) -> Result<Vec<RemoteRecord>> {
        let api = self.clients.resolve(domain).await?;
        let target = filter.name.as_deref().unwrap_or(&domain.name);

        let outcome = api.list_records(&domain.zone_id, filter).await;
        let found = self
            .validate(domain, RemoteOp::List, target, outcome)?
            .unwrap_or_default();

        debug!(
            domain = %domain.name,
            "Conflict search for {} returned {} record(s)",
            target,
            found.len()
        );
        Ok(found)
    }

    /// Push the current field values of `record` to its remote copy
    ///
    /// # Errors
    ///
    /// - `CallerContract` when the record has no remote id
    /// - Credential resolution errors, unchanged
    /// - `RemoteOperation` when the provider rejects the call
    pub async fn update_record(&self, domain: &Domain, record: &Record) -> Result<RemoteRecord> {
        let remote_id = Self::require_remote_id(record, RemoteOp::Update)?;
        let api = self.clients.resolve(domain).await?;
        let payload = RecordPayload::from_record(record, &domain.name);

        let outcome = api.update_record(&domain.zone_id, remote_id, &payload).await;
        let updated = self.validate(domain, RemoteOp::Update, &payload.name, outcome)?;

        info!(
            domain = %domain.name,
            record = %record.id,
            remote_id = %remote_id,
            "Updated remote record {} -> {} (ttl {})",
            payload.name, payload.content, payload.ttl
        );

        // Some providers answer an update with an empty result
        Ok(updated.unwrap_or_else(|| RemoteRecord {
            id: remote_id.to_string(),
            record_type: payload.record_type,
            name: payload.name,
            content: payload.content,
            ttl: payload.ttl,
            proxied: payload.proxied,
        }))
    }

    /// Delete the remote copy of `record`
    ///
    /// # Errors
    ///
    /// - `CallerContract` when the record has no remote id
    /// - Credential resolution errors, unchanged
    /// - `RemoteOperation` when the provider rejects the call
    pub async fn remove_record(&self, domain: &Domain, record: &Record) -> Result<()> {
        let remote_id = Self::require_remote_id(record, RemoteOp::Delete)?;
        let api = self.clients.resolve(domain).await?;
        let name = record.fqdn(&domain.name);

        let outcome = api.delete_record(&domain.zone_id, remote_id).await;
        self.validate(domain, RemoteOp::Delete, &name, outcome)?;

        info!(
            domain = %domain.name,
            record = %record.id,
            remote_id = %remote_id,
            "Deleted remote record {}",
            name
        );
        Ok(())
    }

    fn require_remote_id(record: &Record, op: RemoteOp) -> Result<&str> {
        record.sync.remote_id.as_deref().ok_or_else(|| {
            Error::caller_contract(format!(
                "{} requested for record {} without a remote id",
                op, record.id
            ))
        })
    }

    /// The single validation gate shared by all operations
    fn validate<T>(
        &self,
        domain: &Domain,
        op: RemoteOp,
        target: &str,
        outcome: Result<ApiResponse<T>>,
    ) -> Result<Option<T>> {
        match outcome {
            Ok(response) if response.success => Ok(response.result),
            Ok(response) => Err(self.reject(domain, op, target, response.errors)),
            Err(transport) => Err(self.reject(
                domain,
                op,
                target,
                vec![ApiError::new(None, transport.to_string())],
            )),
        }
    }

    fn reject(&self, domain: &Domain, op: RemoteOp, target: &str, errors: Vec<ApiError>) -> Error {
        let err = Error::remote(op, target, errors);
        error!(
            domain = %domain.name,
            zone = %domain.zone_id,
            operation = %op,
            "{}",
            err
        );
        err
    }
}
