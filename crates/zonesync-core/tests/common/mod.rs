//! Test doubles and common utilities for contract tests
//!
//! The doubles record every call they receive so tests can assert on the
//! exact sequence of remote operations a transition produced.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use zonesync_core::error::{Error, Result};
use zonesync_core::model::{
    AnalyticsSnapshot, Credential, CredentialId, Domain, DomainId, Record, RecordId, RecordType,
};
use zonesync_core::traits::{
    ApiError, ApiResponse, RecordFilter, RecordLifecycle, RecordPayload, RecordStore,
    RemoteApiFactory, RemoteOp, RemoteRecord, RemoteRecordRef, RemoteZoneApi,
};
use zonesync_core::{MemoryRecordStore, Reconciler, RemoteClientFactory, SyncOrchestrator};

pub const ZONE: &str = "zone-1";
pub const DOMAIN: &str = "example.com";

/// One call observed by [`MockRemote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    List {
        zone: String,
        filter: RecordFilter,
    },
    Create {
        zone: String,
        payload: RecordPayload,
    },
    Update {
        zone: String,
        record_id: String,
        payload: RecordPayload,
    },
    Delete {
        zone: String,
        record_id: String,
    },
}

impl RemoteCall {
    pub fn op(&self) -> RemoteOp {
        match self {
            RemoteCall::List { .. } => RemoteOp::List,
            RemoteCall::Create { .. } => RemoteOp::Create,
            RemoteCall::Update { .. } => RemoteOp::Update,
            RemoteCall::Delete { .. } => RemoteOp::Delete,
        }
    }
}

/// How a scripted failure presents itself
#[derive(Debug, Clone)]
pub enum Failure {
    /// `{success: false, errors}`
    Envelope(Vec<ApiError>),
    /// No envelope at all
    Transport(String),
}

#[derive(Debug, Default)]
struct RemoteState {
    calls: Vec<RemoteCall>,
    existing: Vec<RemoteRecord>,
    failures: HashMap<RemoteOp, Failure>,
    next_id: usize,
}

/// A remote zone that records calls and serves scripted responses
///
/// Clones share state, so a test can keep one copy while the connector
/// hands another to the engine.
#[derive(Debug, Clone, Default)]
pub struct MockRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record that list calls may return
    pub fn with_existing(self, record: RemoteRecord) -> Self {
        self.state.lock().unwrap().existing.push(record);
        self
    }

    /// Make every call of `op` fail with a `{success: false}` envelope
    pub fn fail(&self, op: RemoteOp, errors: Vec<ApiError>) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op, Failure::Envelope(errors));
    }

    /// Make every call of `op` fail before an envelope is produced
    pub fn fail_transport(&self, op: RemoteOp, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op, Failure::Transport(message.to_string()));
    }

    pub fn heal(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn ops(&self) -> Vec<RemoteOp> {
        self.calls().iter().map(RemoteCall::op).collect()
    }

    pub fn count(&self, op: RemoteOp) -> usize {
        self.calls().iter().filter(|c| c.op() == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    fn record<T>(&self, call: RemoteCall) -> Option<Result<ApiResponse<T>>> {
        let mut state = self.state.lock().unwrap();
        let op = call.op();
        state.calls.push(call);
        match state.failures.get(&op) {
            Some(Failure::Envelope(errors)) => Some(Ok(ApiResponse::failed(errors.clone()))),
            Some(Failure::Transport(message)) => Some(Err(Error::http(message.clone()))),
            None => None,
        }
    }
}

#[async_trait]
impl RemoteZoneApi for MockRemote {
    async fn list_records(
        &self,
        zone_id: &str,
        filter: &RecordFilter,
    ) -> Result<ApiResponse<Vec<RemoteRecord>>> {
        if let Some(failed) = self.record(RemoteCall::List {
            zone: zone_id.to_string(),
            filter: filter.clone(),
        }) {
            return failed;
        }

        let state = self.state.lock().unwrap();
        let found = state
            .existing
            .iter()
            .filter(|r| filter.record_type.is_none_or(|t| t == r.record_type))
            .filter(|r| filter.name.as_deref().is_none_or(|n| n == r.name))
            .cloned()
            .collect();
        Ok(ApiResponse::ok(found))
    }

    async fn create_record(
        &self,
        zone_id: &str,
        payload: &RecordPayload,
    ) -> Result<ApiResponse<RemoteRecord>> {
        if let Some(failed) = self.record(RemoteCall::Create {
            zone: zone_id.to_string(),
            payload: payload.clone(),
        }) {
            return failed;
        }

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let created = remote_from(format!("remote-{}", state.next_id), payload);
        state.existing.push(created.clone());
        Ok(ApiResponse::ok(created))
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        payload: &RecordPayload,
    ) -> Result<ApiResponse<RemoteRecord>> {
        if let Some(failed) = self.record(RemoteCall::Update {
            zone: zone_id.to_string(),
            record_id: record_id.to_string(),
            payload: payload.clone(),
        }) {
            return failed;
        }
        Ok(ApiResponse::ok(remote_from(record_id.to_string(), payload)))
    }

    async fn delete_record(
        &self,
        zone_id: &str,
        record_id: &str,
    ) -> Result<ApiResponse<RemoteRecordRef>> {
        if let Some(failed) = self.record(RemoteCall::Delete {
            zone: zone_id.to_string(),
            record_id: record_id.to_string(),
        }) {
            return failed;
        }
        Ok(ApiResponse::ok(RemoteRecordRef {
            id: record_id.to_string(),
        }))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

fn remote_from(id: String, payload: &RecordPayload) -> RemoteRecord {
    RemoteRecord {
        id,
        record_type: payload.record_type,
        name: payload.name.clone(),
        content: payload.content.clone(),
        ttl: payload.ttl,
        proxied: payload.proxied,
    }
}

/// Hands out clones of one [`MockRemote`] and counts connections
#[derive(Debug, Default)]
pub struct MockConnector {
    remote: MockRemote,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(remote: MockRemote) -> Self {
        Self {
            remote,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl RemoteApiFactory for MockConnector {
    fn connect(&self, _credential: &Credential) -> Result<Arc<dyn RemoteZoneApi>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.remote.clone()))
    }
}

/// A record store that fires lifecycle hooks from inside `save_record`
///
/// Models a persistence layer whose save callbacks run again when the
/// orchestrator writes sync metadata back.
pub struct HookedStore {
    inner: MemoryRecordStore,
    hooks: Mutex<Option<Weak<dyn RecordLifecycle>>>,
    nested: AtomicUsize,
}

impl HookedStore {
    pub fn new(inner: MemoryRecordStore) -> Self {
        Self {
            inner,
            hooks: Mutex::new(None),
            nested: AtomicUsize::new(0),
        }
    }

    pub fn attach(&self, lifecycle: &Arc<dyn RecordLifecycle>) {
        *self.hooks.lock().unwrap() = Some(Arc::downgrade(lifecycle));
    }

    /// Hook invocations made from inside a save
    pub fn nested_calls(&self) -> usize {
        self.nested.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for HookedStore {
    async fn get_domain(&self, id: DomainId) -> Result<Option<Domain>> {
        self.inner.get_domain(id).await
    }

    async fn list_domains(&self) -> Result<Vec<Domain>> {
        self.inner.list_domains().await
    }

    async fn save_domain(&self, domain: &Domain) -> Result<()> {
        self.inner.save_domain(domain).await
    }

    async fn get_credential(&self, id: CredentialId) -> Result<Option<Credential>> {
        self.inner.get_credential(id).await
    }

    async fn save_credential(&self, credential: &Credential) -> Result<()> {
        self.inner.save_credential(credential).await
    }

    async fn get_record(&self, id: RecordId) -> Result<Option<Record>> {
        self.inner.get_record(id).await
    }

    async fn records_for_domain(&self, domain_id: DomainId) -> Result<Vec<Record>> {
        self.inner.records_for_domain(domain_id).await
    }

    async fn save_record(&self, record: &Record) -> Result<()> {
        self.inner.save_record(record).await?;

        let hooks = self.hooks.lock().unwrap().clone().and_then(|w| w.upgrade());
        if let Some(hooks) = hooks {
            // The copy still carries the caller's in-flight flag
            let mut echoed = record.clone();
            self.nested.fetch_add(3, Ordering::SeqCst);
            hooks.on_record_created(&mut echoed).await?;
            hooks.on_record_updated(&mut echoed).await?;
            hooks.on_record_deleted(&mut echoed).await?;
        }
        Ok(())
    }

    async fn delete_record(&self, id: RecordId) -> Result<Option<Record>> {
        self.inner.delete_record(id).await
    }

    async fn save_snapshot(&self, snapshot: &AnalyticsSnapshot) -> Result<()> {
        self.inner.save_snapshot(snapshot).await
    }

    async fn snapshots_for_domain(&self, domain_id: DomainId) -> Result<Vec<AnalyticsSnapshot>> {
        self.inner.snapshots_for_domain(domain_id).await
    }

    async fn purge_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.inner.purge_snapshots_before(cutoff).await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }
}

pub fn domain() -> Domain {
    Domain::new(DomainId(1), DOMAIN, ZONE).with_credential(CredentialId(1))
}

pub fn credential() -> Credential {
    Credential::new(CredentialId(1), "ops@example.com", "test-secret")
}

/// `www` A record with TTL 300, not proxied, never synced
pub fn a_record(id: u64) -> Record {
    Record::new(RecordId(id), DomainId(1), RecordType::A, "www", "1.2.3.4").with_ttl(300)
}

/// A remote copy of `record` as the provider would list it
pub fn remote_copy(id: &str, record: &Record) -> RemoteRecord {
    RemoteRecord {
        id: id.to_string(),
        record_type: record.record_type,
        name: record.fqdn(DOMAIN),
        content: record.content.clone(),
        ttl: record.ttl,
        proxied: record.proxied,
    }
}

/// Save the standard domain and credential into `store`
pub async fn seed(store: &dyn RecordStore) {
    store.save_domain(&domain()).await.unwrap();
    store.save_credential(&credential()).await.unwrap();
}

/// Orchestrator wired to `store` and `remote`
pub fn orchestrator(store: Arc<dyn RecordStore>, remote: &MockRemote) -> Arc<SyncOrchestrator> {
    let connector = Arc::new(MockConnector::new(remote.clone()));
    let clients = RemoteClientFactory::new(Arc::clone(&store), connector);
    Arc::new(SyncOrchestrator::new(Reconciler::new(clients), store))
}

/// Seeded memory store, remote and orchestrator
pub struct Harness {
    pub store: Arc<MemoryRecordStore>,
    pub remote: MockRemote,
    pub orchestrator: Arc<SyncOrchestrator>,
}

pub async fn harness() -> Harness {
    harness_with(MockRemote::new()).await
}

pub async fn harness_with(remote: MockRemote) -> Harness {
    let store = Arc::new(MemoryRecordStore::new());
    seed(store.as_ref()).await;
    let orchestrator = orchestrator(store.clone(), &remote);
    Harness {
        store,
        remote,
        orchestrator,
    }
}
