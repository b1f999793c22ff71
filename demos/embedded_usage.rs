//! Minimal embedding example for zonesync-core
//!
//! Wires the engine to an in-process zone instead of a real provider and
//! walks one record through create, update, delete and a deferred resync.
//! The application owns every component and the worker lifecycle.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zonesync_core::config::ResyncConfig;
use zonesync_core::model::{CredentialId, DomainId, RecordId};
use zonesync_core::resync;
use zonesync_core::traits::{
    ApiResponse, RecordFilter, RecordPayload, RemoteRecord, RemoteRecordRef,
};
use zonesync_core::{
    Credential, Domain, MemoryRecordStore, Reconciler, Record, RecordField, RecordService,
    RecordStore, RecordType, RemoteApiFactory, RemoteClientFactory, RemoteZoneApi, Result,
    ResyncMessage, ResyncWorker, SyncOrchestrator,
};

/// A zone kept in a map, standing in for the provider
#[derive(Default)]
struct EmbeddedZone {
    records: Mutex<HashMap<String, RemoteRecord>>,
    next_id: AtomicUsize,
    calls: AtomicUsize,
}

impl EmbeddedZone {
    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn store(&self, id: String, payload: &RecordPayload) -> RemoteRecord {
        let record = RemoteRecord {
            id: id.clone(),
            record_type: payload.record_type,
            name: payload.name.clone(),
            content: payload.content.clone(),
            ttl: payload.ttl,
            proxied: payload.proxied,
        };
        if let Ok(mut records) = self.records.lock() {
            records.insert(id, record.clone());
        }
        record
    }
}

#[async_trait]
impl RemoteZoneApi for EmbeddedZone {
    async fn list_records(
        &self,
        _zone_id: &str,
        filter: &RecordFilter,
    ) -> Result<ApiResponse<Vec<RemoteRecord>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let records: Vec<RemoteRecord> = self
            .records
            .lock()
            .map(|records| {
                records
                    .values()
                    .filter(|r| filter.record_type.is_none_or(|t| t == r.record_type))
                    .filter(|r| filter.name.as_deref().is_none_or(|n| n == r.name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(ApiResponse::ok(records))
    }

    async fn create_record(
        &self,
        _zone_id: &str,
        payload: &RecordPayload,
    ) -> Result<ApiResponse<RemoteRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = format!("embedded-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        println!("[Embedded] create {} {} -> {}", payload.record_type, payload.name, payload.content);
        Ok(ApiResponse::ok(self.store(id, payload)))
    }

    async fn update_record(
        &self,
        _zone_id: &str,
        record_id: &str,
        payload: &RecordPayload,
    ) -> Result<ApiResponse<RemoteRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        println!("[Embedded] update {} (ttl {})", record_id, payload.ttl);
        Ok(ApiResponse::ok(self.store(record_id.to_string(), payload)))
    }

    async fn delete_record(
        &self,
        _zone_id: &str,
        record_id: &str,
    ) -> Result<ApiResponse<RemoteRecordRef>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        println!("[Embedded] delete {}", record_id);
        if let Ok(mut records) = self.records.lock() {
            records.remove(record_id);
        }
        Ok(ApiResponse::ok(RemoteRecordRef {
            id: record_id.to_string(),
        }))
    }

    fn provider_name(&self) -> &'static str {
        "embedded"
    }
}

/// Hands out the same zone for every credential
struct EmbeddedConnector(Arc<EmbeddedZone>);

impl RemoteApiFactory for EmbeddedConnector {
    fn connect(&self, _credential: &Credential) -> Result<Arc<dyn RemoteZoneApi>> {
        Ok(self.0.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Embedded zonesync-core Example ===\n");

    let zone = Arc::new(EmbeddedZone::default());
    let store = Arc::new(MemoryRecordStore::new());
    store
        .save_credential(&Credential::new(CredentialId(1), "ops@example.com", "embedded-secret"))
        .await?;
    store
        .save_domain(&Domain::new(DomainId(1), "example.com", "zone-1").with_credential(CredentialId(1)))
        .await?;

    println!("1. Wiring orchestrator...");
    let clients = RemoteClientFactory::new(store.clone(), Arc::new(EmbeddedConnector(zone.clone())));
    let orchestrator = Arc::new(SyncOrchestrator::new(Reconciler::new(clients), store.clone()));

    let (queue, rx) = resync::channel(16);
    let service = RecordService::new(store.clone(), orchestrator.clone()).with_queue(queue.clone());

    println!("2. Creating www.example.com...");
    let record = Record::new(RecordId(1), DomainId(1), RecordType::A, "www", "192.0.2.10").with_ttl(300);
    let created = service.create(record).await?;
    println!("   remote id: {:?}\n", created.sync.remote_id);

    println!("3. Changing the TTL...");
    let mut edited = created.clone();
    edited.ttl = 600;
    service.update(edited, &[RecordField::Ttl]).await?;

    println!("\n4. Deferred write of api.example.com, then a worker...");
    let deferred = Record::new(RecordId(2), DomainId(1), RecordType::Cname, "api", "www.example.com");
    service.create_deferred(deferred).await?;
    queue
        .enqueue(ResyncMessage::DomainResync {
            domain_id: DomainId(1),
        })
        .await?;

    let (worker, mut events) = ResyncWorker::new(orchestrator, store.clone(), queue, ResyncConfig::default());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let worker_handle = tokio::spawn(async move { worker.run_with_shutdown(rx, Some(shutdown_rx)).await });

    let listener = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("[Event] {:?}", event);
        }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    let _ = shutdown_tx.send(());
    let _ = worker_handle.await;
    let _ = tokio::time::timeout(Duration::from_millis(100), listener).await;

    println!("\n5. Deleting www.example.com...");
    service.delete(RecordId(1)).await?;

    for record in store.records_for_domain(DomainId(1)).await? {
        println!(
            "   left: {} {} reconciled={}",
            record.record_type,
            record.fqdn("example.com"),
            record.is_reconciled()
        );
    }

    println!("\n=== Embedding Successful ===");
    println!("Remote calls made: {}", zone.call_count());
    println!("Key Points:");
    println!("- Worker lifecycle is fully controlled by the application");
    println!("- The provider is any RemoteZoneApi implementation");
    println!("- Records written through the store never recurse into the engine");

    Ok(())
}
