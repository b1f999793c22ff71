// # zonesync-core
//
// Core library for keeping locally managed DNS records in step with a
// remote DNS provider.
//
// ## Architecture Overview
//
// - **RecordStore**: Trait for the local source of truth (domains, credentials, records)
// - **RemoteZoneApi**: Trait for the four provider calls (create, list, update, delete)
// - **RemoteClientFactory**: Resolves a domain's credential into a provider handle
// - **Reconciler**: Performs remote operations behind one response-validation gate
// - **SyncOrchestrator**: Per-record state machine driven by lifecycle events
// - **RecordService**: Writes records and fires the lifecycle hooks
// - **ResyncWorker**: Deferred, at-least-once reconciliation with redelivery
//
// ## Design Principles
//
// 1. **Local intent wins**: the store describes what should exist remotely
// 2. **Identity recovery**: a record without a remote id is searched for before it is created
// 3. **No silent failures**: every remote failure is logged and returned
// 4. **Retry belongs to the channel**: core operations never retry on their own

pub mod analytics;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod reconcile;
pub mod resync;
pub mod service;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use client::RemoteClientFactory;
pub use config::{AnalyticsConfig, ProviderConfig, ResyncConfig, StoreConfig, SyncConfig};
pub use error::{Error, ErrorKind, Result};
pub use model::{Credential, Domain, Record, RecordField, RecordType};
pub use orchestrator::{SyncGuard, SyncOrchestrator};
pub use reconcile::Reconciler;
pub use resync::{ResyncMessage, ResyncQueue, ResyncReceiver, ResyncWorker, WorkerEvent};
pub use service::RecordService;
pub use store::{FileRecordStore, MemoryRecordStore};
pub use traits::{RecordLifecycle, RecordStore, RemoteApiFactory, RemoteZoneApi};
