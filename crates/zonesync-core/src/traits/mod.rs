//! Core traits for the zonesync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RemoteZoneApi`]: The four provider calls the engine makes
//! - [`RemoteApiFactory`]: Builds an authenticated handle from a credential
//! - [`RecordStore`]: Local persistence of domains, credentials and records
//! - [`RecordLifecycle`]: Hooks the persistence side calls around its writes

pub mod lifecycle;
pub mod record_store;
pub mod remote_api;

pub use lifecycle::RecordLifecycle;
pub use record_store::RecordStore;
pub use remote_api::{
    ApiError, ApiResponse, RecordFilter, RecordPayload, RemoteApiFactory, RemoteOp, RemoteRecord,
    RemoteRecordRef, RemoteZoneApi,
};
