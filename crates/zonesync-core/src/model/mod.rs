//! Entities managed by the local store
//!
//! - [`Domain`] and [`Credential`]: a managed zone and the key pair used to reach it
//! - [`Record`]: one DNS record intent plus its [`SyncState`]
//! - [`AnalyticsSnapshot`]: per-domain usage statistics, unrelated to sync

pub mod analytics;
pub mod domain;
pub mod record;

pub use analytics::AnalyticsSnapshot;
pub use domain::{Credential, CredentialId, Domain, DomainId};
pub use record::{Record, RecordField, RecordId, RecordType, SyncState};
