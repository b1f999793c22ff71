//! Remote client resolution
//!
//! The [`RemoteClientFactory`] turns a [`Domain`] into an authenticated
//! [`RemoteZoneApi`] handle. It fails closed: a domain without a usable
//! credential never reaches the provider.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zonesync_core::client::RemoteClientFactory;
//!
//! let clients = RemoteClientFactory::new(store.clone(), Arc::new(CloudflareConnector::new(...)?));
//!
//! // Fails with MissingCredential / IncompleteCredential before any I/O
//! let api = clients.resolve(&domain).await?;
//! ```
//!
//! ## Caching
//!
//! Handles are cached per access/secret pair, so domains sharing a
//! credential share one handle (and its connection pool). Rotating a
//! credential's keys produces a new cache entry.

use crate::error::{Error, Result};
use crate::model::Domain;
use crate::traits::{RecordStore, RemoteApiFactory, RemoteZoneApi};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Cache key; deliberately has no `Debug` so the secret cannot be printed
#[derive(Clone, PartialEq, Eq, Hash)]
struct CredentialKey {
    access: String,
    secret: String,
}

/// Resolves provider credentials for a domain and produces remote handles
///
/// ## Thread Safety
///
/// The handle cache uses interior mutability with RwLock, allowing
/// concurrent lookups and exclusive inserts.
pub struct RemoteClientFactory {
    /// Source of credentials
    store: Arc<dyn RecordStore>,

    /// Builds handles for a credential
    connector: Arc<dyn RemoteApiFactory>,

    /// Handles per credential pair, `None` when caching is disabled
    cache: Option<RwLock<HashMap<CredentialKey, Arc<dyn RemoteZoneApi>>>>,
}

impl RemoteClientFactory {
    /// Create a factory that caches handles per credential pair
    pub fn new(store: Arc<dyn RecordStore>, connector: Arc<dyn RemoteApiFactory>) -> Self {
        Self {
            store,
            connector,
            cache: Some(RwLock::new(HashMap::new())),
        }
    }

    /// Create a factory that builds a fresh handle on every resolution
    pub fn without_cache(store: Arc<dyn RecordStore>, connector: Arc<dyn RemoteApiFactory>) -> Self {
        Self {
            store,
            connector,
            cache: None,
        }
    }

    /// Resolve the remote handle for `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(handle)`: a handle scoped to the domain's credential pair
    /// - `Err(Error::MissingCredential)`: no credential reference, or it points nowhere
    /// - `Err(Error::IncompleteCredential)`: access or secret key absent
    pub async fn resolve(&self, domain: &Domain) -> Result<Arc<dyn RemoteZoneApi>> {
        let Some(credential_id) = domain.credential_id else {
            warn!(domain = %domain.name, "Domain has no credential reference");
            return Err(Error::missing_credential(&domain.name));
        };

        let Some(credential) = self.store.get_credential(credential_id).await? else {
            warn!(
                domain = %domain.name,
                credential = %credential_id,
                "Credential referenced by domain does not exist"
            );
            return Err(Error::missing_credential(&domain.name));
        };

        let key = match (credential.access(), credential.secret()) {
            (Some(access), Some(secret)) => CredentialKey {
                access: access.to_string(),
                secret: secret.to_string(),
            },
            _ => {
                let missing = credential.missing_part().unwrap_or("key pair");
                warn!(
                    domain = %domain.name,
                    credential = %credential_id,
                    "Credential is missing its {}", missing
                );
                return Err(Error::incomplete_credential(
                    &domain.name,
                    credential_id.to_string(),
                    missing,
                ));
            }
        };

        let Some(cache) = &self.cache else {
            return self.connector.connect(&credential);
        };

        if let Some(handle) = cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            debug!(domain = %domain.name, "Reusing cached remote handle");
            return Ok(Arc::clone(handle));
        }

        let handle = self.connector.connect(&credential)?;
        debug!(
            domain = %domain.name,
            provider = handle.provider_name(),
            "Created remote handle"
        );

        let mut guard = cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(guard.entry(key).or_insert(handle)))
    }

    /// Number of cached handles
    pub fn cached_clients(&self) -> usize {
        self.cache
            .as_ref()
            .map(|cache| cache.read().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    /// Drop every cached handle
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.write().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Credential, CredentialId, DomainId};
    use crate::store::MemoryRecordStore;
    use crate::traits::{
        ApiResponse, RecordFilter, RecordPayload, RemoteRecord, RemoteRecordRef,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullApi;

    #[async_trait::async_trait]
    impl RemoteZoneApi for NullApi {
        async fn list_records(
            &self,
            _zone_id: &str,
            _filter: &RecordFilter,
        ) -> Result<ApiResponse<Vec<RemoteRecord>>> {
            Ok(ApiResponse::ok(Vec::new()))
        }

        async fn create_record(
            &self,
            _zone_id: &str,
            _payload: &RecordPayload,
        ) -> Result<ApiResponse<RemoteRecord>> {
            Ok(ApiResponse::failed(Vec::new()))
        }

        async fn update_record(
            &self,
            _zone_id: &str,
            _record_id: &str,
            _payload: &RecordPayload,
        ) -> Result<ApiResponse<RemoteRecord>> {
            Ok(ApiResponse::failed(Vec::new()))
        }

        async fn delete_record(
            &self,
            _zone_id: &str,
            _record_id: &str,
        ) -> Result<ApiResponse<RemoteRecordRef>> {
            Ok(ApiResponse::failed(Vec::new()))
        }

        fn provider_name(&self) -> &'static str {
            "null"
        }
    }

    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
    }

    impl RemoteApiFactory for CountingConnector {
        fn connect(&self, _credential: &Credential) -> Result<Arc<dyn RemoteZoneApi>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullApi))
        }
    }

    async fn store_with(credentials: &[Credential]) -> Arc<MemoryRecordStore> {
        let store = Arc::new(MemoryRecordStore::new());
        for credential in credentials {
            store.save_credential(credential).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn shared_credential_reuses_handle() {
        let store = store_with(&[Credential::new(CredentialId(1), "ops@example.com", "key")]).await;
        let connector = Arc::new(CountingConnector::default());
        let clients = RemoteClientFactory::new(store, connector.clone());

        let a = Domain::new(DomainId(1), "example.com", "z1").with_credential(CredentialId(1));
        let b = Domain::new(DomainId(2), "example.org", "z2").with_credential(CredentialId(1));

        clients.resolve(&a).await.unwrap();
        clients.resolve(&b).await.unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        assert_eq!(clients.cached_clients(), 1);

        clients.clear_cache();
        assert_eq!(clients.cached_clients(), 0);
    }

    #[tokio::test]
    async fn uncached_factory_connects_every_time() {
        let store = store_with(&[Credential::new(CredentialId(1), "ops@example.com", "key")]).await;
        let connector = Arc::new(CountingConnector::default());
        let clients = RemoteClientFactory::without_cache(store, connector.clone());

        let domain = Domain::new(DomainId(1), "example.com", "z1").with_credential(CredentialId(1));
        clients.resolve(&domain).await.unwrap();
        clients.resolve(&domain).await.unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(clients.cached_clients(), 0);
    }

    #[tokio::test]
    async fn dangling_credential_reference_is_missing() {
        let store = store_with(&[]).await;
        let connector = Arc::new(CountingConnector::default());
        let clients = RemoteClientFactory::new(store, connector.clone());

        let domain = Domain::new(DomainId(1), "example.com", "z1").with_credential(CredentialId(9));
        let err = clients.resolve(&domain).await.err().unwrap();

        assert!(matches!(err, Error::MissingCredential { .. }));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }
}
