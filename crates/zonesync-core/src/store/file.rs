// # File Record Store
//
// JSON-file implementation of RecordStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: every mutation rewrites a temp file, then renames it
// - Backup: the previous good file is copied to `.backup` before the rename
// - Recovery: a file that fails to parse is replaced by its backup
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "domains": [{ "id": 1, "name": "example.com", "zone_id": "…", "credential_id": 1, "valid": true }],
//   "credentials": [{ "id": 1, "access_key": "ops@example.com", "secret_key": "…" }],
//   "records": [{ "id": 7, "domain_id": 1, "type": "A", "host": "www", "content": "203.0.113.7",
//                 "ttl": 1, "proxied": false, "remote_id": "372e6795", "synced": true }],
//   "snapshots": []
// }
// ```
//
// The transient `syncing` flag is never written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::Error;
use crate::model::{
    AnalyticsSnapshot, Credential, CredentialId, Domain, DomainId, Record, RecordId,
};
use crate::traits::RecordStore;

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-backed record store
///
/// Every mutation is written through to disk before the call returns.
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    state: Arc<RwLock<Tables>>,
    /// Held from snapshot to rename; every write shares one temp file
    write_lock: Mutex<()>,
}

#[derive(Debug, Default)]
struct Tables {
    domains: BTreeMap<DomainId, Domain>,
    credentials: BTreeMap<CredentialId, Credential>,
    records: BTreeMap<RecordId, Record>,
    snapshots: Vec<AnalyticsSnapshot>,
    dirty: bool,
}

/// On-disk layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: String,
    #[serde(default)]
    domains: Vec<Domain>,
    #[serde(default)]
    credentials: Vec<Credential>,
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    snapshots: Vec<AnalyticsSnapshot>,
}

impl From<StoreFile> for Tables {
    fn from(file: StoreFile) -> Self {
        Self {
            domains: file.domains.into_iter().map(|d| (d.id, d)).collect(),
            credentials: file.credentials.into_iter().map(|c| (c.id, c)).collect(),
            records: file.records.into_iter().map(|r| (r.id, r)).collect(),
            snapshots: file.snapshots,
            dirty: false,
        }
    }
}

impl FileRecordStore {
    /// Open or create a store at `path`
    ///
    /// A corrupted file is recovered from its backup; when the backup is
    /// unusable too the store starts empty. Parent directories are created.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let tables = Self::load_with_recovery(&path).await?;
        tracing::debug!(
            "Opened record store {}: {} domain(s), {} record(s)",
            path.display(),
            tables.domains.len(),
            tables.records.len()
        );

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(tables)),
            write_lock: Mutex::new(()),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<Tables, Error> {
        let err = match Self::load(path).await {
            Ok(tables) => return Ok(tables),
            Err(e @ Error::Json(_)) => e,
            Err(other) => return Err(other),
        };

        tracing::warn!(
            "Record store {} is corrupted ({}), attempting recovery from backup",
            path.display(),
            err
        );

        let backup = Self::backup_path(path);
        if !backup.exists() {
            tracing::warn!("No backup file found, starting with an empty store");
            return Ok(Tables::default());
        }

        match Self::load(&backup).await {
            Ok(tables) => {
                tracing::info!("Recovered {} record(s) from backup", tables.records.len());
                if let Err(e) = fs::copy(&backup, path).await {
                    tracing::error!("Failed to restore store file from backup: {}", e);
                }
                Ok(tables)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also unusable ({}), starting with an empty store",
                    backup_err
                );
                Ok(Tables::default())
            }
        }
    }

    async fn load(path: &Path) -> Result<Tables, Error> {
        if !path.exists() {
            return Ok(Tables::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::record_store(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file: StoreFile = serde_json::from_str(&content)?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Loading anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.into())
    }

    /// Serialize the tables and atomically replace the store file
    async fn persist(&self) -> Result<(), Error> {
        let _write = self.write_lock.lock().await;

        let json = {
            let guard = self.state.read().await;
            let file = StoreFile {
                version: STORE_FILE_VERSION.to_string(),
                domains: guard.domains.values().cloned().collect(),
                credentials: guard.credentials.values().cloned().collect(),
                records: guard.records.values().cloned().collect(),
                snapshots: guard.snapshots.clone(),
            };
            serde_json::to_string_pretty(&file)?
        };

        let temp = self.temp_path();
        {
            let mut out = fs::File::create(&temp).await.map_err(|e| {
                Error::record_store(format!("Failed to create {}: {}", temp.display(), e))
            })?;
            out.write_all(json.as_bytes()).await.map_err(|e| {
                Error::record_store(format!("Failed to write {}: {}", temp.display(), e))
            })?;
            out.flush().await.map_err(|e| {
                Error::record_store(format!("Failed to flush {}: {}", temp.display(), e))
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp, &self.path).await.map_err(|e| {
            Error::record_store(format!(
                "Failed to rename {} to {}: {}",
                temp.display(),
                self.path.display(),
                e
            ))
        })?;

        self.state.write().await.dirty = false;
        tracing::trace!("Record store written to {}", self.path.display());
        Ok(())
    }

    /// Apply `change` to the tables and write through
    async fn mutate<T>(&self, change: impl FnOnce(&mut Tables) -> T) -> Result<T, Error> {
        let out = {
            let mut guard = self.state.write().await;
            let out = change(&mut guard);
            guard.dirty = true;
            out
        };
        self.persist().await?;
        Ok(out)
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get_domain(&self, id: DomainId) -> Result<Option<Domain>, Error> {
        Ok(self.state.read().await.domains.get(&id).cloned())
    }

    async fn list_domains(&self) -> Result<Vec<Domain>, Error> {
        Ok(self.state.read().await.domains.values().cloned().collect())
    }

    async fn save_domain(&self, domain: &Domain) -> Result<(), Error> {
        let domain = domain.clone();
        self.mutate(|t| {
            t.domains.insert(domain.id, domain);
        })
        .await
    }

    async fn get_credential(&self, id: CredentialId) -> Result<Option<Credential>, Error> {
        Ok(self.state.read().await.credentials.get(&id).cloned())
    }

    async fn save_credential(&self, credential: &Credential) -> Result<(), Error> {
        let credential = credential.clone();
        self.mutate(|t| {
            t.credentials.insert(credential.id, credential);
        })
        .await
    }

    async fn get_record(&self, id: RecordId) -> Result<Option<Record>, Error> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn records_for_domain(&self, domain_id: DomainId) -> Result<Vec<Record>, Error> {
        let guard = self.state.read().await;
        Ok(guard
            .records
            .values()
            .filter(|r| r.domain_id == domain_id)
            .cloned()
            .collect())
    }

    async fn save_record(&self, record: &Record) -> Result<(), Error> {
        let mut stored = record.clone();
        stored.sync.syncing = false;
        self.mutate(|t| {
            t.records.insert(stored.id, stored);
        })
        .await
    }

    async fn delete_record(&self, id: RecordId) -> Result<Option<Record>, Error> {
        if !self.state.read().await.records.contains_key(&id) {
            return Ok(None);
        }
        self.mutate(|t| t.records.remove(&id)).await
    }

    async fn save_snapshot(&self, snapshot: &AnalyticsSnapshot) -> Result<(), Error> {
        let snapshot = snapshot.clone();
        self.mutate(|t| t.snapshots.push(snapshot)).await
    }

    async fn snapshots_for_domain(
        &self,
        domain_id: DomainId,
    ) -> Result<Vec<AnalyticsSnapshot>, Error> {
        let guard = self.state.read().await;
        let mut snapshots: Vec<AnalyticsSnapshot> = guard
            .snapshots
            .iter()
            .filter(|s| s.domain_id == domain_id)
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| s.captured_at);
        Ok(snapshots)
    }

    async fn purge_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<usize, Error> {
        let expired = self
            .state
            .read()
            .await
            .snapshots
            .iter()
            .filter(|s| s.is_older_than(cutoff))
            .count();
        if expired == 0 {
            return Ok(0);
        }
        self.mutate(|t| t.snapshots.retain(|s| !s.is_older_than(cutoff)))
            .await?;
        Ok(expired)
    }

    async fn flush(&self) -> Result<(), Error> {
        if self.state.read().await.dirty {
            self.persist().await
        } else {
            Ok(())
        }
    }
}
