// # DNS Records
//
// A record is a local intent: what the zone *should* contain. The sync
// metadata next to it says whether the provider is known to hold the
// same values.
//
// ## Sync State
//
// - `remote_id`: set once the provider has assigned an identifier
// - `synced`: last known local values equal the last confirmed push
// - `syncing`: in-flight marker for the orchestrator, never persisted

use super::domain::DomainId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// TTL value the provider treats as "automatic"
pub const AUTOMATIC_TTL: u32 = 1;

/// Identifier of a [`Record`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Txt,
    Mx,
    Ns,
    Srv,
    Caa,
}

impl RecordType {
    /// Wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Srv => "SRV",
            RecordType::Caa => "CAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields a local update may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    RecordType,
    Host,
    Content,
    Ttl,
    Proxied,
    RemoteId,
    Synced,
}

impl RecordField {
    /// Whether a change to this field makes the remote copy stale
    pub fn affects_remote(&self) -> bool {
        matches!(
            self,
            RecordField::RecordType
                | RecordField::Host
                | RecordField::Content
                | RecordField::Ttl
                | RecordField::Proxied
        )
    }
}

/// Synchronization metadata carried by every record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Provider-assigned identifier, `None` until known to exist remotely
    #[serde(default)]
    pub remote_id: Option<String>,

    /// Local values match the last confirmed remote state
    #[serde(default)]
    pub synced: bool,

    /// A reconciliation call is in flight for this record
    #[serde(skip)]
    pub syncing: bool,
}

/// A single DNS record intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Local identifier
    pub id: RecordId,
    /// Owning domain
    pub domain_id: DomainId,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Host label relative to the zone ("@" for the apex)
    pub host: String,
    /// Record content (address, target, text...)
    pub content: String,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Route through the provider's proxy
    #[serde(default)]
    pub proxied: bool,
    /// Synchronization metadata
    #[serde(flatten)]
    pub sync: SyncState,
}

impl Record {
    /// Create a new, never-synced record
    pub fn new(
        id: RecordId,
        domain_id: DomainId,
        record_type: RecordType,
        host: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            domain_id,
            record_type,
            host: host.into(),
            content: content.into(),
            ttl: AUTOMATIC_TTL,
            proxied: false,
            sync: SyncState::default(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the proxy flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    /// Mark the record as already known remotely
    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.sync.remote_id = Some(remote_id.into());
        self
    }

    /// Fully-qualified name of the record inside `domain_name`
    pub fn fqdn(&self, domain_name: &str) -> String {
        let host = self.host.trim_end_matches('.');
        if host.is_empty() || host == "@" {
            domain_name.to_string()
        } else {
            format!("{}.{}", host, domain_name)
        }
    }

    /// Remote identity is known and the last push was confirmed
    pub fn is_reconciled(&self) -> bool {
        self.sync.remote_id.is_some() && self.sync.synced
    }
}
