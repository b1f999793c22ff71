// # Remote Zone API Trait
//
// Defines the four provider calls the reconciliation engine consumes.
//
// ## Implementations
//
// - Cloudflare: `zonesync-provider-cloudflare` crate
//
// ## Response Envelope
//
// Every call answers with an [`ApiResponse`]: a success indicator, an
// optional result and an optional list of errors. Implementations return
// the envelope as received; deciding whether it is a failure is the
// engine's job (see `Reconciler`). An `Err` from these methods means the
// call never produced an envelope (connection refused, timeout, a
// non-JSON error page).
//
// ## Usage
//
// ```rust,ignore
// use zonesync_core::traits::{RemoteZoneApi, RecordFilter};
//
// let response = api
//     .list_records("zone-id", &RecordFilter::new(RecordType::A, "www.example.com"))
//     .await?;
// if response.success {
//     for record in response.result.unwrap_or_default() {
//         println!("{} -> {}", record.name, record.content);
//     }
// }
// ```

use crate::error::Result;
use crate::model::{Credential, Record, RecordType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The remote calls the engine can make
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteOp {
    Create,
    List,
    Update,
    Delete,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RemoteOp::Create => "create",
            RemoteOp::List => "list",
            RemoteOp::Update => "update",
            RemoteOp::Delete => "delete",
        })
    }
}

/// One error entry reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Provider error code, when given
    #[serde(default)]
    pub code: Option<i64>,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    /// Create an error entry
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Structured result of every remote call
///
/// A missing `success` field deserializes as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

impl<T> ApiResponse<T> {
    /// A successful envelope carrying `result`
    pub fn ok(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            errors: Vec::new(),
        }
    }

    /// A failed envelope carrying `errors`
    pub fn failed(errors: Vec<ApiError>) -> Self {
        Self {
            success: false,
            result: None,
            errors,
        }
    }
}

/// Record as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Provider-assigned identifier
    pub id: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Fully-qualified name
    pub name: String,
    /// Record content
    pub content: String,
    /// Time-to-live in seconds
    #[serde(default)]
    pub ttl: u32,
    /// Whether the record is proxied
    #[serde(default)]
    pub proxied: bool,
}

impl RemoteRecord {
    /// Whether the provider copy holds the same values as `record`
    pub fn matches_local(&self, record: &Record) -> bool {
        self.record_type == record.record_type
            && self.content == record.content
            && self.ttl == record.ttl
            && self.proxied == record.proxied
    }
}

/// Reference returned by a delete call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecordRef {
    pub id: String,
}

/// Field values pushed on create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Fully-qualified name
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
}

impl RecordPayload {
    /// Build the payload for `record` inside the zone `domain_name`
    pub fn from_record(record: &Record, domain_name: &str) -> Self {
        Self {
            record_type: record.record_type,
            name: record.fqdn(domain_name),
            content: record.content.clone(),
            ttl: record.ttl,
            proxied: record.proxied,
        }
    }
}

/// Filter for the conflict search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub record_type: Option<RecordType>,
    /// Fully-qualified name
    pub name: Option<String>,
}

impl RecordFilter {
    /// Filter on type and fully-qualified name
    pub fn new(record_type: RecordType, name: impl Into<String>) -> Self {
        Self {
            record_type: Some(record_type),
            name: Some(name.into()),
        }
    }
}

/// Authenticated handle to one provider account
///
/// # Trust Level: Untrusted
///
/// Implementations perform exactly one API call per method and return the
/// provider's envelope untouched. They must not retry, back off, cache
/// records or interpret the success flag; all of that is owned by the
/// engine and the resync channel.
#[async_trait]
pub trait RemoteZoneApi: Send + Sync {
    /// List records of `zone_id` matching `filter`
    async fn list_records(
        &self,
        zone_id: &str,
        filter: &RecordFilter,
    ) -> Result<ApiResponse<Vec<RemoteRecord>>>;

    /// Create a record in `zone_id`
    async fn create_record(
        &self,
        zone_id: &str,
        payload: &RecordPayload,
    ) -> Result<ApiResponse<RemoteRecord>>;

    /// Overwrite the record `record_id` in `zone_id`
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        payload: &RecordPayload,
    ) -> Result<ApiResponse<RemoteRecord>>;

    /// Delete the record `record_id` from `zone_id`
    async fn delete_record(
        &self,
        zone_id: &str,
        record_id: &str,
    ) -> Result<ApiResponse<RemoteRecordRef>>;

    /// Provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Builds authenticated handles from credentials
pub trait RemoteApiFactory: Send + Sync {
    /// Create a handle scoped to `credential`
    ///
    /// The credential has already been checked for completeness.
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn RemoteZoneApi>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_success_flag_is_failure() {
        let response: ApiResponse<RemoteRecord> =
            serde_json::from_str(r#"{"result": null, "errors": []}"#).unwrap();
        assert!(!response.success);
        assert!(response.result.is_none());
    }

    #[test]
    fn envelope_parses_provider_errors() {
        let response: ApiResponse<Vec<RemoteRecord>> = serde_json::from_str(
            r#"{"success": false, "errors": [{"code": 9109, "message": "Invalid access token"}]}"#,
        )
        .unwrap();
        assert_eq!(response.errors, vec![ApiError::new(Some(9109), "Invalid access token")]);
        assert_eq!(response.errors[0].to_string(), "[9109] Invalid access token");
    }

    #[test]
    fn payload_uses_fully_qualified_name() {
        let record = Record::new(
            crate::model::RecordId(1),
            crate::model::DomainId(1),
            RecordType::Cname,
            "blog",
            "example.net",
        )
        .with_ttl(600)
        .with_proxied(true);

        let payload = RecordPayload::from_record(&record, "example.com");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "CNAME");
        assert_eq!(json["name"], "blog.example.com");
        assert_eq!(json["ttl"], 600);
        assert_eq!(json["proxied"], true);
    }
}
