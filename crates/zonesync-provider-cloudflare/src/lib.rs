// # Cloudflare Remote Zone API
//
// This crate implements the zonesync `RemoteZoneApi` trait against the
// Cloudflare API v4.
//
// ## Scope
//
// Exactly the four calls the reconciliation engine makes:
//
// - List:   GET    `/zones/:zone_id/dns_records?type=..&name=..`
// - Create: POST   `/zones/:zone_id/dns_records`
// - Update: PUT    `/zones/:zone_id/dns_records/:record_id`
// - Delete: DELETE `/zones/:zone_id/dns_records/:record_id`
//
// ## Trust Level: Untrusted (Remote Provider)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS API calls to the configured API base only
// - ✅ Parse Cloudflare response envelopes
//
// **Forbidden Capabilities**:
// - ❌ Interpret the `success` flag (owned by `Reconciler`)
// - ❌ Retry, back off or rate limit (owned by the resync channel)
// - ❌ Spawn tasks or cache records
//
// ## Error Mapping
//
// Cloudflare answers most failures with a JSON envelope, 4xx included;
// that envelope is returned as-is so the engine's validation gate sees the
// provider's own error codes. Only a body that is not an envelope becomes
// an `Err`, classified by HTTP status (401/403, 404, 409, 429, 5xx).
//
// ## Security Requirements
//
// - The secret key NEVER appears in logs or `Debug` output
// - Keys come from the record store's credentials, never from config files

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use zonesync_core::config::ProviderConfig;
use zonesync_core::model::Credential;
use zonesync_core::traits::{
    ApiResponse, RecordFilter, RecordPayload, RemoteApiFactory, RemoteOp, RemoteRecord,
    RemoteRecordRef, RemoteZoneApi,
};
use zonesync_core::{Error, Result};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable selecting live or dry-run mode
pub const MODE_ENV: &str = "ZONESYNC_MODE";

/// Longest body excerpt carried into an error message
const BODY_EXCERPT: usize = 200;

/// Cloudflare handle bound to one access/secret key pair
///
/// # Dry-Run Mode
///
/// When `dry_run` is true the client:
/// - Performs list requests normally
/// - Logs the intended create, update and delete payloads
/// - Returns a synthesized success envelope without sending them
pub struct CloudflareClient {
    /// Account e-mail, sent as `X-Auth-Email`
    access_key: String,

    /// Global API key, sent as `X-Auth-Key`
    /// ⚠️ NEVER log this value
    secret_key: String,

    api_base: String,

    /// Shared with every other handle of the same connector
    client: reqwest::Client,

    dry_run: bool,
}

impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareClient {
    /// Bind `client` to the key pair of `credential`
    ///
    /// # Errors
    ///
    /// `IncompleteCredential` when either key is absent or blank.
    pub fn new(
        credential: &Credential,
        api_base: impl Into<String>,
        client: reqwest::Client,
        dry_run: bool,
    ) -> Result<Self> {
        let (Some(access), Some(secret)) = (credential.access(), credential.secret()) else {
            return Err(Error::incomplete_credential(
                "cloudflare",
                credential.id.to_string(),
                credential.missing_part().unwrap_or("key pair"),
            ));
        };

        Ok(Self {
            access_key: access.to_string(),
            secret_key: secret.to_string(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
            dry_run,
        })
    }

    /// Whether mutating calls are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/dns_records", self.api_base, zone_id)
    }

    fn record_url(&self, zone_id: &str, record_id: &str) -> String {
        format!("{}/zones/{}/dns_records/{}", self.api_base, zone_id, record_id)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("X-Auth-Email", &self.access_key)
            .header("X-Auth-Key", &self.secret_key)
            .header("Content-Type", "application/json")
    }

    /// Send one request and decode the Cloudflare envelope
    async fn send<T: DeserializeOwned>(
        &self,
        op: RemoteOp,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("Cloudflare {} request failed: {}", op, e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Error::http(format!("Failed to read Cloudflare {} response: {}", op, e))
        })?;

        match serde_json::from_str::<ApiResponse<T>>(&body) {
            Ok(envelope) => {
                if !status.is_success() {
                    tracing::debug!(
                        status = status.as_u16(),
                        "Cloudflare {} returned an error envelope",
                        op
                    );
                }
                Ok(envelope)
            }
            Err(e) if status.is_success() => Err(Error::http(format!(
                "Failed to parse Cloudflare {} response: {}",
                op, e
            ))),
            Err(_) => Err(status_error(op, status, &body)),
        }
    }

    fn log_dry_run(&self, method: &str, url: &str, payload: Option<&RecordPayload>) {
        match payload {
            Some(payload) => tracing::info!(
                "[DRY-RUN] Would send {} {} with payload: {}",
                method,
                url,
                serde_json::to_string(payload).unwrap_or_default()
            ),
            None => tracing::info!("[DRY-RUN] Would send {} {}", method, url),
        }
    }
}

/// Classify a response that carried no envelope
fn status_error(op: RemoteOp, status: StatusCode, body: &str) -> Error {
    let excerpt: String = body.chars().take(BODY_EXCERPT).collect();
    let detail = match status.as_u16() {
        401 | 403 => "Authentication failed: invalid key pair or insufficient permissions".to_string(),
        404 => "Zone or record not found".to_string(),
        409 => "Conflict: record is being changed by another request".to_string(),
        429 => "Rate limit exceeded".to_string(),
        500..=599 => format!("Cloudflare server error (transient): {}", excerpt),
        _ => format!("Unexpected response: {}", excerpt),
    };
    Error::http(format!("Cloudflare {} failed with {}: {}", op, status, detail))
}

fn echo(id: impl Into<String>, payload: &RecordPayload) -> RemoteRecord {
    RemoteRecord {
        id: id.into(),
        record_type: payload.record_type,
        name: payload.name.clone(),
        content: payload.content.clone(),
        ttl: payload.ttl,
        proxied: payload.proxied,
    }
}

#[async_trait]
impl RemoteZoneApi for CloudflareClient {
    async fn list_records(
        &self,
        zone_id: &str,
        filter: &RecordFilter,
    ) -> Result<ApiResponse<Vec<RemoteRecord>>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(record_type) = filter.record_type {
            query.push(("type", record_type.as_str().to_string()));
        }
        if let Some(name) = &filter.name {
            query.push(("name", name.clone()));
        }

        tracing::debug!(zone = zone_id, ?filter, "Listing Cloudflare DNS records");
        let request = self
            .request(Method::GET, &self.records_url(zone_id))
            .query(&query);
        self.send(RemoteOp::List, request).await
    }

    async fn create_record(
        &self,
        zone_id: &str,
        payload: &RecordPayload,
    ) -> Result<ApiResponse<RemoteRecord>> {
        let url = self.records_url(zone_id);
        if self.dry_run {
            self.log_dry_run("POST", &url, Some(payload));
            let id = format!("dry-run-{}-{}", payload.record_type, payload.name);
            return Ok(ApiResponse::ok(echo(id, payload)));
        }

        let request = self.request(Method::POST, &url).json(payload);
        self.send(RemoteOp::Create, request).await
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        payload: &RecordPayload,
    ) -> Result<ApiResponse<RemoteRecord>> {
        let url = self.record_url(zone_id, record_id);
        if self.dry_run {
            self.log_dry_run("PUT", &url, Some(payload));
            return Ok(ApiResponse::ok(echo(record_id, payload)));
        }

        let request = self.request(Method::PUT, &url).json(payload);
        self.send(RemoteOp::Update, request).await
    }

    async fn delete_record(
        &self,
        zone_id: &str,
        record_id: &str,
    ) -> Result<ApiResponse<RemoteRecordRef>> {
        let url = self.record_url(zone_id, record_id);
        if self.dry_run {
            self.log_dry_run("DELETE", &url, None);
            return Ok(ApiResponse::ok(RemoteRecordRef {
                id: record_id.to_string(),
            }));
        }

        let request = self.request(Method::DELETE, &url);
        self.send(RemoteOp::Delete, request).await
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Builds [`CloudflareClient`] handles sharing one HTTP connection pool
#[derive(Debug, Clone)]
pub struct CloudflareConnector {
    api_base: String,
    client: reqwest::Client,
    dry_run: bool,
}

impl CloudflareConnector {
    /// Create a connector with its own HTTP client
    ///
    /// # Parameters
    ///
    /// - `api_base`: API base URL, `None` for the public Cloudflare endpoint
    /// - `timeout`: per-request timeout
    /// - `dry_run`: log mutating calls instead of sending them
    pub fn new(api_base: Option<String>, timeout: Duration, dry_run: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::from_reqwest(
            api_base.as_deref().unwrap_or(CLOUDFLARE_API_BASE),
            client,
            dry_run,
        ))
    }

    /// Create a connector around an existing HTTP client
    pub fn from_reqwest(api_base: &str, client: reqwest::Client, dry_run: bool) -> Self {
        Self {
            api_base: api_base.to_string(),
            client,
            dry_run,
        }
    }

    /// Create a connector from provider settings
    ///
    /// `ZONESYNC_MODE=dry-run` forces dry-run mode regardless of the settings.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;

        let dry_run = config.dry_run || dry_run_requested();
        if dry_run {
            tracing::warn!("Cloudflare connector running in DRY-RUN mode - no changes will be made");
        }

        Self::new(config.api_base.clone(), config.timeout(), dry_run)
    }

    /// Whether handles from this connector only log mutating calls
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

impl Default for CloudflareConnector {
    fn default() -> Self {
        Self::from_reqwest(CLOUDFLARE_API_BASE, reqwest::Client::new(), false)
    }
}

impl RemoteApiFactory for CloudflareConnector {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn RemoteZoneApi>> {
        let client = CloudflareClient::new(
            credential,
            self.api_base.clone(),
            self.client.clone(),
            self.dry_run,
        )?;
        Ok(Arc::new(client))
    }
}

/// Whether `ZONESYNC_MODE` asks for dry-run mode
pub fn dry_run_requested() -> bool {
    std::env::var(MODE_ENV)
        .map(|mode| mode.trim().eq_ignore_ascii_case("dry-run"))
        .unwrap_or(false)
}
