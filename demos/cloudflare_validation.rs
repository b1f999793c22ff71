// # Cloudflare Provider Real Environment Validation Tool
//
// Runs one record through the full engine against the real Cloudflare API:
// identity recovery, a replayed update, and (in live mode) removal.
//
// ## Usage
//
// ```bash
// # Dry-run mode (default - safe)
// ZONESYNC_MODE=dry-run \
// CLOUDFLARE_EMAIL=you@example.com \
// CLOUDFLARE_API_KEY=your_global_key \
// CLOUDFLARE_ZONE_ID=your_zone_id \
// ZONESYNC_DOMAIN=example.com \
// ZONESYNC_RECORD_HOST=zonesync-test \
// ZONESYNC_RECORD_CONTENT=192.0.2.1 \
// cargo run -p zonesync-demos --bin cloudflare_validation
//
// # Live mode (makes actual changes!)
// ZONESYNC_MODE=live ... cargo run -p zonesync-demos --bin cloudflare_validation
// ```
//
// ## Environment Variables
//
// Required:
// - `CLOUDFLARE_EMAIL`: Account e-mail (access key)
// - `CLOUDFLARE_API_KEY`: Global API key (secret key)
// - `CLOUDFLARE_ZONE_ID`: Zone identifier
// - `ZONESYNC_DOMAIN`: Zone apex (e.g., "example.com")
// - `ZONESYNC_RECORD_CONTENT`: Record content (e.g., an IPv4 address)
//
// Optional:
// - `ZONESYNC_RECORD_HOST`: Host label (default: zonesync-test)
// - `ZONESYNC_RECORD_TYPE`: A, AAAA, CNAME or TXT (default: A)
// - `ZONESYNC_MODE`: "dry-run" or "live" (default: dry-run)

use std::env;
use std::sync::Arc;
use zonesync_core::model::{CredentialId, DomainId, RecordId};
use zonesync_core::{
    Credential, Domain, MemoryRecordStore, Reconciler, Record, RecordLifecycle, RecordStore,
    RecordType, RemoteClientFactory, SyncOrchestrator,
};
use zonesync_provider_cloudflare::{CloudflareConnector, DEFAULT_HTTP_TIMEOUT};

fn required(name: &str) -> Result<String, Box<dyn std::error::Error>> {
    env::var(name).map_err(|_| format!("{} environment variable is required", name).into())
}

fn record_type(raw: &str) -> Result<RecordType, Box<dyn std::error::Error>> {
    match raw.to_uppercase().as_str() {
        "A" => Ok(RecordType::A),
        "AAAA" => Ok(RecordType::Aaaa),
        "CNAME" => Ok(RecordType::Cname),
        "TXT" => Ok(RecordType::Txt),
        other => Err(format!("Unsupported record type: {}", other).into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("=== Cloudflare Provider Real Environment Validation ===");

    let email = required("CLOUDFLARE_EMAIL")?;
    let api_key = required("CLOUDFLARE_API_KEY")?;
    let zone_id = required("CLOUDFLARE_ZONE_ID")?;
    let domain_name = required("ZONESYNC_DOMAIN")?;
    let content = required("ZONESYNC_RECORD_CONTENT")?;
    let host = env::var("ZONESYNC_RECORD_HOST").unwrap_or_else(|_| "zonesync-test".to_string());
    let record_type = record_type(&env::var("ZONESYNC_RECORD_TYPE").unwrap_or_else(|_| "A".to_string()))?;

    let mode = env::var("ZONESYNC_MODE").unwrap_or_else(|_| "dry-run".to_string());
    let dry_run = !mode.eq_ignore_ascii_case("live");

    if dry_run {
        tracing::warn!("Running in DRY-RUN mode - no changes will be made");
    } else {
        tracing::warn!("Running in LIVE mode - will make actual DNS changes!");
    }

    tracing::info!("Configuration:");
    tracing::info!("  Domain: {}", domain_name);
    tracing::info!("  Record: {} {}.{}", record_type, host, domain_name);
    tracing::info!("  Content: {}", content);
    tracing::info!("  Zone ID: {}", zone_id);
    tracing::info!("  Mode: {}", mode);

    tracing::info!("\n--- Step 1: Wiring the engine ---");
    let store = Arc::new(MemoryRecordStore::new());
    store
        .save_credential(&Credential::new(CredentialId(1), email, api_key))
        .await?;
    let domain = Domain::new(DomainId(1), &domain_name, zone_id).with_credential(CredentialId(1));
    store.save_domain(&domain).await?;

    let connector = CloudflareConnector::new(None, DEFAULT_HTTP_TIMEOUT, dry_run)?;
    let clients = RemoteClientFactory::new(store.clone(), Arc::new(connector));
    let orchestrator = SyncOrchestrator::new(Reconciler::new(clients), store.clone());
    tracing::info!("✓ Engine ready (API key not shown for security)");

    tracing::info!("\n--- Step 2: Identity recovery ---");
    let mut record = Record::new(RecordId(1), DomainId(1), record_type, &host, &content).with_ttl(300);
    store.save_record(&record).await?;

    if let Err(e) = orchestrator.on_record_updated(&mut record).await {
        tracing::error!("✗ Identity recovery failed: {}", e);
        return Err(e.into());
    }
    tracing::info!("✓ Remote id: {:?} (synced: {})", record.sync.remote_id, record.sync.synced);

    tracing::info!("\n--- Step 3: Replayed update ---");
    if let Err(e) = orchestrator.on_record_updated(&mut record).await {
        tracing::error!("✗ Update failed: {}", e);
        return Err(e.into());
    }
    let stored = store.get_record(RecordId(1)).await?;
    if stored.as_ref().is_some_and(|r| r.sync.remote_id == record.sync.remote_id) {
        tracing::info!("✓ Remote identity stable across replay");
    } else {
        tracing::warn!("⚠ Remote identity changed across replay");
    }

    if dry_run {
        tracing::info!("\n=== DRY-RUN COMPLETE ===");
        tracing::info!("No changes were made to DNS records.");
        tracing::info!("To make actual changes, set ZONESYNC_MODE=live");
        return Ok(());
    }

    tracing::info!("\n--- Step 4: Removal ---");
    if let Err(e) = orchestrator.on_record_deleted(&mut record).await {
        tracing::error!("✗ Removal failed: {}", e);
        return Err(e.into());
    }
    tracing::info!("✓ Record removed");

    tracing::info!("\n=== LIVE MODE COMPLETE ===");
    Ok(())
}
