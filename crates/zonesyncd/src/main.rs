// # zonesyncd - Zone Sync Daemon
//
// Thin integration layer: everything this binary does is wiring. Record
// transitions live in `zonesync_core::SyncOrchestrator`, delivery policy in
// `zonesync_core::ResyncWorker`, HTTP in `zonesync-provider-cloudflare`.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing tracing and the runtime
// 3. Building the record store, provider connector and orchestrator
// 4. Running the resync workers
// 5. Queueing a domain resync for every valid domain on an interval
// 6. Purging expired analytics snapshots on an interval
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Record Store
// - `ZONESYNC_STORE_TYPE`: Type of record store (file, memory)
// - `ZONESYNC_STORE_PATH`: Path to the store file (for file store)
//
// ### Provider
// - `ZONESYNC_API_BASE`: Cloudflare API base URL (optional)
// - `ZONESYNC_HTTP_TIMEOUT_SECS`: Per-request timeout
// - `ZONESYNC_MODE`: `live` or `dry-run`
//
// ### Resync Channel
// - `ZONESYNC_WORKERS`: Number of worker tasks
// - `ZONESYNC_QUEUE_CAPACITY`: Bounded queue size
// - `ZONESYNC_MAX_DELIVERIES`: Deliveries before a message is abandoned
// - `ZONESYNC_REDELIVERY_DELAY_MS`: Base redelivery delay
// - `ZONESYNC_LEASE_TTL_SECS`: Per-record lease lifetime
// - `ZONESYNC_RESYNC_INTERVAL_SECS`: Interval between full resyncs (0 disables)
//
// ### Analytics
// - `ZONESYNC_ANALYTICS_RETENTION_DAYS`: Days of snapshots to keep (0 keeps all)
//
// ## Example
//
// ```bash
// export ZONESYNC_STORE_TYPE=file
// export ZONESYNC_STORE_PATH=/var/lib/zonesync/store.json
// export ZONESYNC_WORKERS=4
// export ZONESYNC_MODE=dry-run
//
// zonesyncd
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Interval;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use zonesync_core::config::{
    AnalyticsConfig, ProviderConfig, ResyncConfig, StoreConfig, SyncConfig,
};
use zonesync_core::resync::{self, ResyncQueue};
use zonesync_core::traits::RecordStore;
use zonesync_core::{
    FileRecordStore, MemoryRecordStore, Reconciler, RemoteClientFactory, ResyncMessage,
    ResyncWorker, SyncOrchestrator, WorkerEvent,
};
use zonesync_provider_cloudflare::CloudflareConnector;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long running deliveries get to finish after a shutdown signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum ZonesyncExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<ZonesyncExitCode> for ExitCode {
    fn from(code: ZonesyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon settings: the core configuration plus the log level
struct Settings {
    sync: SyncConfig,
    log_level: String,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        let store = match env::var("ZONESYNC_STORE_TYPE")
            .unwrap_or_else(|_| "file".to_string())
            .as_str()
        {
            "file" => StoreConfig::File {
                path: env::var("ZONESYNC_STORE_PATH").map_err(|_| {
                    anyhow::anyhow!(
                        "ZONESYNC_STORE_PATH is required when ZONESYNC_STORE_TYPE=file. \
                        Set it via: export ZONESYNC_STORE_PATH=/var/lib/zonesync/store.json"
                    )
                })?,
            },
            "memory" => StoreConfig::Memory,
            other => anyhow::bail!(
                "ZONESYNC_STORE_TYPE '{}' is not supported. Supported types: file, memory",
                other
            ),
        };

        let defaults = ProviderConfig::default();
        let provider = ProviderConfig {
            api_base: env::var("ZONESYNC_API_BASE").ok().filter(|s| !s.is_empty()),
            timeout_secs: env_or("ZONESYNC_HTTP_TIMEOUT_SECS", defaults.timeout_secs)?,
            dry_run: match env::var("ZONESYNC_MODE").as_deref() {
                Err(_) | Ok("live") => false,
                Ok("dry-run") => true,
                Ok(other) => anyhow::bail!(
                    "ZONESYNC_MODE '{}' is not valid. Valid modes: live, dry-run",
                    other
                ),
            },
            cache_clients: defaults.cache_clients,
        };

        let defaults = ResyncConfig::default();
        let resync = ResyncConfig {
            workers: env_or("ZONESYNC_WORKERS", defaults.workers)?,
            queue_capacity: env_or("ZONESYNC_QUEUE_CAPACITY", defaults.queue_capacity)?,
            max_deliveries: env_or("ZONESYNC_MAX_DELIVERIES", defaults.max_deliveries)?,
            redelivery_delay_ms: env_or(
                "ZONESYNC_REDELIVERY_DELAY_MS",
                defaults.redelivery_delay_ms,
            )?,
            lease_ttl_secs: env_or("ZONESYNC_LEASE_TTL_SECS", defaults.lease_ttl_secs)?,
            resync_interval_secs: env_or(
                "ZONESYNC_RESYNC_INTERVAL_SECS",
                defaults.resync_interval_secs,
            )?,
            ..defaults
        };

        let defaults = AnalyticsConfig::default();
        let analytics = AnalyticsConfig {
            retention_days: env_or("ZONESYNC_ANALYTICS_RETENTION_DAYS", defaults.retention_days)?,
            ..defaults
        };

        Ok(Self {
            sync: SyncConfig {
                store,
                provider,
                resync,
                analytics,
            },
            log_level: env::var("ZONESYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the settings
    fn validate(&self) -> Result<()> {
        self.sync.validate()?;

        if let StoreConfig::File { path } = &self.sync.store
            && let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "ZONESYNC_STORE_PATH parent directory does not exist: {}. \
                Create it first: sudo mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        if let Some(url) = &self.sync.provider.api_base
            && url.starts_with("http://")
        {
            eprintln!(
                "WARNING: ZONESYNC_API_BASE uses HTTP (not HTTPS). \
                Credentials will be sent in clear text."
            );
        }

        if parse_level(&self.log_level).is_none() {
            anyhow::bail!(
                "ZONESYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        Ok(())
    }
}

/// Parse `name` if set, otherwise use `default`
fn env_or<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ZonesyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = settings.validate() {
        eprintln!("Configuration validation error: {}", e);
        return ZonesyncExitCode::ConfigError.into();
    }

    let log_level = parse_level(&settings.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ZonesyncExitCode::ConfigError.into();
    }

    info!("Starting zonesyncd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ZonesyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(settings.sync).await {
            Ok(()) => ZonesyncExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {}", e);
                ZonesyncExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: SyncConfig) -> Result<()> {
    let store: Arc<dyn RecordStore> = match &config.store {
        StoreConfig::File { path } => {
            info!(path = %path, "Using file record store");
            Arc::new(FileRecordStore::new(path).await?)
        }
        StoreConfig::Memory => {
            warn!("Using in-memory record store: nothing survives a restart");
            Arc::new(MemoryRecordStore::new())
        }
    };

    let connector = Arc::new(CloudflareConnector::from_config(&config.provider)?);
    let clients = if config.provider.cache_clients {
        RemoteClientFactory::new(store.clone(), connector)
    } else {
        RemoteClientFactory::without_cache(store.clone(), connector)
    };
    let orchestrator = Arc::new(SyncOrchestrator::new(
        Reconciler::new(clients),
        store.clone(),
    ));

    let (queue, rx) = resync::channel(config.resync.queue_capacity);
    let (worker, events) = ResyncWorker::new(
        orchestrator,
        store.clone(),
        queue.clone(),
        config.resync.clone(),
    );

    let mut workers: Vec<(oneshot::Sender<()>, JoinHandle<()>)> = Vec::new();
    for id in 0..config.resync.workers {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = worker.clone().with_id(id);
        let rx = rx.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = worker.run_with_shutdown(rx, Some(shutdown_rx)).await {
                error!(worker = id, "Resync worker failed: {}", e);
            }
        });
        workers.push((shutdown_tx, handle));
    }
    drop(worker);
    info!("Started {} resync worker(s)", workers.len());

    let event_log = tokio::spawn(log_events(events));

    let mut resync_tick = config.resync.resync_interval().map(tokio::time::interval);
    let mut purge_tick = config
        .analytics
        .retention()
        .map(|_| tokio::time::interval(config.analytics.purge_interval()));

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                info!("Received shutdown signal: {}", signal?);
                break;
            }

            _ = tick(&mut resync_tick) => {
                if let Err(e) = queue_domain_resyncs(store.as_ref(), &queue).await {
                    error!("Failed to queue domain resyncs: {}", e);
                }
            }

            _ = tick(&mut purge_tick) => {
                if let Some(retention) = config.analytics.retention()
                    && let Err(e) = zonesync_core::analytics::purge_expired(
                        store.as_ref(),
                        retention,
                        chrono::Utc::now(),
                    )
                    .await
                {
                    error!("Analytics purge failed: {}", e);
                }
            }
        }
    }

    info!("Shutting down resync workers");
    for (shutdown_tx, handle) in workers {
        let _ = shutdown_tx.send(());
        if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
            warn!("Resync worker did not stop within {:?}", DRAIN_TIMEOUT);
        }
    }
    event_log.abort();

    let pending = queue.pending_redeliveries();
    if pending > 0 {
        // Not persisted; the periodic domain resync picks these records up after restart
        warn!(pending, "Dropping scheduled redeliveries at shutdown");
    }

    store.flush().await?;
    info!("Shutdown complete");
    Ok(())
}

/// Wait for the next tick, forever when the interval is disabled
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Queue a domain resync for every valid domain
async fn queue_domain_resyncs(store: &dyn RecordStore, queue: &ResyncQueue) -> Result<()> {
    let domains = store.list_domains().await?;
    let mut queued = 0;

    for domain in domains.iter().filter(|d| d.valid) {
        queue
            .enqueue(ResyncMessage::DomainResync {
                domain_id: domain.id,
            })
            .await?;
        queued += 1;
    }

    info!(
        "Queued domain resync for {} of {} domain(s)",
        queued,
        domains.len()
    );
    Ok(())
}

/// Turn worker events into log lines
async fn log_events(mut events: tokio::sync::mpsc::Receiver<WorkerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::RecordReconciled { record_id } => {
                debug!(record = %record_id, "Record reconciled");
            }
            WorkerEvent::DomainFannedOut {
                domain_id,
                queued,
                inline,
            } => {
                info!(domain = %domain_id, queued, inline, "Domain resync fanned out");
            }
            WorkerEvent::RedeliveryScheduled {
                message,
                attempt,
                delay,
            } => {
                info!(attempt, ?delay, "Redelivery scheduled for {}", message);
            }
            WorkerEvent::LeaseContended { record_id } => {
                debug!(record = %record_id, "Record lease held elsewhere");
            }
            WorkerEvent::Abandoned {
                message,
                attempt,
                error,
            } => {
                warn!(attempt, "Gave up on {}: {}", message, error);
            }
        }
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
