//! Resync worker
//!
//! Consumes envelopes from a [`ResyncReceiver`] and settles each one:
//!
//! ```text
//! envelope ──▶ RecordResync ──▶ lease ──▶ reload ──▶ on_record_updated
//!    │                            │ held: redeliver, same attempt
//!    └──────▶ DomainResync ──▶ valid? ──▶ try_enqueue each record
//!                                          │ full: resync inline
//!
//! result ──▶ Ok                                ──▶ acknowledged
//!        ──▶ retryable && attempt+1 < max      ──▶ redelivered with backoff
//!        ──▶ otherwise                         ──▶ abandoned (error log + event)
//! ```

use super::{LeaseTable, ResyncEnvelope, ResyncMessage, ResyncQueue, ResyncReceiver};
use crate::config::ResyncConfig;
use crate::error::{Error, Result};
use crate::model::{DomainId, RecordId};
use crate::traits::{RecordLifecycle, RecordStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Events emitted by resync workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// A record went through the "updated" transition
    RecordReconciled { record_id: RecordId },

    /// A domain's records were handed to the queue (or resynced inline)
    DomainFannedOut {
        domain_id: DomainId,
        queued: usize,
        inline: usize,
    },

    /// A failed delivery will be retried
    RedeliveryScheduled {
        message: ResyncMessage,
        attempt: u32,
        delay: Duration,
    },

    /// Another worker holds the record's lease
    LeaseContended { record_id: RecordId },

    /// A delivery was given up on
    Abandoned {
        message: ResyncMessage,
        attempt: u32,
        error: String,
    },
}

/// How a delivery was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Done; nothing further will happen for this envelope
    Acknowledged,
    /// Scheduled to arrive again after `delay`
    Redelivered { delay: Duration },
    /// Dropped after a non-retryable error or the last allowed attempt
    Abandoned,
}

/// Outcome of the work itself, before redelivery policy
enum Step {
    Done,
    Contended(RecordId),
}

/// A resync channel consumer
///
/// Workers are cheap to clone; clones share the lease table, queue and
/// event channel, so a pool is built by cloning one worker.
#[derive(Clone)]
pub struct ResyncWorker {
    id: usize,
    lifecycle: Arc<dyn RecordLifecycle>,
    store: Arc<dyn RecordStore>,
    queue: ResyncQueue,
    leases: Arc<LeaseTable>,
    config: ResyncConfig,
    event_tx: mpsc::Sender<WorkerEvent>,
}

impl ResyncWorker {
    /// Create a worker
    ///
    /// # Returns
    ///
    /// A tuple of (worker, event_receiver) where event_receiver yields worker events
    pub fn new(
        lifecycle: Arc<dyn RecordLifecycle>,
        store: Arc<dyn RecordStore>,
        queue: ResyncQueue,
        config: ResyncConfig,
    ) -> (Self, mpsc::Receiver<WorkerEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let worker = Self {
            id: 0,
            lifecycle,
            store,
            queue,
            leases: Arc::new(LeaseTable::new()),
            config,
            event_tx,
        };
        (worker, event_rx)
    }

    /// The same worker under another id (used in logs)
    pub fn with_id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    /// Leases shared by this worker's pool
    pub fn leases(&self) -> &Arc<LeaseTable> {
        &self.leases
    }

    /// Process envelopes until Ctrl-C
    pub async fn run(&self, rx: ResyncReceiver) -> Result<()> {
        self.run_internal(rx, None).await
    }

    /// Process envelopes until `shutdown_rx` fires (or Ctrl-C when `None`)
    ///
    /// An envelope already being processed is finished before returning.
    pub async fn run_with_shutdown(
        &self,
        rx: ResyncReceiver,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(rx, shutdown_rx).await
    }

    async fn run_internal(
        &self,
        rx: ResyncReceiver,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        info!(worker = self.id, "Resync worker started");

        if let Some(mut shutdown) = shutdown_rx {
            loop {
                tokio::select! {
                    biased;

                    _ = &mut shutdown => {
                        info!(worker = self.id, "Shutdown signal received");
                        break;
                    }

                    // Never `None`: this worker's own queue handle keeps the channel open
                    next = rx.recv() => if let Some(envelope) = next {
                        self.process(envelope).await;
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!(worker = self.id, "Shutdown signal received");
                        break;
                    }

                    // Never `None`: this worker's own queue handle keeps the channel open
                    next = rx.recv() => if let Some(envelope) = next {
                        self.process(envelope).await;
                    }
                }
            }
        }

        let pending = self.queue.pending_redeliveries();
        if pending > 0 {
            warn!(
                worker = self.id,
                pending,
                "Resync worker stopped with redeliveries scheduled"
            );
        } else {
            info!(worker = self.id, "Resync worker stopped");
        }
        Ok(())
    }

    /// Handle one delivery and apply the redelivery policy
    pub async fn process(&self, envelope: ResyncEnvelope) -> Delivery {
        debug!(
            worker = self.id,
            attempt = envelope.attempt,
            "Processing {}",
            envelope.message
        );

        let result = match envelope.message {
            ResyncMessage::RecordResync { record_id } => self.resync_record(record_id).await,
            ResyncMessage::DomainResync { domain_id } => self.fan_out(domain_id).await,
        };
        self.settle(envelope, result)
    }

    async fn resync_record(&self, record_id: RecordId) -> Result<Step> {
        let Some(_lease) = self.leases.try_acquire(record_id, self.config.lease_ttl()) else {
            return Ok(Step::Contended(record_id));
        };

        let Some(mut record) = self.store.get_record(record_id).await? else {
            debug!(record = %record_id, "Record no longer exists, acknowledging resync");
            return Ok(Step::Done);
        };

        self.lifecycle.on_record_updated(&mut record).await?;
        self.emit_event(WorkerEvent::RecordReconciled { record_id });
        Ok(Step::Done)
    }

    async fn fan_out(&self, domain_id: DomainId) -> Result<Step> {
        let Some(domain) = self.store.get_domain(domain_id).await? else {
            debug!(domain_id = %domain_id, "Domain no longer exists, acknowledging resync");
            return Ok(Step::Done);
        };

        if !domain.valid {
            warn!(domain = %domain.name, "Domain is flagged invalid, skipping resync");
            return Ok(Step::Done);
        }

        let records = self.store.records_for_domain(domain_id).await?;
        let (mut queued, mut inline) = (0, 0);

        for record in records {
            let message = ResyncMessage::RecordResync {
                record_id: record.id,
            };
            if self.queue.try_enqueue(message)? {
                queued += 1;
                continue;
            }

            debug!(record = %record.id, "Resync queue full, reconciling inline");
            inline += 1;
            let result = self.resync_record(record.id).await;
            self.settle(ResyncEnvelope::new(message), result);
        }

        info!(
            domain = %domain.name,
            queued, inline, "Fanned out domain resync"
        );
        self.emit_event(WorkerEvent::DomainFannedOut {
            domain_id,
            queued,
            inline,
        });
        Ok(Step::Done)
    }

    fn settle(&self, envelope: ResyncEnvelope, result: Result<Step>) -> Delivery {
        match result {
            Ok(Step::Done) => Delivery::Acknowledged,
            Ok(Step::Contended(record_id)) => {
                // Contention is not the message's fault; the attempt is not counted
                let delay = self.config.base_delay();
                debug!(record = %record_id, "Record lease held elsewhere, redelivering");
                self.emit_event(WorkerEvent::LeaseContended { record_id });
                self.queue.redeliver(envelope, delay);
                Delivery::Redelivered { delay }
            }
            Err(e) if e.is_retryable() && envelope.attempt + 1 < self.config.max_deliveries => {
                let delay = self.config.redelivery_delay(envelope.attempt);
                warn!(
                    worker = self.id,
                    attempt = envelope.attempt,
                    "{} failed, redelivering in {:?}: {}",
                    envelope.message, delay, e
                );
                let next = envelope.next_attempt();
                self.emit_event(WorkerEvent::RedeliveryScheduled {
                    message: next.message,
                    attempt: next.attempt,
                    delay,
                });
                self.queue.redeliver(next, delay);
                Delivery::Redelivered { delay }
            }
            Err(e) => {
                self.abandon(envelope, &e);
                Delivery::Abandoned
            }
        }
    }

    fn abandon(&self, envelope: ResyncEnvelope, err: &Error) {
        error!(
            worker = self.id,
            attempt = envelope.attempt,
            kind = ?err.kind(),
            "Abandoning {}: {}",
            envelope.message, err
        );
        self.emit_event(WorkerEvent::Abandoned {
            message: envelope.message,
            attempt: envelope.attempt,
            error: err.to_string(),
        });
    }

    fn emit_event(&self, event: WorkerEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Worker event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
