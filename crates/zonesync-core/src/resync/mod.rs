//! Asynchronous resync channel
//!
//! The quiet path next to the synchronous [`RecordLifecycle`] hooks: work is
//! described by a [`ResyncMessage`], queued, and picked up by one or more
//! [`ResyncWorker`]s.
//!
//! ```text
//! ResyncQueue ──▶ mpsc ──▶ ResyncReceiver ──▶ ResyncWorker ×N
//!      ▲                                         │
//!      │   DomainResync fans out to RecordResync │
//!      ├─────────────────────────────────────────┤
//!      │   retryable failure: sleep, re-enqueue  │
//!      └─────────────────────────────────────────┘
//! ```
//!
//! Delivery is at-least-once. A record resync replays the "updated"
//! transition, which is idempotent: an unreconciled record goes through
//! identity recovery and a reconciled one gets at most one extra update.
//!
//! [`RecordLifecycle`]: crate::traits::RecordLifecycle

mod lease;
mod worker;

pub use lease::{Lease, LeaseTable};
pub use worker::{Delivery, ResyncWorker, WorkerEvent};

use crate::error::{Error, Result};
use crate::model::{DomainId, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::warn;

/// A unit of deferred reconciliation work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResyncMessage {
    /// Replay the "updated" transition for one record
    RecordResync {
        /// Record to reconcile
        record_id: RecordId,
    },

    /// Enqueue a record resync for every record of a domain
    DomainResync {
        /// Domain to fan out
        domain_id: DomainId,
    },
}

impl fmt::Display for ResyncMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResyncMessage::RecordResync { record_id } => write!(f, "record resync {}", record_id),
            ResyncMessage::DomainResync { domain_id } => write!(f, "domain resync {}", domain_id),
        }
    }
}

/// A message together with its delivery attempt (0 for the first delivery)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncEnvelope {
    pub message: ResyncMessage,
    #[serde(default)]
    pub attempt: u32,
}

impl ResyncEnvelope {
    /// First delivery of `message`
    pub fn new(message: ResyncMessage) -> Self {
        Self {
            message,
            attempt: 0,
        }
    }

    /// The same message, one attempt later
    pub fn next_attempt(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }
}

/// Create a bounded resync channel
pub fn channel(capacity: usize) -> (ResyncQueue, ResyncReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ResyncQueue {
            tx,
            in_flight: Arc::new(AtomicUsize::new(0)),
        },
        ResyncReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer side of the resync channel
#[derive(Debug, Clone)]
pub struct ResyncQueue {
    tx: mpsc::Sender<ResyncEnvelope>,
    /// Redeliveries sleeping or waiting for capacity, shared by all clones
    in_flight: Arc<AtomicUsize>,
}

impl ResyncQueue {
    /// Enqueue a first delivery, waiting for capacity
    pub async fn enqueue(&self, message: ResyncMessage) -> Result<()> {
        self.send(ResyncEnvelope::new(message)).await
    }

    /// Enqueue a first delivery without waiting
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: queued
    /// - `Ok(false)`: the queue is full
    /// - `Err(_)`: every receiver is gone
    pub fn try_enqueue(&self, message: ResyncMessage) -> Result<bool> {
        match self.tx.try_send(ResyncEnvelope::new(message)) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(false),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(closed()),
        }
    }

    /// Send an envelope as-is, waiting for capacity
    pub async fn send(&self, envelope: ResyncEnvelope) -> Result<()> {
        self.tx.send(envelope).await.map_err(|_| closed())
    }

    /// Send `envelope` again after `delay`, without blocking the caller
    ///
    /// The redelivery counts towards [`pending_redeliveries`] until it is
    /// queued or dropped.
    ///
    /// [`pending_redeliveries`]: ResyncQueue::pending_redeliveries
    pub fn redeliver(&self, envelope: ResyncEnvelope, delay: Duration) {
        let tx = self.tx.clone();
        let in_flight = InFlight::enter(&self.in_flight);
        tokio::spawn(async move {
            let _in_flight = in_flight;
            tokio::time::sleep(delay).await;
            if tx.send(envelope).await.is_err() {
                warn!(
                    attempt = envelope.attempt,
                    "Resync queue closed, dropping redelivery of {}", envelope.message
                );
            }
        });
    }

    /// Free slots in the queue
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }

    /// Redeliveries scheduled but not yet back in the queue
    ///
    /// These are lost if the runtime stops first.
    pub fn pending_redeliveries(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// One scheduled redelivery, released on drop
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn closed() -> Error {
    Error::Other("resync queue is closed".to_string())
}

/// Consumer side of the resync channel
///
/// Clones share one underlying receiver, so several workers compete for
/// messages.
#[derive(Debug, Clone)]
pub struct ResyncReceiver {
    rx: Arc<Mutex<mpsc::Receiver<ResyncEnvelope>>>,
}

impl ResyncReceiver {
    /// Wait for the next envelope; `None` once every sender is gone
    pub async fn recv(&self) -> Option<ResyncEnvelope> {
        self.rx.lock().await.recv().await
    }

    /// Take an envelope if one is ready
    pub async fn try_recv(&self) -> Option<ResyncEnvelope> {
        self.rx.lock().await.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_serialize_with_kind_tag() {
        let json = serde_json::to_value(ResyncMessage::RecordResync {
            record_id: RecordId(7),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"kind": "record_resync", "record_id": 7}));

        let parsed: ResyncEnvelope =
            serde_json::from_str(r#"{"message":{"kind":"domain_resync","domain_id":3}}"#).unwrap();
        assert_eq!(
            parsed,
            ResyncEnvelope::new(ResyncMessage::DomainResync {
                domain_id: DomainId(3)
            })
        );
    }

    #[tokio::test]
    async fn try_enqueue_reports_full_queue() {
        let (queue, rx) = channel(1);
        let msg = ResyncMessage::RecordResync {
            record_id: RecordId(1),
        };

        assert!(queue.try_enqueue(msg).unwrap());
        assert!(!queue.try_enqueue(msg).unwrap());

        assert_eq!(rx.recv().await, Some(ResyncEnvelope::new(msg)));
        drop(rx);
        assert!(queue.try_enqueue(msg).is_err());
    }

    #[tokio::test]
    async fn redelivery_arrives_after_delay() {
        let (queue, rx) = channel(4);
        let envelope = ResyncEnvelope::new(ResyncMessage::RecordResync {
            record_id: RecordId(1),
        })
        .next_attempt();

        queue.redeliver(envelope, Duration::from_millis(10));
        assert!(rx.try_recv().await.is_none());

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(received.map(|e| e.attempt), Some(1));
    }

    #[tokio::test]
    async fn scheduled_redeliveries_are_counted_until_queued() {
        let (queue, rx) = channel(4);
        let envelope = ResyncEnvelope::new(ResyncMessage::DomainResync {
            domain_id: DomainId(1),
        });

        queue.redeliver(envelope, Duration::from_millis(50));
        queue.clone().redeliver(envelope.next_attempt(), Duration::from_secs(3600));
        assert_eq!(queue.pending_redeliveries(), 2);

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(received, Some(envelope));

        // The send completes before the task releases its slot
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.pending_redeliveries(), 1);
    }
}
