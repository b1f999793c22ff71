//! Per-record leases shared by the workers of one process

use crate::model::RecordId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct Holder {
    token: u64,
    expires_at: Instant,
}

/// In-process mutual exclusion for record transitions
///
/// A lease expires after its TTL so that a stuck worker cannot block a
/// record forever; an expired lease may be taken over by another worker.
#[derive(Debug, Default)]
pub struct LeaseTable {
    held: Mutex<HashMap<RecordId, Holder>>,
    next_token: AtomicU64,
}

impl LeaseTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease for `record_id`, or `None` while someone else holds it
    pub fn try_acquire(&self, record_id: RecordId, ttl: Duration) -> Option<Lease<'_>> {
        let now = Instant::now();
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(holder) = held.get(&record_id) {
            if holder.expires_at > now {
                return None;
            }
            debug!(record = %record_id, "Taking over expired lease");
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        held.insert(
            record_id,
            Holder {
                token,
                expires_at: now + ttl,
            },
        );

        Some(Lease {
            table: self,
            record_id,
            token,
        })
    }

    /// Whether an unexpired lease exists for `record_id`
    pub fn is_held(&self, record_id: RecordId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&record_id)
            .is_some_and(|holder| holder.expires_at > Instant::now())
    }
}

/// A held lease; released on drop
#[derive(Debug)]
pub struct Lease<'a> {
    table: &'a LeaseTable,
    record_id: RecordId,
    token: u64,
}

impl Lease<'_> {
    /// The leased record
    pub fn record_id(&self) -> RecordId {
        self.record_id
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        let mut held = self.table.held.lock().unwrap_or_else(PoisonError::into_inner);
        // A lease taken over after expiry belongs to the new holder
        if held.get(&self.record_id).map(|h| h.token) == Some(self.token) {
            held.remove(&self.record_id);
        }
    }
}
