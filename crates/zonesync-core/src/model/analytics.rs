//! Per-domain usage statistics

use super::domain::DomainId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Usage statistics for one domain at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub domain_id: DomainId,
    pub captured_at: DateTime<Utc>,
    pub requests: u64,
    pub bandwidth_bytes: u64,
    pub threats: u64,
    pub unique_visitors: u64,
}

impl AnalyticsSnapshot {
    /// Create an empty snapshot captured at `captured_at`
    pub fn new(domain_id: DomainId, captured_at: DateTime<Utc>) -> Self {
        Self {
            domain_id,
            captured_at,
            requests: 0,
            bandwidth_bytes: 0,
            threats: 0,
            unique_visitors: 0,
        }
    }

    /// Whether the snapshot was captured strictly before `cutoff`
    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.captured_at < cutoff
    }
}
