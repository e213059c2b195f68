// Wait-Time Estimator - pure function of a queue snapshot
//
// No ports, no side effects: directly unit-testable independent of the
// coordinator's concurrency machinery.

use std::collections::HashMap;

use crate::domain::{EntryStatus, QueueEntry, TokenNumber};

/// Fallback average consultation length when a doctor has no history.
/// Matches the front desk's standard ten-minute slot.
pub const DEFAULT_SERVICE_SECS: u32 = 600;

/// Computes expected waits for every live entry in a snapshot.
#[derive(Debug, Clone)]
pub struct WaitEstimator {
    default_service_secs: u32,
}

impl WaitEstimator {
    pub fn new(default_service_secs: u32) -> Self {
        Self {
            default_service_secs,
        }
    }

    /// Expected wait per token for an ordered snapshot.
    ///
    /// A WAITING entry with `k` active entries (WAITING or IN_SERVICE)
    /// strictly ahead of it waits `k * avg / capacity` seconds; entries
    /// already in service wait 0. Integer floor keeps the estimate
    /// monotonically non-decreasing front to back, since `k` only grows.
    pub fn estimate(
        &self,
        snapshot: &[QueueEntry],
        avg_service_secs: Option<u32>,
        capacity: u32,
    ) -> HashMap<TokenNumber, u64> {
        let avg = u64::from(avg_service_secs.unwrap_or(self.default_service_secs));
        let capacity = u64::from(capacity.max(1));

        let mut waits = HashMap::with_capacity(snapshot.len());
        let mut active_ahead: u64 = 0;
        for entry in snapshot {
            match entry.status {
                EntryStatus::InService => {
                    waits.insert(entry.token_number, 0);
                    active_ahead += 1;
                }
                EntryStatus::Waiting => {
                    waits.insert(entry.token_number, active_ahead * avg / capacity);
                    active_ahead += 1;
                }
                _ => {}
            }
        }
        waits
    }
}

impl Default for WaitEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_SECS)
    }
}
