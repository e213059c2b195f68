// Queue Change Events
//
// Every successful mutation publishes exactly one event carrying the
// doctor's refreshed ordered snapshot. Consumers (notification and UI
// layers) subscribe to the broadcast stream; delivery beyond the channel
// is entirely their concern.

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::{DoctorId, QueueEntry};

/// Snapshot of one doctor's queue after a mutation, waits refreshed
#[derive(Debug, Clone, Serialize)]
pub struct QueueChanged {
    pub doctor_id: DoctorId,
    pub day: NaiveDate,
    /// Ordered front to back: in-service entries, then waiting entries
    pub entries: Vec<QueueEntry>,
}

/// Create the change-event broadcast channel
pub fn event_channel(
    capacity: usize,
) -> (broadcast::Sender<QueueChanged>, broadcast::Receiver<QueueChanged>) {
    broadcast::channel(capacity)
}
