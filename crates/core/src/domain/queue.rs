// Doctor Queue - ordered collection of live entries for one doctor/day
//
// A sorted Vec rather than a heap; queues hold tens of entries and the
// dominant operation is peek-front. Layout invariant: IN_SERVICE entries
// occupy the front of the Vec in service-start order, followed by WAITING
// entries sorted by (priority desc, enqueued_at asc, token asc).

use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::entry::{DoctorId, EntryStatus, PriorityClass, QueueEntry, TokenNumber};
use crate::domain::error::{DomainError, Result};

/// Total order for WAITING entries
fn order_key(entry: &QueueEntry) -> (Reverse<PriorityClass>, DateTime<Utc>, TokenNumber) {
    (
        Reverse(entry.priority),
        entry.enqueued_at,
        entry.token_number,
    )
}

/// The ordered collection of live QueueEntry for one doctor on one day.
///
/// Held in memory for the engine's lifetime; rebuilt from the external
/// store on restart. Terminal entries are removed on transition.
#[derive(Debug, Clone)]
pub struct DoctorQueue {
    doctor_id: DoctorId,
    day: NaiveDate,
    entries: Vec<QueueEntry>,
}

impl DoctorQueue {
    pub fn new(doctor_id: impl Into<String>, day: NaiveDate) -> Self {
        Self {
            doctor_id: doctor_id.into(),
            day,
            entries: Vec::new(),
        }
    }

    /// Rebuild a queue from active entries loaded out of the store.
    ///
    /// Only WAITING and IN_SERVICE entries are live; anything terminal in
    /// the input is rejected as an internal-consistency fault upstream and
    /// skipped here.
    pub fn rehydrate(
        doctor_id: impl Into<String>,
        day: NaiveDate,
        active: Vec<QueueEntry>,
    ) -> Result<Self> {
        let mut queue = Self::new(doctor_id, day);
        let mut serving: Vec<QueueEntry> = Vec::new();

        for entry in active {
            match entry.status {
                EntryStatus::Waiting => queue.enqueue(entry)?,
                EntryStatus::InService => {
                    if queue.find(entry.token_number).is_some()
                        || serving.iter().any(|e| e.token_number == entry.token_number)
                    {
                        return Err(DomainError::DuplicateToken(entry.token_number));
                    }
                    serving.push(entry);
                }
                _ => {}
            }
        }

        // In-service entries keep their original call order
        serving.sort_by_key(|e| (e.started_at, e.token_number));
        for (i, entry) in serving.into_iter().enumerate() {
            queue.entries.insert(i, entry);
        }
        Ok(queue)
    }

    pub fn doctor_id(&self) -> &str {
        &self.doctor_id
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// All live entries, front to back: IN_SERVICE first, then WAITING in
    /// total order. This is the snapshot ordering.
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, token: TokenNumber) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.token_number == token)
    }

    pub fn in_service_count(&self) -> usize {
        self.waiting_start()
    }

    pub fn waiting_count(&self) -> usize {
        self.entries.len() - self.waiting_start()
    }

    /// Index of the first WAITING entry (in-service prefix boundary)
    fn waiting_start(&self) -> usize {
        self.entries
            .partition_point(|e| e.status == EntryStatus::InService)
    }

    /// Insert a new WAITING entry at its sorted position.
    ///
    /// Rejects token collisions even though the allocator contract rules
    /// them out for freshly issued tokens.
    pub fn enqueue(&mut self, entry: QueueEntry) -> Result<()> {
        if entry.status != EntryStatus::Waiting {
            return Err(DomainError::InvalidTransition {
                from: entry.status.to_string(),
                to: "WAITING".to_string(),
            });
        }
        if self.find(entry.token_number).is_some() {
            return Err(DomainError::DuplicateToken(entry.token_number));
        }

        let start = self.waiting_start();
        let key = order_key(&entry);
        let offset = self.entries[start..].partition_point(|e| order_key(e) <= key);
        self.entries.insert(start + offset, entry);
        Ok(())
    }

    /// Re-prioritize a WAITING entry, preserving its original arrival
    /// time as the tie-break among its new equals.
    pub fn escalate(
        &mut self,
        token: TokenNumber,
        new_priority: PriorityClass,
    ) -> Result<&QueueEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.token_number == token)
            .ok_or(DomainError::TokenNotFound(token))?;

        if self.entries[idx].status != EntryStatus::Waiting {
            return Err(DomainError::InvalidTransition {
                from: self.entries[idx].status.to_string(),
                to: "WAITING".to_string(),
            });
        }

        let mut entry = self.entries.remove(idx);
        entry.priority = new_priority;

        let start = self.waiting_start();
        let key = order_key(&entry);
        let offset = self.entries[start..].partition_point(|e| order_key(e) <= key);
        let new_idx = start + offset;
        self.entries.insert(new_idx, entry);
        Ok(&self.entries[new_idx])
    }

    /// Select the front-most WAITING entry and move it to IN_SERVICE.
    ///
    /// Returns `Ok(None)` when no WAITING entries exist (not an error).
    /// Fails with `CapacityExceeded` when the doctor is already serving
    /// `capacity` patients.
    pub fn call_next(
        &mut self,
        capacity: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<&QueueEntry>> {
        let start = self.waiting_start();
        if start >= self.entries.len() {
            return Ok(None);
        }
        if start as u32 >= capacity {
            return Err(DomainError::CapacityExceeded { capacity });
        }

        let mut entry = self.entries.remove(start);
        entry.begin_service(now)?;
        // Newest call sits at the back of the in-service prefix
        self.entries.insert(start, entry);
        Ok(Some(&self.entries[start]))
    }

    /// IN_SERVICE -> COMPLETED; removes and returns the terminal entry
    pub fn complete(&mut self, token: TokenNumber, now: DateTime<Utc>) -> Result<QueueEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.token_number == token)
            .ok_or(DomainError::TokenNotFound(token))?;

        self.entries[idx].complete(now)?;
        Ok(self.entries.remove(idx))
    }

    /// WAITING or IN_SERVICE -> CANCELLED; removes and returns the entry
    pub fn cancel(&mut self, token: TokenNumber, now: DateTime<Utc>) -> Result<QueueEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.token_number == token)
            .ok_or(DomainError::TokenNotFound(token))?;

        self.entries[idx].cancel(now)?;
        Ok(self.entries.remove(idx))
    }

    /// Write refreshed wait estimates back onto the live entries
    pub fn set_estimated_waits(&mut self, waits: &HashMap<TokenNumber, u64>) {
        for entry in &mut self.entries {
            if let Some(secs) = waits.get(&entry.token_number) {
                entry.estimated_wait_secs = *secs;
            }
        }
    }
}
