// Queue Coordinator - the single entry point over a doctor's queue
//
// Serializes mutating calls per doctor, composes the token allocator,
// priority queue core, and wait-time estimator into each public operation,
// and emits one change event per successful mutation. Queues for different
// doctors are independent and proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{error, info, warn};

use crate::application::estimator::WaitEstimator;
use crate::application::events::{event_channel, QueueChanged};
use crate::application::token::TokenAllocator;
use crate::domain::{
    DoctorId, DoctorQueue, DomainError, PriorityClass, QueueEntry, TokenNumber,
};
use crate::error::{EngineError, Result};
use crate::port::{Doctor, DoctorRegistry, QueueStore, TimeProvider};

/// Default buffer for the change-event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Registration event handed to the coordinator by the front desk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub doctor_id: String,
    pub patient_ref: String,

    #[serde(default)]
    pub priority: PriorityClass,

    /// Free-text symptoms captured at registration
    #[serde(default)]
    pub note: Option<String>,
}

/// Per-doctor queue state: the serialized mutation path plus the
/// watch-published snapshot reads go through.
struct DoctorSlot {
    queue: Mutex<DoctorQueue>,
    snapshot: watch::Sender<Vec<QueueEntry>>,
}

/// Façade over the queue engine; the only component callers interact with
pub struct QueueCoordinator {
    registry: Arc<dyn DoctorRegistry>,
    store: Arc<dyn QueueStore>,
    time_provider: Arc<dyn TimeProvider>,
    allocator: TokenAllocator,
    estimator: WaitEstimator,
    slots: Mutex<HashMap<DoctorId, Arc<DoctorSlot>>>,
    events: broadcast::Sender<QueueChanged>,
}

impl QueueCoordinator {
    pub fn new(
        registry: Arc<dyn DoctorRegistry>,
        store: Arc<dyn QueueStore>,
        time_provider: Arc<dyn TimeProvider>,
        estimator: WaitEstimator,
    ) -> Self {
        let (events, _) = event_channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry,
            store,
            time_provider,
            allocator: TokenAllocator::new(),
            estimator,
            slots: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Subscribe to the change-event stream (one event per mutation)
    pub fn subscribe(&self) -> broadcast::Receiver<QueueChanged> {
        self.events.subscribe()
    }

    /// Enqueue a patient into a doctor's queue, assigning the next token
    pub async fn enqueue(&self, req: EnqueueRequest) -> Result<QueueEntry> {
        if req.patient_ref.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "patient ref must not be empty".to_string(),
            ));
        }

        let doctor = self.require_doctor(&req.doctor_id).await?;
        if !doctor.on_duty {
            return Err(EngineError::DoctorUnavailable(doctor.id));
        }

        let slot = self.slot(&doctor).await?;
        let mut queue = self.lock_for_today(&doctor, &slot).await?;

        let token = self.allocator.next_token(&doctor.id, queue.day())?;
        let mut entry = QueueEntry::new(
            token,
            req.patient_ref,
            &doctor.id,
            queue.day(),
            req.priority,
            self.time_provider.now(),
        );
        entry.note = req.note;

        if let Err(err) = queue.enqueue(entry) {
            if let DomainError::DuplicateToken(token) = err {
                // Allocator invariant breach: surfaced, never swallowed
                error!(
                    doctor_id = %doctor.id,
                    token = token,
                    "duplicate token issued for live queue"
                );
            }
            return Err(err.into());
        }

        self.publish(&doctor, &slot, &mut queue);
        let stored = self.live_entry(&queue, token)?;
        self.persist_best_effort(&stored).await;

        info!(
            doctor_id = %doctor.id,
            token = token,
            priority = %stored.priority,
            "patient enqueued"
        );
        Ok(stored)
    }

    /// Re-prioritize a WAITING entry (emergency escalation)
    pub async fn escalate(
        &self,
        doctor_id: &str,
        token: TokenNumber,
        new_priority: PriorityClass,
    ) -> Result<QueueEntry> {
        let doctor = self.require_doctor(doctor_id).await?;
        let slot = self.slot(&doctor).await?;
        let mut queue = self.lock_for_today(&doctor, &slot).await?;

        queue.escalate(token, new_priority)?;

        self.publish(&doctor, &slot, &mut queue);
        let updated = self.live_entry(&queue, token)?;
        self.persist_best_effort(&updated).await;

        info!(
            doctor_id = %doctor.id,
            token = token,
            priority = %new_priority,
            "entry escalated"
        );
        Ok(updated)
    }

    /// Move the front-most WAITING entry to IN_SERVICE and return it.
    ///
    /// `Ok(None)` when nobody is waiting; no event is emitted in that case
    /// since nothing changed.
    pub async fn call_next(&self, doctor_id: &str) -> Result<Option<QueueEntry>> {
        let doctor = self.require_doctor(doctor_id).await?;
        if !doctor.on_duty {
            return Err(EngineError::DoctorUnavailable(doctor.id));
        }

        let slot = self.slot(&doctor).await?;
        let mut queue = self.lock_for_today(&doctor, &slot).await?;

        let called = queue
            .call_next(doctor.capacity, self.time_provider.now())?
            .map(|e| e.token_number);

        let Some(token) = called else {
            return Ok(None);
        };

        self.publish(&doctor, &slot, &mut queue);
        let entry = self.live_entry(&queue, token)?;
        self.persist_best_effort(&entry).await;

        info!(doctor_id = %doctor.id, token = token, "patient called in");
        Ok(Some(entry))
    }

    /// IN_SERVICE -> COMPLETED; the terminal record is handed to the store
    pub async fn complete(&self, doctor_id: &str, token: TokenNumber) -> Result<QueueEntry> {
        let doctor = self.require_doctor(doctor_id).await?;
        let slot = self.slot(&doctor).await?;
        let mut queue = self.lock_for_today(&doctor, &slot).await?;

        let entry = queue.complete(token, self.time_provider.now())?;

        self.publish(&doctor, &slot, &mut queue);
        self.persist_best_effort(&entry).await;

        info!(doctor_id = %doctor.id, token = token, "consultation completed");
        Ok(entry)
    }

    /// WAITING or IN_SERVICE -> CANCELLED
    pub async fn cancel(&self, doctor_id: &str, token: TokenNumber) -> Result<QueueEntry> {
        let doctor = self.require_doctor(doctor_id).await?;
        let slot = self.slot(&doctor).await?;
        let mut queue = self.lock_for_today(&doctor, &slot).await?;

        let entry = queue.cancel(token, self.time_provider.now())?;

        self.publish(&doctor, &slot, &mut queue);
        self.persist_best_effort(&entry).await;

        info!(doctor_id = %doctor.id, token = token, "entry cancelled");
        Ok(entry)
    }

    /// Ordered read of a doctor's queue. Never takes the mutation lock;
    /// may return a copy a concurrent mutation is about to supersede.
    pub async fn snapshot(&self, doctor_id: &str) -> Result<Vec<QueueEntry>> {
        let doctor = self.require_doctor(doctor_id).await?;
        let slot = self.slot(&doctor).await?;
        let snapshot = slot.snapshot.borrow().clone();
        Ok(snapshot)
    }

    async fn require_doctor(&self, doctor_id: &str) -> Result<Doctor> {
        if doctor_id.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "doctor id must not be empty".to_string(),
            ));
        }
        self.registry
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("doctor {doctor_id}")))
    }

    /// Fetch (or lazily rehydrate) the slot for a doctor
    async fn slot(&self, doctor: &Doctor) -> Result<Arc<DoctorSlot>> {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get(&doctor.id) {
            return Ok(slot.clone());
        }

        let queue = self.load_queue(doctor, self.time_provider.today()).await?;
        let (snapshot, _) = watch::channel(queue.entries().to_vec());
        let slot = Arc::new(DoctorSlot {
            queue: Mutex::new(queue),
            snapshot,
        });
        slots.insert(doctor.id.clone(), slot.clone());
        Ok(slot)
    }

    /// Lock the doctor's queue, rolling over to a fresh queue (and token
    /// sequence) when the calendar day has changed since the last touch.
    async fn lock_for_today<'a>(
        &self,
        doctor: &Doctor,
        slot: &'a DoctorSlot,
    ) -> Result<tokio::sync::MutexGuard<'a, DoctorQueue>> {
        let mut queue = slot.queue.lock().await;
        let today = self.time_provider.today();
        if queue.day() != today {
            info!(doctor_id = %doctor.id, day = %today, "queue day rollover");
            *queue = self.load_queue(doctor, today).await?;
            slot.snapshot.send_replace(queue.entries().to_vec());
        }
        Ok(queue)
    }

    /// Rebuild a queue for one doctor/day from the store and seed the
    /// token allocator from the recorded maximum.
    async fn load_queue(&self, doctor: &Doctor, day: chrono::NaiveDate) -> Result<DoctorQueue> {
        let active = self.store.load_active(&doctor.id, day).await?;
        if let Some(max) = self.store.max_token(&doctor.id, day).await? {
            self.allocator.seed(&doctor.id, day, max)?;
        }

        let mut queue = DoctorQueue::rehydrate(&doctor.id, day, active)?;
        let waits = self
            .estimator
            .estimate(queue.entries(), doctor.avg_service_secs, doctor.capacity);
        queue.set_estimated_waits(&waits);
        Ok(queue)
    }

    /// Refresh estimates, publish the watch snapshot, emit the event
    fn publish(&self, doctor: &Doctor, slot: &DoctorSlot, queue: &mut DoctorQueue) {
        let waits = self
            .estimator
            .estimate(queue.entries(), doctor.avg_service_secs, doctor.capacity);
        queue.set_estimated_waits(&waits);

        let entries = queue.entries().to_vec();
        slot.snapshot.send_replace(entries.clone());
        let _ = self.events.send(QueueChanged {
            doctor_id: doctor.id.clone(),
            day: queue.day(),
            entries,
        });
    }

    fn live_entry(&self, queue: &DoctorQueue, token: TokenNumber) -> Result<QueueEntry> {
        queue
            .find(token)
            .cloned()
            .ok_or_else(|| EngineError::Internal(format!("entry {token} vanished from queue")))
    }

    async fn persist_best_effort(&self, entry: &QueueEntry) {
        if let Err(err) = self.store.persist(entry).await {
            warn!(
                doctor_id = %entry.doctor_id,
                token = entry.token_number,
                error = %err,
                "write-through persist failed"
            );
        }
    }
}
