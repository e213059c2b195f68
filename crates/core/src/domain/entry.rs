// Queue Entry Domain Model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Doctor identifier (owned by the external doctor registry)
pub type DoctorId = String;

/// Opaque patient identifier (owned by the external patient registry)
pub type PatientRef = String;

/// Sequential token number, unique within (doctor, calendar day)
pub type TokenNumber = u32;

/// Coarse urgency tier governing queue order ahead of arrival time.
///
/// Ordinal: `Emergency > Urgent > Routine`. The derived `Ord` relies on
/// variant declaration order, so Routine must stay first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityClass {
    Routine,
    Urgent,
    Emergency,
}

impl Default for PriorityClass {
    fn default() -> Self {
        PriorityClass::Routine
    }
}

impl std::fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorityClass::Routine => write!(f, "ROUTINE"),
            PriorityClass::Urgent => write!(f, "URGENT"),
            PriorityClass::Emergency => write!(f, "EMERGENCY"),
        }
    }
}

/// Entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Waiting,
    InService,
    Completed,
    Cancelled,
}

impl EntryStatus {
    /// Terminal states drop out of the live queue
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryStatus::Completed | EntryStatus::Cancelled)
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryStatus::Waiting => write!(f, "WAITING"),
            EntryStatus::InService => write!(f, "IN_SERVICE"),
            EntryStatus::Completed => write!(f, "COMPLETED"),
            EntryStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// One patient's position in one doctor's queue for one day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub token_number: TokenNumber,
    pub patient_ref: PatientRef,
    pub doctor_id: DoctorId,
    pub day: NaiveDate,

    pub priority: PriorityClass,
    pub status: EntryStatus,

    /// Arrival time; the FIFO tie-break within a priority class.
    /// Escalation never rewrites this.
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Recomputed on every queue mutation affecting entries ahead
    pub estimated_wait_secs: u64,

    /// Free-text registration note (symptoms); opaque to ordering
    pub note: Option<String>,
}

impl QueueEntry {
    /// Create a new WAITING entry.
    ///
    /// Token and timestamp are injected, never generated here: the token
    /// allocator owns the sequence and the time provider owns the clock.
    pub fn new(
        token_number: TokenNumber,
        patient_ref: impl Into<String>,
        doctor_id: impl Into<String>,
        day: NaiveDate,
        priority: PriorityClass,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token_number,
            patient_ref: patient_ref.into(),
            doctor_id: doctor_id.into(),
            day,
            priority,
            status: EntryStatus::Waiting,
            enqueued_at,
            started_at: None,
            finished_at: None,
            estimated_wait_secs: 0,
            note: None,
        }
    }

    /// Transition WAITING -> IN_SERVICE with explicit timestamp
    pub fn begin_service(&mut self, now: DateTime<Utc>) -> crate::domain::error::Result<()> {
        if self.status != EntryStatus::Waiting {
            return Err(crate::domain::error::DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: "IN_SERVICE".to_string(),
            });
        }
        self.status = EntryStatus::InService;
        self.started_at = Some(now);
        Ok(())
    }

    /// Transition IN_SERVICE -> COMPLETED with explicit timestamp
    pub fn complete(&mut self, now: DateTime<Utc>) -> crate::domain::error::Result<()> {
        if self.status != EntryStatus::InService {
            return Err(crate::domain::error::DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: "COMPLETED".to_string(),
            });
        }
        self.status = EntryStatus::Completed;
        self.finished_at = Some(now);
        Ok(())
    }

    /// Transition WAITING or IN_SERVICE -> CANCELLED with explicit timestamp
    pub fn cancel(&mut self, now: DateTime<Utc>) -> crate::domain::error::Result<()> {
        if self.status.is_terminal() {
            return Err(crate::domain::error::DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: "CANCELLED".to_string(),
            });
        }
        self.status = EntryStatus::Cancelled;
        self.finished_at = Some(now);
        Ok(())
    }
}
