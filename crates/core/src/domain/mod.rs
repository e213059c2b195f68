// Domain Layer - Pure queue logic and entities

pub mod entry;
pub mod error;
pub mod queue;

// Re-exports
pub use entry::{DoctorId, EntryStatus, PatientRef, PriorityClass, QueueEntry, TokenNumber};
pub use error::DomainError;
pub use queue::DoctorQueue;
