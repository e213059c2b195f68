// Port Layer - Interfaces for external dependencies

pub mod doctor_registry;
pub mod queue_store;
pub mod time_provider;

// Re-exports
pub use doctor_registry::{Doctor, DoctorRegistry};
pub use queue_store::QueueStore;
pub use time_provider::{SystemTimeProvider, TimeProvider};
