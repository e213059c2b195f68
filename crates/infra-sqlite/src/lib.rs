// MEDQ Infrastructure - SQLite Adapter
// Implements: QueueStore (write-through + rehydration), DoctorRegistry

mod connection;
mod doctor_registry;
mod migration;
mod queue_store;

pub use connection::create_pool;
pub use doctor_registry::SqliteDoctorRegistry;
pub use migration::run_migrations;
pub use queue_store::SqliteQueueStore;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for
// EngineError here)
