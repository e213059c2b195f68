// Queue Store Port (Interface)
//
// Durable storage is an external sink the engine writes through; its own
// durability guarantees are out of scope here.

use crate::domain::{QueueEntry, TokenNumber};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Interface to the durable store backing the live queues
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Active (WAITING / IN_SERVICE) entries for one doctor/day, used to
    /// rehydrate in-memory state after a restart. Order is not guaranteed.
    async fn load_active(&self, doctor_id: &str, day: NaiveDate) -> Result<Vec<QueueEntry>>;

    /// Highest token ever recorded for the (doctor, day) pair, terminal
    /// entries included. Seeds the token allocator across restarts.
    async fn max_token(&self, doctor_id: &str, day: NaiveDate) -> Result<Option<TokenNumber>>;

    /// Upsert one entry keyed by (doctor, day, token). Called after every
    /// entry state change; fire-and-forget from the engine's perspective.
    async fn persist(&self, entry: &QueueEntry) -> Result<()>;
}
