// Token Allocator - strictly increasing per (doctor, day) token numbers

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;

use crate::domain::{DoctorId, TokenNumber};
use crate::error::{EngineError, Result};

/// Issues per-day, per-doctor token numbers starting at 1.
///
/// Two concurrent calls for the same key never return the same number and
/// numbers are never skipped, except across a process restart where the
/// allocator reseeds from the maximum the store recorded for the day.
pub struct TokenAllocator {
    last_issued: Mutex<HashMap<(DoctorId, NaiveDate), TokenNumber>>,
}

impl TokenAllocator {
    pub fn new() -> Self {
        Self {
            last_issued: Mutex::new(HashMap::new()),
        }
    }

    /// Raise the counter for a key to at least `max_recorded`.
    ///
    /// Used on rehydration; never lowers an already-issued counter.
    pub fn seed(&self, doctor_id: &str, day: NaiveDate, max_recorded: TokenNumber) -> Result<()> {
        let mut guard = self
            .last_issued
            .lock()
            .map_err(|_| EngineError::Internal("token allocator lock poisoned".to_string()))?;
        let last = guard.entry((doctor_id.to_string(), day)).or_insert(0);
        if max_recorded > *last {
            *last = max_recorded;
        }
        Ok(())
    }

    /// Smallest integer greater than any token previously issued for the
    /// (doctor, day) pair; 1 for a new pair.
    pub fn next_token(&self, doctor_id: &str, day: NaiveDate) -> Result<TokenNumber> {
        if doctor_id.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "doctor id must not be empty".to_string(),
            ));
        }

        let mut guard = self
            .last_issued
            .lock()
            .map_err(|_| EngineError::Internal("token allocator lock poisoned".to_string()))?;
        let last = guard.entry((doctor_id.to_string(), day)).or_insert(0);
        *last += 1;
        Ok(*last)
    }
}

impl Default for TokenAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, n).unwrap()
    }

    #[test]
    fn tokens_start_at_one_and_increase() {
        let alloc = TokenAllocator::new();
        assert_eq!(alloc.next_token("dr-a", day(1)).unwrap(), 1);
        assert_eq!(alloc.next_token("dr-a", day(1)).unwrap(), 2);
        assert_eq!(alloc.next_token("dr-a", day(1)).unwrap(), 3);
    }

    #[test]
    fn independent_sequences_per_doctor_and_day() {
        let alloc = TokenAllocator::new();
        alloc.next_token("dr-a", day(1)).unwrap();
        alloc.next_token("dr-a", day(1)).unwrap();

        assert_eq!(alloc.next_token("dr-b", day(1)).unwrap(), 1);
        assert_eq!(alloc.next_token("dr-a", day(2)).unwrap(), 1);
    }

    #[test]
    fn empty_doctor_id_is_invalid() {
        let alloc = TokenAllocator::new();
        let err = alloc.next_token("  ", day(1)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn seed_raises_but_never_lowers() {
        let alloc = TokenAllocator::new();
        alloc.seed("dr-a", day(1), 41).unwrap();
        assert_eq!(alloc.next_token("dr-a", day(1)).unwrap(), 42);

        // Seeding below the current counter is a no-op
        alloc.seed("dr-a", day(1), 10).unwrap();
        assert_eq!(alloc.next_token("dr-a", day(1)).unwrap(), 43);
    }

    #[tokio::test]
    async fn concurrent_calls_never_collide_or_skip() {
        let alloc = Arc::new(TokenAllocator::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let alloc = alloc.clone();
            handles.push(tokio::spawn(async move {
                alloc.next_token("dr-a", day(1)).unwrap()
            }));
        }

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap());
        }
        tokens.sort_unstable();
        assert_eq!(tokens, (1..=50).collect::<Vec<_>>());
    }
}
