// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid entry state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Token not found in queue: {0}")]
    TokenNotFound(u32),

    #[error("Duplicate token in queue: {0}")]
    DuplicateToken(u32),

    #[error("Doctor already serving at capacity: {capacity}")]
    CapacityExceeded { capacity: u32 },
}

pub type Result<T> = std::result::Result<T, DomainError>;
