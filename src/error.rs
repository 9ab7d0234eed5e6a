//! Standalone error types for the memory pool
//!
//! Uses thiserror for clean, idiomatic Rust error definitions. Every
//! variant maps onto one of the stable numeric status codes exposed by
//! [`PoolError::status_code`].

use thiserror::Error;
use tracing::{error, warn};

// ============================================================================
// Main Error Type
// ============================================================================

/// Errors surfaced by pool and client operations
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A caller-supplied argument was rejected before touching the arena
    #[error("invalid parameter: {reason}")]
    InvalidParam { reason: String },

    /// No free block can satisfy the (already aligned) request
    #[error("out of memory: no free block fits {requested} bytes")]
    OutOfMemory { requested: usize },

    /// The aligned request can never fit the arena, regardless of state
    #[error("request of {requested} bytes exceeds arena capacity of {capacity} bytes")]
    ExceedsCapacity { requested: usize, capacity: usize },

    /// A header failed its liveness or bounds checks
    #[error("memory corruption detected: {details}")]
    Corruption { details: String },

    /// A client tried to release a block it does not own
    #[error("client {caller} attempted to release a block owned by client {owner}")]
    OwnershipViolation { owner: i64, caller: i64 },

    /// The pool was destroyed (or never initialized)
    #[error("pool is not initialized or already destroyed")]
    PoolNotInitialized,
}

impl PoolError {
    /// Numeric status code matching the library's stable error contract:
    /// success is `0`, every error is negative.
    #[must_use]
    pub fn status_code(&self) -> i32 {
        match self {
            Self::InvalidParam { .. } => -1,
            Self::OutOfMemory { .. } | Self::ExceedsCapacity { .. } => -2,
            Self::Corruption { .. } => -3,
            Self::OwnershipViolation { .. } => -4,
            Self::PoolNotInitialized => -5,
        }
    }

    /// Check if the error can succeed on retry after other clients release
    /// memory. Corruption and ownership errors never clear on their own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    // ------------------------------------------------------------------
    // Convenience constructors
    // ------------------------------------------------------------------

    /// Create an invalid-parameter error
    pub fn invalid_param(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        error!("invalid parameter: {reason}");
        Self::InvalidParam { reason }
    }

    /// Create an out-of-memory error for an aligned request
    #[must_use]
    pub fn out_of_memory(requested: usize) -> Self {
        warn!(requested, "no free block large enough");
        Self::OutOfMemory { requested }
    }

    /// Create an error for a request larger than the arena can ever hold
    #[must_use]
    pub fn exceeds_capacity(requested: usize, capacity: usize) -> Self {
        error!(requested, capacity, "request exceeds arena capacity");
        Self::ExceedsCapacity {
            requested,
            capacity,
        }
    }

    /// Create a corruption error
    pub fn corruption(details: impl Into<String>) -> Self {
        let details = details.into();
        error!("memory corruption: {details}");
        Self::Corruption { details }
    }

    /// Create an ownership-violation error
    #[must_use]
    pub fn ownership_violation(owner: i64, caller: i64) -> Self {
        error!(owner, caller, "cross-client release rejected");
        Self::OwnershipViolation { owner, caller }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// Result type for pool operations
pub type PoolResult<T> = core::result::Result<T, PoolError>;

// ============================================================================
// Tests
// ============================================================================
