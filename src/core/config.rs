//! Pool configuration

use crate::core::types::AllocationStrategy;

/// Configuration for a memory pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Arena size in bytes, fixed for the pool's lifetime
    pub total_size: usize,

    /// Initial placement strategy
    pub strategy: AllocationStrategy,

    /// Zero payload bytes before handing them to the caller
    pub zero_on_alloc: bool,
}

impl PoolConfig {
    /// Configuration for an arena of `total_size` bytes with the default
    /// strategy
    #[must_use]
    pub fn new(total_size: usize) -> Self {
        Self {
            total_size,
            strategy: AllocationStrategy::default(),
            zero_on_alloc: true,
        }
    }

    /// Sets the initial placement strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: AllocationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Disables (or re-enables) zeroing of payloads on allocation
    #[must_use]
    pub fn with_zero_on_alloc(mut self, zero_on_alloc: bool) -> Self {
        self.zero_on_alloc = zero_on_alloc;
        self
    }
}
