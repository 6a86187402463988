// crates/settings-audit-core/src/runtime/pool.rs
// ============================================================================
// Module: Worker Pool
// Description: Bounded thread pool for blocking hub reads.
// Purpose: Fan out independent units of work while keeping results ordered.
// Dependencies: rayon
// ============================================================================

//! ## Overview
//! Hub reads are blocking HTTP round trips, so fan-out uses a fixed pool of OS
//! threads. [`WorkerPool::map_ordered`] returns results indexed by submission
//! order, never completion order, which keeps reports deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::runtime::errors::ConfigurationError;

// ============================================================================
// SECTION: Worker Pool
// ============================================================================

/// Fixed-size pool executing one blocking task per worker at a time.
#[derive(Debug)]
pub struct WorkerPool {
    /// Underlying rayon pool.
    pool: ThreadPool,
    /// Number of worker threads.
    size: usize,
}

impl WorkerPool {
    /// Creates a pool with `size` worker threads.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidWorkerPool`] when `size` is zero
    /// or the threads cannot be spawned.
    pub fn new(size: usize) -> Result<Self, ConfigurationError> {
        if size == 0 {
            return Err(ConfigurationError::InvalidWorkerPool(
                "worker pool size must be at least 1".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|index| format!("settings-audit-{index}"))
            .build()
            .map_err(|err| ConfigurationError::InvalidWorkerPool(err.to_string()))?;
        Ok(Self {
            pool,
            size,
        })
    }

    /// Returns the number of worker threads.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Runs `task` over every item and returns results in input order.
    pub fn map_ordered<T, R, F>(&self, items: &[T], task: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool.install(|| items.par_iter().map(task).collect())
    }
}
