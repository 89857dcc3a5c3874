// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Binding parameters for demand scheduling
//!
//! A binding describes how one entity's (or one group's) demands are
//! scheduled on the worker pool:
//! - `OrderingMode` - WHICH demands share a FIFO stream
//! - batch limit - HOW MANY demands a worker runs per turn before yielding

use serde::{Deserialize, Serialize};

use crate::core::error::{DispatchError, Result};

/// Default number of demands a worker executes from one queue per turn.
pub const DEFAULT_BATCH_LIMIT: usize = 4;

/// FIFO discipline for an entity's demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderingMode {
    /// All entities sharing a group identifier share one demand queue.
    ///
    /// Their demands execute in arrival order on whichever single worker
    /// currently owns that queue, so grouped entities never run in
    /// parallel with each other.
    GroupedFifo,

    /// Each entity gets its own demand queue.
    ///
    /// Different entities may execute concurrently on different workers;
    /// one entity's own demands remain strictly ordered.
    IndividualFifo,
}

/// Scheduling parameters attached to a binding.
///
/// A plain value object: setters chain, nothing is validated until the
/// params are consumed by a dispatcher (see [`BindingParams::validate`]),
/// so tooling can build partially-configured params incrementally.
///
/// ```
/// use dispatchlib::core::{BindingParams, OrderingMode};
///
/// let params = BindingParams::new()
///     .with_ordering(OrderingMode::IndividualFifo)
///     .with_batch_limit(16);
/// assert_eq!(params.batch_limit(), 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingParams {
    ordering: OrderingMode,
    batch_limit: usize,
}

impl Default for BindingParams {
    fn default() -> Self {
        Self {
            ordering: OrderingMode::GroupedFifo,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

impl BindingParams {
    /// Create params with the default ordering (grouped FIFO) and batch limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the FIFO discipline.
    pub fn with_ordering(mut self, ordering: OrderingMode) -> Self {
        self.ordering = ordering;
        self
    }

    /// Set the maximum number of demands executed per worker turn.
    ///
    /// Zero is rejected later by [`BindingParams::validate`], not here.
    pub fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit;
        self
    }

    /// FIFO discipline for this binding.
    pub fn ordering(&self) -> OrderingMode {
        self.ordering
    }

    /// Maximum demands executed per worker turn on one queue.
    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Check the `batch_limit >= 1` invariant.
    ///
    /// Called by the dispatcher at the point the params are consumed
    /// (bind / binder creation) so misconfiguration fails fast there.
    pub fn validate(&self) -> Result<()> {
        if self.batch_limit == 0 {
            return Err(DispatchError::Configuration(
                "batch_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default worker pool size for the host.
///
/// Queried once at dispatcher construction; never cached in process-wide
/// state. Floor of 2 keeps a pool meaningful on hosts where detection
/// reports nothing useful.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_grouped_with_batch_limit_4() {
        let params = BindingParams::default();
        assert_eq!(params.ordering(), OrderingMode::GroupedFifo);
        assert_eq!(params.batch_limit(), DEFAULT_BATCH_LIMIT);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn setters_chain() {
        let params = BindingParams::new()
            .with_ordering(OrderingMode::IndividualFifo)
            .with_batch_limit(128);
        assert_eq!(params.ordering(), OrderingMode::IndividualFifo);
        assert_eq!(params.batch_limit(), 128);
    }

    #[test]
    fn zero_batch_limit_fails_validation_not_construction() {
        // Building the value succeeds; only consumption rejects it.
        let params = BindingParams::new().with_batch_limit(0);
        assert!(matches!(
            params.validate(),
            Err(DispatchError::Configuration(_))
        ));
    }

    #[test]
    fn default_pool_size_has_floor_of_two() {
        assert!(default_pool_size() >= 2);
    }
}
