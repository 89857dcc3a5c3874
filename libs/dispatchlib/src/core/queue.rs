// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-entity / per-group demand queues
//!
//! A `DemandQueue` is the unit the scheduler moves between idle and
//! runnable. Producers push concurrently; at most one worker owns the
//! queue while it is `Running`, which is the whole ordering guarantee:
//! demands inside one queue can never execute on two workers at once.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::core::demand::{Demand, QueueKey};
use crate::core::error::{DispatchError, Result};
use crate::core::params::BindingParams;

/// Scheduling state of one demand queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueState {
    /// Empty, not scheduled.
    Idle,
    /// Non-empty, waiting in the registry's runnable list.
    Runnable,
    /// Currently owned by exactly one worker.
    Running,
}

/// What the registry should do with a queue after a worker's batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BatchDisposition {
    /// More demands remain: re-insert at the tail of the runnable list.
    Requeue,
    /// Drained: park as idle, keep registered.
    Idle,
    /// Drained and retired: remove from the registry.
    Retire,
}

struct QueueInner {
    demands: VecDeque<Demand>,
    state: QueueState,
    /// Owning entity/group is gone; remove once drained.
    retired: bool,
}

/// FIFO sequence of pending demands for one queue key.
pub(crate) struct DemandQueue {
    key: QueueKey,
    params: BindingParams,
    inner: Mutex<QueueInner>,
}

impl DemandQueue {
    pub(crate) fn new(key: QueueKey, params: BindingParams) -> Self {
        Self {
            key,
            params,
            inner: Mutex::new(QueueInner {
                demands: VecDeque::new(),
                state: QueueState::Idle,
                retired: false,
            }),
        }
    }

    pub(crate) fn key(&self) -> &QueueKey {
        &self.key
    }

    pub(crate) fn params(&self) -> BindingParams {
        self.params
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().demands.len()
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> QueueState {
        self.inner.lock().state
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.inner.lock().retired
    }

    /// Append a demand at the tail.
    ///
    /// Returns `true` when the queue just transitioned from `Idle`, in
    /// which case the caller must hand it to the registry's runnable
    /// list. Producers never block here beyond the short queue lock.
    pub(crate) fn push(&self, demand: Demand) -> Result<bool> {
        let mut inner = self.inner.lock();
        if inner.retired {
            return Err(DispatchError::Configuration(format!(
                "Queue '{}' is retired and no longer accepts demands",
                self.key
            )));
        }
        inner.demands.push_back(demand);
        if inner.state == QueueState::Idle {
            inner.state = QueueState::Runnable;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Transition `Runnable` -> `Running` as the registry hands the queue
    /// to a worker.
    pub(crate) fn mark_running(&self) {
        let mut inner = self.inner.lock();
        debug_assert_eq!(inner.state, QueueState::Runnable);
        inner.state = QueueState::Running;
    }

    /// Remove and return up to `limit` demands from the head.
    ///
    /// Caller must be the worker that owns the queue (`Running`). The
    /// batch is moved out under one short lock so execution itself runs
    /// without any queue-level locking.
    pub(crate) fn take_batch(&self, limit: usize) -> Vec<Demand> {
        let mut inner = self.inner.lock();
        let count = limit.min(inner.demands.len());
        inner.demands.drain(..count).collect()
    }

    /// Settle the queue after a worker finished its batch.
    pub(crate) fn finish_batch(&self) -> BatchDisposition {
        let mut inner = self.inner.lock();
        debug_assert_eq!(inner.state, QueueState::Running);
        if inner.demands.is_empty() {
            inner.state = QueueState::Idle;
            if inner.retired {
                BatchDisposition::Retire
            } else {
                BatchDisposition::Idle
            }
        } else {
            inner.state = QueueState::Runnable;
            BatchDisposition::Requeue
        }
    }

    /// Flag the queue for removal once it drains.
    ///
    /// Returns `true` when the queue is already drained and idle, i.e.
    /// the registry can drop it immediately.
    pub(crate) fn mark_retired(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.retired = true;
        inner.demands.is_empty() && inner.state == QueueState::Idle
    }

    /// Drop all pending demands, returning how many were discarded.
    ///
    /// Only valid once no worker can own the queue anymore (dispatcher
    /// teardown, after the pool has been joined).
    pub(crate) fn discard_remaining(&self) -> usize {
        let mut inner = self.inner.lock();
        let discarded = inner.demands.len();
        inner.demands.clear();
        inner.state = QueueState::Idle;
        discarded
    }
}
