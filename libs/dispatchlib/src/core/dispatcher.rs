// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Dispatcher lifecycle and external surface
//!
//! # Thread Safety
//!
//! `Dispatcher` is a cheaply clonable handle over shared internals. All
//! methods take `&self`; clones address the same worker pool and
//! registry. Internal state uses fine-grained locking, so producers on
//! arbitrary threads (including workers executing unrelated demands)
//! can enqueue without an outer lock.
//!
//! # State Transitions
//!
//! ```text
//! ┌────────┐  stop() / last private owner released  ┌──────────────┐
//! │ Active │───────────────────────────────────────►│ ShuttingDown │
//! └────────┘                                        └──────┬───────┘
//!                                                          │ every worker exited
//!                                                          ▼
//!                                                   ┌─────────┐
//!                                                   │ Stopped │  (terminal)
//!                                                   └─────────┘
//! ```
//!
//! Shutdown bounds teardown latency to one batch per worker: each worker
//! finishes its current batch and exits; whatever is still queued is
//! discarded and reported, never silently dropped.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::demand::{Demand, DemandKey};
use crate::core::error::{DispatchError, Result};
use crate::core::events::{DispatchEvent, DispatchListener, ListenerHub};
use crate::core::params::{BindingParams, default_pool_size};
use crate::core::registry::DispatchRegistry;
use crate::core::worker::WorkerPool;

/// Dispatcher lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Accepting bindings and demands normally.
    Active,
    /// Workers are finishing their current batches; no new queue keys.
    ShuttingDown,
    /// Every worker has exited. Terminal, not resumable.
    Stopped,
}

impl DispatcherState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Outcome of a completed shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Demands still queued when the dispatcher stopped; reported as
    /// discarded, distinct from execution failures.
    pub discarded: usize,
}

struct DispatcherInner {
    registry: Arc<DispatchRegistry>,
    events: Arc<ListenerHub>,
    workers: Mutex<Option<WorkerPool>>,
    state: Mutex<DispatcherState>,
    thread_count: usize,
}

/// Thread-pool dispatcher: turns queued demands into executed work under
/// per-binding FIFO and fairness rules.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Create a dispatcher sized by host introspection
    /// ([`default_pool_size`]).
    pub fn new() -> Result<Self> {
        Self::with_thread_count(default_pool_size())
    }

    /// Create a dispatcher with an explicit worker count.
    ///
    /// The pool is fixed at construction and not resizable; workers spawn
    /// immediately and the dispatcher is `Active` from construction.
    pub fn with_thread_count(thread_count: usize) -> Result<Self> {
        if thread_count == 0 {
            return Err(DispatchError::Configuration(
                "Dispatcher needs at least one worker thread".to_string(),
            ));
        }

        let registry = Arc::new(DispatchRegistry::new());
        let events = Arc::new(ListenerHub::new());
        let workers = WorkerPool::spawn(thread_count, Arc::clone(&registry), Arc::clone(&events))?;
        tracing::info!("Dispatcher started with {} worker threads", thread_count);

        Ok(Self {
            inner: Arc::new(DispatcherInner {
                registry,
                events,
                workers: Mutex::new(Some(workers)),
                state: Mutex::new(DispatcherState::Active),
                thread_count,
            }),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DispatcherState {
        *self.inner.state.lock()
    }

    /// Size of the worker pool.
    pub fn thread_count(&self) -> usize {
        self.inner.thread_count
    }

    /// Demands queued but not yet taken by a worker.
    pub fn pending_demands(&self) -> usize {
        self.inner.registry.pending_demands()
    }

    /// Register an observability listener for failure/discard/lifecycle
    /// events. Dropping the listener unsubscribes it.
    pub fn subscribe(&self, listener: Arc<Mutex<dyn DispatchListener>>) {
        self.inner.events.subscribe(listener);
    }

    /// Associate an entity with this dispatcher under `params`.
    ///
    /// Fails fast on invalid params (`batch_limit == 0`), on rebinding a
    /// live queue key to different params, and on a stopped dispatcher.
    /// No queue is created when validation fails.
    pub fn bind(&self, key: &DemandKey, params: BindingParams) -> Result<()> {
        params.validate()?;
        self.check_not_stopped()?;
        self.inner.registry.bind(key, params)
    }

    /// Enqueue one demand for `key`.
    ///
    /// The queue is resolved (or lazily created) per `params`; the demand
    /// executes in arrival order relative to its queue. Never blocks
    /// beyond short internal locks.
    pub fn enqueue(&self, key: &DemandKey, params: BindingParams, demand: Demand) -> Result<()> {
        params.validate()?;
        self.check_not_stopped()?;
        self.inner.registry.enqueue(key, params, demand)
    }

    /// Permanently retire an entity.
    ///
    /// Demands already queued for it still run to completion; its queue
    /// is removed once drained (and, for grouped bindings, once the last
    /// group member is gone).
    pub fn unbind(&self, key: &DemandKey) -> Result<()> {
        self.check_not_stopped()?;
        self.inner.registry.unbind(key)
    }

    /// Stop the dispatcher: release parked workers, let running workers
    /// finish their current batch, join the pool, and report whatever was
    /// still queued as discarded.
    ///
    /// Idempotent: a second call (or the private handle's drop after an
    /// explicit stop) returns an empty report.
    pub fn stop(&self) -> Result<ShutdownReport> {
        {
            let mut state = self.inner.state.lock();
            match *state {
                DispatcherState::Active => *state = DispatcherState::ShuttingDown,
                DispatcherState::ShuttingDown | DispatcherState::Stopped => {
                    return Ok(ShutdownReport { discarded: 0 });
                }
            }
        }

        tracing::info!("Dispatcher shutting down...");
        self.inner.events.publish(&DispatchEvent::DispatcherStopping);
        self.inner.registry.begin_shutdown();

        let pool = self.inner.workers.lock().take();
        let join_result = match pool {
            Some(pool) => pool.join(),
            None => Ok(()),
        };

        let discarded = self.inner.registry.discard_pending();
        if discarded > 0 {
            tracing::warn!("Discarded {} queued demands on shutdown", discarded);
            self.inner
                .events
                .publish(&DispatchEvent::DemandsDiscarded { count: discarded });
        }

        *self.inner.state.lock() = DispatcherState::Stopped;
        self.inner
            .events
            .publish(&DispatchEvent::DispatcherStopped { discarded });
        tracing::info!("Dispatcher stopped ({} demands discarded)", discarded);

        join_result?;
        Ok(ShutdownReport { discarded })
    }

    fn check_not_stopped(&self) -> Result<()> {
        if self.state().is_stopped() {
            return Err(DispatchError::DispatcherStopped);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &DispatchRegistry {
        &self.inner.registry
    }
}
