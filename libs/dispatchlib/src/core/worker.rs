// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Worker pool - fixed set of threads driving the demand queues
//!
//! Each worker runs the same loop: acquire the next runnable queue from
//! the registry (blocking), execute up to the queue's batch limit, hand
//! the queue back, repeat. The loop ends when the registry returns its
//! shutdown sentinel; a worker mid-batch finishes that batch first.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::core::error::{DispatchError, Result};
use crate::core::events::{DispatchEvent, ListenerHub};
use crate::core::registry::DispatchRegistry;

pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` long-lived worker threads.
    ///
    /// No thread is created or destroyed per unit of work after this.
    pub(crate) fn spawn(
        count: usize,
        registry: Arc<DispatchRegistry>,
        events: Arc<ListenerHub>,
    ) -> Result<Self> {
        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let registry = Arc::clone(&registry);
            let events = Arc::clone(&events);
            let handle = std::thread::Builder::new()
                .name(format!("dispatch-worker-{}", index))
                .spawn(move || worker_loop(index, &registry, &events))?;
            handles.push(handle);
        }
        Ok(Self { handles })
    }

    /// Wait for every worker to exit its loop.
    ///
    /// Callable only after the registry has begun shutdown, otherwise
    /// this blocks forever on parked workers.
    pub(crate) fn join(self) -> Result<()> {
        let mut panicked = Vec::new();
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("dispatch-worker").to_string();
            if handle.join().is_err() {
                tracing::error!("Worker thread '{}' panicked", name);
                panicked.push(name);
            }
        }
        if panicked.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::Runtime(format!(
                "Worker threads panicked: {}",
                panicked.join(", ")
            )))
        }
    }
}

fn worker_loop(index: usize, registry: &DispatchRegistry, events: &ListenerHub) {
    tracing::debug!("Worker {} started", index);

    while let Some(queue) = registry.acquire_next_runnable() {
        let limit = queue.params().batch_limit();
        for demand in queue.take_batch(limit) {
            let label = demand.label();
            if let Err(e) = demand.execute() {
                // One failing demand never takes down the worker or the
                // queue; report and move on.
                tracing::warn!(
                    "Demand {} on queue '{}' failed: {}",
                    label.unwrap_or("<unlabeled>"),
                    queue.key(),
                    e
                );
                events.publish(&DispatchEvent::DemandFailed {
                    key: queue.key().clone(),
                    label,
                    error: e.to_string(),
                });
            }
        }
        registry.finish_batch(&queue);
    }

    tracing::debug!("Worker {} stopped", index);
}
