// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Dispatch registry - the rendezvous between producers and workers
//!
//! The registry owns the key->queue map, the FIFO runnable list, and the
//! binding/membership bookkeeping. `acquire_next_runnable` is the single
//! blocking point in the whole dispatcher: workers park on the condvar
//! and wake when a producer makes an idle queue runnable or when
//! shutdown begins.
//!
//! Lock discipline: the registry mutex may be held while taking a
//! queue's own lock, never the other way around. Producers push into a
//! queue first (queue lock only), then hand it to the runnable list
//! (registry lock only).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::core::demand::{Demand, DemandKey, EntityId, QueueKey};
use crate::core::error::{DispatchError, Result};
use crate::core::params::BindingParams;
use crate::core::queue::{BatchDisposition, DemandQueue};

struct RegistryInner {
    /// Live queues, keyed by entity id or group id.
    queues: HashMap<QueueKey, Arc<DemandQueue>>,
    /// Queues waiting for a worker, FIFO by time of becoming runnable.
    runnable: VecDeque<Arc<DemandQueue>>,
    /// Entities currently bound to each queue; a queue retires when the
    /// last member unbinds.
    members: HashMap<QueueKey, HashSet<EntityId>>,
    /// Which queue each bound entity routes to.
    bindings: HashMap<EntityId, QueueKey>,
    shutting_down: bool,
}

impl RegistryInner {
    /// Look up or lazily create the queue for `queue_key`.
    ///
    /// Idempotent per key. A live key never re-binds to different
    /// parameters, and no new keys appear once shutdown has begun.
    fn resolve_queue(
        &mut self,
        queue_key: &QueueKey,
        params: BindingParams,
    ) -> Result<Arc<DemandQueue>> {
        if let Some(queue) = self.queues.get(queue_key) {
            if queue.params() != params {
                return Err(DispatchError::Configuration(format!(
                    "Queue '{}' is already bound with different parameters",
                    queue_key
                )));
            }
            return Ok(Arc::clone(queue));
        }

        if self.shutting_down {
            return Err(DispatchError::DispatcherStopped);
        }

        let queue = Arc::new(DemandQueue::new(queue_key.clone(), params));
        self.queues.insert(queue_key.clone(), Arc::clone(&queue));
        tracing::debug!("Created demand queue '{}'", queue_key);
        Ok(queue)
    }

    /// Record that `entity` routes to `queue_key`, rejecting conflicts.
    fn record_membership(&mut self, entity: EntityId, queue_key: &QueueKey) -> Result<()> {
        if let Some(existing) = self.bindings.get(&entity) {
            if existing != queue_key {
                return Err(DispatchError::Configuration(format!(
                    "{} is already bound to '{}', cannot rebind to '{}'",
                    entity, existing, queue_key
                )));
            }
            return Ok(());
        }
        self.bindings.insert(entity, queue_key.clone());
        self.members
            .entry(queue_key.clone())
            .or_default()
            .insert(entity);
        Ok(())
    }
}

/// Shared structure mapping live entities/groups to their demand queues
/// and tracking which queues are currently runnable.
pub(crate) struct DispatchRegistry {
    inner: Mutex<RegistryInner>,
    runnable_available: Condvar,
}

impl DispatchRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                queues: HashMap::new(),
                runnable: VecDeque::new(),
                members: HashMap::new(),
                bindings: HashMap::new(),
                shutting_down: false,
            }),
            runnable_available: Condvar::new(),
        }
    }

    /// Associate an entity with this dispatcher (first lifecycle step).
    pub(crate) fn bind(&self, key: &DemandKey, params: BindingParams) -> Result<()> {
        let queue_key = key.queue_key(params.ordering());
        let mut inner = self.inner.lock();
        let queue = inner.resolve_queue(&queue_key, params)?;
        Self::reject_retired(&queue)?;
        inner.record_membership(key.entity(), &queue_key)
    }

    /// Enqueue one demand, creating the queue lazily on first use.
    pub(crate) fn enqueue(
        &self,
        key: &DemandKey,
        params: BindingParams,
        demand: Demand,
    ) -> Result<()> {
        let queue_key = key.queue_key(params.ordering());
        let queue = {
            let mut inner = self.inner.lock();
            let queue = inner.resolve_queue(&queue_key, params)?;
            // Checked before membership is recorded, so a rejected push
            // cannot resurrect a retired key's bookkeeping.
            Self::reject_retired(&queue)?;
            inner.record_membership(key.entity(), &queue_key)?;
            queue
        };

        // Push outside the registry lock; only the idle->runnable edge
        // comes back for the runnable list.
        if queue.push(demand)? {
            self.mark_runnable(queue);
        }
        Ok(())
    }

    fn reject_retired(queue: &Arc<DemandQueue>) -> Result<()> {
        if queue.is_retired() {
            return Err(DispatchError::Configuration(format!(
                "Queue '{}' is retired and no longer accepts demands",
                queue.key()
            )));
        }
        Ok(())
    }

    /// Insert a queue at the tail of the runnable list and wake a worker.
    pub(crate) fn mark_runnable(&self, queue: Arc<DemandQueue>) {
        let mut inner = self.inner.lock();
        inner.runnable.push_back(queue);
        drop(inner);
        self.runnable_available.notify_one();
    }

    /// Block until a queue is runnable or shutdown begins.
    ///
    /// Returns `None` as the shutdown sentinel. Workers must not call
    /// this again after receiving `None`.
    pub(crate) fn acquire_next_runnable(&self) -> Option<Arc<DemandQueue>> {
        let mut inner = self.inner.lock();
        loop {
            if inner.shutting_down {
                return None;
            }
            if let Some(queue) = inner.runnable.pop_front() {
                queue.mark_running();
                return Some(queue);
            }
            self.runnable_available.wait(&mut inner);
        }
    }

    /// Return a queue after a worker's batch: tail re-insertion when work
    /// remains (the fairness mechanism), removal when a retired queue has
    /// drained.
    pub(crate) fn finish_batch(&self, queue: &Arc<DemandQueue>) {
        match queue.finish_batch() {
            BatchDisposition::Requeue => self.mark_runnable(Arc::clone(queue)),
            BatchDisposition::Idle => {}
            BatchDisposition::Retire => {
                let mut inner = self.inner.lock();
                inner.queues.remove(queue.key());
                tracing::debug!("Retired drained queue '{}'", queue.key());
            }
        }
    }

    /// Permanently retire an entity. The queue itself is removed once the
    /// last member unbinds *and* the queue has drained; demands already
    /// queued still run to completion.
    pub(crate) fn unbind(&self, key: &DemandKey) -> Result<()> {
        let mut inner = self.inner.lock();
        let entity = key.entity();
        let Some(queue_key) = inner.bindings.remove(&entity) else {
            return Err(DispatchError::NotBound(entity.to_string()));
        };

        let last_member = match inner.members.get_mut(&queue_key) {
            Some(set) => {
                set.remove(&entity);
                set.is_empty()
            }
            None => true,
        };
        if !last_member {
            return Ok(());
        }

        inner.members.remove(&queue_key);
        if let Some(queue) = inner.queues.get(&queue_key) {
            if queue.mark_retired() {
                inner.queues.remove(&queue_key);
                tracing::debug!("Retired idle queue '{}'", queue_key);
            } else {
                tracing::debug!("Deferred retirement of draining queue '{}'", queue_key);
            }
        }
        Ok(())
    }

    /// Release every parked worker and refuse new keys from now on.
    pub(crate) fn begin_shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.shutting_down = true;
        drop(inner);
        self.runnable_available.notify_all();
    }

    /// Drop everything still queued and clear the registry.
    ///
    /// Only valid after the worker pool has been joined; returns the
    /// number of demands discarded.
    pub(crate) fn discard_pending(&self) -> usize {
        let mut inner = self.inner.lock();
        let discarded: usize = inner
            .queues
            .values()
            .map(|queue| queue.discard_remaining())
            .sum();
        inner.queues.clear();
        inner.runnable.clear();
        inner.members.clear();
        inner.bindings.clear();
        discarded
    }

    /// Total demands currently queued across all queues.
    pub(crate) fn pending_demands(&self) -> usize {
        let inner = self.inner.lock();
        inner.queues.values().map(|queue| queue.len()).sum()
    }

    #[cfg(test)]
    pub(crate) fn queue_count(&self) -> usize {
        self.inner.lock().queues.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::demand::GroupId;
    use crate::core::params::OrderingMode;

    fn key(entity: u64, group: &str) -> DemandKey {
        DemandKey::new(EntityId(entity), GroupId::new(group))
    }

    fn individual() -> BindingParams {
        BindingParams::new().with_ordering(OrderingMode::IndividualFifo)
    }

    fn noop() -> Demand {
        Demand::new(|| Ok(()))
    }

    #[test]
    fn resolve_is_idempotent_per_key() {
        let registry = DispatchRegistry::new();
        let k = key(1, "g");
        registry.bind(&k, individual()).unwrap();
        registry.bind(&k, individual()).unwrap();
        registry.enqueue(&k, individual(), noop()).unwrap();
        assert_eq!(registry.queue_count(), 1);
    }

    #[test]
    fn rebinding_a_live_key_with_different_params_fails() {
        let registry = DispatchRegistry::new();
        registry.bind(&key(1, "g"), individual()).unwrap();
        let other = individual().with_batch_limit(32);
        assert!(matches!(
            registry.bind(&key(1, "g"), other),
            Err(DispatchError::Configuration(_))
        ));
    }

    #[test]
    fn grouped_entities_share_one_queue() {
        let registry = DispatchRegistry::new();
        let params = BindingParams::default();
        registry.bind(&key(1, "coop"), params).unwrap();
        registry.bind(&key(2, "coop"), params).unwrap();
        assert_eq!(registry.queue_count(), 1);
    }

    #[test]
    fn runnable_selection_is_fifo() {
        let registry = DispatchRegistry::new();
        for entity in 0..3 {
            registry
                .enqueue(&key(entity, "g"), individual(), noop())
                .unwrap();
        }
        for entity in 0..3 {
            let queue = registry.acquire_next_runnable().unwrap();
            assert_eq!(queue.key(), &QueueKey::Entity(EntityId(entity)));
            registry.finish_batch(&queue);
        }
    }

    #[test]
    fn acquire_returns_sentinel_on_shutdown() {
        let registry = DispatchRegistry::new();
        registry.enqueue(&key(1, "g"), individual(), noop()).unwrap();
        registry.begin_shutdown();
        // Shutdown wins over remaining runnable queues.
        assert!(registry.acquire_next_runnable().is_none());
    }

    #[test]
    fn new_keys_are_rejected_during_shutdown() {
        let registry = DispatchRegistry::new();
        registry.enqueue(&key(1, "g"), individual(), noop()).unwrap();
        registry.begin_shutdown();
        let err = registry
            .enqueue(&key(2, "g"), individual(), noop())
            .unwrap_err();
        assert!(matches!(err, DispatchError::DispatcherStopped));
        // The message must not claim the dispatcher already stopped while
        // existing queues are still draining.
        assert!(err.to_string().contains("shutting down"));
        // The pre-existing queue still accepts work while draining.
        registry.enqueue(&key(1, "g"), individual(), noop()).unwrap();
        assert_eq!(registry.pending_demands(), 2);
    }

    #[test]
    fn grouped_queue_retires_with_its_last_member() {
        let registry = DispatchRegistry::new();
        let params = BindingParams::default();
        registry.bind(&key(1, "coop"), params).unwrap();
        registry.bind(&key(2, "coop"), params).unwrap();

        registry.unbind(&key(1, "coop")).unwrap();
        assert_eq!(registry.queue_count(), 1);
        registry.unbind(&key(2, "coop")).unwrap();
        assert_eq!(registry.queue_count(), 0);
    }

    #[test]
    fn queued_demands_survive_unbind_until_drained() {
        let registry = DispatchRegistry::new();
        let k = key(1, "g");
        registry.enqueue(&k, individual(), noop()).unwrap();
        registry.unbind(&k).unwrap();
        // Deferred: the queue is still registered and still runnable.
        assert_eq!(registry.queue_count(), 1);

        let queue = registry.acquire_next_runnable().unwrap();
        for demand in queue.take_batch(4) {
            demand.execute().unwrap();
        }
        registry.finish_batch(&queue);
        assert_eq!(registry.queue_count(), 0);
    }

    #[test]
    fn retired_draining_queue_rejects_new_work_and_members() {
        let registry = DispatchRegistry::new();
        let k = key(1, "g");
        registry.enqueue(&k, individual(), noop()).unwrap();
        registry.unbind(&k).unwrap();

        assert!(matches!(
            registry.enqueue(&k, individual(), noop()),
            Err(DispatchError::Configuration(_))
        ));
        // The rejected enqueue must not have re-bound the entity.
        assert!(matches!(
            registry.unbind(&k),
            Err(DispatchError::NotBound(_))
        ));
    }

    #[test]
    fn unbinding_an_unknown_entity_fails() {
        let registry = DispatchRegistry::new();
        assert!(matches!(
            registry.unbind(&key(9, "g")),
            Err(DispatchError::NotBound(_))
        ));
    }

    #[test]
    fn discard_pending_counts_every_queued_demand() {
        let registry = DispatchRegistry::new();
        for _ in 0..5 {
            registry.enqueue(&key(1, "g"), individual(), noop()).unwrap();
            registry.enqueue(&key(2, "g"), individual(), noop()).unwrap();
        }
        registry.begin_shutdown();
        assert_eq!(registry.discard_pending(), 10);
        assert_eq!(registry.queue_count(), 0);
    }
}
