// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Thread-pool dispatcher for actor-style runtimes.
//!
//! The embedding runtime produces *demands* (pending event invocations
//! addressed to an entity); this crate executes them on a bounded pool
//! of worker threads under per-binding ordering and fairness rules:
//!
//! - [`core::OrderingMode::GroupedFifo`] serializes all entities sharing
//!   a group on one demand queue;
//! - [`core::OrderingMode::IndividualFifo`] gives each entity its own
//!   queue, ordered internally but free to run in parallel with others;
//! - the per-binding batch limit bounds how long one queue can hold a
//!   worker before yielding back to the runnable list.
//!
//! ```no_run
//! use dispatchlib::core::{
//!     BindingParams, Demand, DemandKey, EntityId, GroupId, OrderingMode,
//!     PrivateDispatcherHandle,
//! };
//!
//! # fn main() -> dispatchlib::core::Result<()> {
//! let pool = PrivateDispatcherHandle::with_thread_count(4)?;
//! let binder = pool.binder_with(|p| {
//!     *p = p.with_ordering(OrderingMode::IndividualFifo).with_batch_limit(16);
//! })?;
//!
//! let key = DemandKey::new(EntityId(1), GroupId::new("ingest"));
//! binder.bind(&key)?;
//! binder.enqueue(&key, Demand::new(|| {
//!     // run one event handler
//!     Ok(())
//! }))?;
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use core::{
    BindingParams, Demand, DemandKey, DispatchError, DispatchEvent, DispatchListener, Dispatcher,
    DispatcherBinder, DispatcherDirectory, DispatcherState, EntityId, GroupId, OrderingMode,
    PrivateDispatcherHandle, Result, ShutdownReport, default_pool_size,
};
