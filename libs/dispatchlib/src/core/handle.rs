// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Private dispatcher ownership and binders
//!
//! A private dispatcher is owned by whoever holds its handle rather than
//! by a global runtime registry. The handle is reference-counted: the
//! moment the last owner releases it, shutdown begins synchronously.
//! Binders are the opaque routing objects the embedding runtime uses to
//! direct entities at a dispatcher with fixed binding parameters.

use std::sync::Arc;

use crate::core::demand::{Demand, DemandKey};
use crate::core::dispatcher::Dispatcher;
use crate::core::error::Result;
use crate::core::params::{BindingParams, default_pool_size};

struct OwnedDispatcher {
    dispatcher: Dispatcher,
}

impl Drop for OwnedDispatcher {
    fn drop(&mut self) {
        // Last owner released: initiate shutdown now. Errors can only be
        // logged from a drop path.
        match self.dispatcher.stop() {
            Ok(report) if report.discarded > 0 => {
                tracing::warn!(
                    "Private dispatcher released with {} demands still queued",
                    report.discarded
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Private dispatcher teardown failed: {}", e),
        }
    }
}

/// Reference-counted handle to a privately owned dispatcher.
///
/// Clones share one dispatcher; dropping the last clone stops it. A
/// [`DispatcherBinder`] created from this handle keeps the dispatcher
/// alive for as long as the binder exists.
#[derive(Clone)]
pub struct PrivateDispatcherHandle {
    inner: Arc<OwnedDispatcher>,
}

impl PrivateDispatcherHandle {
    /// Create a private dispatcher sized by host introspection.
    pub fn new() -> Result<Self> {
        Self::with_thread_count(default_pool_size())
    }

    /// Create a private dispatcher with an explicit worker count.
    pub fn with_thread_count(thread_count: usize) -> Result<Self> {
        let dispatcher = Dispatcher::with_thread_count(thread_count)?;
        Ok(Self {
            inner: Arc::new(OwnedDispatcher { dispatcher }),
        })
    }

    /// The underlying dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Create a binder routing entities to this dispatcher with `params`.
    ///
    /// Fails with a configuration error when `params.batch_limit()` is
    /// zero.
    pub fn binder(&self, params: BindingParams) -> Result<DispatcherBinder> {
        params.validate()?;
        Ok(DispatcherBinder {
            dispatcher: self.inner.dispatcher.clone(),
            params,
            _owner: Some(self.clone()),
        })
    }

    /// Convenience overload: default-construct params, let `configure`
    /// mutate them, then validate and bind.
    pub fn binder_with(
        &self,
        configure: impl FnOnce(&mut BindingParams),
    ) -> Result<DispatcherBinder> {
        let mut params = BindingParams::default();
        configure(&mut params);
        self.binder(params)
    }
}

/// Opaque routing object: one dispatcher plus one set of binding
/// parameters, handed to the embedding runtime.
pub struct DispatcherBinder {
    dispatcher: Dispatcher,
    params: BindingParams,
    /// Keeps a private dispatcher alive while the binder exists; `None`
    /// for binders over shared (named) dispatchers.
    _owner: Option<PrivateDispatcherHandle>,
}

impl DispatcherBinder {
    pub(crate) fn over_shared(dispatcher: Dispatcher, params: BindingParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            dispatcher,
            params,
            _owner: None,
        })
    }

    pub fn params(&self) -> BindingParams {
        self.params
    }

    /// Associate an entity with the bound dispatcher.
    pub fn bind(&self, key: &DemandKey) -> Result<()> {
        self.dispatcher.bind(key, self.params)
    }

    /// Enqueue a demand under this binder's parameters.
    pub fn enqueue(&self, key: &DemandKey, demand: Demand) -> Result<()> {
        self.dispatcher.enqueue(key, self.params, demand)
    }

    /// Permanently retire an entity from the bound dispatcher.
    pub fn unbind(&self, key: &DemandKey) -> Result<()> {
        self.dispatcher.unbind(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::demand::{EntityId, GroupId};
    use crate::core::error::DispatchError;
    use crate::core::params::OrderingMode;
    use std::time::Duration;

    fn key(entity: u64) -> DemandKey {
        DemandKey::new(EntityId(entity), GroupId::new("private"))
    }

    #[test]
    fn binder_rejects_zero_batch_limit() {
        let handle = PrivateDispatcherHandle::with_thread_count(1).unwrap();
        assert!(matches!(
            handle.binder(BindingParams::new().with_batch_limit(0)),
            Err(DispatchError::Configuration(_))
        ));
    }

    #[test]
    fn binder_with_applies_the_configurator() {
        let handle = PrivateDispatcherHandle::with_thread_count(1).unwrap();
        let binder = handle
            .binder_with(|p| {
                *p = p
                    .with_ordering(OrderingMode::IndividualFifo)
                    .with_batch_limit(8);
            })
            .unwrap();
        assert_eq!(binder.params().batch_limit(), 8);
        assert_eq!(binder.params().ordering(), OrderingMode::IndividualFifo);
    }

    #[test]
    fn last_owner_release_stops_the_dispatcher() {
        let handle = PrivateDispatcherHandle::with_thread_count(1).unwrap();
        let observer = handle.dispatcher().clone();

        let second_owner = handle.clone();
        drop(handle);
        assert!(observer.state().is_active());

        drop(second_owner);
        assert!(observer.state().is_stopped());
    }

    #[test]
    fn live_binder_keeps_the_dispatcher_alive() {
        let handle = PrivateDispatcherHandle::with_thread_count(1).unwrap();
        let observer = handle.dispatcher().clone();
        let binder = handle.binder(BindingParams::default()).unwrap();

        drop(handle);
        assert!(observer.state().is_active());

        let (tx, rx) = crossbeam_channel::bounded(1);
        binder
            .enqueue(
                &key(1),
                Demand::new(move || {
                    tx.send(()).ok();
                    Ok(())
                }),
            )
            .unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        drop(binder);
        assert!(observer.state().is_stopped());
    }
}
