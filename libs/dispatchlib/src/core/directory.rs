// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Named dispatcher directory
//!
//! When a dispatcher is registered by name in a larger runtime instead
//! of being held privately, binders are created against the directory.
//! The directory is an explicit value owned by the embedding runtime,
//! not process-wide state.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::core::dispatcher::Dispatcher;
use crate::core::error::{DispatchError, Result};
use crate::core::handle::DispatcherBinder;
use crate::core::params::BindingParams;

/// Name -> dispatcher map with binder factories.
#[derive(Default)]
pub struct DispatcherDirectory {
    entries: Mutex<HashMap<String, Dispatcher>>,
}

impl DispatcherDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dispatcher under `name`. Duplicate names are rejected.
    pub fn register(&self, name: impl Into<String>, dispatcher: Dispatcher) -> Result<()> {
        let name = name.into();
        let mut entries = self.entries.lock();
        if entries.contains_key(&name) {
            return Err(DispatchError::Configuration(format!(
                "Dispatcher '{}' is already registered",
                name
            )));
        }
        tracing::debug!("Registered dispatcher '{}'", name);
        entries.insert(name, dispatcher);
        Ok(())
    }

    /// Remove and return the dispatcher registered under `name`.
    pub fn deregister(&self, name: &str) -> Option<Dispatcher> {
        self.entries.lock().remove(name)
    }

    /// Look up a registered dispatcher.
    pub fn get(&self, name: &str) -> Option<Dispatcher> {
        self.entries.lock().get(name).cloned()
    }

    /// Create a binder for the named dispatcher with `params`.
    pub fn binder(&self, name: &str, params: BindingParams) -> Result<DispatcherBinder> {
        let dispatcher = self
            .get(name)
            .ok_or_else(|| DispatchError::NotBound(format!("dispatcher '{}'", name)))?;
        DispatcherBinder::over_shared(dispatcher, params)
    }

    /// Convenience overload mirroring
    /// [`PrivateDispatcherHandle::binder_with`]: default params, mutate,
    /// validate, bind.
    ///
    /// [`PrivateDispatcherHandle::binder_with`]: crate::core::handle::PrivateDispatcherHandle::binder_with
    pub fn binder_with(
        &self,
        name: &str,
        configure: impl FnOnce(&mut BindingParams),
    ) -> Result<DispatcherBinder> {
        let mut params = BindingParams::default();
        configure(&mut params);
        self.binder(name, params)
    }
}
