// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod demand;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handle;
pub mod params;

pub(crate) mod queue;
pub(crate) mod registry;
pub(crate) mod worker;

pub use demand::{Demand, DemandKey, EntityId, GroupId, QueueKey};
pub use directory::DispatcherDirectory;
pub use dispatcher::{Dispatcher, DispatcherState, ShutdownReport};
pub use error::{DispatchError, Result};
pub use events::{DispatchEvent, DispatchListener};
pub use handle::{DispatcherBinder, PrivateDispatcherHandle};
pub use params::{BindingParams, DEFAULT_BATCH_LIMIT, OrderingMode, default_pool_size};
