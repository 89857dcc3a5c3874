// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Demands and the keys that address them
//!
//! A demand is one queued unit of work: "run this handler for this entity
//! now". The dispatcher never looks inside it; it only owns it between
//! enqueue and execution.

use std::fmt;

use serde::Serialize;

use crate::core::error::Result;
use crate::core::params::OrderingMode;

/// Identifier the embedding runtime assigns to one entity (actor/agent).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// Identifier of the group (cooperation) an entity belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group:{}", self.0)
    }
}

/// Address external collaborators use when binding or enqueueing.
///
/// Every entity carries its group; the binding's [`OrderingMode`] decides
/// which of the two becomes the queue identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DemandKey {
    entity: EntityId,
    group: GroupId,
}

impl DemandKey {
    pub fn new(entity: EntityId, group: GroupId) -> Self {
        Self { entity, group }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    /// Project this key into the registry keyspace for the given ordering.
    pub(crate) fn queue_key(&self, ordering: OrderingMode) -> QueueKey {
        match ordering {
            OrderingMode::GroupedFifo => QueueKey::Group(self.group.clone()),
            OrderingMode::IndividualFifo => QueueKey::Entity(self.entity),
        }
    }
}

impl fmt::Display for DemandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.entity, self.group)
    }
}

/// Identity of one demand queue: a single entity or a whole group.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum QueueKey {
    Entity(EntityId),
    Group(GroupId),
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueKey::Entity(id) => write!(f, "{}", id),
            QueueKey::Group(id) => write!(f, "{}", id),
        }
    }
}

/// One queued event invocation.
///
/// Produced and owned by the external collaborator until handed to the
/// dispatcher; a worker consumes it exactly once. Handler failures are
/// contained to the single demand (see the worker loop).
pub struct Demand {
    label: Option<&'static str>,
    handler: Box<dyn FnOnce() -> Result<()> + Send + 'static>,
}

impl Demand {
    pub fn new(handler: impl FnOnce() -> Result<()> + Send + 'static) -> Self {
        Self {
            label: None,
            handler: Box::new(handler),
        }
    }

    /// Attach a static label used in failure reports.
    pub fn labeled(
        label: &'static str,
        handler: impl FnOnce() -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            label: Some(label),
            handler: Box::new(handler),
        }
    }

    pub fn label(&self) -> Option<&'static str> {
        self.label
    }

    /// Run the handler, consuming the demand.
    pub(crate) fn execute(self) -> Result<()> {
        (self.handler)()
    }
}

impl fmt::Debug for Demand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Demand")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
