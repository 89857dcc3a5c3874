// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Dispatch observability events
//!
//! Execution failures, shutdown discards, and lifecycle transitions are
//! reported to registered listeners in addition to `tracing` output.
//! Discards are a distinct event from failures on purpose: stopping a
//! busy dispatcher is expected, a failing handler is not.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::demand::QueueKey;
use crate::core::error::Result;

/// Events emitted by a dispatcher.
#[derive(Debug, Clone, Serialize)]
pub enum DispatchEvent {
    /// One demand's handler failed; the worker continued with the rest
    /// of its batch.
    DemandFailed {
        key: QueueKey,
        label: Option<&'static str>,
        error: String,
    },
    /// Demands still queued at teardown were discarded, not executed.
    DemandsDiscarded { count: usize },
    /// The dispatcher entered `ShuttingDown`.
    DispatcherStopping,
    /// Every worker has exited; the dispatcher is `Stopped`.
    DispatcherStopped { discarded: usize },
}

/// Trait for objects that receive dispatch events.
pub trait DispatchListener: Send {
    fn on_event(&mut self, event: &DispatchEvent) -> Result<()>;
}

/// Per-dispatcher listener registry.
///
/// Listeners are held as weak references, so dropping a listener is an
/// implicit unsubscribe; dead entries are pruned on the next publish.
pub(crate) struct ListenerHub {
    listeners: Mutex<Vec<Weak<Mutex<dyn DispatchListener>>>>,
}

impl ListenerHub {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self, listener: Arc<Mutex<dyn DispatchListener>>) {
        self.listeners.lock().push(Arc::downgrade(&listener));
    }

    /// Deliver `event` to every live listener.
    ///
    /// Listener errors are logged and never propagate into the worker or
    /// teardown path that published the event.
    pub(crate) fn publish(&self, event: &DispatchEvent) {
        let live: Vec<_> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|weak| weak.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };

        for listener in live {
            if let Err(e) = listener.lock().on_event(event) {
                tracing::warn!("Dispatch listener failed on {:?}: {}", event, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        seen: Arc<Mutex<Vec<DispatchEvent>>>,
    }

    impl DispatchListener for Recorder {
        fn on_event(&mut self, event: &DispatchEvent) -> Result<()> {
            self.seen.lock().push(event.clone());
            Ok(())
        }
    }

    #[test]
    fn live_listeners_receive_events() {
        let hub = ListenerHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let listener: Arc<Mutex<dyn DispatchListener>> = Arc::new(Mutex::new(Recorder {
            seen: seen.clone(),
        }));
        hub.subscribe(listener.clone());

        hub.publish(&DispatchEvent::DispatcherStopping);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn dropped_listeners_are_pruned() {
        let hub = ListenerHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let listener: Arc<Mutex<dyn DispatchListener>> = Arc::new(Mutex::new(Recorder {
                seen: seen.clone(),
            }));
            hub.subscribe(listener);
        }
        hub.publish(&DispatchEvent::DemandsDiscarded { count: 3 });
        assert!(seen.lock().is_empty());
        assert!(hub.listeners.lock().is_empty());
    }
}
