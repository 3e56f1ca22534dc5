// ── Message router ──
//
// Multi-subscriber dispatch table: `key -> (subscriber id -> handler)`.
// Used twice by the client: once keyed by inbound message kind, once by
// notification kind. Handlers run sequentially on the dispatching task;
// one failing handler never stops the rest.

use std::any::Any;
use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;

/// What a handler reports back. Errors are collected, never propagated.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A registered handler.
pub type Handler<P> = Arc<dyn Fn(&P) -> HandlerResult + Send + Sync>;

/// A handler that returned an error or panicked during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFault {
    pub kind: String,
    pub subscriber: String,
    pub message: String,
}

impl fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler '{}' for '{}' failed: {}",
            self.subscriber, self.kind, self.message
        )
    }
}

impl std::error::Error for HandlerFault {}

// ── Router ───────────────────────────────────────────────────────────

/// Dispatch table keyed by `K`, delivering payloads of type `P`.
///
/// Per key, handlers are kept in registration order. Re-subscribing an
/// existing `(key, subscriber)` pair replaces the handler in place.
pub struct Router<K, P> {
    table: DashMap<K, IndexMap<String, Handler<P>>>,
}

impl<K, P> Router<K, P>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    /// Register `handler` for `key` under `subscriber`. Last writer wins.
    pub fn subscribe<F>(&self, key: K, subscriber: impl Into<String>, handler: F)
    where
        F: Fn(&P) -> HandlerResult + Send + Sync + 'static,
    {
        let subscriber = subscriber.into();
        tracing::trace!(%key, %subscriber, "subscribe");
        self.table
            .entry(key)
            .or_default()
            .insert(subscriber, Arc::new(handler));
    }

    /// Remove the handler for `(key, subscriber)`. Missing pairs are ignored.
    pub fn unsubscribe(&self, key: &K, subscriber: &str) {
        if let Some(mut handlers) = self.table.get_mut(key) {
            handlers.shift_remove(subscriber);
        }
        self.table.remove_if(key, |_, handlers| handlers.is_empty());
    }

    pub fn is_subscribed(&self, key: &K, subscriber: &str) -> bool {
        self.table
            .get(key)
            .is_some_and(|handlers| handlers.contains_key(subscriber))
    }

    pub fn handler_count(&self, key: &K) -> usize {
        self.table.get(key).map_or(0, |handlers| handlers.len())
    }

    /// Run every handler registered for `key` with `payload`.
    ///
    /// Handlers are cloned out of the table before running, so a handler
    /// may subscribe or unsubscribe without deadlocking. Errors and panics
    /// are returned as [`HandlerFault`]s in handler order.
    pub fn dispatch(&self, key: &K, payload: &P) -> Vec<HandlerFault> {
        let handlers: Vec<(String, Handler<P>)> = match self.table.get(key) {
            Some(entry) => entry
                .iter()
                .map(|(id, handler)| (id.clone(), Arc::clone(handler)))
                .collect(),
            None => return Vec::new(),
        };

        let mut faults = Vec::new();
        for (subscriber, handler) in handlers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(payload)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
            };
            tracing::warn!(%key, %subscriber, %message, "handler failed");
            faults.push(HandlerFault {
                kind: key.to_string(),
                subscriber,
                message,
            });
        }
        faults
    }
}

impl<K, P> Default for Router<K, P>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
