//! Notification routing by method name
//!
//! Server-pushed messages carry no id, so they are correlated by method name
//! instead of request identity. Listeners are appended per method and invoked
//! synchronously in registration order; there is no queueing or backpressure,
//! so a listener that blocks delays delivery of later frames on the same
//! connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::trace;

use crate::rpc::protocol::Notification;

type Listener = Arc<dyn Fn(Value) + Send + Sync>;

/// Append-only table of per-method notification listeners
#[derive(Default)]
pub struct SubscriptionBus {
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
}

impl SubscriptionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for a method name. Multiple listeners per method
    /// are permitted and fire in registration order.
    pub fn subscribe<F>(&self, method: impl Into<String>, listener: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock().expect("subscription table poisoned");
        listeners
            .entry(method.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Deliver a notification to every listener registered for its method.
    /// A notification nobody listens for is dropped without error.
    pub fn publish(&self, notification: Notification) {
        let registered = {
            let listeners = self.listeners.lock().expect("subscription table poisoned");
            listeners.get(&notification.method).cloned()
        };
        match registered {
            Some(registered) if !registered.is_empty() => {
                for listener in &registered {
                    listener(notification.params.clone());
                }
            }
            _ => {
                trace!(method = %notification.method, "dropping notification with no listener");
            }
        }
    }
}
