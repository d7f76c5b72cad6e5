//! Explicit event bus.
//!
//! Listeners register through [`EventBus::subscribe`] and stay registered for
//! as long as the returned [`Subscription`] is alive. The bus is owned by the
//! composition root and handed out by reference; there are no global listener
//! lists.

use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::core::access::AccessTier;
use crate::core::screen::ScreenId;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    listeners: Vec<(u64, Callback<E>)>,
}

/// Publish/subscribe hub for one event type.
pub struct EventBus<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: 'static> EventBus<E> {
    /// Create a bus with no listeners.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener.
    ///
    /// The listener is removed when the returned subscription is dropped or
    /// [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    lock(&registry).listeners.retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Deliver an event to every current listener. Returns how many were
    /// called.
    ///
    /// Listeners run outside the registry lock, so a listener may subscribe or
    /// unsubscribe without deadlocking.
    pub fn publish(&self, event: &E) -> usize {
        let listeners: Vec<Callback<E>> = lock(&self.registry)
            .listeners
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

impl<E: 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .registry
            .lock()
            .map(|r| r.listeners.len())
            .unwrap_or_default();
        f.debug_struct("EventBus").field("listeners", &count).finish()
    }
}

fn lock<E>(registry: &Mutex<Registry<E>>) -> std::sync::MutexGuard<'_, Registry<E>> {
    // A listener panicking mid-publish does not corrupt the list itself.
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle returned by [`EventBus::subscribe`].
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}

/// Published by the navigation gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationEvent {
    ScreenChanged {
        from: ScreenId,
        to: ScreenId,
        tier: AccessTier,
    },
}

/// Published by the workspace-update path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressionEvent {
    /// Onboarding step was raised.
    Advanced {
        workspace_id: String,
        from: u32,
        to: u32,
    },
    /// Onboarding step was explicitly reset.
    Reset {
        workspace_id: String,
        from: u32,
        to: u32,
    },
}
