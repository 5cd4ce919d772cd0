//! Engine events
//!
//! A small publish-subscribe bus with no dependency on any UI framework.
//! Hosts subscribe a handler and receive profile-change, decision and error
//! events; `subscribe` returns a token that unsubscribes the handler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;
use uuid::Uuid;

use crate::core::context::PermissionContext;
use crate::rules::PermissionResult;

/// What changed in the profile store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileChangeKind {
    ProfileCreated,
    ProfileUpdated,
    ProfileDeleted,
    ProfileActivated,
    RuleAdded,
    RuleUpdated,
    RuleDeleted,
}

/// Events surfaced to subscribers
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A profile or one of its rules was mutated
    ProfileChange {
        kind: ProfileChangeKind,
        profile_id: String,
        rule_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// A permission evaluation completed
    Decision {
        context: PermissionContext,
        result: PermissionResult,
    },
    /// Evaluation or persistence failed; the engine degraded gracefully
    Error {
        message: String,
        context: Option<PermissionContext>,
    },
}

/// Token returned by `subscribe`; pass it to `unsubscribe`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

type EventHandler = Box<dyn Fn(&EngineEvent) + Send + Sync>;

/// Publish-subscribe bus for engine events
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<Vec<(SubscriptionId, EventHandler)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for all engine events
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4().to_string());
        self.handlers
            .write()
            .expect("event bus lock poisoned")
            .push((id.clone(), Box::new(handler)));
        id
    }

    /// Remove a handler; returns false if the token is unknown
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().expect("event bus lock poisoned");
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| handler_id != id);
        handlers.len() != before
    }

    /// Deliver an event to every subscriber in registration order
    pub fn emit(&self, event: &EngineEvent) {
        let handlers = self.handlers.read().expect("event bus lock poisoned");
        for (_, handler) in handlers.iter() {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().expect("event bus lock poisoned").len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn change_event() -> EngineEvent {
        EngineEvent::ProfileChange {
            kind: ProfileChangeKind::ProfileCreated,
            profile_id: "p1".into(),
            rule_id: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_subscribe_and_emit() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_clone = seen.clone();
        bus.subscribe(move |_event| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&change_event());
        bus.emit(&change_event());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_clone = seen.clone();
        let id = bus.subscribe(move |_event| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&change_event());
        assert!(bus.unsubscribe(&id));
        bus.emit(&change_event());

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);

        // Unknown token
        assert!(!bus.unsubscribe(&id));
    }

    #[test]
    fn test_multiple_subscribers_all_fire() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let seen_clone = seen.clone();
            bus.subscribe(move |_event| {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit(&change_event());
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
