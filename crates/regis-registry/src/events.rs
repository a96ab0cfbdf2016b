//! Registry change notifications.
//!
//! Every registration, removal, and value change is published as a
//! [`RegistryEvent`] to subscribers on broadcast channels. Delivery is
//! fire-and-forget: having no subscribers, or subscribers that lag or drop
//! their receivers, never affects the operation that produced the event.

use std::fmt;
use std::sync::RwLock;

use regis_types::Value;
use tokio::sync::broadcast;
use tracing::trace;

/// Classification of registry events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    RecordAdded,
    RecordRemoved,
    RecordModified,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RecordAdded => "RecordAdded",
            Self::RecordRemoved => "RecordRemoved",
            Self::RecordModified => "RecordModified",
        };
        write!(f, "{s}")
    }
}

/// A change to a record.
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryEvent {
    /// A record was registered.
    RecordAdded {
        key: String,
        interface_name: Option<String>,
    },
    /// A record was deleted; `value` is what it held.
    RecordRemoved {
        key: String,
        interface_name: Option<String>,
        value: Option<Value>,
    },
    /// A record's value changed.
    RecordModified {
        key: String,
        interface_name: Option<String>,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
}

impl RegistryEvent {
    pub fn key(&self) -> &str {
        match self {
            Self::RecordAdded { key, .. }
            | Self::RecordRemoved { key, .. }
            | Self::RecordModified { key, .. } => key,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::RecordAdded { .. } => EventKind::RecordAdded,
            Self::RecordRemoved { .. } => EventKind::RecordRemoved,
            Self::RecordModified { .. } => EventKind::RecordModified,
        }
    }
}

/// Filter for subscribing to a subset of registry events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events whose key starts with this prefix are delivered.
    pub key_prefix: Option<String>,
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// A filter delivering every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter delivering events for keys under `prefix`.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: Some(prefix.into()),
            kinds: None,
        }
    }

    /// Returns `true` if the given event matches this filter.
    pub fn matches(&self, event: &RegistryEvent) -> bool {
        if let Some(ref prefix) = self.key_prefix {
            if !event.key().starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&event.kind()) {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for registry events.
pub type EventStream = broadcast::Receiver<RegistryEvent>;

struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<RegistryEvent>,
}

/// Fan-out of registry events to filtered subscribers.
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            capacity,
        }
    }

    /// Register a subscriber and return its receiving end.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        let (tx, rx) = broadcast::channel(self.capacity);
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subs.push(Subscriber { filter, sender: tx });
        rx
    }

    /// Deliver an event to every matching subscriber.
    /// Subscribers whose receivers are all gone are pruned.
    pub fn emit(&self, event: RegistryEvent) {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if subs.is_empty() {
            return;
        }
        trace!(key = event.key(), kind = %event.kind(), "event emitted");
        subs.retain(|sub| {
            if sub.filter.matches(&event) {
                sub.sender.send(event.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .map(|subs| subs.len())
            .unwrap_or_default()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modified(key: &str) -> RegistryEvent {
        RegistryEvent::RecordModified {
            key: key.into(),
            interface_name: None,
            old_value: None,
            new_value: Some(Value::Int(1)),
        }
    }

    #[test]
    fn filter_by_prefix_and_kind() {
        let filter = EventFilter {
            key_prefix: Some("app.mail".into()),
            kinds: Some(vec![EventKind::RecordModified]),
        };
        assert!(filter.matches(&modified("app.mail.sender")));
        assert!(!filter.matches(&modified("app.other.sender")));
        assert!(!filter.matches(&RegistryEvent::RecordAdded {
            key: "app.mail.sender".into(),
            interface_name: None,
        }));
        assert!(EventFilter::all().matches(&modified("anything")));
    }

    #[test]
    fn subscribers_receive_matching_events() {
        let bus = EventBus::new(16);
        let mut mail = bus.subscribe(EventFilter::prefix("app.mail"));
        let mut all = bus.subscribe(EventFilter::all());

        bus.emit(modified("app.mail.sender"));
        bus.emit(modified("app.other.x"));

        assert_eq!(mail.try_recv().unwrap().key(), "app.mail.sender");
        assert!(mail.try_recv().is_err());
        assert_eq!(all.try_recv().unwrap().key(), "app.mail.sender");
        assert_eq!(all.try_recv().unwrap().key(), "app.other.x");
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.emit(modified("a.b"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let bus = EventBus::new(4);
        let rx = bus.subscribe(EventFilter::all());
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        bus.emit(modified("a.b"));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
