// SPDX-License-Identifier: MIT OR Apache-2.0
//! Topic-addressed event bus.
//!
//! Stand-in for the platform's system-wide event service: endpoints publish
//! their capability objects under a token-suffixed topic during connection
//! setup, and daemons exchange out-of-band commands over the broadcast
//! topics. The bus is an explicitly constructed service shared by `Arc`;
//! there is no process-global instance.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

/// Topic prefix under which a server publishes its api-caller endpoint; the
/// session token is appended.
pub const TOPIC_CALLER_PUBLISH_PREFIX: &str = "uitest.api.caller.publish#";
/// Out-of-band command topic.
pub const TOPIC_BROADCAST_COMMAND: &str = "uitest.broadcast.command";
/// Reply topic of the out-of-band command channel.
pub const TOPIC_BROADCAST_COMMAND_REPLY: &str = "uitest.broadcast.command.reply";

/// The discovery topic for a session token.
#[must_use]
pub fn caller_publish_topic(token: &str) -> String {
    format!("{TOPIC_CALLER_PUBLISH_PREFIX}{token}")
}

/// Type-erased capability object carried in an event payload. The receiver
/// downcasts it to the endpoint trait it expects.
pub type EndpointHandle = Arc<dyn Any + Send + Sync>;

/// One event: a topic, JSON parameters, and at most one capability object.
#[derive(Clone)]
pub struct BusEvent {
    /// Topic the event was published under.
    pub topic: String,
    /// Key-value parameters.
    pub params: Map<String, Value>,
    /// Capability object riding along, if any.
    pub endpoint: Option<EndpointHandle>,
}

impl BusEvent {
    /// An event with no parameters or endpoint.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            params: Map::new(),
            endpoint: None,
        }
    }

    /// Builder-style parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Builder-style capability object.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: EndpointHandle) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Read a parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

impl std::fmt::Debug for BusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusEvent")
            .field("topic", &self.topic)
            .field("params", &self.params)
            .field("endpoint", &self.endpoint.is_some())
            .finish()
    }
}

/// Bus failures.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Nobody is subscribed to the topic; the event was dropped.
    #[error("no subscriber on topic '{0}'")]
    NoSubscribers(String),
}

/// Per-topic channel capacity. Discovery and command traffic is sparse.
const TOPIC_CAPACITY: usize = 16;

/// Topic-addressed broadcast bus.
#[derive(Default)]
pub struct EventBus {
    topics: Mutex<HashMap<String, broadcast::Sender<BusEvent>>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event to its topic.
    ///
    /// Returns the number of subscribers reached, or
    /// [`BusError::NoSubscribers`] when the event went nowhere; discovery
    /// publishers retry on that.
    pub fn publish(&self, event: BusEvent) -> Result<usize, BusError> {
        let topic = event.topic.clone();
        let sender = {
            let topics = self.topics.lock().expect("bus lock poisoned");
            topics.get(&topic).cloned()
        };
        match sender.map(|tx| tx.send(event)) {
            Some(Ok(reached)) => {
                debug!(%topic, reached, "published bus event");
                Ok(reached)
            }
            _ => Err(BusError::NoSubscribers(topic)),
        }
    }

    /// Subscribe to a topic; events published before this call are not
    /// replayed.
    #[must_use]
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let mut topics = self.topics.lock().expect("bus lock poisoned");
        let sender = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0);
        Subscription {
            rx: sender.subscribe(),
        }
    }

    /// Number of subscribers currently listening on a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.lock().expect("bus lock poisoned");
        topics.get(topic).map_or(0, broadcast::Sender::receiver_count)
    }
}

/// A handle receiving events of one topic.
pub struct Subscription {
    rx: broadcast::Receiver<BusEvent>,
}

impl Subscription {
    /// Receive the next event, waiting asynchronously.
    ///
    /// Returns `None` when the bus side is gone. Lagged events are skipped.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "bus subscription lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive without waiting; `None` when no event is pending.
    pub fn try_recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("uitest.api.caller.publish#tkn");
        bus.publish(
            BusEvent::new(caller_publish_topic("tkn")).with_param("token", json!("tkn")),
        )
        .unwrap();
        let event = sub.recv().await.unwrap();
        assert_eq!(event.param("token"), Some(&json!("tkn")));
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_reported() {
        let bus = EventBus::new();
        let result = bus.publish(BusEvent::new("uitest.broadcast.command"));
        assert!(matches!(result, Err(BusError::NoSubscribers(_))));
    }

    #[tokio::test]
    async fn endpoint_handles_survive_the_trip() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("t");
        let handle: EndpointHandle = Arc::new(42u32);
        bus.publish(BusEvent::new("t").with_endpoint(handle)).unwrap();
        let event = sub.recv().await.unwrap();
        let endpoint = event.endpoint.unwrap();
        assert_eq!(endpoint.downcast_ref::<u32>(), Some(&42));
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = EventBus::new();
        let mut a = bus.subscribe("a");
        let _b = bus.subscribe("b");
        bus.publish(BusEvent::new("b")).unwrap();
        assert!(a.try_recv().is_none());
    }
}
