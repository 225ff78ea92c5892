//! Domain event fan-out.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::domain::events::DomainEvent;

/// Where domain events go once a state change has been committed.
#[derive(Clone, Debug, Default)]
pub enum EventPublisher {
    Nats(async_nats::Client),
    /// Keeps every event; used by tests.
    Memory(Arc<Mutex<Vec<DomainEvent>>>),
    #[default]
    Disabled,
}

impl EventPublisher {
    pub fn nats(client: async_nats::Client) -> Self {
        Self::Nats(client)
    }

    pub fn capturing() -> Self {
        Self::Memory(Arc::default())
    }

    /// Events recorded so far by a capturing publisher.
    pub fn captured(&self) -> Vec<DomainEvent> {
        match self {
            Self::Memory(events) => events.lock().clone(),
            _ => Vec::new(),
        }
    }

    /// Never fails the caller: broker errors are logged and the event is dropped.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        match self {
            Self::Disabled => {}
            Self::Memory(sink) => sink.lock().extend(events),
            Self::Nats(client) => {
                for event in events {
                    let subject = event.subject();
                    let payload = match serde_json::to_vec(&event) {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            tracing::warn!(%subject, error = %e, "failed to encode event");
                            continue;
                        }
                    };
                    if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                        tracing::warn!(%subject, error = %e, "failed to publish event");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::CartEvent;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_capturing_publisher_records_in_order() {
        let publisher = EventPublisher::capturing();
        let user_id = Uuid::now_v7();
        publisher
            .publish(vec![
                DomainEvent::Cart(CartEvent::LineRemoved { user_id, line_id: Uuid::nil() }),
                DomainEvent::Cart(CartEvent::Cleared { user_id, lines: 0 }),
            ])
            .await;
        let events = publisher.captured();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].subject(), "storefront.cart.cleared");
    }

    #[tokio::test]
    async fn test_disabled_publisher_drops_events() {
        let publisher = EventPublisher::default();
        publisher.publish(vec![DomainEvent::Cart(CartEvent::Cleared { user_id: Uuid::nil(), lines: 1 })]).await;
        assert!(publisher.captured().is_empty());
    }
}
