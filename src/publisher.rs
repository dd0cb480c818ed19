//! Publishes domain events to NATS.

use async_nats::Client;

use crate::domain::events::DomainEvent;

/// No-op when NATS is not configured. Failures are logged and swallowed:
/// events are notifications, the database stays the source of truth.
#[derive(Clone, Default)]
pub struct EventPublisher {
    client: Option<Client>,
}

impl EventPublisher {
    pub fn new(client: Option<Client>) -> Self { Self { client } }

    pub fn disabled() -> Self { Self { client: None } }

    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::disabled() };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(url, "connected to NATS");
                Self::new(Some(client))
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "NATS unavailable, events will not be published");
                Self::disabled()
            }
        }
    }

    pub async fn publish(&self, event: &DomainEvent) {
        let Some(client) = &self.client else { return };
        let subject = event.subject();
        let payload = match serde_json::to_vec(event) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(subject = %subject, error = %e, "failed to serialize event");
                return;
            }
        };
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            tracing::warn!(subject = %subject, error = %e, "failed to publish event");
        }
    }

    pub async fn publish_all(&self, events: impl IntoIterator<Item = DomainEvent>) {
        let events: Vec<DomainEvent> = events.into_iter().collect();
        futures::future::join_all(events.iter().map(|e| self.publish(e))).await;
    }
}
