//! Alert sink: the single emission path for signals. Durable persistence
//! happens before any external delivery; webhook fan-out is best-effort,
//! at most one attempt per signal per subscription.

pub mod notify;
pub mod store;
pub mod webhooks;

pub use notify::NotifyRelay;
pub use store::{MemoryStore, SignalFilter, SignalLog, SignalStore, StoreError, StoredSignal};
pub use webhooks::{RegistryError, Subscription, WebhookRegistry};

use std::sync::Arc;
use std::time::Duration;

use crate::model::Signal;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("signal persistence failed: {0}")]
    Store(#[from] StoreError),
}

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Persists signals and fans them out to subscribers.
pub struct AlertSink {
    store: Arc<dyn SignalStore>,
    registry: Arc<WebhookRegistry>,
    relay: Option<NotifyRelay>,
    client: reqwest::Client,
}

impl AlertSink {
    pub fn new(
        store: Arc<dyn SignalStore>,
        registry: Arc<WebhookRegistry>,
        relay: Option<NotifyRelay>,
    ) -> Self {
        Self {
            store,
            registry,
            relay,
            client: reqwest::Client::new(),
        }
    }

    /// Persist a signal and deliver it. A persistence failure is the only
    /// error surfaced: delivery failures are logged and never retried, so
    /// the signal is recorded internally before anything leaves the process.
    pub async fn emit(&self, signal: &Signal) -> Result<u64, SinkError> {
        let id = self.store.save(signal).await?;

        tracing::info!(
            id,
            target = %signal.target,
            kind = signal.kind.as_str(),
            priority = ?signal.priority,
            title = %signal.title,
            "signal emitted"
        );

        for subscription in self.registry.matching(signal.kind) {
            if let Err(e) = self.deliver(&subscription, id, signal).await {
                tracing::warn!(
                    webhook = %subscription.name,
                    id,
                    error = %e,
                    "webhook delivery failed"
                );
            }
        }

        if let Some(relay) = &self.relay {
            relay.notify_signal(signal).await;
        }

        Ok(id)
    }

    async fn deliver(
        &self,
        subscription: &Subscription,
        id: u64,
        signal: &Signal,
    ) -> Result<(), String> {
        let payload = serde_json::json!({
            "event": signal.kind.as_str(),
            "id": id,
            "timestamp": signal.detected_at.to_rfc3339(),
            "data": signal,
        });

        let mut request = self
            .client
            .post(&subscription.url)
            .timeout(DELIVERY_TIMEOUT)
            .json(&payload);
        for (name, value) in &subscription.headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("endpoint returned {}", response.status()));
        }
        tracing::debug!(webhook = %subscription.name, id, "webhook delivered");
        Ok(())
    }
}
