use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::app::store::ProfileStore;
use crate::domain::push_subscription::PushSubscription;

/// Provider verdict for a single delivery attempt that reached the push service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// The endpoint no longer exists (404/410); the subscription is dead.
    Gone,
}

/// Sends one encrypted message to one endpoint. Transient failures are `Err`.
#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<PushOutcome>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub sent: usize,
    pub cleaned: usize,
}

enum Attempt {
    Sent,
    Cleaned,
    Failed,
}

/// Fans a payload out to all of a user's active subscriptions.
#[derive(Clone)]
pub struct PushDeliveryService {
    profiles: Arc<dyn ProfileStore>,
    provider: Option<Arc<dyn PushProvider>>,
    timeout: Duration,
}

impl PushDeliveryService {
    /// Without a provider (no VAPID credentials) every send is a no-op.
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        provider: Option<Arc<dyn PushProvider>>,
        timeout: Duration,
    ) -> Self {
        Self {
            profiles,
            provider,
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Delivers to every active subscription concurrently.
    ///
    /// Only a failure to load the subscriptions is returned as an error.
    /// Per-endpoint failures and timeouts are logged and leave the
    /// subscription untouched; `Gone` deactivates it.
    pub async fn send_to_user<T: Serialize + ?Sized>(
        &self,
        user_id: Uuid,
        payload: &T,
    ) -> Result<PushReport> {
        let Some(provider) = self.provider.as_ref() else {
            return Ok(PushReport::default());
        };

        let subscriptions: Vec<PushSubscription> = self
            .profiles
            .push_subscriptions(user_id)
            .await?
            .into_iter()
            .filter(|subscription| subscription.is_active)
            .collect();
        if subscriptions.is_empty() {
            return Ok(PushReport::default());
        }

        let body = serde_json::to_vec(payload)?;
        let attempts = subscriptions
            .iter()
            .map(|subscription| self.attempt(provider.as_ref(), user_id, subscription, &body));

        let mut report = PushReport::default();
        for attempt in join_all(attempts).await {
            match attempt {
                Attempt::Sent => report.sent += 1,
                Attempt::Cleaned => report.cleaned += 1,
                Attempt::Failed => {}
            }
        }

        tracing::debug!(
            user_id = %user_id,
            sent = report.sent,
            cleaned = report.cleaned,
            "push delivery finished"
        );
        Ok(report)
    }

    async fn attempt(
        &self,
        provider: &dyn PushProvider,
        user_id: Uuid,
        subscription: &PushSubscription,
        body: &[u8],
    ) -> Attempt {
        let outcome = tokio::time::timeout(self.timeout, provider.send(subscription, body)).await;

        match outcome {
            Ok(Ok(PushOutcome::Delivered)) => Attempt::Sent,
            Ok(Ok(PushOutcome::Gone)) => {
                match self
                    .profiles
                    .deactivate_subscription(user_id, &subscription.endpoint)
                    .await
                {
                    Ok(true) => {
                        tracing::info!(
                            user_id = %user_id,
                            subscription_id = %subscription.id,
                            "deactivated expired push subscription"
                        );
                        Attempt::Cleaned
                    }
                    Ok(false) => Attempt::Failed,
                    Err(err) => {
                        tracing::warn!(
                            error = ?err,
                            user_id = %user_id,
                            subscription_id = %subscription.id,
                            "failed to deactivate expired push subscription"
                        );
                        Attempt::Failed
                    }
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    error = ?err,
                    user_id = %user_id,
                    subscription_id = %subscription.id,
                    "push delivery failed"
                );
                Attempt::Failed
            }
            Err(_) => {
                tracing::warn!(
                    user_id = %user_id,
                    subscription_id = %subscription.id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "push delivery timed out"
                );
                Attempt::Failed
            }
        }
    }
}
