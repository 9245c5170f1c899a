use std::sync::Arc;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::policy::{Admission, DenyReason, PolicyEngine};
use crate::app::push::PushDeliveryService;
use crate::app::store::{NotificationStore, ProfileStore};
use crate::app::stream_hub::{StreamHub, NOTIFICATION_EVENT};
use crate::domain::channel_policy::ChannelPolicy;
use crate::domain::notification::{NewNotification, Notification, NotificationKind, PushPayload};

#[derive(Debug)]
pub enum DispatchOutcome {
    Created(Notification),
    Denied(DenyReason),
}

/// Policy check, record write, then best-effort fan-out.
///
/// Only the record write can fail the call. Stream and push delivery happen
/// after it and their errors are logged and dropped.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn NotificationStore>,
    profiles: Arc<dyn ProfileStore>,
    policy: PolicyEngine,
    hub: StreamHub,
    push: PushDeliveryService,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        profiles: Arc<dyn ProfileStore>,
        hub: StreamHub,
        push: PushDeliveryService,
    ) -> Self {
        Self {
            policy: PolicyEngine::new(store.clone()),
            store,
            profiles,
            hub,
            push,
        }
    }

    /// Returns true iff a notification record was created.
    pub async fn dispatch_if_allowed(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Result<bool> {
        let outcome = self
            .dispatch(NewNotification::new(user_id, kind, message), OffsetDateTime::now_utc())
            .await?;
        Ok(matches!(outcome, DispatchOutcome::Created(_)))
    }

    /// Loads the recipient's policy and dispatches `draft` as of `now`.
    pub async fn dispatch(
        &self,
        draft: NewNotification,
        now: OffsetDateTime,
    ) -> Result<DispatchOutcome> {
        let policy = self
            .profiles
            .channel_policy(draft.user_id)
            .await
            .context("failed to load channel policy")?;
        self.dispatch_with_policy(&policy, draft, now).await
    }

    /// Same as [`Dispatcher::dispatch`] for callers that already hold the policy.
    pub async fn dispatch_with_policy(
        &self,
        policy: &ChannelPolicy,
        draft: NewNotification,
        now: OffsetDateTime,
    ) -> Result<DispatchOutcome> {
        let user_id = draft.user_id;
        let kind = draft.kind;

        if let Admission::Denied(reason) = self.policy.admit(user_id, policy, kind, now).await? {
            tracing::debug!(user_id = %user_id, kind = %kind, reason = %reason, "notification denied");
            return Ok(DispatchOutcome::Denied(reason));
        }

        let notification = self
            .store
            .create(draft)
            .await
            .context("failed to create notification")?;
        tracing::info!(
            user_id = %user_id,
            kind = %kind,
            notification_id = %notification.id,
            "notification created"
        );

        self.fan_out(policy, &notification).await;
        Ok(DispatchOutcome::Created(notification))
    }

    async fn fan_out(&self, policy: &ChannelPolicy, notification: &Notification) {
        let user_id = notification.user_id;
        let streamed = self.hub.broadcast(user_id, NOTIFICATION_EVENT, notification);

        if !policy.allow_push {
            tracing::debug!(user_id = %user_id, streamed = streamed, "push disabled by user");
            return;
        }

        match self
            .push
            .send_to_user(user_id, &PushPayload::from(notification))
            .await
        {
            Ok(report) => tracing::debug!(
                user_id = %user_id,
                streamed = streamed,
                pushed = report.sent,
                cleaned = report.cleaned,
                "notification delivered"
            ),
            Err(err) => tracing::warn!(
                error = ?err,
                user_id = %user_id,
                notification_id = %notification.id,
                "push delivery failed"
            ),
        }
    }
}
