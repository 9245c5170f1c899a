//! Persistence seams consumed by the dispatch engine.

use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::activity::ActivityKind;
use crate::domain::channel_policy::ChannelPolicy;
use crate::domain::notification::{NewNotification, Notification, NotificationKind};
use crate::domain::push_subscription::{NewPushSubscription, PushSubscription};

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, notification: NewNotification) -> Result<Notification>;

    /// Records for `user_id` created at or after `since`, optionally of one kind.
    async fn count_since(
        &self,
        user_id: Uuid,
        kind: Option<NotificationKind>,
        since: OffsetDateTime,
    ) -> Result<i64>;

    async fn exists_since(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        since: OffsetDateTime,
    ) -> Result<bool>;

    /// Newest first, keyset-paginated on `(created_at, id)`.
    async fn list(
        &self,
        user_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Notification>>;

    async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn unread_count(&self, user_id: Uuid) -> Result<i64>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Stored policy, or the default policy for users who never saved one.
    async fn channel_policy(&self, user_id: Uuid) -> Result<ChannelPolicy>;

    async fn push_subscriptions(&self, user_id: Uuid) -> Result<Vec<PushSubscription>>;

    /// Marks one subscription inactive. Returns false if it was not active.
    async fn deactivate_subscription(&self, user_id: Uuid, endpoint: &str) -> Result<bool>;

    /// Inserts or reactivates by endpoint. Returns `None` when the endpoint
    /// is already registered to a different user.
    async fn upsert_subscription(
        &self,
        user_id: Uuid,
        subscription: NewPushSubscription,
    ) -> Result<Option<PushSubscription>>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn user_ids(&self) -> Result<Vec<Uuid>>;

    async fn count_activity(
        &self,
        user_id: Uuid,
        activity: ActivityKind,
        since: OffsetDateTime,
    ) -> Result<i64>;
}
