use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::app::store::ProfileStore;
use crate::domain::channel_policy::{CategoryPolicy, ChannelPolicy, QuietHours, DEFAULT_TIME_ZONE};
use crate::domain::push_subscription::{NewPushSubscription, PushKeys, PushSubscription};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct ProfileService {
    db: Db,
}

impl ProfileService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileStore for ProfileService {
    async fn channel_policy(&self, user_id: Uuid) -> Result<ChannelPolicy> {
        let row = sqlx::query(
            "SELECT allow_push, daily_limit, quiet_start, quiet_end, time_zone, categories \
             FROM notification_settings \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(ChannelPolicy::default());
        };

        let daily_limit: i32 = row.get("daily_limit");
        let categories: Option<Value> = row.get("categories");
        let categories = match categories {
            Some(value) => serde_json::from_value::<CategoryPolicy>(value).unwrap_or_else(|err| {
                tracing::warn!(error = ?err, user_id = %user_id, "invalid notification categories, allowing all");
                CategoryPolicy::default()
            }),
            None => CategoryPolicy::default(),
        };
        let time_zone: Option<String> = row.get("time_zone");

        Ok(ChannelPolicy {
            allow_push: row.get("allow_push"),
            daily_limit: u32::try_from(daily_limit).unwrap_or(0),
            quiet_hours: QuietHours {
                start: row.get::<Option<String>, _>("quiet_start").unwrap_or_default(),
                end: row.get::<Option<String>, _>("quiet_end").unwrap_or_default(),
                time_zone: time_zone.unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string()),
            },
            categories,
        })
    }

    async fn push_subscriptions(&self, user_id: Uuid) -> Result<Vec<PushSubscription>> {
        let rows = sqlx::query(
            "SELECT id, user_id, endpoint, p256dh, auth, user_agent, is_active, created_at \
             FROM push_subscriptions \
             WHERE user_id = $1 \
             ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(subscription_from_row).collect())
    }

    async fn deactivate_subscription(&self, user_id: Uuid, endpoint: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE push_subscriptions \
             SET is_active = FALSE \
             WHERE user_id = $1 AND endpoint = $2 AND is_active = TRUE",
        )
        .bind(user_id)
        .bind(endpoint)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_subscription(
        &self,
        user_id: Uuid,
        subscription: NewPushSubscription,
    ) -> Result<Option<PushSubscription>> {
        let row = sqlx::query(
            "INSERT INTO push_subscriptions (id, user_id, endpoint, p256dh, auth, user_agent) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (endpoint) DO UPDATE \
             SET p256dh = EXCLUDED.p256dh, \
                 auth = EXCLUDED.auth, \
                 user_agent = EXCLUDED.user_agent, \
                 is_active = TRUE \
             WHERE push_subscriptions.user_id = EXCLUDED.user_id \
             RETURNING id, user_id, endpoint, p256dh, auth, user_agent, is_active, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(subscription.endpoint)
        .bind(subscription.keys.p256dh)
        .bind(subscription.keys.auth)
        .bind(subscription.user_agent)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(subscription_from_row))
    }
}

fn subscription_from_row(row: &PgRow) -> PushSubscription {
    PushSubscription {
        id: row.get("id"),
        user_id: row.get("user_id"),
        endpoint: row.get("endpoint"),
        keys: PushKeys {
            p256dh: row.get("p256dh"),
            auth: row.get("auth"),
        },
        user_agent: row.get("user_agent"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}
