use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::store::NotificationStore;
use crate::domain::notification::{NewNotification, Notification, NotificationKind};
use crate::infra::db::Db;

const COLUMNS: &str =
    "id, user_id, sender_id, reference_id, kind, message, is_read, read_at, created_at";

#[derive(Clone)]
pub struct NotificationService {
    db: Db,
}

impl NotificationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationStore for NotificationService {
    async fn create(&self, notification: NewNotification) -> Result<Notification> {
        let row = sqlx::query(&format!(
            "INSERT INTO notifications (id, user_id, sender_id, reference_id, kind, message) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(notification.sender_id)
        .bind(notification.reference_id)
        .bind(notification.kind.as_str())
        .bind(notification.message)
        .fetch_one(self.db.pool())
        .await?;

        notification_from_row(&row)
    }

    async fn count_since(
        &self,
        user_id: Uuid,
        kind: Option<NotificationKind>,
        since: OffsetDateTime,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications \
             WHERE user_id = $1 \
               AND created_at >= $2 \
               AND ($3::text IS NULL OR kind = $3)",
        )
        .bind(user_id)
        .bind(since)
        .bind(kind.map(|kind| kind.as_str()))
        .fetch_one(self.db.pool())
        .await?;

        Ok(count)
    }

    async fn exists_since(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        since: OffsetDateTime,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(\
                SELECT 1 FROM notifications \
                WHERE user_id = $1 AND kind = $2 AND created_at >= $3\
             )",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(since)
        .fetch_one(self.db.pool())
        .await?;

        Ok(exists)
    }

    async fn list(
        &self,
        user_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Notification>> {
        let rows = match cursor {
            Some((created_at, notification_id)) => {
                sqlx::query(&format!(
                    "SELECT {COLUMNS} \
                     FROM notifications \
                     WHERE user_id = $1 \
                       AND (created_at < $2 OR (created_at = $2 AND id < $3)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $4"
                ))
                .bind(user_id)
                .bind(created_at)
                .bind(notification_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {COLUMNS} \
                     FROM notifications \
                     WHERE user_id = $1 \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $2"
                ))
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        rows.iter().map(notification_from_row).collect()
    }

    async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET is_read = TRUE, read_at = now() \
             WHERE id = $1 AND user_id = $2 AND is_read = FALSE",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(count)
    }
}

fn notification_from_row(row: &PgRow) -> Result<Notification> {
    let kind: String = row.get("kind");
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        sender_id: row.get("sender_id"),
        reference_id: row.get("reference_id"),
        kind: kind.parse()?,
        message: row.get("message"),
        is_read: row.get("is_read"),
        read_at: row.get("read_at"),
        created_at: row.get("created_at"),
    })
}
