use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::store::ActivityStore;
use crate::domain::activity::ActivityKind;
use crate::infra::db::Db;

/// Read-only view over activity tables owned by the journaling side.
#[derive(Clone)]
pub struct ActivityService {
    db: Db,
}

impl ActivityService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActivityStore for ActivityService {
    async fn user_ids(&self) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users ORDER BY id")
            .fetch_all(self.db.pool())
            .await?;
        Ok(ids)
    }

    async fn count_activity(
        &self,
        user_id: Uuid,
        activity: ActivityKind,
        since: OffsetDateTime,
    ) -> Result<i64> {
        // Table names come from a closed enum, never from input
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE user_id = $1 AND created_at >= $2",
            activity.table()
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(user_id)
            .bind(since)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}
