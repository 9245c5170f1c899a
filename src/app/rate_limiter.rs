use std::sync::Arc;

use anyhow::Result;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::store::NotificationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limited: bool,
    pub limit: u32,
    pub remaining: u32,
}

/// Daily cap on dispatched notifications, counted from persisted records.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn NotificationStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    pub async fn count_since(&self, user_id: Uuid, since: OffsetDateTime) -> Result<i64> {
        self.store.count_since(user_id, None, since).await
    }

    /// Compares today's count against `daily_limit`. A limit of zero always limits.
    pub async fn check_daily_limit(
        &self,
        user_id: Uuid,
        daily_limit: u32,
        day_start: OffsetDateTime,
    ) -> Result<RateLimitInfo> {
        if daily_limit == 0 {
            return Ok(RateLimitInfo { limited: true, limit: 0, remaining: 0 });
        }

        let count = self.count_since(user_id, day_start).await?;
        let count = u32::try_from(count.max(0)).unwrap_or(u32::MAX);

        if count >= daily_limit {
            tracing::debug!(
                user_id = %user_id,
                count = count,
                limit = daily_limit,
                "Daily notification limit reached"
            );
            return Ok(RateLimitInfo { limited: true, limit: daily_limit, remaining: 0 });
        }

        Ok(RateLimitInfo {
            limited: false,
            limit: daily_limit,
            remaining: daily_limit - count,
        })
    }
}
