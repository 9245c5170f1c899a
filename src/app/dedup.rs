use std::sync::Arc;

use anyhow::Result;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::store::NotificationStore;
use crate::domain::notification::NotificationKind;

/// Once-per-local-day guard for scheduled kinds.
///
/// Advisory: callers check it before dispatching. The dispatcher itself does
/// not, which lets event-driven kinds repeat within the daily cap.
#[derive(Clone)]
pub struct DedupGuard {
    store: Arc<dyn NotificationStore>,
}

impl DedupGuard {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    pub async fn can_trigger_today(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        day_start: OffsetDateTime,
    ) -> Result<bool> {
        let exists = self.store.exists_since(user_id, kind, day_start).await?;
        Ok(!exists)
    }
}
