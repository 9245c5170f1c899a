use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A browser's push registration. Soft-deleted via `is_active`, never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Push service endpoint URL. Unique across all users.
    pub endpoint: String,
    pub keys: PushKeys,
    pub user_agent: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Client encryption material, both base64url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Registration request as sent by the browser's `PushSubscription.toJSON()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPushSubscription {
    pub endpoint: String,
    pub keys: PushKeys,
    pub user_agent: Option<String>,
}
