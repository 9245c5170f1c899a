use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Closed set of notification triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    MemoNudge,
    TsNudge,
    ZengoNudge,
    SummarySuggestion,
    ShareReceived,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 5] = [
        NotificationKind::MemoNudge,
        NotificationKind::TsNudge,
        NotificationKind::ZengoNudge,
        NotificationKind::SummarySuggestion,
        NotificationKind::ShareReceived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::MemoNudge => "memo-nudge",
            NotificationKind::TsNudge => "ts-nudge",
            NotificationKind::ZengoNudge => "zengo-nudge",
            NotificationKind::SummarySuggestion => "summary-suggestion",
            NotificationKind::ShareReceived => "share-received",
        }
    }

    /// Title shown in push notifications.
    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::MemoNudge => "Time for a memo",
            NotificationKind::TsNudge => "Pick your book back up",
            NotificationKind::ZengoNudge => "Flashcards are waiting",
            NotificationKind::SummarySuggestion => "Summarize your week",
            NotificationKind::ShareReceived => "Something was shared with you",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        NotificationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| anyhow!("unknown notification kind: {}", value))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sender_id: Option<Uuid>,
    /// Memo, book or session the notification points at.
    pub reference_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields supplied by the dispatcher when a record is created.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub reference_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub message: String,
}

impl NewNotification {
    pub fn new(user_id: Uuid, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            user_id,
            sender_id: None,
            reference_id: None,
            kind,
            message: message.into(),
        }
    }

    pub fn with_sender(mut self, sender_id: Option<Uuid>) -> Self {
        self.sender_id = sender_id;
        self
    }

    pub fn with_reference(mut self, reference_id: Option<Uuid>) -> Self {
        self.reference_id = reference_id;
        self
    }
}

/// Body of a web push message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    pub notification_id: Uuid,
    pub url: String,
}

impl From<&Notification> for PushPayload {
    fn from(notification: &Notification) -> Self {
        Self {
            title: notification.kind.title().to_string(),
            body: notification.message.clone(),
            kind: notification.kind,
            notification_id: notification.id,
            url: "/notifications".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_wire_format() {
        for kind in NotificationKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!("weekly-digest".parse::<NotificationKind>().is_err());
    }
}
