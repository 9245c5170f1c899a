use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::campaign::CampaignReport;
use crate::app::dispatcher::DispatchOutcome;
use crate::domain::notification::{NewNotification, Notification, NotificationKind};
use crate::domain::push_subscription::{NewPushSubscription, PushSubscription};
use crate::http::{AdminToken, AppError, AuthUser};
use crate::AppState;

const MAX_MESSAGE_LEN: usize = 500;
const MAX_ENDPOINT_LEN: usize = 2048;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    connected_users: usize,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let (timestamp, id) = cursor
        .split_once('/')
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connected_users: state.hub.connected_users(),
    })
}

pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Notification>>, AppError> {
    let limit = query.limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let cursor = parse_cursor(query.cursor)?;

    let mut notifications = state
        .notifications
        .list(auth.user_id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list notifications");
            AppError::internal("failed to list notifications")
        })?;

    let next_cursor = if notifications.len() > limit as usize {
        notifications.truncate(limit as usize);
        notifications.last().map(|last| (last.created_at, last.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: notifications,
        next_cursor: encode_cursor(next_cursor),
    }))
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

pub async fn unread_count(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread = state
        .notifications
        .unread_count(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to count unread notifications");
            AppError::internal("failed to count unread notifications")
        })?;

    Ok(Json(UnreadCountResponse { unread }))
}

pub async fn mark_notification_read(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let updated = state
        .notifications
        .mark_read(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, notification_id = %id, user_id = %auth.user_id, "failed to mark notification read");
            AppError::internal("failed to mark notification read")
        })?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("notification not found"))
    }
}

/// Server-sent events for the caller. The connection leaves the hub when the
/// client goes away and the stream is dropped.
pub async fn notification_stream(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.hub.subscribe(auth.user_id);
    tracing::debug!(
        user_id = %auth.user_id,
        connection_id = %subscription.connection_id(),
        "notification stream opened"
    );

    let events = subscription
        .map(|event| Ok::<_, Infallible>(Event::default().event(event.name()).data(event.data())));

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}

pub async fn push_public_key(
    State(state): State<AppState>,
) -> Result<Json<PublicKeyResponse>, AppError> {
    let public_key = state
        .vapid_public_key
        .clone()
        .ok_or_else(|| AppError::not_found("push notifications are not configured"))?;

    Ok(Json(PublicKeyResponse { public_key }))
}

pub async fn subscribe_push(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<NewPushSubscription>,
) -> Result<Json<PushSubscription>, AppError> {
    validate_endpoint(&payload.endpoint)?;
    if payload.keys.p256dh.trim().is_empty() || payload.keys.auth.trim().is_empty() {
        return Err(AppError::bad_request("subscription keys are required"));
    }

    let subscription = state
        .profiles
        .upsert_subscription(auth.user_id, payload)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to save push subscription");
            AppError::internal("failed to save push subscription")
        })?
        .ok_or_else(|| AppError::conflict("endpoint is registered to another account"))?;

    Ok(Json(subscription))
}

#[derive(Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

pub async fn unsubscribe_push(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UnsubscribeRequest>,
) -> Result<StatusCode, AppError> {
    let deactivated = state
        .profiles
        .deactivate_subscription(auth.user_id, &payload.endpoint)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to remove push subscription");
            AppError::internal("failed to remove push subscription")
        })?;

    if deactivated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("subscription not found"))
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), AppError> {
    if endpoint.len() > MAX_ENDPOINT_LEN {
        return Err(AppError::bad_request("endpoint is too long"));
    }
    let url = url::Url::parse(endpoint).map_err(|_| AppError::bad_request("invalid endpoint"))?;
    if url.scheme() != "https" || url.host_str().is_none() {
        return Err(AppError::bad_request("endpoint must be an https URL"));
    }
    Ok(())
}

pub async fn run_campaign(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<Json<CampaignReport>, AppError> {
    let report = state
        .campaign
        .run(OffsetDateTime::now_utc())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "campaign run failed");
            AppError::internal("campaign run failed")
        })?;

    Ok(Json(report))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub sender_id: Option<Uuid>,
    pub reference_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationResponse {
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_reason: Option<String>,
}

pub async fn send_notification(
    _admin: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<SendNotificationRequest>,
) -> Result<Json<SendNotificationResponse>, AppError> {
    let message = payload.message.trim();
    if message.is_empty() || message.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::bad_request("message must be 1-500 characters"));
    }

    let draft = NewNotification::new(payload.user_id, payload.kind, message)
        .with_sender(payload.sender_id)
        .with_reference(payload.reference_id);

    let outcome = state
        .dispatcher
        .dispatch(draft, OffsetDateTime::now_utc())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %payload.user_id, kind = %payload.kind, "failed to dispatch notification");
            AppError::internal("failed to dispatch notification")
        })?;

    let response = match outcome {
        DispatchOutcome::Created(notification) => SendNotificationResponse {
            created: true,
            notification: Some(notification),
            denied_reason: None,
        },
        DispatchOutcome::Denied(reason) => SendNotificationResponse {
            created: false,
            notification: None,
            denied_reason: Some(reason.to_string()),
        },
    };

    Ok(Json(response))
}
