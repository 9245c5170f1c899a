use axum::{routing::get, routing::post, Router};

use crate::AppState;
use crate::http::handlers;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/unread-count", get(handlers::unread_count))
        .route("/notifications/stream", get(handlers::notification_stream))
        .route(
            "/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
}

pub fn push() -> Router<AppState> {
    Router::new()
        .route("/push/public-key", get(handlers::push_public_key))
        .route(
            "/push/subscriptions",
            post(handlers::subscribe_push).delete(handlers::unsubscribe_push),
        )
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/campaigns/run", post(handlers::run_campaign))
        .route("/admin/notifications", post(handlers::send_notification))
}
