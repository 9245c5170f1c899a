#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pasetors::claims::Claims;
use pasetors::keys::SymmetricKey;
use pasetors::{local, version4::V4};
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use nudge::app::push::{PushOutcome, PushProvider};
use nudge::app::store::{ActivityStore, NotificationStore, ProfileStore};
use nudge::config::nudges::default_rules;
use nudge::domain::activity::ActivityKind;
use nudge::domain::channel_policy::{ChannelPolicy, QuietHours};
use nudge::domain::notification::{NewNotification, Notification, NotificationKind};
use nudge::domain::push_subscription::{NewPushSubscription, PushKeys, PushSubscription};
use nudge::{AppState, EngineSettings};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const TEST_ACCESS_KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";
pub const TEST_ISSUER: &str = "nudge-test";
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token-12345";
pub const TEST_VAPID_PUBLIC_KEY: &str = "BTestPublicKey";
pub const PUSH_TIMEOUT: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// MemoryStore: notifications, profiles and activity in one place
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    clock: Option<OffsetDateTime>,
    notifications: Vec<Notification>,
    policies: HashMap<Uuid, ChannelPolicy>,
    subscriptions: Vec<PushSubscription>,
    activity: Vec<(Uuid, ActivityKind, OffsetDateTime)>,
    users: Vec<Uuid>,
    fail_create: bool,
    fail_subscriptions: bool,
    fail_policy: HashSet<Uuid>,
    fail_activity: HashSet<(Uuid, ActivityKind)>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pins `created_at` of new records. Defaults to the real clock.
    pub fn set_clock(&self, now: OffsetDateTime) {
        self.inner.lock().unwrap().clock = Some(now);
    }

    pub fn add_user(&self, policy: ChannelPolicy) -> Uuid {
        let user_id = Uuid::new_v4();
        let mut inner = self.inner.lock().unwrap();
        inner.users.push(user_id);
        inner.policies.insert(user_id, policy);
        user_id
    }

    pub fn set_policy(&self, user_id: Uuid, policy: ChannelPolicy) {
        self.inner.lock().unwrap().policies.insert(user_id, policy);
    }

    pub fn add_subscription(&self, user_id: Uuid, endpoint: &str, is_active: bool) {
        self.inner.lock().unwrap().subscriptions.push(PushSubscription {
            id: Uuid::new_v4(),
            user_id,
            endpoint: endpoint.to_string(),
            keys: PushKeys {
                p256dh: "p256dh".to_string(),
                auth: "auth".to_string(),
            },
            user_agent: None,
            is_active,
            created_at: OffsetDateTime::now_utc(),
        });
    }

    pub fn subscription(&self, endpoint: &str) -> PushSubscription {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .find(|subscription| subscription.endpoint == endpoint)
            .cloned()
            .expect("subscription exists")
    }

    pub fn record_activity(&self, user_id: Uuid, activity: ActivityKind, at: OffsetDateTime) {
        self.inner.lock().unwrap().activity.push((user_id, activity, at));
    }

    pub fn seed_notification(&self, user_id: Uuid, kind: NotificationKind, at: OffsetDateTime) {
        self.inner.lock().unwrap().notifications.push(Notification {
            id: Uuid::new_v4(),
            user_id,
            sender_id: None,
            reference_id: None,
            kind,
            message: "seeded".to_string(),
            is_read: false,
            read_at: None,
            created_at: at,
        });
    }

    pub fn notifications_for(&self, user_id: Uuid) -> Vec<Notification> {
        self.inner
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|notification| notification.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn fail_create(&self, fail: bool) {
        self.inner.lock().unwrap().fail_create = fail;
    }

    pub fn fail_subscriptions(&self, fail: bool) {
        self.inner.lock().unwrap().fail_subscriptions = fail;
    }

    pub fn fail_policy(&self, user_id: Uuid) {
        self.inner.lock().unwrap().fail_policy.insert(user_id);
    }

    pub fn fail_activity(&self, user_id: Uuid, activity: ActivityKind) {
        self.inner.lock().unwrap().fail_activity.insert((user_id, activity));
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create(&self, notification: NewNotification) -> Result<Notification> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_create {
            return Err(anyhow!("database unavailable"));
        }
        let record = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            sender_id: notification.sender_id,
            reference_id: notification.reference_id,
            kind: notification.kind,
            message: notification.message,
            is_read: false,
            read_at: None,
            created_at: inner.clock.unwrap_or_else(OffsetDateTime::now_utc),
        };
        inner.notifications.push(record.clone());
        Ok(record)
    }

    async fn count_since(
        &self,
        user_id: Uuid,
        kind: Option<NotificationKind>,
        since: OffsetDateTime,
    ) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        let count = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && n.created_at >= since)
            .filter(|n| kind.map_or(true, |kind| n.kind == kind))
            .count();
        Ok(count as i64)
    }

    async fn exists_since(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        since: OffsetDateTime,
    ) -> Result<bool> {
        Ok(self.count_since(user_id, Some(kind), since).await? > 0)
    }

    async fn list(
        &self,
        user_id: Uuid,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Notification>> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .filter(|n| match cursor {
                Some((created_at, id)) => {
                    n.created_at < created_at || (n.created_at == created_at && n.id < id)
                }
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(notification) = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id && !n.is_read)
        else {
            return Ok(false);
        };
        notification.is_read = true;
        notification.read_at = Some(OffsetDateTime::now_utc());
        Ok(true)
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn channel_policy(&self, user_id: Uuid) -> Result<ChannelPolicy> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_policy.contains(&user_id) {
            return Err(anyhow!("profile store unavailable"));
        }
        Ok(inner.policies.get(&user_id).cloned().unwrap_or_default())
    }

    async fn push_subscriptions(&self, user_id: Uuid) -> Result<Vec<PushSubscription>> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_subscriptions {
            return Err(anyhow!("profile store unavailable"));
        }
        Ok(inner
            .subscriptions
            .iter()
            .filter(|subscription| subscription.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn deactivate_subscription(&self, user_id: Uuid, endpoint: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(subscription) = inner.subscriptions.iter_mut().find(|subscription| {
            subscription.user_id == user_id && subscription.endpoint == endpoint && subscription.is_active
        }) else {
            return Ok(false);
        };
        subscription.is_active = false;
        Ok(true)
    }

    async fn upsert_subscription(
        &self,
        user_id: Uuid,
        subscription: NewPushSubscription,
    ) -> Result<Option<PushSubscription>> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .subscriptions
            .iter_mut()
            .find(|existing| existing.endpoint == subscription.endpoint)
        {
            if existing.user_id != user_id {
                return Ok(None);
            }
            existing.keys = subscription.keys;
            existing.user_agent = subscription.user_agent;
            existing.is_active = true;
            return Ok(Some(existing.clone()));
        }

        let record = PushSubscription {
            id: Uuid::new_v4(),
            user_id,
            endpoint: subscription.endpoint,
            keys: subscription.keys,
            user_agent: subscription.user_agent,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.subscriptions.push(record.clone());
        Ok(Some(record))
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn user_ids(&self) -> Result<Vec<Uuid>> {
        Ok(self.inner.lock().unwrap().users.clone())
    }

    async fn count_activity(
        &self,
        user_id: Uuid,
        activity: ActivityKind,
        since: OffsetDateTime,
    ) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_activity.contains(&(user_id, activity)) {
            return Err(anyhow!("activity query failed"));
        }
        Ok(inner
            .activity
            .iter()
            .filter(|(user, kind, at)| *user == user_id && *kind == activity && *at >= since)
            .count() as i64)
    }
}

// ---------------------------------------------------------------------------
// FakePushProvider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum PushBehavior {
    Deliver,
    Gone,
    Fail,
    Hang,
}

#[derive(Default)]
pub struct FakePushProvider {
    behaviors: Mutex<HashMap<String, PushBehavior>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl FakePushProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, endpoint: &str, behavior: PushBehavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), behavior);
    }

    /// Endpoint and decoded JSON payload of every attempted send.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushProvider for FakePushProvider {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<PushOutcome> {
        let payload: Value = serde_json::from_slice(payload)?;
        self.calls
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload));

        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&subscription.endpoint)
            .copied()
            .unwrap_or(PushBehavior::Deliver);

        match behavior {
            PushBehavior::Deliver => Ok(PushOutcome::Delivered),
            PushBehavior::Gone => Ok(PushOutcome::Gone),
            PushBehavior::Fail => Err(anyhow!("push service returned HTTP 503")),
            PushBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(PushOutcome::Delivered)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TestEngine: AppState over the fakes
// ---------------------------------------------------------------------------

pub struct TestEngine {
    pub store: Arc<MemoryStore>,
    pub push: Arc<FakePushProvider>,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: axum::body::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        stream_buffer: 16,
        push_timeout: PUSH_TIMEOUT,
        campaign_concurrency: 4,
        rules: default_rules(),
        admin_token: Some(TEST_ADMIN_TOKEN.to_string()),
        paseto_access_key: TEST_ACCESS_KEY,
        token_issuer: TEST_ISSUER.to_string(),
        vapid_public_key: Some(TEST_VAPID_PUBLIC_KEY.to_string()),
    }
}

pub fn engine() -> TestEngine {
    build(true)
}

/// Engine with no push credentials configured.
pub fn engine_without_push() -> TestEngine {
    build(false)
}

fn build(with_push: bool) -> TestEngine {
    let store = MemoryStore::new();
    let push = FakePushProvider::new();
    let provider: Option<Arc<dyn PushProvider>> = if with_push {
        Some(push.clone() as Arc<dyn PushProvider>)
    } else {
        None
    };

    let mut settings = settings();
    if !with_push {
        settings.vapid_public_key = None;
    }

    let state = AppState::new(
        store.clone() as Arc<dyn NotificationStore>,
        store.clone() as Arc<dyn ProfileStore>,
        store.clone() as Arc<dyn ActivityStore>,
        provider,
        settings,
    );

    TestEngine { store, push, state }
}

impl TestEngine {
    pub fn router(&self) -> Router {
        nudge::http::router(self.state.clone())
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let response = self
            .router()
            .oneshot(build_request(method, path, body, headers))
            .await
            .unwrap();

        let status = response.status();
        let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse { status, body_bytes }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let auth = token.map(|token| format!("Bearer {}", token));
        let headers: Vec<(&str, &str)> = auth
            .as_deref()
            .map(|value| vec![("authorization", value)])
            .unwrap_or_default();
        self.request(Method::GET, path, None, &headers).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let auth = token.map(|token| format!("Bearer {}", token));
        let headers: Vec<(&str, &str)> = auth
            .as_deref()
            .map(|value| vec![("authorization", value)])
            .unwrap_or_default();
        self.request(Method::POST, path, Some(body), &headers).await
    }

    pub async fn post_admin(&self, path: &str, body: Value) -> TestResponse {
        self.request(
            Method::POST,
            path,
            Some(body),
            &[("x-admin-token", TEST_ADMIN_TOKEN)],
        )
        .await
    }
}

pub fn build_request(
    method: Method,
    path: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("host", "localhost");

    for &(key, value) in headers {
        builder = builder.header(key, value);
    }

    if let Some(body) = body {
        builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    } else {
        builder.body(Body::empty()).unwrap()
    }
}

/// Access token as the external auth service would mint it.
pub fn access_token(user_id: Uuid) -> String {
    let key = SymmetricKey::<V4>::from(&TEST_ACCESS_KEY).unwrap();
    let mut claims = Claims::new().unwrap();
    claims.issuer(TEST_ISSUER).unwrap();
    claims.audience(TEST_ISSUER).unwrap();
    claims.subject(&user_id.to_string()).unwrap();
    claims.add_additional("typ", "access").unwrap();
    local::encrypt(&key, &claims, None, None).unwrap()
}

/// Policy with no quiet hours and the given cap.
pub fn open_policy(daily_limit: u32) -> ChannelPolicy {
    ChannelPolicy {
        daily_limit,
        ..ChannelPolicy::default()
    }
}

/// Policy whose calendar day follows `time_zone`, with no quiet window.
pub fn zoned_policy(daily_limit: u32, time_zone: &str) -> ChannelPolicy {
    ChannelPolicy {
        daily_limit,
        quiet_hours: QuietHours {
            time_zone: time_zone.to_string(),
            ..QuietHours::default()
        },
        ..ChannelPolicy::default()
    }
}
