//! Web push sender (RFC 8030) with VAPID authentication (RFC 8292).
//!
//! `web-push` handles RFC 8291 payload encryption and JWT signing; the HTTP
//! request itself goes through a shared `reqwest::Client` for pooling.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use web_push::{ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder};

use crate::app::push::{PushOutcome, PushProvider};
use crate::config::VapidConfig;
use crate::domain::push_subscription::PushSubscription;

#[derive(Clone)]
pub struct WebPushClient {
    http: reqwest::Client,
    private_key: String,
    subject: String,
    ttl_seconds: u32,
}

impl WebPushClient {
    pub fn new(vapid: &VapidConfig, ttl_seconds: u32, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build push HTTP client")?;

        Ok(Self {
            http,
            private_key: vapid.private_key.clone(),
            subject: vapid.subject.clone(),
            ttl_seconds,
        })
    }
}

#[async_trait]
impl PushProvider for WebPushClient {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<PushOutcome> {
        let sub_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut sig_builder = VapidSignatureBuilder::from_base64(&self.private_key, &sub_info)
            .context("failed to build VAPID signature")?;
        sig_builder.add_claim("sub", self.subject.as_str());
        let signature = sig_builder.build().context("failed to sign VAPID JWT")?;

        let mut builder = WebPushMessageBuilder::new(&sub_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        builder.set_ttl(self.ttl_seconds);
        let message = builder.build().context("failed to build web push message")?;

        let mut request = self
            .http
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(urgency) = message.urgency {
            request = request.header("Urgency", urgency.to_string());
        }

        if let Some(topic) = message.topic {
            request = request.header("Topic", topic);
        }

        // Opaque aes128gcm body: the service worker decrypts and parses the
        // JSON itself, so no declarative `application/notification+json`.
        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        let response = request.send().await.context("web push HTTP request failed")?;
        let status = response.status().as_u16();
        if let Some(outcome) = outcome_for_status(status) {
            return Ok(outcome);
        }

        let body = response.text().await.unwrap_or_default();
        Err(anyhow!("web push send failed (HTTP {}): {}", status, body))
    }
}

/// Maps a push service response. `None` means a transient failure (429 and
/// 5xx included) that must not deactivate the subscription.
fn outcome_for_status(status: u16) -> Option<PushOutcome> {
    match status {
        200..=299 => Some(PushOutcome::Delivered),
        404 | 410 => Some(PushOutcome::Gone),
        _ => None,
    }
}
