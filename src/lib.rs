pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use std::sync::Arc;
use std::time::Duration;

use crate::app::campaign::CampaignRunner;
use crate::app::dispatcher::Dispatcher;
use crate::app::push::{PushDeliveryService, PushProvider};
use crate::app::store::{ActivityStore, NotificationStore, ProfileStore};
use crate::app::stream_hub::StreamHub;
use crate::config::nudges::{default_rules, NudgeRule};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub notifications: Arc<dyn NotificationStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub hub: StreamHub,
    pub dispatcher: Dispatcher,
    pub campaign: CampaignRunner,
    pub admin_token: Option<String>,
    pub paseto_access_key: [u8; 32],
    pub token_issuer: String,
    pub vapid_public_key: Option<String>,
}

/// Knobs for wiring an [`AppState`], usually taken from [`AppConfig`].
#[derive(Clone)]
pub struct EngineSettings {
    pub stream_buffer: usize,
    pub push_timeout: Duration,
    pub campaign_concurrency: usize,
    pub rules: Vec<NudgeRule>,
    pub admin_token: Option<String>,
    pub paseto_access_key: [u8; 32],
    pub token_issuer: String,
    pub vapid_public_key: Option<String>,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            stream_buffer: config.stream_buffer,
            push_timeout: Duration::from_secs(config.push_timeout_seconds),
            campaign_concurrency: config.campaign_concurrency,
            rules: default_rules(),
            admin_token: config.admin_token.clone(),
            paseto_access_key: config.paseto_access_key,
            token_issuer: config.token_issuer.clone(),
            vapid_public_key: config.vapid.as_ref().map(|vapid| vapid.public_key.clone()),
        }
    }
}

impl AppState {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        profiles: Arc<dyn ProfileStore>,
        activity: Arc<dyn ActivityStore>,
        push_provider: Option<Arc<dyn PushProvider>>,
        settings: EngineSettings,
    ) -> Self {
        let hub = StreamHub::new(settings.stream_buffer);
        let push = PushDeliveryService::new(profiles.clone(), push_provider, settings.push_timeout);
        let dispatcher = Dispatcher::new(notifications.clone(), profiles.clone(), hub.clone(), push);
        let campaign = CampaignRunner::new(
            activity,
            profiles.clone(),
            notifications.clone(),
            dispatcher.clone(),
            settings.rules,
            settings.campaign_concurrency,
        );

        Self {
            notifications,
            profiles,
            hub,
            dispatcher,
            campaign,
            admin_token: settings.admin_token,
            paseto_access_key: settings.paseto_access_key,
            token_issuer: settings.token_issuer,
            vapid_public_key: settings.vapid_public_key,
        }
    }
}
