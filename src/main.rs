use anyhow::anyhow;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nudge::app::activity::ActivityService;
use nudge::app::notifications::NotificationService;
use nudge::app::profiles::ProfileService;
use nudge::app::push::PushProvider;
use nudge::config::AppConfig;
use nudge::infra::{db::Db, web_push::WebPushClient};
use nudge::{http, jobs, AppState, EngineSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = Db::connect(&config).await?;
    if config.run_migrations {
        db.run_migrations("migrations").await?;
    }

    let push_provider: Option<Arc<dyn PushProvider>> = match &config.vapid {
        Some(vapid) => {
            let client = WebPushClient::new(
                vapid,
                config.push_ttl_seconds,
                Duration::from_secs(config.push_timeout_seconds),
            )?;
            Some(Arc::new(client) as Arc<dyn PushProvider>)
        }
        None => {
            tracing::warn!("VAPID keys not configured, push delivery disabled");
            None
        }
    };

    let state = AppState::new(
        Arc::new(NotificationService::new(db.clone())),
        Arc::new(ProfileService::new(db.clone())),
        Arc::new(ActivityService::new(db.clone())),
        push_provider,
        EngineSettings::from_config(&config),
    );

    match config.app_mode.as_str() {
        "api" => {
            let app: Router = http::router(state).layer(TraceLayer::new_for_http());
            let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
            tracing::info!("listening on {}", config.http_addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        "worker" => {
            tracing::info!("starting worker mode");
            let interval = Duration::from_secs(config.campaign_interval_seconds.max(1));
            tokio::select! {
                result = jobs::campaign_scheduler::run(state.campaign.clone(), interval) => {
                    result?;
                }
                _ = shutdown_signal() => {}
            }
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
