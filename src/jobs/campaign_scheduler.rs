use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::app::campaign::CampaignRunner;

/// Runs the nudge campaign every `interval`, forever.
///
/// A failed run is logged and retried on the next tick; ticks missed while a
/// run is still going are skipped rather than queued.
pub async fn run(runner: CampaignRunner, interval: Duration) -> Result<()> {
    info!(interval_seconds = interval.as_secs(), "campaign scheduler started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match runner.run(OffsetDateTime::now_utc()).await {
            Ok(report) => info!(
                users = report.users,
                created = report.created,
                failed = report.failed,
                "scheduled campaign completed"
            ),
            Err(err) => error!(error = ?err, "scheduled campaign failed"),
        }
    }
}
