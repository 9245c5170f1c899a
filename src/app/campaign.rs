use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::clock;
use crate::app::dedup::DedupGuard;
use crate::app::dispatcher::{DispatchOutcome, Dispatcher};
use crate::app::store::{ActivityStore, NotificationStore, ProfileStore};
use crate::config::nudges::NudgeRule;
use crate::domain::channel_policy::ChannelPolicy;
use crate::domain::notification::NewNotification;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CampaignReport {
    pub users: usize,
    pub created: usize,
    /// Rules (or whole users) skipped because of an error.
    pub failed: usize,
}

#[derive(Default)]
struct UserReport {
    created: usize,
    failed: usize,
}

/// Evaluates nudge rules for every user and dispatches the ones that fire.
///
/// Users run concurrently up to `concurrency`; a single user's rules run in
/// order so they observe each other's writes against the daily cap.
#[derive(Clone)]
pub struct CampaignRunner {
    activity: Arc<dyn ActivityStore>,
    profiles: Arc<dyn ProfileStore>,
    dedup: DedupGuard,
    dispatcher: Dispatcher,
    rules: Arc<Vec<NudgeRule>>,
    concurrency: usize,
}

impl CampaignRunner {
    pub fn new(
        activity: Arc<dyn ActivityStore>,
        profiles: Arc<dyn ProfileStore>,
        notifications: Arc<dyn NotificationStore>,
        dispatcher: Dispatcher,
        rules: Vec<NudgeRule>,
        concurrency: usize,
    ) -> Self {
        Self {
            activity,
            profiles,
            dedup: DedupGuard::new(notifications),
            dispatcher,
            rules: Arc::new(rules),
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run(&self, now: OffsetDateTime) -> Result<CampaignReport> {
        let user_ids = self
            .activity
            .user_ids()
            .await
            .context("failed to list campaign users")?;

        let mut report = CampaignReport {
            users: user_ids.len(),
            ..CampaignReport::default()
        };

        let mut results = stream::iter(user_ids)
            .map(|user_id| self.run_for_user(user_id, now))
            .buffer_unordered(self.concurrency);
        while let Some(user_report) = results.next().await {
            report.created += user_report.created;
            report.failed += user_report.failed;
        }

        tracing::info!(
            users = report.users,
            created = report.created,
            failed = report.failed,
            "campaign run finished"
        );
        Ok(report)
    }

    async fn run_for_user(&self, user_id: Uuid, now: OffsetDateTime) -> UserReport {
        let mut report = UserReport::default();

        let policy = match self.profiles.channel_policy(user_id).await {
            Ok(policy) => policy,
            Err(err) => {
                tracing::warn!(error = ?err, user_id = %user_id, "failed to load channel policy");
                report.failed += 1;
                return report;
            }
        };

        for rule in self.rules.iter() {
            match self.evaluate_rule(user_id, &policy, rule, now).await {
                Ok(true) => report.created += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        error = ?err,
                        user_id = %user_id,
                        kind = %rule.kind,
                        "nudge rule failed"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    async fn evaluate_rule(
        &self,
        user_id: Uuid,
        policy: &ChannelPolicy,
        rule: &NudgeRule,
        now: OffsetDateTime,
    ) -> Result<bool> {
        if rule.once_per_day {
            let day_start = clock::start_of_local_day(now, &policy.quiet_hours.time_zone);
            if !self.dedup.can_trigger_today(user_id, rule.kind, day_start).await? {
                return Ok(false);
            }
        }

        let count = self
            .activity
            .count_activity(user_id, rule.activity, now - rule.lookback)
            .await?;
        if !rule.condition.is_met(count) {
            return Ok(false);
        }

        let draft = NewNotification::new(user_id, rule.kind, rule.message);
        let outcome = self.dispatcher.dispatch_with_policy(policy, draft, now).await?;
        Ok(matches!(outcome, DispatchOutcome::Created(_)))
    }
}
