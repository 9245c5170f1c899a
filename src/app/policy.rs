use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::clock;
use crate::app::quiet_hours;
use crate::app::rate_limiter::RateLimiter;
use crate::app::store::NotificationStore;
use crate::domain::channel_policy::{CategoryPolicy, ChannelPolicy};
use crate::domain::notification::NotificationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    CategoryDisabled,
    DailyLimitReached,
    QuietHours,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DenyReason::CategoryDisabled => "category_disabled",
            DenyReason::DailyLimitReached => "daily_limit_reached",
            DenyReason::QuietHours => "quiet_hours",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Denied(DenyReason),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit)
    }
}

pub fn is_category_allowed(categories: &CategoryPolicy, kind: NotificationKind) -> bool {
    categories.is_allowed(kind)
}

/// Admit/deny decision for one (user, kind) pair.
///
/// The daily count is read without a lock, so two concurrent admits can both
/// see headroom and overshoot the cap by one. Acceptable for nudges; anything
/// billing-related needs the count and insert in one transaction instead.
#[derive(Clone)]
pub struct PolicyEngine {
    rate_limiter: RateLimiter,
}

impl PolicyEngine {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self {
            rate_limiter: RateLimiter::new(store),
        }
    }

    pub async fn admit(
        &self,
        user_id: Uuid,
        policy: &ChannelPolicy,
        kind: NotificationKind,
        now: OffsetDateTime,
    ) -> Result<Admission> {
        if !is_category_allowed(&policy.categories, kind) {
            return Ok(Admission::Denied(DenyReason::CategoryDisabled));
        }

        let day_start = clock::start_of_local_day(now, &policy.quiet_hours.time_zone);
        let info = self
            .rate_limiter
            .check_daily_limit(user_id, policy.daily_limit, day_start)
            .await?;
        if info.limited {
            return Ok(Admission::Denied(DenyReason::DailyLimitReached));
        }

        if quiet_hours::is_quiet_window(now, &policy.quiet_hours) {
            return Ok(Admission::Denied(DenyReason::QuietHours));
        }

        Ok(Admission::Admit)
    }
}
